use crate::{
    app::{
        config::{self, Config},
        state::ChatInputs,
    },
    core::session::ChatSession,
};
use eframe::egui::{self, Align, Key, Layout};

pub fn draw_identity_prompt(
    ui: &mut egui::Ui,
    session: &mut ChatSession,
    inputs: &mut ChatInputs,
    config: &mut Config,
) {
    ui.with_layout(Layout::top_down(Align::Center), |ui| {
        ui.add_space(ui.available_height() * 0.25);
        ui.heading("Who is on the channel?");
        ui.add_space(10.0);

        let response = ui.add(
            egui::TextEdit::singleline(&mut inputs.username_input)
                .hint_text("Unit or name")
                .desired_width(220.0),
        );
        let enter_pressed = response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
        let has_name = !inputs.username_input.trim().is_empty();

        if (ui.add_enabled(has_name, egui::Button::new("Join")).clicked() || enter_pressed)
            && has_name
        {
            session.mount(&inputs.username_input);
            config.username = session.identity().map(str::to_string);
            let config_to_save = config.clone();
            tokio::spawn(async move {
                if let Err(e) = config::save(&config_to_save).await {
                    tracing::error!("Failed to save config: {}", e);
                }
            });
        }
    });
}
