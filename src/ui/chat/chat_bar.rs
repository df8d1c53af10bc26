use crate::{
    app::state::ChatInputs,
    core::session::{ChatSession, MenuState},
};
use eframe::egui;

pub fn draw_chat_bar(ui: &mut egui::Ui, session: &mut ChatSession, inputs: &mut ChatInputs) {
    ui.scope(|ui| {
        let new_font_size = ui.style().text_styles[&egui::TextStyle::Body].size * 1.25;
        ui.style_mut().override_font_id = Some(egui::FontId::new(
            new_font_size,
            egui::FontFamily::Proportional,
        ));

        ui.add_space(4.0);
        ui.horizontal(|ui| {
            let response = ui.add(
                egui::TextEdit::singleline(&mut inputs.message_to_send)
                    .hint_text("Message")
                    .desired_width(ui.available_width() - 120.0),
            );
            let enter_pressed =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Send").clicked() || enter_pressed {
                session.send_text(&mut inputs.message_to_send);
                if enter_pressed {
                    response.request_focus();
                }
            }

            let plus = egui::Button::new("+")
                .selected(session.attachment_menu() == MenuState::Open);
            if ui.add(plus).clicked() {
                session.toggle_menu();
            }
        });
        ui.add_space(4.0);
    });
}
