use crate::{
    app::state::ChatInputs,
    core::session::{ChatSession, MenuState},
};
use eframe::egui;
use std::path::PathBuf;

pub fn draw_attachment_menu(ctx: &egui::Context, session: &mut ChatSession, inputs: &mut ChatInputs) {
    // Releasing the record button may happen after the menu closed.
    if session.attachment_menu() == MenuState::Closed {
        if inputs.record_pressed && !ctx.input(|i| i.pointer.primary_down()) {
            inputs.record_pressed = false;
            session.stop_recording();
        }
        return;
    }

    let mut open = true;
    egui::Window::new("Attach")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
        .open(&mut open)
        .show(ctx, |ui| {
            ui.set_min_width(220.0);
            let full = egui::vec2(ui.available_width(), 0.0);

            if ui.add_sized(full, egui::Button::new("Camera")).clicked() {
                session.capture_photo();
            }

            ui.separator();
            ui.label("Album");
            ui.horizontal(|ui| {
                ui.add(
                    egui::TextEdit::singleline(&mut inputs.album_path)
                        .hint_text("Path to image")
                        .desired_width(150.0),
                );
                let has_path = !inputs.album_path.trim().is_empty();
                if ui.add_enabled(has_path, egui::Button::new("Send")).clicked() {
                    let path = PathBuf::from(inputs.album_path.trim());
                    inputs.album_path.clear();
                    session.pick_album(path);
                }
            });

            ui.separator();
            let label = if session.is_recording() {
                "Recording..."
            } else {
                "Press to record"
            };
            let response = ui.add_sized(
                full,
                egui::Button::new(label).sense(egui::Sense::click_and_drag()),
            );
            let down = response.is_pointer_button_down_on();
            if down && !inputs.record_pressed {
                session.start_recording();
            } else if !down && inputs.record_pressed {
                session.stop_recording();
            }
            inputs.record_pressed = down;
        });

    if !open && session.attachment_menu() == MenuState::Open {
        session.close_menu();
    }
}
