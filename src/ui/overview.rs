use crate::app::config::IncidentContext;
use eframe::egui::{self, RichText};

pub fn draw_overview(ui: &mut egui::Ui, incident: Option<&IncidentContext>) {
    let Some(incident) = incident else {
        ui.centered_and_justified(|ui| {
            ui.label("No incident assigned.");
        });
        return;
    };

    ui.heading(&incident.title);
    ui.label(RichText::new(format!("Incident #{}", incident.id)).weak());
    ui.add_space(10.0);

    egui::Grid::new("incident_overview_grid")
        .num_columns(2)
        .spacing([16.0, 6.0])
        .show(ui, |ui| {
            ui.label("Reported");
            ui.label(&incident.time);
            ui.end_row();

            ui.label("Position");
            ui.label(format!("{:.5}, {:.5}", incident.latitude, incident.longitude));
            ui.end_row();
        });

    ui.add_space(10.0);
    ui.separator();
    ui.label(&incident.incident);
}
