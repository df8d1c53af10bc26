use crate::{
    app::{
        config::{self, Config},
        reducer,
        state::{AppState, ChatInputs, Tab},
    },
    core::session::{ChatSession, ConnectionStatus},
    events::app_event::AppEvent,
    ui::{
        chat::{attachment_menu, chat_bar, chat_log, chat_log::MediaCache, identity_prompt},
        fonts, overview,
    },
};
use eframe::egui::{self, Align, Color32, Layout, TopBottomPanel};
use tokio::sync::mpsc;

pub struct App {
    state: AppState,
    event_rx: mpsc::Receiver<AppEvent>,
    event_tx: mpsc::Sender<AppEvent>,
    config: Config,
    media_cache: MediaCache,
    show_settings_window: bool,
    startup_task_spawned: bool,
    fonts_installed: bool,
}

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let (event_tx, event_rx) = mpsc::channel(100);
        Self {
            state: AppState::Startup,
            event_rx,
            event_tx,
            config: Config::default(),
            media_cache: MediaCache::default(),
            show_settings_window: false,
            startup_task_spawned: false,
            fonts_installed: false,
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_settings(ctx);

        while let Ok(event) = self.event_rx.try_recv() {
            reducer::reduce(&mut self.state, event, &mut self.config, self.event_tx.clone());
        }

        match &mut self.state {
            AppState::Startup => {
                if !self.startup_task_spawned {
                    self.startup_task_spawned = true;
                    let tx = self.event_tx.clone();
                    tokio::spawn(async move {
                        let result = config::load().await;
                        tx.send(AppEvent::ConfigLoaded(result)).await.ok();
                    });
                }
                draw_loading_ui(ctx, "Starting...");
            }
            AppState::StartupFailed { error } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.with_layout(Layout::top_down(Align::Center), |ui| {
                        ui.add_space(ui.available_height() * 0.3);
                        ui.heading("Incident Chat could not start");
                        ui.colored_label(Color32::RED, error.as_str());
                    });
                });
            }
            AppState::Ready {
                session,
                inputs,
                active_tab,
            } => {
                if !self.fonts_installed {
                    self.fonts_installed = true;
                    if self.config.enable_cjk_font {
                        fonts::install_system_fonts(ctx);
                    }
                }

                TopBottomPanel::top("top_panel").show(ctx, |ui| {
                    draw_top_bar(ui, session, active_tab, &mut self.show_settings_window);
                });

                if session.identity().is_none() {
                    egui::CentralPanel::default().show(ctx, |ui| {
                        identity_prompt::draw_identity_prompt(ui, session, inputs, &mut self.config);
                    });
                } else {
                    match active_tab {
                        Tab::Overview => {
                            egui::CentralPanel::default().show(ctx, |ui| {
                                overview::draw_overview(ui, self.config.incident.as_ref());
                            });
                        }
                        Tab::Chat => {
                            draw_chat(ctx, session, inputs, &self.config, &mut self.media_cache)
                        }
                    }
                }

                draw_settings_window(ctx, &mut self.show_settings_window, &mut self.config);
            }
        }

        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

impl App {
    fn apply_settings(&mut self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        style.text_styles.iter_mut().for_each(|(_, font_id)| {
            font_id.size = self.config.font_size;
        });
        ctx.set_style(style);
    }
}

fn draw_loading_ui(ctx: &egui::Context, message: &str) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.centered_and_justified(|ui| {
            ui.with_layout(Layout::top_down(Align::Center), |ui| {
                ui.heading(message);
                ui.add_space(10.0);
                ui.spinner();
            });
        });
    });
}

fn draw_top_bar(
    ui: &mut egui::Ui,
    session: &mut ChatSession,
    active_tab: &mut Tab,
    show_settings_window: &mut bool,
) {
    ui.horizontal(|ui| {
        ui.selectable_value(active_tab, Tab::Overview, "Overview");
        ui.selectable_value(active_tab, Tab::Chat, "Chat");

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if ui.button("⚙").clicked() {
                *show_settings_window = !*show_settings_window;
            }
            if let Some(identity) = session.identity().map(str::to_string) {
                if ui.button("Switch user").clicked() {
                    session.unmount();
                }
                draw_status(ui, session.status());
                ui.label(format!("Signed in as {identity}"));
            }
        });
    });
}

fn draw_status(ui: &mut egui::Ui, status: &ConnectionStatus) {
    match status {
        ConnectionStatus::Idle => {}
        ConnectionStatus::Connecting => {
            ui.spinner();
        }
        ConnectionStatus::Connected => {
            ui.colored_label(Color32::from_rgb(34, 197, 94), "● Connected");
        }
        ConnectionStatus::Closed(reason) => {
            let text = match reason {
                Some(reason) => format!("● Disconnected: {reason}"),
                None => "● Disconnected".to_string(),
            };
            ui.colored_label(Color32::RED, text);
        }
    }
}

fn draw_chat(
    ctx: &egui::Context,
    session: &mut ChatSession,
    inputs: &mut ChatInputs,
    config: &Config,
    media_cache: &mut MediaCache,
) {
    TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
        chat_bar::draw_chat_bar(ui, session, inputs);
    });

    egui::CentralPanel::default().show(ctx, |ui| {
        chat_log::draw_chat_log(ui, session, config, media_cache);
    });

    attachment_menu::draw_attachment_menu(ctx, session, inputs);
}

fn draw_settings_window(ctx: &egui::Context, open: &mut bool, config: &mut Config) {
    egui::Window::new("Settings").open(open).show(ctx, |ui| {
        ui.heading("Appearance");
        let mut config_changed = false;

        config_changed |= ui
            .add(egui::Slider::new(&mut config.font_size, 8.0..=24.0).text("Font Size"))
            .changed();
        config_changed |= ui
            .checkbox(&mut config.show_timestamps, "Show timestamps")
            .changed();
        config_changed |= ui
            .checkbox(&mut config.enable_cjk_font, "Load CJK system fonts (restart)")
            .changed();

        if config_changed {
            let config_to_save = config.clone();
            tokio::spawn(async move {
                if let Err(e) = config::save(&config_to_save).await {
                    tracing::error!("Failed to save config: {}", e);
                }
            });
        }
    });
}
