use crate::{
    app::config::Config,
    core::session::ChatSession,
    media::{payload::Payload, recorder::wav_duration_secs},
    models::message::{ChatMessage, MessageKind},
    utils::text_processing::{TextOrUrl, parse_text_for_urls},
};
use eframe::egui::{self, Align, Color32, CornerRadius, Layout, Margin, RichText, ScrollArea};
use std::{collections::HashMap, path::PathBuf, sync::Arc};

const OWN_BUBBLE: Color32 = Color32::from_rgb(219, 234, 254);
const OTHER_BUBBLE: Color32 = Color32::from_rgb(220, 252, 231);
const BUBBLE_TEXT: Color32 = Color32::from_rgb(17, 24, 39);

// Keyed by log position; log entries never change.
#[derive(Default)]
pub struct MediaCache {
    entries: HashMap<usize, CachedMedia>,
}

enum CachedMedia {
    Image { uri: String, bytes: Arc<[u8]> },
    Audio { payload: Payload, seconds: Option<f32> },
    Unreadable,
}

impl MediaCache {
    fn get(&mut self, index: usize, message: &ChatMessage) -> &CachedMedia {
        self.entries
            .entry(index)
            .or_insert_with(|| decode_media(index, message))
    }
}

fn decode_media(index: usize, message: &ChatMessage) -> CachedMedia {
    let payload = match Payload::from_data_url(&message.content) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Unreadable {} payload at {}: {}", message.kind, index, e);
            return CachedMedia::Unreadable;
        }
    };
    match message.kind {
        MessageKind::Image => {
            let extension = if payload.is_image() {
                payload.extension()
            } else {
                match image::guess_format(payload.data()) {
                    Ok(format) => format.extensions_str().first().copied().unwrap_or("img"),
                    Err(_) => return CachedMedia::Unreadable,
                }
            };
            CachedMedia::Image {
                uri: format!("bytes://chat/{index}.{extension}"),
                bytes: payload.into_data().into(),
            }
        }
        _ => CachedMedia::Audio {
            seconds: wav_duration_secs(payload.data()),
            payload,
        },
    }
}

pub fn draw_chat_log(
    ui: &mut egui::Ui,
    session: &ChatSession,
    config: &Config,
    cache: &mut MediaCache,
) {
    let identity = session.identity();
    ScrollArea::vertical()
        .id_salt("chat_log_scroll_area")
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for (index, message) in session.log().iter().enumerate() {
                let own = message.is_from(identity);
                let align = if own { Align::Max } else { Align::Min };
                ui.with_layout(Layout::top_down(align), |ui| {
                    draw_bubble(ui, index, message, own, config, cache);
                });
                ui.add_space(6.0);
            }
        });
}

fn draw_bubble(
    ui: &mut egui::Ui,
    index: usize,
    message: &ChatMessage,
    own: bool,
    config: &Config,
    cache: &mut MediaCache,
) {
    let max_width = ui.available_width() * 0.83;
    egui::Frame::new()
        .fill(if own { OWN_BUBBLE } else { OTHER_BUBBLE })
        .corner_radius(CornerRadius::same(6))
        .inner_margin(Margin::same(8))
        .show(ui, |ui| {
            ui.set_max_width(max_width);
            let header = if config.show_timestamps {
                format!("{} ({})", message.sender, message.timestamp)
            } else {
                message.sender.clone()
            };
            ui.label(RichText::new(header).strong().color(BUBBLE_TEXT));

            match message.kind {
                MessageKind::Text => draw_text(ui, &message.content),
                MessageKind::Image | MessageKind::Audio => {
                    draw_media(ui, index, cache.get(index, message), max_width)
                }
            }
        });
}

fn draw_text(ui: &mut egui::Ui, text: &str) {
    ui.horizontal_wrapped(|ui| {
        for segment in parse_text_for_urls(text) {
            match segment {
                TextOrUrl::Text(t) => {
                    ui.label(RichText::new(t).color(BUBBLE_TEXT));
                }
                TextOrUrl::Url(u) => {
                    ui.hyperlink(&u);
                }
            }
        }
    });
}

fn draw_media(ui: &mut egui::Ui, index: usize, media: &CachedMedia, max_width: f32) {
    match media {
        CachedMedia::Image { uri, bytes } => {
            ui.add(egui::Image::from_bytes(uri.clone(), bytes.clone()).max_width(max_width));
        }
        CachedMedia::Audio { payload, seconds } => {
            ui.horizontal(|ui| {
                let length = seconds.map_or_else(|| "?".to_string(), |s| format!("{s:.1}s"));
                ui.label(RichText::new(format!("🔊 Voice message ({length})")).color(BUBBLE_TEXT));
                if ui.button("Save").clicked() {
                    save_payload(index, payload.clone());
                }
            });
        }
        CachedMedia::Unreadable => {
            ui.label(RichText::new("Attachment could not be displayed").italics());
        }
    }
}

fn save_payload(index: usize, payload: Payload) {
    let dir = dirs::download_dir().unwrap_or_else(|| PathBuf::from("."));
    let path = dir.join(format!("voice-{}.{}", index, payload.extension()));
    tokio::spawn(async move {
        match tokio::fs::write(&path, payload.data()).await {
            Ok(()) => tracing::info!("Saved attachment to {:?}", path),
            Err(e) => tracing::error!("Failed to save attachment to {:?}: {}", path, e),
        }
    });
}
