use super::state::{AppState, ChatInputs, Tab};
use crate::{
    app::config::Config,
    core::{connection::WsConnector, session::ChatSession},
    events::app_event::AppEvent,
    media::MediaDevices,
};
use std::sync::Arc;
use tokio::sync::mpsc;

pub fn reduce(
    state: &mut AppState,
    event: AppEvent,
    config: &mut Config,
    event_tx: mpsc::Sender<AppEvent>,
) {
    match event {
        AppEvent::ConfigLoaded(config_result) => {
            handle_config_loaded(state, config_result, config, event_tx);
        }
        AppEvent::Session(session_event) => {
            if let AppState::Ready { session, .. } = state {
                session.handle_event(session_event);
            } else {
                tracing::debug!("Session event before startup finished: {:?}", session_event);
            }
        }
    }
}

fn handle_config_loaded(
    state: &mut AppState,
    result: Result<Config, eyre::Report>,
    config: &mut Config,
    event_tx: mpsc::Sender<AppEvent>,
) {
    match result {
        Ok(loaded_config) => *config = loaded_config,
        Err(e) => tracing::error!("Failed to load config, using defaults: {:?}", e),
    }

    let endpoint = match config.chat_endpoint() {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::error!("{:?}", e);
            *state = AppState::StartupFailed {
                error: format!("{e:#}"),
            };
            return;
        }
    };

    let devices = MediaDevices::platform(config.camera_index, config.camera_settle());
    let mut session = ChatSession::new(Arc::new(WsConnector::new(endpoint)), devices, event_tx);

    let mut inputs = ChatInputs::default();
    if let Some(username) = config.username.as_deref() {
        inputs.username_input = username.to_string();
        session.mount(username);
    }

    *state = AppState::Ready {
        session,
        inputs,
        active_tab: Tab::Chat,
    };
}
