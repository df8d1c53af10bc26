//! The chat session engine.
//!
//! `ChatSession` is owned by the UI thread and only mutated there: background
//! work (connecting, capturing, recording) reports back as [`SessionEvent`]s
//! which the reducer feeds into [`ChatSession::handle_event`].

use crate::{
    core::{
        connection::{Channel, ChannelId, Connector},
        error::ChatError,
        protocol,
    },
    events::app_event::{AppEvent, SessionEvent},
    media::{
        MediaDevices, album, camera,
        payload::Payload,
        recorder::{self, Recording},
    },
    models::message::{ChatMessage, MessageKind},
};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    Open,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No identity, so no channel.
    Idle,
    Connecting,
    Connected,
    Closed(Option<String>),
}

#[derive(Debug)]
enum RecordingState {
    Idle,
    /// Microphone acquisition in flight; `stop_requested` is set when the
    /// user lets go before it completes.
    Starting { stop_requested: bool },
    Active(Recording),
}

pub struct ChatSession {
    identity: Option<String>,
    channel: Option<Channel>,
    next_channel: u64,
    status: ConnectionStatus,
    log: Vec<ChatMessage>,
    menu: MenuState,
    recording: RecordingState,
    connector: Arc<dyn Connector>,
    devices: MediaDevices,
    events_tx: mpsc::Sender<AppEvent>,
}

impl ChatSession {
    pub fn new(
        connector: Arc<dyn Connector>,
        devices: MediaDevices,
        events_tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            identity: None,
            channel: None,
            next_channel: 1,
            status: ConnectionStatus::Idle,
            log: Vec::new(),
            menu: MenuState::Closed,
            recording: RecordingState::Idle,
            connector,
            devices,
            events_tx,
        }
    }

    /// Sets the participant identity. A changed identity replaces the channel:
    /// the old one is closed before the new one is opened. An empty identity
    /// leaves the session waiting for one.
    pub fn mount(&mut self, identity: &str) {
        let identity = identity.trim();
        if identity.is_empty() {
            self.unmount();
            return;
        }
        if self.identity.as_deref() == Some(identity) && self.channel.is_some() {
            return;
        }

        if let Some(old) = self.channel.take() {
            old.close();
        }
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        tracing::info!("Mounting chat session for {} on channel {}", identity, id);
        self.channel = Some(self.connector.open(identity, id, self.events_tx.clone()));
        self.identity = Some(identity.to_string());
        self.status = ConnectionStatus::Connecting;
    }

    /// Clears the identity, closing the channel and abandoning any recording.
    pub fn unmount(&mut self) {
        if let Some(channel) = self.channel.take() {
            tracing::info!("Unmounting chat session, closing channel {}", channel.id());
            channel.close();
        }
        self.identity = None;
        self.status = ConnectionStatus::Idle;
        self.menu = MenuState::Closed;
        self.recording = RecordingState::Idle;
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn log(&self) -> &[ChatMessage] {
        &self.log
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn attachment_menu(&self) -> MenuState {
        self.menu
    }

    pub fn toggle_menu(&mut self) {
        self.menu = match self.menu {
            MenuState::Closed => MenuState::Open,
            MenuState::Open => MenuState::Closed,
        };
    }

    pub fn close_menu(&mut self) {
        self.menu = MenuState::Closed;
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording, RecordingState::Active(_))
    }

    /// Sends the trimmed input as a text message and clears it. Blank input
    /// or a missing channel makes this a no-op that leaves the input alone.
    pub fn send_text(&mut self, input: &mut String) -> bool {
        let text = input.trim();
        if text.is_empty() {
            return false;
        }
        let text = text.to_string();
        if self.send(MessageKind::Text, text) {
            input.clear();
            true
        } else {
            false
        }
    }

    pub fn send_image(&mut self, payload: &Payload) -> bool {
        self.send_payload(MessageKind::Image, payload)
    }

    pub fn send_audio(&mut self, payload: &Payload) -> bool {
        self.send_payload(MessageKind::Audio, payload)
    }

    fn send_payload(&mut self, kind: MessageKind, payload: &Payload) -> bool {
        if let Err(e) = protocol::check_payload(kind, payload) {
            tracing::warn!("Not sending {} payload: {}", payload.mime(), e);
            return false;
        }
        self.send(kind, payload.to_data_url())
    }

    /// Encodes and submits one message. The log is not touched: our own
    /// message appears once the server echoes it back.
    fn send(&mut self, kind: MessageKind, content: String) -> bool {
        let (Some(identity), Some(channel)) = (self.identity.as_deref(), self.channel.as_ref())
        else {
            tracing::debug!("Ignoring {} send: {}", kind, ChatError::ConnectionUnavailable);
            return false;
        };
        let message = ChatMessage::now(identity, kind, content);
        match protocol::encode(&message) {
            Ok(frame) => {
                channel.send(frame);
                true
            }
            Err(e) => {
                tracing::error!("Failed to encode {} message: {}", kind, e);
                false
            }
        }
    }

    pub fn capture_photo(&mut self) {
        self.close_menu();
        let source = self.devices.camera.clone();
        let settle = self.devices.settle;
        self.spawn_capture(MessageKind::Image, async move {
            camera::capture_photo(source.as_ref(), settle).await
        });
    }

    pub fn pick_album(&mut self, path: PathBuf) {
        self.close_menu();
        self.spawn_capture(MessageKind::Image, async move { album::read_image(&path).await });
    }

    pub fn start_recording(&mut self) {
        if !matches!(self.recording, RecordingState::Idle) {
            return;
        }
        self.recording = RecordingState::Starting {
            stop_requested: false,
        };
        let microphone = self.devices.microphone.clone();
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = recorder::start(microphone.as_ref()).await;
            let _ = tx
                .send(AppEvent::Session(SessionEvent::RecordingStarted(result)))
                .await;
        });
    }

    /// Ends the active recording and sends it. Without a recording this only
    /// closes the menu.
    pub fn stop_recording(&mut self) {
        self.close_menu();
        match std::mem::replace(&mut self.recording, RecordingState::Idle) {
            RecordingState::Active(recording) => self.finish_recording(recording),
            RecordingState::Starting { .. } => {
                self.recording = RecordingState::Starting {
                    stop_requested: true,
                };
            }
            RecordingState::Idle => {}
        }
    }

    fn finish_recording(&self, recording: Recording) {
        tracing::info!("Stopping recording");
        self.spawn_capture(MessageKind::Audio, recording.stop());
    }

    fn spawn_capture<F>(&self, kind: MessageKind, capture: F)
    where
        F: Future<Output = Result<Payload, ChatError>> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = capture.await;
            let _ = tx
                .send(AppEvent::Session(SessionEvent::CaptureFinished { kind, result }))
                .await;
        });
    }

    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::ChannelOpened(id) => {
                if self.is_current(id) {
                    tracing::info!("Channel {} connected", id);
                    self.status = ConnectionStatus::Connected;
                }
            }
            SessionEvent::Inbound { channel, message } => {
                if self.is_current(channel) {
                    self.log.push(message);
                } else {
                    tracing::trace!("Discarding frame from replaced channel {}", channel);
                }
            }
            SessionEvent::ChannelClosed { channel, reason } => {
                if self.is_current(channel) {
                    tracing::warn!("Channel {} closed: {:?}", channel, reason);
                    self.channel = None;
                    self.status = ConnectionStatus::Closed(reason);
                }
            }
            SessionEvent::RecordingStarted(result) => self.handle_recording_started(result),
            SessionEvent::CaptureFinished { kind, result } => match result {
                Ok(payload) => {
                    self.send_payload(kind, &payload);
                }
                Err(e) => tracing::warn!("{} capture failed: {}", kind, e),
            },
        }
    }

    fn handle_recording_started(&mut self, result: Result<Recording, ChatError>) {
        let RecordingState::Starting { stop_requested } = self.recording else {
            // Unmounted while the microphone was being acquired; dropping the
            // recording releases it.
            return;
        };
        match result {
            Ok(recording) if stop_requested => {
                self.recording = RecordingState::Idle;
                self.finish_recording(recording);
            }
            Ok(recording) => {
                tracing::info!("Recording started");
                self.recording = RecordingState::Active(recording);
            }
            Err(e) => {
                tracing::warn!("Could not start recording: {}", e);
                self.recording = RecordingState::Idle;
            }
        }
    }

    fn is_current(&self, id: ChannelId) -> bool {
        self.channel.as_ref().is_some_and(|c| c.id() == id)
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::connection::memory::{MemoryConnector, RemoteEnd},
        media::fake::{FakeCamera, FakeMicrophone},
    };
    use std::time::Duration;

    struct Harness {
        session: ChatSession,
        connector: MemoryConnector,
        camera: Arc<FakeCamera>,
        microphone: Arc<FakeMicrophone>,
        events_rx: mpsc::Receiver<AppEvent>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_devices(FakeCamera::with_frame(2, 2), FakeMicrophone::default())
        }

        fn with_devices(camera: FakeCamera, microphone: FakeMicrophone) -> Self {
            let connector = MemoryConnector::default();
            let camera = Arc::new(camera);
            let microphone = Arc::new(microphone);
            let (events_tx, events_rx) = mpsc::channel(64);
            let devices = MediaDevices {
                camera: camera.clone(),
                microphone: microphone.clone(),
                settle: Duration::ZERO,
            };
            let session = ChatSession::new(Arc::new(connector.clone()), devices, events_tx);
            Self {
                session,
                connector,
                camera,
                microphone,
                events_rx,
            }
        }

        /// Feeds the next background event into the session.
        async fn pump(&mut self) -> &'static str {
            let event = tokio::time::timeout(Duration::from_secs(2), self.events_rx.recv())
                .await
                .expect("timed out waiting for session event")
                .expect("event channel closed");
            let AppEvent::Session(event) = event else {
                panic!("unexpected app event");
            };
            let name = match &event {
                SessionEvent::ChannelOpened(_) => "opened",
                SessionEvent::Inbound { .. } => "inbound",
                SessionEvent::ChannelClosed { .. } => "closed",
                SessionEvent::RecordingStarted(_) => "recording",
                SessionEvent::CaptureFinished { .. } => "capture",
            };
            self.session.handle_event(event);
            name
        }

        async fn mount(&mut self, identity: &str) -> RemoteEnd {
            self.session.mount(identity);
            assert_eq!(self.pump().await, "opened");
            self.connector.take_remote().expect("channel opened")
        }
    }

    fn frame(sender: &str, kind: MessageKind, content: &str) -> String {
        protocol::encode(&ChatMessage::now(sender, kind, content.to_string())).unwrap()
    }

    async fn next_frame(remote: &mut RemoteEnd) -> ChatMessage {
        let text = tokio::time::timeout(Duration::from_secs(2), remote.next_sent_text())
            .await
            .expect("timed out waiting for outbound frame")
            .expect("transport closed");
        protocol::decode(text.as_bytes()).unwrap()
    }

    #[tokio::test]
    async fn sending_text_emits_one_frame_and_waits_for_echo() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;
        assert_eq!(h.session.status(), &ConnectionStatus::Connected);

        let mut input = String::from("Unit en route");
        assert!(h.session.send_text(&mut input));
        assert!(input.is_empty());
        assert!(h.session.log().is_empty());

        let sent = next_frame(&mut remote).await;
        assert_eq!(sent.sender, "Dispatcher");
        assert_eq!(sent.content, "Unit en route");
        assert_eq!(sent.kind, MessageKind::Text);
        assert!(!sent.timestamp.is_empty());

        remote.push_text(&protocol::encode(&sent).unwrap());
        assert_eq!(h.pump().await, "inbound");
        assert_eq!(h.session.log(), &[sent]);
    }

    #[tokio::test]
    async fn text_is_trimmed_before_sending() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        let mut input = String::from("  copy that \n");
        assert!(h.session.send_text(&mut input));
        assert_eq!(next_frame(&mut remote).await.content, "copy that");
    }

    #[tokio::test]
    async fn blank_text_is_ignored() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        for blank in ["", "   "] {
            let mut input = blank.to_string();
            assert!(!h.session.send_text(&mut input));
            assert_eq!(input, blank);
        }
        let mut input = String::from("marker");
        h.session.send_text(&mut input);
        assert_eq!(next_frame(&mut remote).await.content, "marker");
    }

    #[tokio::test]
    async fn inbound_frames_append_in_delivery_order() {
        let mut h = Harness::new();
        let remote = h.mount("Dispatcher").await;
        let image = Payload::new("image/png", vec![1, 2, 3]).to_data_url();

        remote.push_text(&frame("Field1", MessageKind::Text, "On scene"));
        remote.push_text("{\"not\": \"a message\"}");
        remote.push_text(&frame("Field1", MessageKind::Image, &image));
        assert_eq!(h.pump().await, "inbound");
        assert_eq!(h.pump().await, "inbound");

        let log = h.session.log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].kind, MessageKind::Text);
        assert_eq!(log[0].content, "On scene");
        assert_eq!(log[1].kind, MessageKind::Image);
        assert!(Payload::from_data_url(&log[1].content).unwrap().is_image());
    }

    #[tokio::test]
    async fn sends_without_identity_are_no_ops() {
        let mut h = Harness::new();
        let audio = Payload::new("audio/wav", vec![0; 4]);

        assert!(!h.session.send_audio(&audio));
        assert!(!h.session.send_image(&audio));
        let mut input = String::from("hello");
        assert!(!h.session.send_text(&mut input));
        assert_eq!(input, "hello");

        assert!(h.connector.opened().is_empty());
        assert!(h.session.log().is_empty());
        assert_eq!(h.session.status(), &ConnectionStatus::Idle);
    }

    #[tokio::test]
    async fn empty_identity_does_not_connect() {
        let mut h = Harness::new();
        h.session.mount("   ");
        assert!(h.session.identity().is_none());
        assert!(h.connector.opened().is_empty());
    }

    #[tokio::test]
    async fn identity_change_replaces_channel() {
        let mut h = Harness::new();
        let mut first = h.mount("Dispatcher").await;
        h.session.mount("Dispatcher");
        assert_eq!(h.connector.opened(), vec!["Dispatcher"]);

        let second = h.mount("Supervisor").await;
        assert_eq!(h.connector.opened(), vec!["Dispatcher", "Supervisor"]);
        assert_eq!(second.identity, "Supervisor");

        // The old channel was closed before the new one took over.
        let mut saw_close = false;
        while let Some(msg) = futures::StreamExt::next(&mut first.sent).await {
            saw_close |= msg.is_close();
        }
        assert!(saw_close);

        // A late frame on the replaced channel never reaches the log.
        h.session.handle_event(SessionEvent::Inbound {
            channel: first.id,
            message: ChatMessage::now("Field1", MessageKind::Text, "stale".into()),
        });
        second.push_text(&frame("Field1", MessageKind::Text, "fresh"));
        assert_eq!(h.pump().await, "inbound");
        assert_eq!(h.session.log().len(), 1);
        assert_eq!(h.session.log()[0].content, "fresh");
    }

    #[tokio::test]
    async fn unmount_closes_channel() {
        let mut h = Harness::new();
        let _remote = h.mount("Dispatcher").await;
        h.session.toggle_menu();
        h.session.unmount();

        assert!(h.session.identity().is_none());
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        assert_eq!(h.session.status(), &ConnectionStatus::Idle);
        let mut input = String::from("late");
        assert!(!h.session.send_text(&mut input));
    }

    #[tokio::test]
    async fn remote_close_is_reported_without_reconnect() {
        let mut h = Harness::new();
        let remote = h.mount("Dispatcher").await;
        drop(remote);

        assert_eq!(h.pump().await, "closed");
        assert_eq!(h.session.status(), &ConnectionStatus::Closed(None));
        assert_eq!(h.connector.opened().len(), 1);
        let mut input = String::from("anyone?");
        assert!(!h.session.send_text(&mut input));
    }

    #[test]
    fn menu_toggles() {
        let mut h = Harness::new();
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        h.session.toggle_menu();
        assert_eq!(h.session.attachment_menu(), MenuState::Open);
        h.session.toggle_menu();
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
    }

    #[tokio::test]
    async fn camera_capture_closes_menu_and_sends_image() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        h.session.toggle_menu();
        h.session.capture_photo();
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        assert_eq!(h.pump().await, "capture");

        let sent = next_frame(&mut remote).await;
        assert_eq!(sent.kind, MessageKind::Image);
        assert_eq!(Payload::from_data_url(&sent.content).unwrap().mime(), "image/png");
        assert_eq!(h.camera.releases.count(), 1);
        assert!(h.session.log().is_empty());
    }

    #[tokio::test]
    async fn failed_capture_closes_menu_and_sends_nothing() {
        let camera = FakeCamera {
            deny: true,
            ..Default::default()
        };
        let mut h = Harness::with_devices(camera, FakeMicrophone::default());
        let mut remote = h.mount("Dispatcher").await;

        h.session.toggle_menu();
        h.session.capture_photo();
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        assert_eq!(h.pump().await, "capture");

        h.session.toggle_menu();
        h.session.pick_album(PathBuf::from("/definitely/missing.png"));
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        assert_eq!(h.pump().await, "capture");

        let mut input = String::from("marker");
        h.session.send_text(&mut input);
        assert_eq!(next_frame(&mut remote).await.content, "marker");
        assert!(h.session.log().is_empty());
    }

    #[tokio::test]
    async fn album_pick_sends_file_payload() {
        let mut h = Harness::new();
        let mut remote = h.mount("Field1").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        h.session.pick_album(path);
        assert_eq!(h.pump().await, "capture");

        let sent = next_frame(&mut remote).await;
        assert_eq!(sent.kind, MessageKind::Image);
        let payload = Payload::from_data_url(&sent.content).unwrap();
        assert_eq!(payload.data(), &[0x89, b'P', b'N', b'G']);
    }

    #[tokio::test]
    async fn album_tiff_is_echoed_into_the_log() {
        let mut h = Harness::new();
        let mut remote = h.mount("Field1").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.tiff");
        std::fs::write(&path, [b'I', b'I', 42, 0, 8, 0, 0, 0]).unwrap();

        h.session.pick_album(path);
        assert_eq!(h.pump().await, "capture");

        let sent = next_frame(&mut remote).await;
        assert_eq!(Payload::from_data_url(&sent.content).unwrap().mime(), "image/tiff");
        remote.push_text(&protocol::encode(&sent).unwrap());
        assert_eq!(h.pump().await, "inbound");
        assert_eq!(h.session.log(), &[sent]);
    }

    #[tokio::test]
    async fn payload_of_the_wrong_kind_is_not_sent() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        let wav = Payload::new("audio/wav", vec![0; 4]);
        let notes = Payload::new("text/plain", b"notes".to_vec());
        assert!(!h.session.send_image(&wav));
        assert!(!h.session.send_image(&notes));
        assert!(!h.session.send_audio(&notes));

        let mut input = String::from("marker");
        h.session.send_text(&mut input);
        assert_eq!(next_frame(&mut remote).await.content, "marker");
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let mut h = Harness::new();
        let _remote = h.mount("Dispatcher").await;
        h.session.toggle_menu();

        h.session.stop_recording();
        assert!(!h.session.is_recording());
        assert_eq!(h.session.attachment_menu(), MenuState::Closed);
        assert!(h.events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn recording_round_trip_sends_audio() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        h.session.start_recording();
        assert_eq!(h.pump().await, "recording");
        assert!(h.session.is_recording());
        assert!(h.microphone.push(vec![5, 6]));
        assert!(h.microphone.push(vec![7]));

        h.session.stop_recording();
        assert!(!h.session.is_recording());
        assert_eq!(h.pump().await, "capture");

        let sent = next_frame(&mut remote).await;
        assert_eq!(sent.kind, MessageKind::Audio);
        let payload = Payload::from_data_url(&sent.content).unwrap();
        assert_eq!(payload.mime(), "audio/wav");
        assert_eq!(&payload.data()[44..], &[5, 0, 6, 0, 7, 0]);
        assert_eq!(h.microphone.releases.count(), 1);
    }

    #[tokio::test]
    async fn recording_with_no_audio_still_returns_to_idle() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        h.session.start_recording();
        assert_eq!(h.pump().await, "recording");
        h.session.stop_recording();
        assert_eq!(h.pump().await, "capture");

        assert!(!h.session.is_recording());
        let sent = next_frame(&mut remote).await;
        assert_eq!(sent.kind, MessageKind::Audio);
        assert_eq!(h.microphone.releases.count(), 1);
    }

    #[tokio::test]
    async fn stop_during_acquisition_finishes_once_started() {
        let mut h = Harness::new();
        let mut remote = h.mount("Dispatcher").await;

        h.session.start_recording();
        h.session.stop_recording();
        assert_eq!(h.pump().await, "recording");
        assert!(!h.session.is_recording());
        assert_eq!(h.pump().await, "capture");

        assert_eq!(next_frame(&mut remote).await.kind, MessageKind::Audio);
    }

    #[tokio::test]
    async fn denied_microphone_returns_to_idle() {
        let mut h = Harness::with_devices(FakeCamera::default(), FakeMicrophone::denied());
        let _remote = h.mount("Dispatcher").await;

        h.session.start_recording();
        assert_eq!(h.pump().await, "recording");
        assert!(!h.session.is_recording());

        // A fresh start is allowed after the failure.
        h.session.start_recording();
        assert_eq!(h.pump().await, "recording");
    }

    #[tokio::test]
    async fn audio_without_identity_is_dropped() {
        let mut h = Harness::new();
        h.session.start_recording();
        assert_eq!(h.pump().await, "recording");
        h.session.stop_recording();
        assert_eq!(h.pump().await, "capture");

        assert!(h.connector.opened().is_empty());
        assert!(h.session.log().is_empty());
    }
}
