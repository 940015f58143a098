//! Sitzungsereignisse für Abonnenten (SSE).
//!
//! Jede Auswahländerung, jeder Szenenaufbau und jede Fehlermeldung wird als
//! `SessionEvent` über einen Broadcast-Kanal verteilt. Langsame Abonnenten
//! verlieren ältere Ereignisse, blockieren aber nie die Sitzung.

use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::model::PlacedItem;
use crate::retrieval::RetrievalHint;

/// Kapazität des Broadcast-Puffers pro Abonnent.
pub const EVENT_BUFFER: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Ereignisse einer Visualisierungssitzung.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum SessionEvent {
    /// Die Szene wurde aufgebaut und wird gerendert.
    SceneReady {
        container_id: String,
        zone_name: Option<String>,
        item_count: usize,
        skipped_items: Vec<String>,
    },
    /// Die Auswahl hat sich geändert (`item_id = None` bedeutet abgewählt).
    SelectionChanged {
        item_id: Option<String>,
        previous: Option<String>,
    },
    /// Detailansicht des ausgewählten Objekts.
    ItemInfo {
        item: PlacedItem,
        retrieval: RetrievalHint,
    },
    /// Eine Zeile der Seitenleiste wurde aktiviert.
    PanelSync { row: usize, label: String },
    /// Meldung für den Benutzer.
    Notification {
        level: NotificationLevel,
        message: String,
    },
    /// Die Sitzung wurde beendet und alle Ressourcen freigegeben.
    SessionClosed { container_id: String },
}

impl SessionEvent {
    /// Name des SSE-Ereignisses.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionEvent::SceneReady { .. } => "scene_ready",
            SessionEvent::SelectionChanged { .. } => "selection_changed",
            SessionEvent::ItemInfo { .. } => "item_info",
            SessionEvent::PanelSync { .. } => "panel_sync",
            SessionEvent::Notification { .. } => "notification",
            SessionEvent::SessionClosed { .. } => "session_closed",
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        SessionEvent::Notification {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Sendeseite des Ereigniskanals.
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Verteilt ein Ereignis. Ohne Abonnenten wird es verworfen.
    pub fn emit(&self, event: SessionEvent) {
        tracing::trace!(kind = event.kind(), "session event");
        // Err bedeutet nur: niemand hört zu.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}
