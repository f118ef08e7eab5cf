use chrono::{DateTime, Utc};

use crate::{AutoConnectCandidate, MessageId, Provider, Role, WizardStep};

/// Read-only projection of [`crate::AppState`] for the UI shell. Components
/// read this; all mutation flows through `update`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub providers: Vec<ProviderCardView>,
    pub messages: Vec<MessageRowView>,
    pub typing_users: Vec<String>,
    pub is_processing: bool,
    pub notice: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderCardView {
    pub provider: Provider,
    pub step: WizardStep,
    pub account: Option<String>,
    pub can_auto_connect: bool,
    pub candidates: Vec<AutoConnectCandidate>,
    pub status_message: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRowView {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub html: Option<String>,
    /// True while the entry is optimistic (not yet acknowledged by a push).
    pub pending_ack: bool,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}
