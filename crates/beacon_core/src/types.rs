use std::fmt;

use chrono::{DateTime, Utc};

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of an external integration provider (source control, chat, ...).
    Provider
);
string_id!(
    /// Server-side handle for an asynchronous chat job.
    JobId
);
string_id!(
    /// Message identifier. User messages carry a client-assigned id that the
    /// server echoes back, which is what makes optimistic inserts mergeable.
    MessageId
);
string_id!(OrgId);
string_id!(ConversationId);

impl MessageId {
    /// Client-assigned id for an optimistic user message.
    pub fn local(counter: u64) -> Self {
        Self(format!("local-{counter}"))
    }
}

/// Primary lifecycle of a provider connection, as reported by the server.
/// This field is always authoritative; the wizard step is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NotConnected,
    Connecting,
    Connected,
}

/// Secondary authorization sub-state for two-phase providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NotConnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoConnectCandidate {
    pub org_id: OrgId,
    pub org_name: String,
    pub source_integration_id: String,
}

/// One provider's connection status within an organization. Replaced
/// wholesale on every push snapshot, never merged field-by-field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub provider: Provider,
    pub lifecycle: LifecycleState,
    pub sub_auth: Option<AuthState>,
    pub account: Option<String>,
    pub can_auto_connect: bool,
    pub auto_connect_candidates: Vec<AutoConnectCandidate>,
    pub status_message: Option<String>,
}

/// Where the connection wizard stands for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    FirstPhase,
    SecondPhase,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A chat message. Immutable once created; display-ready rendered content is
/// tracked separately so rendering never blocks list insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether a list entry has been acknowledged by the server yet. A confirmed
/// event for the same id always replaces an optimistic entry, never the
/// reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Optimistic,
    Confirmed,
}

/// A job-status event delivered over the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSignal {
    Processing,
    Completed,
    Failed(String),
}

/// A job-status reading obtained from the poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolledStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

/// Key identifying one push subscription: the active organization (connection
/// status snapshots) or the active conversation (chat events).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeKey {
    Organization(OrgId),
    Conversation(ConversationId),
}
