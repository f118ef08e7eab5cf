//! Beacon core: pure state machine for the dashboard's async coordination.
//!
//! Three engines share one reducer: the connection status synchronizer
//! (wizard steps derived from server push), the job reconciliation engine
//! (push and poll raced, first writer wins), and the message stream
//! assembler (optimistic inserts merged with authoritative deliveries).
mod effect;
mod msg;
mod state;
mod types;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{derive_step, AppState, MAX_POLL_ATTEMPTS, POLL_INTERVAL_MS, TYPING_TTL_SECS};
pub use types::{
    AuthState, AutoConnectCandidate, ConnectionStatus, ConversationId, Delivery, JobId, JobSignal,
    LifecycleState, Message, MessageId, OrgId, PolledStatus, Provider, Role, ScopeKey, WizardStep,
};
pub use update::update;
pub use view_model::{AppViewModel, MessageRowView, ProviderCardView};
