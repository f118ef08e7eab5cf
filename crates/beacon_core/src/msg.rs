use chrono::{DateTime, Utc};

use crate::{
    ConnectionStatus, ConversationId, JobId, JobSignal, Message, MessageId, OrgId, PolledStatus,
    Provider, ScopeKey,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User switched the active organization.
    OrganizationSelected(OrgId),
    /// User opened a conversation with the assistant.
    ConversationOpened(ConversationId),
    /// Push channel delivered a full connection-status snapshot.
    ConnectionSnapshot {
        org: OrgId,
        statuses: Vec<ConnectionStatus>,
    },
    /// User clicked "Connect" on a provider card.
    ConnectClicked { provider: Provider },
    /// User clicked the second-phase install action.
    InstallClicked { provider: Provider, force_new: bool },
    /// User chose to reuse an existing installation from a sibling org.
    AutoConnectClicked { provider: Provider, source_org: OrgId },
    /// The connect/install request returned the external URL to open.
    AuthorizeUrlReady { provider: Provider, url: String },
    /// The connect/install/auto-connect request failed before a flow existed.
    ConnectRequestFailed { provider: Provider, error: String },
    /// The push subscription for a scope dropped or failed to connect.
    PushChannelDown { scope: ScopeKey, error: String },
    /// User submitted the chat composer.
    ComposerSubmitted { text: String, now: DateTime<Utc> },
    /// sendMessage returned a job handle for an optimistic message.
    SendAccepted { local_id: MessageId, job_id: JobId },
    /// sendMessage failed before any server-side job existed.
    SendFailed { local_id: MessageId, error: String },
    /// Push channel delivered an authoritative message.
    MessageReceived {
        conversation: ConversationId,
        message: Message,
    },
    /// Push channel reported job progress for the conversation.
    JobUpdatePushed {
        conversation: ConversationId,
        job_id: JobId,
        signal: JobSignal,
    },
    /// Push channel reported that someone is typing.
    TypingObserved {
        conversation: ConversationId,
        user: String,
        at: DateTime<Utc>,
    },
    /// Poll interval elapsed while jobs were in flight.
    PollTick,
    /// Poll endpoint answered for one job.
    JobStatusFetched { job_id: JobId, status: PolledStatus },
    /// Full message list fetched from the authoritative source.
    MessagesFetched {
        conversation: ConversationId,
        messages: Vec<Message>,
    },
    /// The authoritative message fetch failed; the list may be stale.
    MessageSyncFailed {
        conversation: ConversationId,
        error: String,
    },
    /// The async markdown formatter finished for a message.
    MarkdownRendered { message_id: MessageId, html: String },
    /// User clicked retry on a failed message.
    RetryClicked { message_id: MessageId },
    /// UI tick used to decay ephemeral state (typing indicators).
    Tick { now: DateTime<Utc> },
    /// Fallback for placeholder wiring.
    NoOp,
}
