use crate::{ConversationId, JobId, MessageId, OrgId, Provider, ScopeKey};

/// IO requested by `update`. The platform layer executes these and feeds the
/// results back as `Msg`s; the core never performs IO itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Subscribe { scope: ScopeKey },
    Unsubscribe { scope: ScopeKey },
    BeginFirstPhase { org: OrgId, provider: Provider },
    BeginSecondPhase {
        org: OrgId,
        provider: Provider,
        force_new: bool,
    },
    AutoConnect {
        org: OrgId,
        provider: Provider,
        source_org: OrgId,
    },
    /// Open an external authorization page in a new context (tab/window),
    /// never in-place navigation.
    OpenExternal { url: String },
    SendMessage {
        conversation: ConversationId,
        local_id: MessageId,
        text: String,
    },
    FetchMessages { conversation: ConversationId },
    FetchJobStatus { job_id: JobId },
    RetryJob { job_id: JobId },
    RenderMarkdown { message_id: MessageId, raw: String },
    /// Arm the fallback poll loop. Emitted only on the empty-to-non-empty
    /// transition of the pending set.
    StartPolling,
    /// Disarm the poll loop. Emitted the moment the pending set empties.
    StopPolling,
}
