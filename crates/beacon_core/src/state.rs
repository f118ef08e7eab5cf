use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::view_model::{AppViewModel, MessageRowView, ProviderCardView};
use crate::{
    ConnectionStatus, ConversationId, Delivery, JobId, Message, MessageId, OrgId, Provider, Role,
    WizardStep,
};

/// Reference interval for the fallback poll loop.
pub const POLL_INTERVAL_MS: u64 = 3000;

/// Poll ticks a job may survive before it is failed locally with a timeout.
/// 100 ticks at the reference interval is five minutes.
pub const MAX_POLL_ATTEMPTS: u32 = 100;

/// Seconds a typing indicator stays visible after the last typing event.
pub const TYPING_TTL_SECS: i64 = 3;

/// Derives the wizard step for a provider from its latest status snapshot.
/// Pure: re-derivable at any time from the snapshot alone, no hidden history.
pub fn derive_step(status: &ConnectionStatus) -> WizardStep {
    if status.lifecycle == crate::LifecycleState::Connected {
        WizardStep::Done
    } else if status.sub_auth == Some(crate::AuthState::Connected) {
        WizardStep::SecondPhase
    } else {
        WizardStep::FirstPhase
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProviderEntry {
    pub(crate) status: ConnectionStatus,
    /// Step shown ahead of server truth right after a user action. Cleared by
    /// the next authoritative snapshot; bounded staleness, never the source
    /// of truth.
    pub(crate) optimistic_step: Option<WizardStep>,
    pub(crate) error: Option<String>,
}

impl ProviderEntry {
    fn effective_step(&self) -> WizardStep {
        self.optimistic_step.unwrap_or_else(|| derive_step(&self.status))
    }
}

/// An in-flight asynchronous job. Presence in the pending map is what
/// "PROCESSING" means; terminal states remove the entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingJob {
    pub(crate) correlation: MessageId,
    pub(crate) polls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FailedJob {
    pub(crate) job_id: JobId,
    pub(crate) error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MessageEntry {
    pub(crate) message: Message,
    pub(crate) rendered: Option<String>,
    pub(crate) delivery: Delivery,
}

pub(crate) enum MergeOutcome {
    /// New id, appended at the tail.
    Inserted,
    /// An optimistic entry with this id was confirmed in place.
    Confirmed,
    /// Already present and confirmed; nothing to do.
    Duplicate,
}

pub(crate) enum RegisterOutcome {
    Registered { was_empty: bool },
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    dirty: bool,
    org_scope: Option<OrgId>,
    providers: BTreeMap<Provider, ProviderEntry>,
    conversation_scope: Option<ConversationId>,
    messages: Vec<MessageEntry>,
    pending: BTreeMap<JobId, PendingJob>,
    failed: BTreeMap<MessageId, FailedJob>,
    typing: BTreeMap<String, DateTime<Utc>>,
    notice: Option<String>,
    next_local_id: u64,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let providers = self
            .providers
            .values()
            .map(|entry| ProviderCardView {
                provider: entry.status.provider.clone(),
                step: entry.effective_step(),
                account: entry.status.account.clone(),
                can_auto_connect: entry.status.can_auto_connect
                    && !entry.status.auto_connect_candidates.is_empty(),
                candidates: entry.status.auto_connect_candidates.clone(),
                status_message: entry.status.status_message.clone(),
                error: entry.error.clone(),
            })
            .collect();

        let messages = self
            .messages
            .iter()
            .map(|entry| MessageRowView {
                id: entry.message.id.clone(),
                role: entry.message.role,
                content: entry.message.content.clone(),
                html: entry.rendered.clone(),
                pending_ack: entry.delivery == Delivery::Optimistic,
                error: self
                    .failed
                    .get(&entry.message.id)
                    .map(|failed| failed.error.clone()),
                created_at: entry.message.created_at,
            })
            .collect();

        AppViewModel {
            providers,
            messages,
            typing_users: self.typing.keys().cloned().collect(),
            is_processing: !self.pending.is_empty(),
            notice: self.notice.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // --- connection status synchronizer ---

    pub(crate) fn org_scope(&self) -> Option<&OrgId> {
        self.org_scope.as_ref()
    }

    pub(crate) fn select_org(&mut self, org: OrgId) {
        self.org_scope = Some(org);
        self.providers.clear();
        self.mark_dirty();
    }

    /// Replaces the whole panel snapshot. Value-equal payloads are a complete
    /// no-op so repeated identical pushes cause no downstream notifications.
    pub(crate) fn replace_connection_snapshot(&mut self, statuses: Vec<ConnectionStatus>) -> bool {
        let identical = self.providers.len() == statuses.len()
            && statuses
                .iter()
                .all(|status| {
                    self.providers
                        .get(&status.provider)
                        .is_some_and(|entry| entry.status == *status)
                });
        if identical {
            return false;
        }

        self.providers = statuses
            .into_iter()
            .map(|status| {
                let provider = status.provider.clone();
                (
                    provider,
                    ProviderEntry {
                        status,
                        optimistic_step: None,
                        error: None,
                    },
                )
            })
            .collect();
        self.mark_dirty();
        true
    }

    pub(crate) fn provider_step(&self, provider: &Provider) -> Option<WizardStep> {
        self.providers.get(provider).map(ProviderEntry::effective_step)
    }

    pub(crate) fn provider_status(&self, provider: &Provider) -> Option<&ConnectionStatus> {
        self.providers.get(provider).map(|entry| &entry.status)
    }

    pub(crate) fn set_optimistic_step(&mut self, provider: &Provider, step: WizardStep) {
        if let Some(entry) = self.providers.get_mut(provider) {
            entry.optimistic_step = Some(step);
            entry.error = None;
            self.mark_dirty();
        }
    }

    /// Restores the derived (pre-optimistic) step and attaches the error, so
    /// the wizard never strands in a step no push event can explain.
    pub(crate) fn revert_optimistic_step(&mut self, provider: &Provider, error: String) {
        if let Some(entry) = self.providers.get_mut(provider) {
            entry.optimistic_step = None;
            entry.error = Some(error);
            self.mark_dirty();
        }
    }

    pub(crate) fn set_notice(&mut self, notice: String) {
        self.notice = Some(notice);
        self.mark_dirty();
    }

    // --- message stream assembler ---

    pub(crate) fn conversation_scope(&self) -> Option<&ConversationId> {
        self.conversation_scope.as_ref()
    }

    pub(crate) fn open_conversation(&mut self, conversation: ConversationId) {
        self.conversation_scope = Some(conversation);
        self.messages.clear();
        self.pending.clear();
        self.failed.clear();
        self.typing.clear();
        self.notice = None;
        self.mark_dirty();
    }

    pub(crate) fn next_local_id(&mut self) -> MessageId {
        self.next_local_id += 1;
        MessageId::local(self.next_local_id)
    }

    pub(crate) fn append_optimistic(&mut self, message: Message) {
        self.messages.push(MessageEntry {
            message,
            rendered: None,
            delivery: Delivery::Optimistic,
        });
        self.mark_dirty();
    }

    pub(crate) fn has_message(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|entry| entry.message.id == *id)
    }

    pub(crate) fn remove_optimistic(&mut self, id: &MessageId) -> bool {
        let before = self.messages.len();
        self.messages
            .retain(|entry| !(entry.delivery == Delivery::Optimistic && entry.message.id == *id));
        let removed = self.messages.len() != before;
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Idempotent insert by id; insertion order is append order, never
    /// re-sorted by timestamp.
    pub(crate) fn merge_incoming(&mut self, message: Message) -> MergeOutcome {
        if let Some(entry) = self
            .messages
            .iter_mut()
            .find(|entry| entry.message.id == message.id)
        {
            if entry.delivery == Delivery::Confirmed {
                return MergeOutcome::Duplicate;
            }
            entry.message = message;
            entry.delivery = Delivery::Confirmed;
            self.mark_dirty();
            return MergeOutcome::Confirmed;
        }

        self.messages.push(MessageEntry {
            message,
            rendered: None,
            delivery: Delivery::Confirmed,
        });
        self.mark_dirty();
        MergeOutcome::Inserted
    }

    /// Replaces the list from the authoritative source, preserving rendered
    /// content for ids already known and re-appending optimistic entries the
    /// server has not echoed yet. Returns assistant messages still needing a
    /// rendered form.
    pub(crate) fn resync_messages(&mut self, messages: Vec<Message>) -> Vec<(MessageId, String)> {
        let mut next: Vec<MessageEntry> = messages
            .into_iter()
            .map(|message| {
                let rendered = self
                    .messages
                    .iter()
                    .find(|entry| entry.message.id == message.id)
                    .and_then(|entry| entry.rendered.clone());
                MessageEntry {
                    message,
                    rendered,
                    delivery: Delivery::Confirmed,
                }
            })
            .collect();

        for entry in &self.messages {
            if entry.delivery == Delivery::Optimistic
                && !next.iter().any(|n| n.message.id == entry.message.id)
            {
                next.push(entry.clone());
            }
        }

        let to_render = next
            .iter()
            .filter(|entry| entry.message.role == Role::Assistant && entry.rendered.is_none())
            .map(|entry| (entry.message.id.clone(), entry.message.content.clone()))
            .collect();

        if next != self.messages {
            self.messages = next;
            self.mark_dirty();
        }
        to_render
    }

    pub(crate) fn attach_rendered(&mut self, id: &MessageId, html: String) -> bool {
        let Some(entry) = self
            .messages
            .iter_mut()
            .find(|entry| entry.message.id == *id)
        else {
            return false;
        };
        if entry.rendered.as_deref() == Some(html.as_str()) {
            return false;
        }
        entry.rendered = Some(html);
        self.mark_dirty();
        true
    }

    pub(crate) fn observe_typing(&mut self, user: String, deadline: DateTime<Utc>) {
        let newly_visible = self.typing.insert(user, deadline).is_none();
        if newly_visible {
            self.mark_dirty();
        }
    }

    pub(crate) fn prune_typing(&mut self, now: DateTime<Utc>) {
        let before = self.typing.len();
        self.typing.retain(|_, deadline| *deadline > now);
        if self.typing.len() != before {
            self.mark_dirty();
        }
    }

    // --- job reconciliation engine ---

    pub(crate) fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn register_job(&mut self, job_id: JobId, correlation: MessageId) -> RegisterOutcome {
        if self.pending.contains_key(&job_id) {
            return RegisterOutcome::Duplicate;
        }
        let was_empty = self.pending.is_empty();
        self.pending.insert(
            job_id,
            PendingJob {
                correlation,
                polls: 0,
            },
        );
        self.mark_dirty();
        RegisterOutcome::Registered { was_empty }
    }

    /// Removes a pending entry on a terminal observation. Whichever channel
    /// gets here first wins; the other channel's later report finds nothing.
    pub(crate) fn resolve_job(&mut self, job_id: &JobId) -> Option<MessageId> {
        let job = self.pending.remove(job_id)?;
        self.mark_dirty();
        Some(job.correlation)
    }

    pub(crate) fn fail_job(&mut self, job_id: &JobId, error: String) -> Option<MessageId> {
        let job = self.pending.remove(job_id)?;
        self.failed.insert(
            job.correlation.clone(),
            FailedJob {
                job_id: job_id.clone(),
                error,
            },
        );
        self.mark_dirty();
        Some(job.correlation)
    }

    /// Advances every pending entry's poll count, failing those past the
    /// bound. Returns the jobs still worth fetching.
    pub(crate) fn advance_polls(&mut self) -> Vec<JobId> {
        let mut timed_out = Vec::new();
        let mut to_fetch = Vec::new();
        for (job_id, job) in &mut self.pending {
            job.polls += 1;
            if job.polls > MAX_POLL_ATTEMPTS {
                timed_out.push(job_id.clone());
            } else {
                to_fetch.push(job_id.clone());
            }
        }
        for job_id in timed_out {
            self.fail_job(&job_id, "job timed out waiting for a result".to_string());
        }
        to_fetch
    }

    pub(crate) fn take_failed_job(&mut self, message_id: &MessageId) -> Option<JobId> {
        let failed = self.failed.remove(message_id)?;
        self.mark_dirty();
        Some(failed.job_id)
    }
}
