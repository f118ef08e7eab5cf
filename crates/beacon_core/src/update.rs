use chrono::Duration;

use crate::state::{MergeOutcome, RegisterOutcome, TYPING_TTL_SECS};
use crate::{
    AppState, Effect, JobSignal, Message, Msg, PolledStatus, Role, ScopeKey, WizardStep,
};

/// Pure update function: applies a message to state and returns any effects.
///
/// Stale-scope inputs (a push event, poll answer, or fetch result for an
/// organization or conversation that is no longer active) are dropped here so
/// a late response can never write into a newer scope's state.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::OrganizationSelected(org) => {
            if state.org_scope() == Some(&org) {
                return (state, Vec::new());
            }
            let mut effects = Vec::new();
            if let Some(old) = state.org_scope() {
                effects.push(Effect::Unsubscribe {
                    scope: ScopeKey::Organization(old.clone()),
                });
            }
            effects.push(Effect::Subscribe {
                scope: ScopeKey::Organization(org.clone()),
            });
            state.select_org(org);
            effects
        }
        Msg::ConversationOpened(conversation) => {
            if state.conversation_scope() == Some(&conversation) {
                return (state, Vec::new());
            }
            let mut effects = Vec::new();
            if let Some(old) = state.conversation_scope() {
                effects.push(Effect::Unsubscribe {
                    scope: ScopeKey::Conversation(old.clone()),
                });
            }
            if !state.pending_is_empty() {
                effects.push(Effect::StopPolling);
            }
            effects.push(Effect::Subscribe {
                scope: ScopeKey::Conversation(conversation.clone()),
            });
            effects.push(Effect::FetchMessages {
                conversation: conversation.clone(),
            });
            state.open_conversation(conversation);
            effects
        }
        Msg::ConnectionSnapshot { org, statuses } => {
            if state.org_scope() != Some(&org) {
                return (state, Vec::new());
            }
            state.replace_connection_snapshot(statuses);
            Vec::new()
        }
        Msg::ConnectClicked { provider } => {
            let Some(org) = state.org_scope().cloned() else {
                return (state, Vec::new());
            };
            if state.provider_step(&provider) != Some(WizardStep::FirstPhase) {
                return (state, Vec::new());
            }
            state.set_optimistic_step(&provider, WizardStep::SecondPhase);
            vec![Effect::BeginFirstPhase { org, provider }]
        }
        Msg::InstallClicked {
            provider,
            force_new,
        } => {
            let Some(org) = state.org_scope().cloned() else {
                return (state, Vec::new());
            };
            if state.provider_step(&provider) != Some(WizardStep::SecondPhase) {
                return (state, Vec::new());
            }
            state.set_optimistic_step(&provider, WizardStep::Done);
            vec![Effect::BeginSecondPhase {
                org,
                provider,
                force_new,
            }]
        }
        Msg::AutoConnectClicked {
            provider,
            source_org,
        } => {
            let Some(org) = state.org_scope().cloned() else {
                return (state, Vec::new());
            };
            let eligible = state.provider_status(&provider).is_some_and(|status| {
                status.can_auto_connect
                    && status
                        .auto_connect_candidates
                        .iter()
                        .any(|candidate| candidate.org_id == source_org)
            });
            if !eligible || state.provider_step(&provider) == Some(WizardStep::Done) {
                return (state, Vec::new());
            }
            // Reuses a sibling org's installation: skips both phases and
            // heads straight for Done pending server confirmation.
            state.set_optimistic_step(&provider, WizardStep::Done);
            vec![Effect::AutoConnect {
                org,
                provider,
                source_org,
            }]
        }
        Msg::AuthorizeUrlReady { provider, url } => {
            if state.provider_status(&provider).is_none() {
                return (state, Vec::new());
            }
            vec![Effect::OpenExternal { url }]
        }
        Msg::ConnectRequestFailed { provider, error } => {
            state.revert_optimistic_step(&provider, error);
            Vec::new()
        }
        Msg::PushChannelDown { scope, error } => {
            let current = match &scope {
                ScopeKey::Organization(org) => state.org_scope() == Some(org),
                ScopeKey::Conversation(conversation) => {
                    state.conversation_scope() == Some(conversation)
                }
            };
            if current {
                state.set_notice(format!("live updates unavailable: {error}"));
            }
            Vec::new()
        }
        Msg::ComposerSubmitted { text, now } => {
            let trimmed = text.trim();
            let Some(conversation) = state.conversation_scope().cloned() else {
                return (state, Vec::new());
            };
            if trimmed.is_empty() {
                return (state, Vec::new());
            }
            let local_id = state.next_local_id();
            state.append_optimistic(Message {
                id: local_id.clone(),
                role: Role::User,
                content: trimmed.to_string(),
                sources: Vec::new(),
                created_at: now,
            });
            vec![Effect::SendMessage {
                conversation,
                local_id,
                text: trimmed.to_string(),
            }]
        }
        Msg::SendAccepted { local_id, job_id } => {
            // A job handle for a message the current scope does not know is a
            // late response from a superseded conversation.
            if !state.has_message(&local_id) {
                return (state, Vec::new());
            }
            // Registration happens in the same update step the job handle
            // arrives in, before either channel's report can be processed.
            match state.register_job(job_id, local_id) {
                RegisterOutcome::Registered { was_empty: true } => vec![Effect::StartPolling],
                RegisterOutcome::Registered { was_empty: false } | RegisterOutcome::Duplicate => {
                    Vec::new()
                }
            }
        }
        Msg::SendFailed { local_id, error } => {
            if state.remove_optimistic(&local_id) {
                state.set_notice(format!("message could not be sent: {error}"));
            }
            Vec::new()
        }
        Msg::MessageReceived {
            conversation,
            message,
        } => {
            if state.conversation_scope() != Some(&conversation) {
                return (state, Vec::new());
            }
            let needs_render = message.role == Role::Assistant;
            let id = message.id.clone();
            let raw = message.content.clone();
            match state.merge_incoming(message) {
                MergeOutcome::Inserted if needs_render => vec![Effect::RenderMarkdown {
                    message_id: id,
                    raw,
                }],
                MergeOutcome::Inserted | MergeOutcome::Confirmed | MergeOutcome::Duplicate => {
                    Vec::new()
                }
            }
        }
        Msg::JobUpdatePushed {
            conversation,
            job_id,
            signal,
        } => {
            if state.conversation_scope() != Some(&conversation) {
                return (state, Vec::new());
            }
            match signal {
                JobSignal::Processing => Vec::new(),
                JobSignal::Completed => {
                    // The resulting message arrives via its own push event;
                    // this report only clears the pending entry.
                    if state.resolve_job(&job_id).is_some() && state.pending_is_empty() {
                        vec![Effect::StopPolling]
                    } else {
                        Vec::new()
                    }
                }
                JobSignal::Failed(error) => {
                    if state.fail_job(&job_id, error).is_some() && state.pending_is_empty() {
                        vec![Effect::StopPolling]
                    } else {
                        Vec::new()
                    }
                }
            }
        }
        Msg::TypingObserved {
            conversation,
            user,
            at,
        } => {
            if state.conversation_scope() != Some(&conversation) {
                return (state, Vec::new());
            }
            state.observe_typing(user, at + Duration::seconds(TYPING_TTL_SECS));
            Vec::new()
        }
        Msg::PollTick => {
            let to_fetch = state.advance_polls();
            let mut effects: Vec<Effect> = to_fetch
                .into_iter()
                .map(|job_id| Effect::FetchJobStatus { job_id })
                .collect();
            if state.pending_is_empty() {
                effects.push(Effect::StopPolling);
            }
            effects
        }
        Msg::JobStatusFetched { job_id, status } => match status {
            PolledStatus::Pending | PolledStatus::Running => Vec::new(),
            PolledStatus::Completed => {
                // Unlike push, the poll channel carries no message payload, so
                // completion here means a full resynchronization.
                if state.resolve_job(&job_id).is_none() {
                    return (state, Vec::new());
                }
                let mut effects = Vec::new();
                if let Some(conversation) = state.conversation_scope().cloned() {
                    effects.push(Effect::FetchMessages { conversation });
                }
                if state.pending_is_empty() {
                    effects.push(Effect::StopPolling);
                }
                effects
            }
            PolledStatus::Failed(error) => {
                if state.fail_job(&job_id, error).is_some() && state.pending_is_empty() {
                    vec![Effect::StopPolling]
                } else {
                    Vec::new()
                }
            }
        },
        Msg::MessagesFetched {
            conversation,
            messages,
        } => {
            if state.conversation_scope() != Some(&conversation) {
                return (state, Vec::new());
            }
            state
                .resync_messages(messages)
                .into_iter()
                .map(|(message_id, raw)| Effect::RenderMarkdown { message_id, raw })
                .collect()
        }
        Msg::MessageSyncFailed {
            conversation,
            error,
        } => {
            if state.conversation_scope() != Some(&conversation) {
                return (state, Vec::new());
            }
            state.set_notice(format!("message sync failed: {error}"));
            Vec::new()
        }
        Msg::MarkdownRendered { message_id, html } => {
            state.attach_rendered(&message_id, html);
            Vec::new()
        }
        Msg::RetryClicked { message_id } => {
            let Some(job_id) = state.take_failed_job(&message_id) else {
                return (state, Vec::new());
            };
            let mut effects = vec![Effect::RetryJob {
                job_id: job_id.clone(),
            }];
            if let RegisterOutcome::Registered { was_empty: true } =
                state.register_job(job_id, message_id)
            {
                effects.push(Effect::StartPolling);
            }
            effects
        }
        Msg::Tick { now } => {
            state.prune_typing(now);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
