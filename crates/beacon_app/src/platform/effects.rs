use std::sync::{mpsc, Arc};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use beacon_client::{
    subscribe, ApiClient, ApiError, CmarkFormatter, ConnectionStatusDto, EventSink, Formatter,
    JobStatusDto, JobStatusKindDto, LifecycleStateDto, MessageDto, ProcessingStatusDto, PushEvent,
    PushHandle, PushScope, RoleDto, SubAuthStateDto,
};
use beacon_core::{
    AuthState, AutoConnectCandidate, ConnectionStatus, ConversationId, Effect, JobId, JobSignal,
    LifecycleState, Message, MessageId, Msg, OrgId, PolledStatus, Provider, Role, ScopeKey,
    POLL_INTERVAL_MS,
};
use beacon_logging::{beacon_info, beacon_warn};

/// Seam for opening external authorization pages. The embedding shell opens
/// a new tab; the headless harness just logs the URL.
pub trait ExternalOpener: Send + Sync {
    fn open(&self, url: &str);
}

pub struct LogOpener;

impl ExternalOpener for LogOpener {
    fn open(&self, url: &str) {
        beacon_info!("open external context: {url}");
    }
}

/// Executes [`Effect`]s on a dedicated tokio runtime and feeds results back
/// as [`Msg`]s. Owns the push subscriptions (one per scope kind) and the
/// poll-loop task, so StartPolling while already live is a no-op and scope
/// switches tear the old stream down.
pub struct EffectRunner {
    runtime: tokio::runtime::Runtime,
    api: ApiClient,
    msg_tx: mpsc::Sender<Msg>,
    formatter: Arc<dyn Formatter>,
    opener: Arc<dyn ExternalOpener>,
    org_subscription: Option<PushHandle>,
    conversation_subscription: Option<PushHandle>,
    poller: Option<CancellationToken>,
}

impl EffectRunner {
    pub fn new(api: ApiClient, msg_tx: mpsc::Sender<Msg>) -> Self {
        Self::with_opener(api, msg_tx, Arc::new(LogOpener))
    }

    pub fn with_opener(
        api: ApiClient,
        msg_tx: mpsc::Sender<Msg>,
        opener: Arc<dyn ExternalOpener>,
    ) -> Self {
        let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
        Self {
            runtime,
            api,
            msg_tx,
            formatter: Arc::new(CmarkFormatter),
            opener,
            org_subscription: None,
            conversation_subscription: None,
            poller: None,
        }
    }

    pub fn enqueue(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            self.run(effect);
        }
    }

    fn run(&mut self, effect: Effect) {
        match effect {
            Effect::Subscribe { scope } => self.open_subscription(scope),
            Effect::Unsubscribe { scope } => {
                let handle = match scope {
                    ScopeKey::Organization(_) => self.org_subscription.take(),
                    ScopeKey::Conversation(_) => self.conversation_subscription.take(),
                };
                if let Some(handle) = handle {
                    handle.unsubscribe();
                }
            }
            Effect::BeginFirstPhase { org, provider } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    let msg = match api
                        .initiate_first_phase(org.as_str(), provider.as_str())
                        .await
                    {
                        Ok(url) => Msg::AuthorizeUrlReady { provider, url },
                        Err(err) => Msg::ConnectRequestFailed {
                            provider,
                            error: err.to_string(),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::BeginSecondPhase {
                org,
                provider,
                force_new,
            } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    let msg = match api
                        .initiate_second_phase(org.as_str(), provider.as_str(), force_new)
                        .await
                    {
                        Ok(url) => Msg::AuthorizeUrlReady { provider, url },
                        Err(err) => Msg::ConnectRequestFailed {
                            provider,
                            error: err.to_string(),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::AutoConnect {
                org,
                provider,
                source_org,
            } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    // Success needs no message: the push snapshot confirms.
                    if let Err(err) = api
                        .auto_connect(org.as_str(), provider.as_str(), source_org.as_str())
                        .await
                    {
                        let _ = tx.send(Msg::ConnectRequestFailed {
                            provider,
                            error: err.to_string(),
                        });
                    }
                });
            }
            Effect::OpenExternal { url } => self.opener.open(&url),
            Effect::SendMessage {
                conversation,
                local_id,
                text,
            } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    let msg = match api
                        .send_message(conversation.as_str(), local_id.as_str(), &text)
                        .await
                    {
                        Ok(response) => Msg::SendAccepted {
                            local_id,
                            job_id: JobId::new(response.job_id),
                        },
                        Err(err) => Msg::SendFailed {
                            local_id,
                            error: err.to_string(),
                        },
                    };
                    let _ = tx.send(msg);
                });
            }
            Effect::FetchMessages { conversation } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    match api.list_messages(conversation.as_str()).await {
                        Ok(messages) => {
                            let _ = tx.send(Msg::MessagesFetched {
                                conversation,
                                messages: messages.into_iter().map(map_message).collect(),
                            });
                        }
                        Err(err) => {
                            beacon_warn!("message fetch failed: {err}");
                            let _ = tx.send(Msg::MessageSyncFailed {
                                conversation,
                                error: err.to_string(),
                            });
                        }
                    }
                });
            }
            Effect::FetchJobStatus { job_id } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    match api.job_status(job_id.as_str()).await {
                        Ok(status) => {
                            let _ = tx.send(Msg::JobStatusFetched {
                                job_id,
                                status: map_polled(status),
                            });
                        }
                        // A lost poll is harmless; the next tick asks again.
                        Err(err) => beacon_warn!("job status poll failed: {err}"),
                    }
                });
            }
            Effect::RetryJob { job_id } => {
                let api = self.api.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    if let Err(err) = api.retry_job(job_id.as_str()).await {
                        // The retry never started; fail the job again so the
                        // error stays visible and retryable.
                        let _ = tx.send(Msg::JobStatusFetched {
                            job_id,
                            status: PolledStatus::Failed(err.to_string()),
                        });
                    }
                });
            }
            Effect::RenderMarkdown { message_id, raw } => {
                let formatter = self.formatter.clone();
                let tx = self.msg_tx.clone();
                self.runtime.spawn(async move {
                    let html = formatter.markdown_to_html(&raw).await;
                    let _ = tx.send(Msg::MarkdownRendered { message_id, html });
                });
            }
            Effect::StartPolling => self.start_polling(),
            Effect::StopPolling => {
                if let Some(poller) = self.poller.take() {
                    poller.cancel();
                }
            }
        }
    }

    fn open_subscription(&mut self, scope: ScopeKey) {
        let push_scope = match &scope {
            ScopeKey::Organization(org) => PushScope::Organization(org.as_str().to_string()),
            ScopeKey::Conversation(conversation) => {
                PushScope::Conversation(conversation.as_str().to_string())
            }
        };
        let sink = Arc::new(PushSink {
            msg_tx: self.msg_tx.clone(),
            scope: scope.clone(),
        });
        let handle = subscribe(self.api.clone(), push_scope, sink, self.runtime.handle());
        // Replacing a handle drops the previous one, cancelling its stream.
        match scope {
            ScopeKey::Organization(_) => self.org_subscription = Some(handle),
            ScopeKey::Conversation(_) => self.conversation_subscription = Some(handle),
        }
    }

    fn start_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let tx = self.msg_tx.clone();
        self.runtime.spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_millis(POLL_INTERVAL_MS));
            // The first tick of a tokio interval fires immediately; the poll
            // loop should first fire one interval after arming.
            interval.tick().await;
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if tx.send(Msg::PollTick).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        self.poller = Some(cancel);
    }
}

struct PushSink {
    msg_tx: mpsc::Sender<Msg>,
    scope: ScopeKey,
}

impl EventSink for PushSink {
    fn deliver(&self, event: PushEvent) {
        if let Some(msg) = map_push_event(&self.scope, event) {
            let _ = self.msg_tx.send(msg);
        }
    }

    fn channel_down(&self, error: ApiError) {
        let _ = self.msg_tx.send(Msg::PushChannelDown {
            scope: self.scope.clone(),
            error: error.to_string(),
        });
    }
}

/// Maps a wire event onto a core message. Events that do not belong to the
/// subscription's scope kind are dropped.
fn map_push_event(scope: &ScopeKey, event: PushEvent) -> Option<Msg> {
    match (scope, event) {
        (ScopeKey::Organization(org), PushEvent::ConnectionStatus(statuses)) => {
            Some(Msg::ConnectionSnapshot {
                org: org.clone(),
                statuses: statuses.into_iter().map(map_status).collect(),
            })
        }
        (ScopeKey::Conversation(conversation), PushEvent::NewMessage(message)) => {
            Some(Msg::MessageReceived {
                conversation: conversation.clone(),
                message: map_message(message),
            })
        }
        (ScopeKey::Conversation(conversation), PushEvent::MessageProcessing(update)) => {
            let signal = match update.status {
                ProcessingStatusDto::Processing => JobSignal::Processing,
                ProcessingStatusDto::Completed => JobSignal::Completed,
                ProcessingStatusDto::Failed => JobSignal::Failed(
                    update.error.unwrap_or_else(|| "job failed".to_string()),
                ),
            };
            Some(Msg::JobUpdatePushed {
                conversation: conversation.clone(),
                job_id: JobId::new(update.job_id),
                signal,
            })
        }
        (ScopeKey::Conversation(conversation), PushEvent::Typing(typing)) => {
            Some(Msg::TypingObserved {
                conversation: conversation.clone(),
                user: typing.user,
                at: Utc::now(),
            })
        }
        _ => None,
    }
}

fn map_status(dto: ConnectionStatusDto) -> ConnectionStatus {
    ConnectionStatus {
        provider: Provider::new(dto.provider),
        lifecycle: match dto.lifecycle_state {
            LifecycleStateDto::NotConnected => LifecycleState::NotConnected,
            LifecycleStateDto::Connecting => LifecycleState::Connecting,
            LifecycleStateDto::Connected => LifecycleState::Connected,
        },
        sub_auth: dto.sub_auth_state.map(|sub| match sub {
            SubAuthStateDto::NotConnected => AuthState::NotConnected,
            SubAuthStateDto::Connected => AuthState::Connected,
        }),
        account: dto.account_identifier,
        can_auto_connect: dto.can_auto_connect,
        auto_connect_candidates: dto
            .auto_connect_candidates
            .into_iter()
            .map(|candidate| AutoConnectCandidate {
                org_id: OrgId::new(candidate.candidate_org_id),
                org_name: candidate.candidate_org_name,
                source_integration_id: candidate.source_integration_id,
            })
            .collect(),
        status_message: dto.status_message,
    }
}

fn map_message(dto: MessageDto) -> Message {
    Message {
        id: MessageId::new(dto.id),
        role: match dto.role {
            RoleDto::User => Role::User,
            RoleDto::Assistant => Role::Assistant,
            RoleDto::System => Role::System,
        },
        content: dto.content,
        sources: dto.sources,
        created_at: dto.created_at,
    }
}

fn map_polled(dto: JobStatusDto) -> PolledStatus {
    match dto.status {
        JobStatusKindDto::Pending => PolledStatus::Pending,
        JobStatusKindDto::Running => PolledStatus::Running,
        JobStatusKindDto::Completed => PolledStatus::Completed,
        JobStatusKindDto::Failed => {
            PolledStatus::Failed(dto.error.unwrap_or_else(|| "job failed".to_string()))
        }
    }
}
