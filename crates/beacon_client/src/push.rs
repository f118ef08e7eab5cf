use std::sync::Arc;

use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;

use beacon_logging::{beacon_debug, beacon_warn};

use crate::api::ApiClient;
use crate::sse::{parse_push_event, SseFrameDecoder};
use crate::types::{map_reqwest_error, ApiError, ErrorKind, PushEvent};

/// The server-side stream a subscription attaches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushScope {
    Organization(String),
    Conversation(String),
}

impl PushScope {
    fn events_path(&self) -> String {
        match self {
            PushScope::Organization(org) => format!("api/orgs/{org}/events"),
            PushScope::Conversation(conversation) => {
                format!("api/conversations/{conversation}/events")
            }
        }
    }
}

/// Receives decoded push events for one subscription.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: PushEvent);
    /// Called once when the stream fails or ends; the subscription is dead
    /// afterwards and the owner decides whether to resubscribe.
    fn channel_down(&self, error: ApiError);
}

/// Handle for an open push subscription. Unsubscribing (or dropping the
/// handle) cancels the stream task.
#[derive(Debug)]
pub struct PushHandle {
    cancel: CancellationToken,
}

impl PushHandle {
    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens the SSE stream for a scope and pumps decoded events into the sink
/// until the stream ends, errors, or the handle is cancelled.
pub fn subscribe(
    api: ApiClient,
    scope: PushScope,
    sink: Arc<dyn EventSink>,
    runtime: &tokio::runtime::Handle,
) -> PushHandle {
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let label = format!("{scope:?}");
    runtime.spawn(async move {
        tokio::select! {
            () = task_cancel.cancelled() => {
                beacon_debug!("push subscription cancelled for {label}");
            }
            () = run_stream(api, scope, sink) => {}
        }
    });
    PushHandle { cancel }
}

async fn run_stream(api: ApiClient, scope: PushScope, sink: Arc<dyn EventSink>) {
    let url = api.url(&scope.events_path());
    let response = match api
        .http()
        .get(&url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            sink.channel_down(map_reqwest_error(err));
            return;
        }
    };
    let status = response.status();
    if !status.is_success() {
        sink.channel_down(ApiError::new(
            ErrorKind::Http(status.as_u16()),
            status.to_string(),
        ));
        return;
    }

    let mut decoder = SseFrameDecoder::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                sink.channel_down(map_reqwest_error(err));
                return;
            }
        };
        for frame in decoder.push_chunk(&chunk) {
            match parse_push_event(&frame) {
                Ok(Some(event)) => sink.deliver(event),
                Ok(None) => {}
                // A malformed payload is a server bug; skip the frame rather
                // than kill the stream.
                Err(err) => beacon_warn!("dropping push frame: {err}"),
            }
        }
    }

    sink.channel_down(ApiError::new(ErrorKind::Network, "push stream ended"));
}
