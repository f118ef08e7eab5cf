//! Beacon client: HTTP API access, push-channel subscriptions, and the
//! markdown formatter. IO only; all coordination logic lives in
//! `beacon_core`.
mod api;
mod push;
mod render;
mod sse;
mod types;

pub use api::{ApiClient, ApiSettings};
pub use push::{subscribe, EventSink, PushHandle, PushScope};
pub use render::{CmarkFormatter, Formatter};
pub use sse::{parse_push_event, SseFrame, SseFrameDecoder};
pub use types::{
    ApiError, AutoConnectCandidateDto, ConnectionStatusDto, ErrorKind, JobStatusDto,
    JobStatusKindDto, LifecycleStateDto, MessageDto, MessageProcessingDto, ProcessingStatusDto,
    PushEvent, RoleDto, SendMessageResponse, SubAuthStateDto, TypingDto,
};
