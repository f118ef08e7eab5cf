use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Error from any dashboard API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Http(u16),
    Timeout,
    Network,
    Decode,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Http(code) => write!(f, "http status {code}"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Decode => write!(f, "decode error"),
        }
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ErrorKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return ApiError::new(ErrorKind::Decode, err.to_string());
    }
    ApiError::new(ErrorKind::Network, err.to_string())
}

// --- wire DTOs ---

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStateDto {
    NotConnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubAuthStateDto {
    NotConnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoConnectCandidateDto {
    pub candidate_org_id: String,
    pub candidate_org_name: String,
    pub source_integration_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatusDto {
    pub provider: String,
    pub lifecycle_state: LifecycleStateDto,
    #[serde(default)]
    pub sub_auth_state: Option<SubAuthStateDto>,
    #[serde(default)]
    pub account_identifier: Option<String>,
    #[serde(default)]
    pub can_auto_connect: bool,
    #[serde(default)]
    pub auto_connect_candidates: Vec<AutoConnectCandidateDto>,
    #[serde(default)]
    pub status_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleDto {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub role: RoleDto,
    pub content: String,
    #[serde(default)]
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatusKindDto {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusDto {
    pub status: JobStatusKindDto,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub job_id: String,
    pub message: MessageDto,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectResponse {
    pub authorize_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResponse {
    pub install_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatusDto {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageProcessingDto {
    pub job_id: String,
    pub status: ProcessingStatusDto,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingDto {
    pub user: String,
}

/// A decoded push-channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    ConnectionStatus(Vec<ConnectionStatusDto>),
    NewMessage(MessageDto),
    MessageProcessing(MessageProcessingDto),
    Typing(TypingDto),
}
