use bytes::BytesMut;

use crate::types::{ApiError, ErrorKind, PushEvent};

/// One dispatched server-sent event: the optional `event:` name and the
/// joined `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental decoder for `text/event-stream` bodies. Fed raw byte chunks as
/// they arrive; yields complete frames on each blank-line dispatch and keeps
/// partial lines buffered across chunk boundaries.
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: BytesMut,
    event: Option<String>,
    data: Vec<String>,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // Buffer raw bytes; a chunk boundary may fall inside a multi-byte
        // UTF-8 character, so only complete lines are ever converted.
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line = self.buffer.split_to(newline + 1);
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(frame) = self.accept_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn accept_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            // Blank line dispatches the accumulated frame, if any.
            if self.data.is_empty() && self.event.is_none() {
                return None;
            }
            let frame = SseFrame {
                event: self.event.take(),
                data: self.data.join("\n"),
            };
            self.data.clear();
            return Some(frame);
        }
        if line.starts_with(':') {
            // Comment / keep-alive.
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id/retry and unknown fields are not used by this client.
            _ => {}
        }
        None
    }
}

/// Maps a dispatched frame onto a [`PushEvent`]. Frames with an unknown event
/// name are ignored (the stream may carry events this client does not use).
pub fn parse_push_event(frame: &SseFrame) -> Result<Option<PushEvent>, ApiError> {
    let decode = |err: serde_json::Error| {
        ApiError::new(
            ErrorKind::Decode,
            format!("bad push payload for {:?}: {err}", frame.event),
        )
    };

    let event = match frame.event.as_deref() {
        Some("connectionStatus") => {
            PushEvent::ConnectionStatus(serde_json::from_str(&frame.data).map_err(decode)?)
        }
        Some("newMessage") => {
            PushEvent::NewMessage(serde_json::from_str(&frame.data).map_err(decode)?)
        }
        Some("messageProcessing") => {
            PushEvent::MessageProcessing(serde_json::from_str(&frame.data).map_err(decode)?)
        }
        Some("typing") => PushEvent::Typing(serde_json::from_str(&frame.data).map_err(decode)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}
