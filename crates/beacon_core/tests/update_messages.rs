use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};

use beacon_core::{
    update, AppState, ConversationId, Effect, JobId, Message, MessageId, Msg, Role, ScopeKey,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(beacon_logging::initialize_for_tests);
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
}

fn open_conversation() -> AppState {
    let (state, _effects) = update(
        AppState::new(),
        Msg::ConversationOpened(ConversationId::new("conv-1")),
    );
    state
}

fn assistant(id: &str, content: &str) -> Message {
    Message {
        id: MessageId::new(id),
        role: Role::Assistant,
        content: content.to_string(),
        sources: vec!["https://docs.example/a".to_string()],
        created_at: t0(),
    }
}

fn user(id: &str, content: &str) -> Message {
    Message {
        id: MessageId::new(id),
        role: Role::User,
        content: content.to_string(),
        sources: Vec::new(),
        created_at: t0(),
    }
}

fn receive(state: AppState, message: Message) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::MessageReceived {
            conversation: ConversationId::new("conv-1"),
            message,
        },
    )
}

#[test]
fn composer_appends_optimistic_entry() {
    init_logging();
    let state = open_conversation();
    let (state, effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "  what changed this week?  ".to_string(),
            now: t0(),
        },
    );

    assert_eq!(
        effects,
        vec![Effect::SendMessage {
            conversation: ConversationId::new("conv-1"),
            local_id: MessageId::new("local-1"),
            text: "what changed this week?".to_string(),
        }]
    );
    let view = state.view();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].role, Role::User);
    assert!(view.messages[0].pending_ack);
    assert_eq!(view.messages[0].content, "what changed this week?");
}

#[test]
fn blank_composer_input_is_ignored() {
    init_logging();
    let state = open_conversation();
    let (state, effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "   \n".to_string(),
            now: t0(),
        },
    );
    assert!(effects.is_empty());
    assert!(state.view().messages.is_empty());
}

#[test]
fn push_echo_confirms_optimistic_without_duplicate() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "hello".to_string(),
            now: t0(),
        },
    );

    // The server echoes the client-assigned id "local-1".
    let (state, effects) = receive(state, user("local-1", "hello"));
    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.messages.len(), 1);
    assert!(!view.messages[0].pending_ack);
}

#[test]
fn assistant_message_is_inserted_raw_then_rendered() {
    init_logging();
    let state = open_conversation();
    let (state, effects) = receive(state, assistant("a1", "**bold** answer"));

    // Raw insertion never waits for the formatter.
    assert_eq!(
        effects,
        vec![Effect::RenderMarkdown {
            message_id: MessageId::new("a1"),
            raw: "**bold** answer".to_string(),
        }]
    );
    let view = state.view();
    assert_eq!(view.messages.len(), 1);
    assert_eq!(view.messages[0].html, None);

    let (mut state, effects) = update(
        state,
        Msg::MarkdownRendered {
            message_id: MessageId::new("a1"),
            html: "<p><strong>bold</strong> answer</p>".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(state.consume_dirty());
    assert_eq!(
        state.view().messages[0].html.as_deref(),
        Some("<p><strong>bold</strong> answer</p>")
    );

    // Re-attaching the same rendered form is not a visible change.
    let (mut state, _effects) = update(
        state,
        Msg::MarkdownRendered {
            message_id: MessageId::new("a1"),
            html: "<p><strong>bold</strong> answer</p>".to_string(),
        },
    );
    assert!(!state.consume_dirty());
}

#[test]
fn duplicate_delivery_is_idempotent() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = receive(state, assistant("a1", "answer"));
    let (state, effects) = receive(state, assistant("a1", "answer"));

    assert!(effects.is_empty());
    assert_eq!(state.view().messages.len(), 1);
}

#[test]
fn rendered_form_for_a_gone_message_is_dropped() {
    init_logging();
    let mut state = open_conversation();
    state.consume_dirty();
    let (mut state, effects) = update(
        state,
        Msg::MarkdownRendered {
            message_id: MessageId::new("a-gone"),
            html: "<p>late</p>".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.consume_dirty());
}

#[test]
fn resync_preserves_unacknowledged_optimistic_entries() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "pending question".to_string(),
            now: t0(),
        },
    );

    // Authoritative list does not know about local-1 yet.
    let (state, effects) = update(
        state,
        Msg::MessagesFetched {
            conversation: ConversationId::new("conv-1"),
            messages: vec![user("u0", "earlier"), assistant("a0", "earlier answer")],
        },
    );
    assert_eq!(
        effects,
        vec![Effect::RenderMarkdown {
            message_id: MessageId::new("a0"),
            raw: "earlier answer".to_string(),
        }]
    );

    let view = state.view();
    let ids: Vec<_> = view.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u0", "a0", "local-1"]);
    assert!(view.messages[2].pending_ack);
}

#[test]
fn resync_adopts_server_order_and_keeps_rendered_content() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = receive(state, assistant("a1", "answer"));
    let (state, _effects) = update(
        state,
        Msg::MarkdownRendered {
            message_id: MessageId::new("a1"),
            html: "<p>answer</p>".to_string(),
        },
    );

    let (state, effects) = update(
        state,
        Msg::MessagesFetched {
            conversation: ConversationId::new("conv-1"),
            messages: vec![user("u1", "question"), assistant("a1", "answer")],
        },
    );
    // a1 already has a rendered form, so nothing is re-rendered.
    assert!(effects.is_empty());
    let view = state.view();
    let ids: Vec<_> = view.messages.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "a1"]);
    assert_eq!(view.messages[1].html.as_deref(), Some("<p>answer</p>"));
}

#[test]
fn resync_for_stale_conversation_is_dropped() {
    init_logging();
    let state = open_conversation();
    let (mut state, effects) = update(
        state,
        Msg::MessagesFetched {
            conversation: ConversationId::new("conv-stale"),
            messages: vec![user("u1", "old scope")],
        },
    );
    assert!(effects.is_empty());
    state.consume_dirty();
    assert!(state.view().messages.is_empty());
}

#[test]
fn failed_resync_surfaces_a_notice() {
    init_logging();
    let state = open_conversation();
    let (state, effects) = update(
        state,
        Msg::MessageSyncFailed {
            conversation: ConversationId::new("conv-1"),
            error: "timeout".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert!(state.view().notice.unwrap().contains("timeout"));

    // A late failure from a superseded conversation stays invisible.
    let (state, _effects) = update(
        state,
        Msg::ConversationOpened(ConversationId::new("conv-2")),
    );
    let (state, effects) = update(
        state,
        Msg::MessageSyncFailed {
            conversation: ConversationId::new("conv-1"),
            error: "late".to_string(),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.view().notice, None);
}

#[test]
fn send_failure_reverts_optimistic_entry_and_notices() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "hello".to_string(),
            now: t0(),
        },
    );
    let (state, effects) = update(
        state,
        Msg::SendFailed {
            local_id: MessageId::new("local-1"),
            error: "503 service unavailable".to_string(),
        },
    );
    assert!(effects.is_empty());
    let view = state.view();
    assert!(view.messages.is_empty());
    assert!(view.notice.unwrap().contains("503"));
}

#[test]
fn typing_indicator_decays_after_three_seconds() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = update(
        state,
        Msg::TypingObserved {
            conversation: ConversationId::new("conv-1"),
            user: "casey".to_string(),
            at: t0(),
        },
    );
    assert_eq!(state.view().typing_users, vec!["casey".to_string()]);

    // Still visible two seconds in, gone after the TTL with no explicit
    // stopped-typing event.
    let (state, _effects) = update(
        state,
        Msg::Tick {
            now: t0() + chrono::Duration::seconds(2),
        },
    );
    assert_eq!(state.view().typing_users, vec!["casey".to_string()]);

    let (state, _effects) = update(
        state,
        Msg::Tick {
            now: t0() + chrono::Duration::seconds(4),
        },
    );
    assert!(state.view().typing_users.is_empty());
}

#[test]
fn repeated_typing_events_extend_quietly() {
    init_logging();
    let state = open_conversation();
    let (mut state, _effects) = update(
        state,
        Msg::TypingObserved {
            conversation: ConversationId::new("conv-1"),
            user: "casey".to_string(),
            at: t0(),
        },
    );
    assert!(state.consume_dirty());

    // The second event extends the deadline but changes nothing visible.
    let (mut state, _effects) = update(
        state,
        Msg::TypingObserved {
            conversation: ConversationId::new("conv-1"),
            user: "casey".to_string(),
            at: t0() + chrono::Duration::seconds(2),
        },
    );
    assert!(!state.consume_dirty());

    // The extension still counts: alive at t0+4s.
    let (state, _effects) = update(
        state,
        Msg::Tick {
            now: t0() + chrono::Duration::seconds(4),
        },
    );
    assert_eq!(state.view().typing_users, vec!["casey".to_string()]);
}

#[test]
fn switching_conversation_clears_chat_state() {
    init_logging();
    let state = open_conversation();
    let (state, _effects) = update(
        state,
        Msg::ComposerSubmitted {
            text: "hello".to_string(),
            now: t0(),
        },
    );
    let (state, _effects) = update(
        state,
        Msg::SendAccepted {
            local_id: MessageId::new("local-1"),
            job_id: JobId::new("j1"),
        },
    );

    let (state, effects) = update(
        state,
        Msg::ConversationOpened(ConversationId::new("conv-2")),
    );
    assert_eq!(
        effects,
        vec![
            Effect::Unsubscribe {
                scope: ScopeKey::Conversation(ConversationId::new("conv-1")),
            },
            Effect::StopPolling,
            Effect::Subscribe {
                scope: ScopeKey::Conversation(ConversationId::new("conv-2")),
            },
            Effect::FetchMessages {
                conversation: ConversationId::new("conv-2"),
            },
        ]
    );
    let view = state.view();
    assert!(view.messages.is_empty());
    assert!(!view.is_processing);
}
