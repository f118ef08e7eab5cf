use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::Utc;

use beacon_client::{ApiClient, ApiSettings};
use beacon_core::{update, AppState, AppViewModel, ConversationId, Msg, OrgId, WizardStep};
use beacon_logging::beacon_info;

use super::config::Config;
use super::effects::EffectRunner;
use super::logging;

/// Owns the state machine and the channel feeding it. The UI shell (or the
/// headless harness below) sends `Msg`s in and reads fresh view models out.
pub struct Controller {
    state: AppState,
    msg_rx: mpsc::Receiver<Msg>,
    msg_tx: mpsc::Sender<Msg>,
    runner: EffectRunner,
}

impl Controller {
    pub fn new(api: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
        let runner = EffectRunner::new(api, msg_tx.clone());

        // Background tick for ephemeral-state decay (typing indicators).
        let tick_tx = msg_tx.clone();
        thread::spawn(move || {
            let interval = Duration::from_millis(1000);
            while tick_tx.send(Msg::Tick { now: Utc::now() }).is_ok() {
                thread::sleep(interval);
            }
        });

        Self {
            state: AppState::new(),
            msg_rx,
            msg_tx,
            runner,
        }
    }

    pub fn msg_sender(&self) -> mpsc::Sender<Msg> {
        self.msg_tx.clone()
    }

    /// Drains queued messages through `update`, handing effects to the
    /// runner. Returns a view model only when something visible changed.
    pub fn pump(&mut self) -> Option<AppViewModel> {
        let mut inbox = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            inbox.push(msg);
        }

        let mut any_dirty = false;
        for msg in inbox {
            let state = std::mem::take(&mut self.state);
            let (mut state, effects) = update(state, msg);
            self.runner.enqueue(effects);
            any_dirty |= state.consume_dirty();
            self.state = state;
        }

        any_dirty.then(|| self.state.view())
    }
}

/// Headless harness: connects to the configured scopes and logs every view
/// transition. The real dashboard shell drives `Controller` the same way.
pub fn run_app() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    logging::initialize(config.log_destination);

    let api = ApiClient::new(ApiSettings::new(config.base_url.clone()))?;
    let mut controller = Controller::new(api);
    let tx = controller.msg_sender();

    if let Some(org) = &config.org {
        let _ = tx.send(Msg::OrganizationSelected(OrgId::new(org.clone())));
    }
    if let Some(conversation) = &config.conversation {
        let _ = tx.send(Msg::ConversationOpened(ConversationId::new(
            conversation.clone(),
        )));
    }

    loop {
        if let Some(view) = controller.pump() {
            for card in &view.providers {
                let step = match card.step {
                    WizardStep::FirstPhase => "first-phase",
                    WizardStep::SecondPhase => "second-phase",
                    WizardStep::Done => "connected",
                };
                beacon_info!("provider {} step={step}", card.provider);
            }
            beacon_info!(
                "messages={} processing={} typing={:?}",
                view.messages.len(),
                view.is_processing,
                view.typing_users
            );
            if let Some(notice) = &view.notice {
                beacon_info!("notice: {notice}");
            }
        }
        thread::sleep(Duration::from_millis(75));
    }
}
