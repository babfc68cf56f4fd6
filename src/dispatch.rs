// =============================================================================
// Command Dispatch — textual commands in, engine operations out
// =============================================================================
//
// A single consumer drains the inbound command channel one command at a time,
// so operations are fully serialized: an update can never race another
// update or a delete on the same series. Unknown or malformed commands are
// logged and skipped; the loop itself never dies on a bad command.
//
// Command grammar (an optional " | <payload>" suffix is preserved for
// downstream echo, matching the transport's envelope format):
//
//   init <symbol> <interval>
//   update <symbol> <interval>
//   delete <symbol> <interval>
//   update_all

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::{RecomputeEngine, RecomputeOutcome};
use crate::error::EngineError;
use crate::notify::{snapshot_payload, topic_for, Notifier};
use crate::store::IndicatorStore;
use crate::types::{Interval, SeriesKey};

// =============================================================================
// Command parsing
// =============================================================================

/// One decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize(SeriesKey),
    Update(SeriesKey),
    Delete(SeriesKey),
    UpdateAll,
}

/// A command plus the transport envelope's optional trailing payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Command,
    pub payload: Option<String>,
}

/// Parse the textual command form.
pub fn parse_command(text: &str) -> Result<ParsedCommand, EngineError> {
    let (head, payload) = match text.split_once(" | ") {
        Some((head, payload)) => (head, Some(payload.to_string())),
        None => (text, None),
    };

    let tokens: Vec<&str> = head.split_whitespace().collect();
    let command = match tokens.as_slice() {
        ["update_all"] => Command::UpdateAll,
        [verb, symbol, interval] => {
            let interval: Interval = interval.parse()?;
            let key = SeriesKey::new(symbol.to_string(), interval);
            match verb.to_ascii_lowercase().as_str() {
                "init" => Command::Initialize(key),
                "update" => Command::Update(key),
                "delete" => Command::Delete(key),
                other => {
                    return Err(EngineError::InvalidInput(format!(
                        "unknown command verb: {other}"
                    )))
                }
            }
        }
        _ => {
            return Err(EngineError::InvalidInput(format!(
                "malformed command: {head:?}"
            )))
        }
    };

    Ok(ParsedCommand { command, payload })
}

// =============================================================================
// Per-key state machine
// =============================================================================

/// Lifecycle of one series as seen by the dispatcher.
///
/// `Uninitialized -> Initialized -> Updating (ephemeral) -> Initialized`;
/// delete returns the key to `Uninitialized`. The state is reconciled
/// against engine outcomes, so a restart converges to the stores' truth
/// after the first command per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Uninitialized,
    Initialized,
    Updating,
}

impl fmt::Display for KeyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Updating => write!(f, "Updating"),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Maps commands onto engine operations, tracks per-key state, and publishes
/// a snapshot notification after each successful update.
pub struct Dispatcher {
    engine: Arc<RecomputeEngine>,
    indicator_store: Arc<dyn IndicatorStore>,
    notifier: Arc<dyn Notifier>,
    market_id: u32,
    sweep_keys: Vec<SeriesKey>,
    states: HashMap<SeriesKey, KeyState>,
}

impl Dispatcher {
    pub fn new(
        engine: Arc<RecomputeEngine>,
        indicator_store: Arc<dyn IndicatorStore>,
        notifier: Arc<dyn Notifier>,
        market_id: u32,
        sweep_keys: Vec<SeriesKey>,
    ) -> Self {
        Self {
            engine,
            indicator_store,
            notifier,
            market_id,
            sweep_keys,
            states: HashMap::new(),
        }
    }

    /// Current dispatcher-side state for a key.
    #[cfg(test)]
    pub fn key_state(&self, key: &SeriesKey) -> KeyState {
        self.states
            .get(key)
            .copied()
            .unwrap_or(KeyState::Uninitialized)
    }

    /// Handle one raw command string: parse, execute, log. One atomic unit
    /// of work per key; failures are reported and the dispatcher moves on.
    pub fn handle_text(&mut self, text: &str) {
        let command_id = Uuid::new_v4();
        info!(%command_id, command = %text, "command received");

        let parsed = match parse_command(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(%command_id, error = %e, "ignoring unrecognized command");
                return;
            }
        };

        if let Some(payload) = &parsed.payload {
            debug!(%command_id, payload, "command envelope payload");
        }

        self.handle_command(command_id, parsed.command);
    }

    fn handle_command(&mut self, command_id: Uuid, command: Command) {
        match command {
            Command::Initialize(key) => {
                let result = self
                    .engine
                    .initialize(&key.symbol, key.interval, self.market_id);
                self.finish(command_id, key, result, false);
            }
            Command::Update(key) => {
                self.states.insert(key.clone(), KeyState::Updating);
                let result = self.engine.update(&key.symbol, key.interval, self.market_id);
                self.finish(command_id, key, result, true);
            }
            Command::Delete(key) => {
                let result = self.engine.delete(&key.symbol, key.interval);
                self.finish(command_id, key, result, false);
            }
            Command::UpdateAll => {
                info!(%command_id, keys = self.sweep_keys.len(), "update sweep started");
                let keys = self.sweep_keys.clone();
                for (key, result) in self.engine.update_all(&keys, self.market_id) {
                    self.finish(command_id, key, result, true);
                }
            }
        }
    }

    /// Record the outcome: log it, settle the key's state, and notify on a
    /// successful update.
    fn finish(
        &mut self,
        command_id: Uuid,
        key: SeriesKey,
        result: Result<RecomputeOutcome, EngineError>,
        notify: bool,
    ) {
        match result {
            Ok(outcome) => {
                info!(%command_id, key = %key, status = %outcome, "command completed");

                let state = match &outcome {
                    RecomputeOutcome::Initialized { .. }
                    | RecomputeOutcome::AlreadyInitialized
                    | RecomputeOutcome::Updated { .. } => KeyState::Initialized,
                    RecomputeOutcome::Deleted { .. } | RecomputeOutcome::NotFound => {
                        KeyState::Uninitialized
                    }
                    // Nothing was computed; the stored series is the truth.
                    RecomputeOutcome::NoPriceData | RecomputeOutcome::NothingToUpdate => {
                        self.stored_state(&key)
                    }
                };
                debug!(key = %key, state = %state, "key state settled");
                self.states.insert(key.clone(), state);

                if notify && outcome.wrote_points() {
                    self.publish_snapshot(&key);
                }
            }
            Err(e) => {
                error!(%command_id, key = %key, error = %e, "command failed");
                // A failed operation leaves the stored series intact.
                let state = self.stored_state(&key);
                self.states.insert(key, state);
            }
        }
    }

    /// Derive a key's state from what the store actually holds.
    fn stored_state(&self, key: &SeriesKey) -> KeyState {
        match self.indicator_store.get_latest(&key.symbol, key.interval) {
            Ok(Some(_)) => KeyState::Initialized,
            _ => KeyState::Uninitialized,
        }
    }

    fn publish_snapshot(&self, key: &SeriesKey) {
        let latest = match self.indicator_store.get_latest(&key.symbol, key.interval) {
            Ok(Some(point)) => point,
            Ok(None) => return,
            Err(e) => {
                warn!(key = %key, error = %e, "could not load snapshot for notification");
                return;
            }
        };

        let payload = snapshot_payload(&latest);
        if let Err(e) = self.notifier.publish(&topic_for(key), &payload) {
            warn!(key = %key, error = %e, "notification publish failed");
        }
    }
}

// =============================================================================
// Dispatch loop
// =============================================================================

/// Drain the command channel sequentially until every sender is dropped.
pub async fn run_dispatch_loop(mut rx: mpsc::Receiver<String>, mut dispatcher: Dispatcher) {
    info!("command dispatch loop started");
    while let Some(text) = rx.recv().await {
        dispatcher.handle_text(&text);
    }
    info!("command channel closed; dispatch loop exiting");
}
