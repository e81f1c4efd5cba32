//! Turn state machine: ordering and debounce rules for caption updates.
//!
//! The service re-sends a turn's full text as it refines it; rendering every
//! update flickers. The pure decision core picks which events reach the
//! caption sink, and the async station owns the single debounce timer per
//! session.

use crate::defaults;
use crate::stream::protocol::TurnEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Policy knobs for partial-update significance and coalescing.
///
/// The thresholds are heuristics, carried as configuration rather than
/// constants.
#[derive(Debug, Clone)]
pub struct TurnPolicy {
    /// Minimum character growth for a same-turn partial to be significant.
    pub min_char_growth: usize,
    /// Whether a new whitespace-delimited word alone counts as significant.
    pub count_new_words: bool,
    /// Coalescing window for significant partial emissions.
    pub debounce: Duration,
}

impl Default for TurnPolicy {
    fn default() -> Self {
        Self {
            min_char_growth: defaults::TURN_MIN_CHAR_GROWTH,
            count_new_words: true,
            debounce: Duration::from_millis(defaults::TURN_DEBOUNCE_MS),
        }
    }
}

/// A caption update released downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionUpdate {
    pub turn_order: u64,
    pub text: String,
    pub is_final: bool,
}

/// What to do with an incoming turn event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnAction {
    /// Emit immediately, cancelling any pending debounced emission.
    Emit,
    /// Emit after the debounce window, replacing any pending emission.
    EmitDebounced,
    /// Drop the event.
    Discard,
}

/// Decision core: pure, synchronous, deterministic.
#[derive(Debug)]
pub struct TurnStateMachine {
    policy: TurnPolicy,
    last_turn: Option<u64>,
    last_text: String,
    last_final: bool,
}

impl TurnStateMachine {
    /// Creates a state machine with the default policy.
    pub fn new() -> Self {
        Self::with_policy(TurnPolicy::default())
    }

    /// Creates a state machine with a custom policy.
    pub fn with_policy(policy: TurnPolicy) -> Self {
        Self {
            policy,
            last_turn: None,
            last_text: String::new(),
            last_final: false,
        }
    }

    /// The configured debounce window.
    pub fn debounce(&self) -> Duration {
        self.policy.debounce
    }

    /// Applies the ordering and significance rules to one event.
    ///
    /// On `Emit`/`EmitDebounced` the held state advances to this event;
    /// discarded events leave it untouched.
    pub fn decide(&mut self, event: &TurnEvent) -> TurnAction {
        let action = match self.last_turn {
            // First turn of the session behaves like a newer turn.
            None => self.action_for_update(event),
            Some(last) if event.turn_order > last => self.action_for_update(event),
            Some(last) if event.turn_order == last => {
                if self.last_final {
                    // A finalized turn is terminal and immutable; repeats
                    // and trailing partials are stale duplicates.
                    TurnAction::Discard
                } else if event.end_of_turn {
                    TurnAction::Emit
                } else if self.is_significant(&event.transcript) {
                    TurnAction::EmitDebounced
                } else {
                    TurnAction::Discard
                }
            }
            // Stale turn, discard unconditionally.
            Some(_) => TurnAction::Discard,
        };

        if action != TurnAction::Discard {
            self.last_turn = Some(event.turn_order);
            self.last_text = event.transcript.clone();
            self.last_final = event.end_of_turn;
        }
        action
    }

    /// A newer turn always passes; finality is never delayed.
    fn action_for_update(&self, event: &TurnEvent) -> TurnAction {
        if event.end_of_turn {
            TurnAction::Emit
        } else {
            TurnAction::EmitDebounced
        }
    }

    /// Text grew by the threshold, or gained a word.
    fn is_significant(&self, text: &str) -> bool {
        if text.chars().count() >= self.last_text.chars().count() + self.policy.min_char_growth {
            return true;
        }
        self.policy.count_new_words
            && text.split_whitespace().count() > self.last_text.split_whitespace().count()
    }
}

impl Default for TurnStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives released caption updates.
pub trait CaptionSink: Send + Sync {
    /// Publishes one update. Called from the turn station task.
    fn publish(&self, update: CaptionUpdate);
}

/// Caption sink that collects updates for inspection in tests.
#[derive(Debug, Default)]
pub struct CollectorSink {
    updates: std::sync::Mutex<Vec<CaptionUpdate>>,
}

impl CollectorSink {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything published so far.
    pub fn collected(&self) -> Vec<CaptionUpdate> {
        self.updates
            .lock()
            .map(|u| u.clone())
            .unwrap_or_default()
    }
}

impl CaptionSink for CollectorSink {
    fn publish(&self, update: CaptionUpdate) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(update);
        }
    }
}

/// Async station driving the state machine and its debounce timer.
///
/// Exactly one debounce timer may be pending per session; each debounced
/// emission restarts it, and a final emission or shutdown cancels it. The
/// channel closing is the stop signal: any pending emission is dropped
/// without publishing.
pub struct TurnStation {
    machine: TurnStateMachine,
}

impl TurnStation {
    /// Creates a station around a state machine.
    pub fn new(machine: TurnStateMachine) -> Self {
        Self { machine }
    }

    /// Runs until the event channel closes.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<TurnEvent>,
        sink: std::sync::Arc<dyn CaptionSink>,
    ) {
        let mut pending: Option<CaptionUpdate> = None;
        let timer = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                maybe_event = events.recv() => {
                    let Some(event) = maybe_event else {
                        // Session stopped: cancel pending without emitting.
                        if pending.is_some() {
                            debug!("dropping pending caption on shutdown");
                        }
                        return;
                    };
                    let update = CaptionUpdate {
                        turn_order: event.turn_order,
                        text: event.transcript.clone(),
                        is_final: event.end_of_turn,
                    };
                    match self.machine.decide(&event) {
                        TurnAction::Emit => {
                            pending = None;
                            sink.publish(update);
                        }
                        TurnAction::EmitDebounced => {
                            timer.as_mut().reset(tokio::time::Instant::now() + self.machine.debounce());
                            pending = Some(update);
                        }
                        TurnAction::Discard => {}
                    }
                }
                _ = &mut timer, if pending.is_some() => {
                    if let Some(update) = pending.take() {
                        sink.publish(update);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn turn(order: u64, text: &str, end_of_turn: bool) -> TurnEvent {
        TurnEvent {
            transcript: text.to_string(),
            end_of_turn,
            turn_order: order,
            confidence: 0.9,
            end_of_turn_confidence: if end_of_turn { 0.95 } else { 0.1 },
            turn_is_formatted: end_of_turn,
        }
    }

    #[test]
    fn test_first_event_passes() {
        let mut m = TurnStateMachine::new();
        assert_eq!(m.decide(&turn(1, "hi", false)), TurnAction::EmitDebounced);
    }

    #[test]
    fn test_newer_turn_always_passes() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "first turn text", false));
        // Even a shorter text passes when the turn is newer
        assert_eq!(m.decide(&turn(2, "x", false)), TurnAction::EmitDebounced);
        assert_eq!(m.decide(&turn(3, "y", true)), TurnAction::Emit);
    }

    #[test]
    fn test_final_emits_immediately() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "hello", false));
        assert_eq!(m.decide(&turn(1, "hello there", true)), TurnAction::Emit);
    }

    #[test]
    fn test_insignificant_partial_discarded() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "hello", false));
        // +1 char, no new word
        assert_eq!(m.decide(&turn(1, "helloo", false)), TurnAction::Discard);
    }

    #[test]
    fn test_char_growth_is_significant() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "hel", false));
        assert_eq!(m.decide(&turn(1, "hello", false)), TurnAction::EmitDebounced);
    }

    #[test]
    fn test_new_word_is_significant() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "hello", false));
        // Grows by one char but adds a word boundary
        assert_eq!(m.decide(&turn(1, "hello a", false)), TurnAction::EmitDebounced);
    }

    #[test]
    fn test_word_growth_disabled_by_policy() {
        let mut m = TurnStateMachine::with_policy(TurnPolicy {
            min_char_growth: 5,
            count_new_words: false,
            debounce: Duration::from_millis(50),
        });
        m.decide(&turn(1, "hello", false));
        assert_eq!(m.decide(&turn(1, "hello a", false)), TurnAction::Discard);
    }

    #[test]
    fn test_stale_turn_discarded() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(5, "current", false));
        assert_eq!(m.decide(&turn(4, "older", false)), TurnAction::Discard);
        assert_eq!(m.decide(&turn(3, "ancient final", true)), TurnAction::Discard);
        // Monotonicity: a later stale event is also discarded
        assert_eq!(m.decide(&turn(2, "even older", true)), TurnAction::Discard);
    }

    #[test]
    fn test_repeated_final_discarded_as_duplicate() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "hello there", true));
        assert_eq!(m.decide(&turn(1, "hello there", true)), TurnAction::Discard);
    }

    #[test]
    fn test_partial_after_final_discarded() {
        let mut m = TurnStateMachine::new();
        m.decide(&turn(1, "done", true));
        assert_eq!(
            m.decide(&turn(1, "done and then some", false)),
            TurnAction::Discard
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_station_debounces_partials() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::new());
        let handle = tokio::spawn(station.run(rx, sink.clone()));

        tx.send(turn(1, "hel", false)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(turn(1, "hello", false)).unwrap();
        // Let the debounce window elapse: only the coalesced partial emits
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(sink.collected().len(), 1);
        assert_eq!(sink.collected()[0].text, "hello");
        assert!(!sink.collected()[0].is_final);

        // Final emits immediately, no window
        tx.send(turn(1, "hello there", true)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let collected = sink.collected();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[1].text, "hello there");
        assert!(collected[1].is_final);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_cancels_pending_debounce() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::new());
        let handle = tokio::spawn(station.run(rx, sink.clone()));

        tx.send(turn(1, "partial text", false)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Final arrives inside the window: the pending partial must not fire
        tx.send(turn(1, "partial text done", true)).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let collected = sink.collected();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].text, "partial text done");
        assert!(collected[0].is_final);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_without_emitting() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::new());
        let handle = tokio::spawn(station.run(rx, sink.clone()));

        tx.send(turn(1, "never shown", false)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(tx);
        handle.await.unwrap();
        assert!(sink.collected().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replayed_final_yields_single_emission() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::new());
        let handle = tokio::spawn(station.run(rx, sink.clone()));

        let final_event = turn(1, "hello there", true);
        tx.send(final_event.clone()).unwrap();
        tx.send(final_event).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.collected().len(), 1);

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_decreasing_turn_orders_not_emitted() {
        let sink = Arc::new(CollectorSink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let station = TurnStation::new(TurnStateMachine::new());
        let handle = tokio::spawn(station.run(rx, sink.clone()));

        tx.send(turn(9, "kept", true)).unwrap();
        tx.send(turn(8, "stale one", true)).unwrap();
        tx.send(turn(7, "stale two", false)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let collected = sink.collected();
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].text, "kept");

        drop(tx);
        handle.await.unwrap();
    }
}
