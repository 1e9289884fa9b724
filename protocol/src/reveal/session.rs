//! Per-session reveal state.
//!
//! A [`RevealSession`] owns one state cell per (handle, identity) pair and
//! the broadcast channel that announces transitions. Create one per user
//! session; drop it (or switch identity) to forget every plaintext.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::state::{DisplayMode, RevealEvent, RevealState};
use crate::address::Pubkey;
use crate::config::REVEAL_EVENT_CAPACITY;
use crate::handle::Handle;

type RevealKey = (Handle, Pubkey);

#[derive(Debug, Default)]
pub(crate) struct RevealCell {
    state: RevealState,
    display: DisplayMode,
}

pub(crate) type SharedCell = Arc<Mutex<RevealCell>>;

/// Outcome of asking to start a flow.
pub(crate) enum Begin {
    /// The caller now owns the flow; the cell is in `CheckingAllowance`.
    Started(SharedCell),
    /// Nothing to do: cached, failed or already in flight.
    Existing(RevealState),
}

pub struct RevealSession {
    active: RwLock<Option<Pubkey>>,
    cells: DashMap<RevealKey, SharedCell>,
    /// Flows still running for an identity that is no longer active.
    detached: DashMap<RevealKey, SharedCell>,
    events: broadcast::Sender<RevealEvent>,
}

impl Default for RevealSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RevealSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevealSession")
            .field("active", &*self.active.read())
            .field("tracked", &self.cells.len())
            .field("detached", &self.detached.len())
            .finish()
    }
}

impl RevealSession {
    pub fn new() -> Self {
        Self::with_event_capacity(REVEAL_EVENT_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind see
    /// `RecvError::Lagged` and skip ahead.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            active: RwLock::new(None),
            cells: DashMap::new(),
            detached: DashMap::new(),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RevealEvent> {
        self.events.subscribe()
    }

    pub fn active_identity(&self) -> Option<Pubkey> {
        *self.active.read()
    }

    /// Makes `identity` the active one. If it differs from the previous
    /// identity every cell is dropped, cached plaintexts included.
    ///
    /// Flows still running for the old identity are parked: they publish
    /// nothing and their results are discarded. Switching back to that
    /// identity while one is still running re-attaches it, so the pair is
    /// never started twice. Returns whether anything was cleared.
    pub fn switch_identity(&self, identity: Option<Pubkey>) -> bool {
        let mut active = self.active.write();
        if *active == identity {
            return false;
        }
        let previous = std::mem::replace(&mut *active, identity);

        for entry in self.cells.iter() {
            if entry.value().lock().state.is_in_flight() {
                self.detached.insert(*entry.key(), entry.value().clone());
            }
        }
        let dropped = self.cells.len();
        self.cells.clear();

        let resumed = match identity {
            Some(id) => self.reattach(&id),
            None => 0,
        };
        info!(
            from = ?previous.map(|p| p.to_string()),
            to = ?identity.map(|p| p.to_string()),
            dropped,
            resumed,
            "reveal session identity switched"
        );
        dropped > 0
    }

    /// Moves `identity`'s parked flows back into the live map. Parked cells
    /// that finished meanwhile are dropped with their results.
    fn reattach(&self, identity: &Pubkey) -> usize {
        let keys: Vec<RevealKey> = self
            .detached
            .iter()
            .filter(|entry| entry.key().1 == *identity)
            .map(|entry| *entry.key())
            .collect();
        let mut resumed = 0;
        for key in keys {
            let Some((key, cell)) = self.detached.remove(&key) else {
                continue;
            };
            if cell.lock().state.is_in_flight() {
                self.cells.insert(key, cell);
                resumed += 1;
            }
        }
        resumed
    }

    /// Current state; `Hidden` for pairs never touched.
    pub fn state(&self, handle: Handle, identity: &Pubkey) -> RevealState {
        self.cells
            .get(&(handle, *identity))
            .map(|cell| cell.lock().state.clone())
            .unwrap_or_default()
    }

    pub fn display(&self, handle: Handle, identity: &Pubkey) -> DisplayMode {
        self.cells
            .get(&(handle, *identity))
            .map(|cell| cell.lock().display)
            .unwrap_or_default()
    }

    /// The plaintext if it is revealed and currently shown.
    pub fn visible_value(&self, handle: Handle, identity: &Pubkey) -> Option<u128> {
        let cell = self.cells.get(&(handle, *identity))?;
        let cell = cell.lock();
        match cell.display {
            DisplayMode::Shown => cell.state.plaintext(),
            DisplayMode::Masked => None,
        }
    }

    /// Number of pairs with state.
    pub fn tracked(&self) -> usize {
        self.cells.len()
    }

    /// Masks a revealed value. Returns false unless the pair is revealed.
    pub fn hide(&self, handle: Handle, identity: &Pubkey) -> bool {
        self.set_display(handle, identity, DisplayMode::Masked)
    }

    /// Unmasks a revealed value. Returns false unless the pair is revealed.
    pub fn show(&self, handle: Handle, identity: &Pubkey) -> bool {
        self.set_display(handle, identity, DisplayMode::Shown)
    }

    fn set_display(&self, handle: Handle, identity: &Pubkey, mode: DisplayMode) -> bool {
        let Some(cell) = self.cells.get(&(handle, *identity)) else {
            return false;
        };
        let mut cell = cell.lock();
        if cell.state.plaintext().is_none() {
            return false;
        }
        cell.display = mode;
        true
    }

    /// Returns a finished pair to `Hidden`, dropping any cached plaintext.
    /// In-flight pairs are left alone.
    pub fn reset(&self, handle: Handle, identity: &Pubkey) -> bool {
        let key = (handle, *identity);
        let reset = match self.cells.get(&key) {
            Some(cell) => {
                let mut cell = cell.lock();
                if cell.state.is_terminal() {
                    *cell = RevealCell::default();
                    true
                } else {
                    false
                }
            }
            None => false,
        };
        if reset {
            self.publish(key, RevealState::Hidden);
        }
        reset
    }

    /// Claims the pair for a new flow if it is `Hidden`.
    pub(crate) fn begin(&self, handle: Handle, identity: &Pubkey) -> Begin {
        let key = (handle, *identity);
        let cell = self.cells.entry(key).or_default().value().clone();
        {
            let mut guard = cell.lock();
            match guard.state.clone() {
                RevealState::Hidden => {
                    guard.state = RevealState::CheckingAllowance;
                    guard.display = DisplayMode::Shown;
                }
                revealed @ RevealState::Revealed(_) => {
                    guard.display = DisplayMode::Shown;
                    return Begin::Existing(revealed);
                }
                other => return Begin::Existing(other),
            }
        }
        self.publish(key, RevealState::CheckingAllowance);
        Begin::Started(cell)
    }

    /// Moves a claimed cell to `state`. Publishes only if the cell is still
    /// the live one for its pair.
    pub(crate) fn transition(
        &self,
        handle: Handle,
        identity: &Pubkey,
        cell: &SharedCell,
        state: RevealState,
    ) {
        let key = (handle, *identity);
        let live = self
            .cells
            .get(&key)
            .map(|current| Arc::ptr_eq(current.value(), cell))
            .unwrap_or(false);
        cell.lock().state = state.clone();
        if live {
            self.publish(key, state);
        } else {
            if state.is_terminal() {
                self.detached
                    .remove_if(&key, |_, parked| Arc::ptr_eq(parked, cell));
            }
            debug!(%handle, %identity, state = state.name(), "transition on detached cell");
        }
    }

    fn publish(&self, (handle, identity): RevealKey, state: RevealState) {
        debug!(%handle, %identity, state = state.name(), "reveal transition");
        // No subscribers is fine.
        let _ = self.events.send(RevealEvent::now(handle, identity, state));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Handle, Pubkey) {
        (Handle::new(1_000_000), Pubkey::new([1u8; 32]))
    }

    #[test]
    fn untouched_pair_is_hidden() {
        let session = RevealSession::new();
        let (h, id) = pair();
        assert_eq!(session.state(h, &id), RevealState::Hidden);
        assert_eq!(session.tracked(), 0);
    }

    #[test]
    fn begin_claims_once() {
        let session = RevealSession::new();
        let (h, id) = pair();
        assert!(matches!(session.begin(h, &id), Begin::Started(_)));
        match session.begin(h, &id) {
            Begin::Existing(state) => assert_eq!(state, RevealState::CheckingAllowance),
            Begin::Started(_) => panic!("second claim must not start a flow"),
        }
    }

    #[test]
    fn hide_and_show_only_apply_to_revealed() {
        let session = RevealSession::new();
        let (h, id) = pair();
        assert!(!session.hide(h, &id));

        let Begin::Started(cell) = session.begin(h, &id) else {
            panic!("expected a fresh flow");
        };
        assert!(!session.hide(h, &id));
        session.transition(h, &id, &cell, RevealState::Revealed(9));

        assert!(session.hide(h, &id));
        assert_eq!(session.display(h, &id), DisplayMode::Masked);
        assert_eq!(session.visible_value(h, &id), None);
        assert_eq!(session.state(h, &id), RevealState::Revealed(9));

        assert!(session.show(h, &id));
        assert_eq!(session.visible_value(h, &id), Some(9));
    }

    #[test]
    fn reset_ignores_in_flight_pairs() {
        let session = RevealSession::new();
        let (h, id) = pair();
        let Begin::Started(cell) = session.begin(h, &id) else {
            panic!("expected a fresh flow");
        };
        assert!(!session.reset(h, &id));
        session.transition(h, &id, &cell, RevealState::Failed("boom".into()));
        assert!(session.reset(h, &id));
        assert_eq!(session.state(h, &id), RevealState::Hidden);
    }

    #[test]
    fn identity_switch_clears_and_detaches() {
        let session = RevealSession::new();
        let (h, id) = pair();
        session.switch_identity(Some(id));
        let Begin::Started(cell) = session.begin(h, &id) else {
            panic!("expected a fresh flow");
        };
        let mut rx = session.subscribe();

        assert!(session.switch_identity(Some(Pubkey::new([2u8; 32]))));
        assert_eq!(session.tracked(), 0);

        session.transition(h, &id, &cell, RevealState::Revealed(1));
        assert_eq!(session.state(h, &id), RevealState::Hidden);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn switching_back_resumes_running_flow() {
        let session = RevealSession::new();
        let (h, a) = pair();
        let b = Pubkey::new([2u8; 32]);
        session.switch_identity(Some(a));
        let Begin::Started(cell) = session.begin(h, &a) else {
            panic!("expected a fresh flow");
        };

        session.switch_identity(Some(b));
        session.switch_identity(Some(a));
        assert_eq!(session.tracked(), 1);
        assert_eq!(session.state(h, &a), RevealState::CheckingAllowance);
        match session.begin(h, &a) {
            Begin::Existing(state) => assert_eq!(state, RevealState::CheckingAllowance),
            Begin::Started(_) => panic!("running flow must not be started twice"),
        }

        let mut rx = session.subscribe();
        session.transition(h, &a, &cell, RevealState::Revealed(4));
        assert_eq!(session.state(h, &a), RevealState::Revealed(4));
        assert_eq!(rx.try_recv().unwrap().state, RevealState::Revealed(4));
    }

    #[test]
    fn flow_finished_while_away_is_discarded() {
        let session = RevealSession::new();
        let (h, a) = pair();
        let b = Pubkey::new([2u8; 32]);
        session.switch_identity(Some(a));
        let Begin::Started(cell) = session.begin(h, &a) else {
            panic!("expected a fresh flow");
        };

        session.switch_identity(Some(b));
        session.transition(h, &a, &cell, RevealState::Revealed(4));
        session.switch_identity(Some(a));

        assert_eq!(session.tracked(), 0);
        assert_eq!(session.state(h, &a), RevealState::Hidden);
        assert!(matches!(session.begin(h, &a), Begin::Started(_)));
    }

    #[test]
    fn same_identity_does_not_clear() {
        let session = RevealSession::new();
        let (h, id) = pair();
        session.switch_identity(Some(id));
        let _ = session.begin(h, &id);
        assert!(!session.switch_identity(Some(id)));
        assert_eq!(session.tracked(), 1);
    }

    #[test]
    fn transitions_are_broadcast() {
        let session = RevealSession::new();
        let mut rx = session.subscribe();
        let (h, id) = pair();
        let Begin::Started(cell) = session.begin(h, &id) else {
            panic!("expected a fresh flow");
        };
        session.transition(h, &id, &cell, RevealState::Decrypting);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.state, RevealState::CheckingAllowance);
        assert_eq!(first.handle, h);
        assert_eq!(first.identity, id);
        assert_eq!(rx.try_recv().unwrap().state, RevealState::Decrypting);
    }
}
