//! Session state store: the single source of truth for the selected instrument, the latest
//! snapshot and the display toggles.
//!
//! [`SessionStore`] is a cheap, cloneable handle passed explicitly to every collaborator.
//! Selection changes (symbol, expiry, polling switch) bump a generation counter and are
//! published on a [`watch`] channel, which is how the expiry resolver and the live poller learn
//! they must restart. Market data writers hold a [`FetchTicket`] issued at request time, and
//! writes carrying a superseded ticket are discarded.

use crate::{
    chain::ViewOptions,
    config::SessionConfig,
    model::{Expiry, InstrumentSelection},
    snapshot::LiveSnapshot,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use smol_str::SmolStr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Instrument selection and polling switch, as published to the poller and resolver.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Selection {
    pub symbol: SmolStr,
    pub expiry: Option<Expiry>,
    pub polling_enabled: bool,
    /// Incremented on every symbol, expiry or polling switch change.
    pub generation: u64,
}

impl Selection {
    /// Symbol and expiry, once both are resolved.
    pub fn instrument(&self) -> Option<InstrumentSelection> {
        match (self.symbol.is_empty(), self.expiry) {
            (false, Some(expiry)) => Some(InstrumentSelection::new(self.symbol.clone(), expiry)),
            _ => None,
        }
    }

    /// Instrument to poll, if polling is enabled and the instrument is resolved.
    pub fn pollable(&self) -> Option<InstrumentSelection> {
        self.polling_enabled.then(|| self.instrument()).flatten()
    }
}

/// Proof that a market data request was issued for a given selection generation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FetchTicket {
    pub generation: u64,
    pub sequence: u64,
}

#[derive(Debug)]
struct SessionState {
    selection: Selection,
    expiries: Vec<Expiry>,
    snapshot: Option<Arc<LiveSnapshot>>,
    snapshot_time: Option<DateTime<Utc>>,
    next_sequence: u64,
    applied_sequence: u64,
    reversed: bool,
    highlighting: bool,
    strike_depth: Option<usize>,
}

impl SessionState {
    fn bump(&mut self) {
        self.selection.generation += 1;
    }
}

/// Injectable handle to the session state. Clones share the same state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    state: Arc<RwLock<SessionState>>,
    selection_tx: Arc<watch::Sender<Selection>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        let selection = Selection {
            symbol: config.symbol.clone(),
            expiry: None,
            polling_enabled: config.polling_enabled,
            generation: 0,
        };

        let (selection_tx, _) = watch::channel(selection.clone());

        Self {
            state: Arc::new(RwLock::new(SessionState {
                selection,
                expiries: Vec::new(),
                snapshot: None,
                snapshot_time: None,
                next_sequence: 1,
                applied_sequence: 0,
                reversed: config.reversed,
                highlighting: config.highlighting,
                strike_depth: config.strike_depth,
            })),
            selection_tx: Arc::new(selection_tx),
        }
    }

    /// Apply a selection change under the write lock and publish it.
    fn update_selection<F>(&self, update: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        let mut state = self.state.write();
        if !update(&mut state) {
            return false;
        }
        state.bump();
        self.selection_tx.send_replace(state.selection.clone());
        true
    }

    /// Select a new underlying symbol.
    ///
    /// Clears the expiry selection and the expiry list so the resolver picks a new default,
    /// and restarts the poller. Selecting the current symbol is a no-op.
    pub fn set_symbol(&self, symbol: impl Into<SmolStr>) -> bool {
        let symbol = symbol.into();
        let changed = self.update_selection(|state| {
            if state.selection.symbol == symbol {
                return false;
            }
            state.selection.symbol = symbol.clone();
            state.selection.expiry = None;
            state.expiries.clear();
            true
        });

        if changed {
            info!(%symbol, "symbol selected");
        }
        changed
    }

    /// Select an expiry, restarting the poller. Selecting the current expiry is a no-op.
    pub fn set_expiry(&self, expiry: Expiry) -> bool {
        let changed = self.update_selection(|state| {
            if state.selection.expiry == Some(expiry) {
                return false;
            }
            state.selection.expiry = Some(expiry);
            true
        });

        if changed {
            info!(%expiry, "expiry selected");
        }
        changed
    }

    /// Select the expiry `offset` positions away from the current one in the resolved list.
    ///
    /// Clamps at both ends. Returns the newly selected expiry, if the selection changed.
    pub fn step_expiry(&self, offset: isize) -> Option<Expiry> {
        let target = {
            let state = self.state.read();
            if state.expiries.is_empty() {
                return None;
            }
            let current = state
                .selection
                .expiry
                .and_then(|expiry| state.expiries.iter().position(|other| *other == expiry))
                .unwrap_or(0);
            let last = state.expiries.len() - 1;
            let target = current.saturating_add_signed(offset).min(last);
            state.expiries[target]
        };

        self.set_expiry(target).then_some(target)
    }

    /// Master polling switch. When disabled the poller issues no further fetches.
    pub fn set_polling_enabled(&self, enabled: bool) -> bool {
        let changed = self.update_selection(|state| {
            if state.selection.polling_enabled == enabled {
                return false;
            }
            state.selection.polling_enabled = enabled;
            true
        });

        if changed {
            info!(enabled, "polling switched");
        }
        changed
    }

    pub fn set_highlighting(&self, enabled: bool) {
        self.state.write().highlighting = enabled;
    }

    pub fn set_reversed(&self, reversed: bool) {
        self.state.write().reversed = reversed;
    }

    pub fn set_strike_depth(&self, depth: Option<usize>) {
        self.state.write().strike_depth = depth;
    }

    /// Subscribe to selection changes.
    pub fn subscribe(&self) -> watch::Receiver<Selection> {
        self.selection_tx.subscribe()
    }

    pub fn selection(&self) -> Selection {
        self.state.read().selection.clone()
    }

    pub fn symbol(&self) -> SmolStr {
        self.state.read().selection.symbol.clone()
    }

    pub fn expiry(&self) -> Option<Expiry> {
        self.state.read().selection.expiry
    }

    pub fn instrument(&self) -> Option<InstrumentSelection> {
        self.state.read().selection.instrument()
    }

    pub fn expiries(&self) -> Vec<Expiry> {
        self.state.read().expiries.clone()
    }

    pub fn snapshot(&self) -> Option<Arc<LiveSnapshot>> {
        self.state.read().snapshot.clone()
    }

    /// Time the current snapshot was accepted.
    pub fn snapshot_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().snapshot_time
    }

    pub fn is_polling_enabled(&self) -> bool {
        self.state.read().selection.polling_enabled
    }

    pub fn is_highlighting(&self) -> bool {
        self.state.read().highlighting
    }

    pub fn is_reversed(&self) -> bool {
        self.state.read().reversed
    }

    /// Render options derived from the current toggles.
    pub fn view_options(&self) -> ViewOptions {
        let state = self.state.read();
        ViewOptions {
            reversed: state.reversed,
            highlighting: state.highlighting,
            depth: state.strike_depth,
        }
    }

    /// Issue a ticket for a live data fetch, if `generation` is still current and polling is
    /// enabled.
    pub fn issue_ticket(&self, generation: u64) -> Option<FetchTicket> {
        let mut state = self.state.write();
        if state.selection.generation != generation || !state.selection.polling_enabled {
            return None;
        }

        let ticket = FetchTicket {
            generation,
            sequence: state.next_sequence,
        };
        state.next_sequence += 1;
        Some(ticket)
    }

    /// Replace the snapshot with one fetched under `ticket`.
    ///
    /// The write is discarded if the selection changed since the ticket was issued, or if a
    /// snapshot from a later-issued ticket has already been applied.
    pub fn apply_snapshot(&self, ticket: FetchTicket, snapshot: LiveSnapshot) -> bool {
        let mut state = self.state.write();

        if ticket.generation != state.selection.generation {
            debug!(
                ?ticket,
                current = state.selection.generation,
                "discarding snapshot from superseded selection"
            );
            return false;
        }

        if ticket.sequence <= state.applied_sequence {
            debug!(
                ?ticket,
                applied = state.applied_sequence,
                "discarding out of order snapshot"
            );
            return false;
        }

        state.applied_sequence = ticket.sequence;
        state.snapshot = Some(Arc::new(snapshot));
        state.snapshot_time = Some(Utc::now());
        true
    }

    /// Store the expiry list resolved for `symbol`.
    ///
    /// Discarded if the symbol changed in the meantime. When no expiry is selected, the first
    /// entry becomes the selection (restarting the poller). Returns the auto-selected expiry.
    pub fn apply_expiries(&self, symbol: &str, expiries: Vec<Expiry>) -> Option<Expiry> {
        let mut state = self.state.write();

        if state.selection.symbol != symbol {
            debug!(
                symbol,
                current = %state.selection.symbol,
                "discarding expiries for superseded symbol"
            );
            return None;
        }

        let default = match (state.selection.expiry, expiries.first()) {
            (None, Some(first)) => Some(*first),
            _ => None,
        };
        state.expiries = expiries;

        if let Some(expiry) = default {
            state.selection.expiry = Some(expiry);
            state.bump();
            self.selection_tx.send_replace(state.selection.clone());
            info!(%symbol, %expiry, "default expiry selected");
        }

        default
    }
}
