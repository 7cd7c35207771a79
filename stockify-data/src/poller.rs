//! Live poller: fixed-rate re-fetching of the option chain snapshot.
//!
//! The poller is a single task multiplexing three event sources:
//! - selection changes from the [`SessionStore`], which cancel and re-arm the timer,
//! - timer ticks, each of which issues one fetch without waiting for earlier ones,
//! - completions of in-flight fetches, applied through their [`FetchTicket`].
//!
//! In-flight fetches are not aborted when the selection changes. Their results are discarded
//! by the store because their ticket generation is stale.

use crate::{
    config::PollerConfig,
    error::DataError,
    gateway::MarketGateway,
    model::InstrumentSelection,
    session::{FetchTicket, Selection, SessionStore},
    snapshot::LiveSnapshot,
};
use futures::{FutureExt, StreamExt, future::BoxFuture, stream::FuturesUnordered};
use std::sync::Arc;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Interval, interval},
};
use tracing::{debug, info, warn};

/// Observable poller state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PollerState {
    /// Polling disabled, or symbol / expiry not yet resolved.
    Idle,
    /// Timer armed, next fetch pending.
    Scheduled,
    /// At least one fetch for the current selection is in flight.
    Fetching,
}

type FetchOutput = (FetchTicket, InstrumentSelection, Result<LiveSnapshot, DataError>);

/// Timer armed for one selection generation.
#[derive(Debug)]
struct Armed {
    timer: Interval,
    instrument: InstrumentSelection,
    generation: u64,
    in_flight: usize,
}

/// Resolves on the next tick of the armed timer, never if disarmed.
async fn tick(armed: &mut Option<Armed>) {
    match armed {
        Some(armed) => {
            armed.timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Fixed-rate snapshot poller bound to a [`SessionStore`].
#[derive(Debug)]
pub struct LivePoller<Gateway> {
    gateway: Arc<Gateway>,
    store: SessionStore,
    config: PollerConfig,
}

impl<Gateway> LivePoller<Gateway>
where
    Gateway: MarketGateway + 'static,
{
    pub fn new(gateway: Arc<Gateway>, store: SessionStore, config: PollerConfig) -> Self {
        Self {
            gateway,
            store,
            config,
        }
    }

    /// Spawn the poller onto the current Tokio runtime.
    ///
    /// The task runs until the returned handle is dropped or shut down.
    pub fn spawn(self) -> PollerHandle {
        let (state_tx, state_rx) = watch::channel(PollerState::Idle);
        let task = tokio::spawn(self.run(state_tx));
        PollerHandle {
            task,
            state: state_rx,
        }
    }

    async fn run(self, state_tx: watch::Sender<PollerState>) {
        let mut selections = self.store.subscribe();
        let mut in_flight = FuturesUnordered::<BoxFuture<'static, FetchOutput>>::new();
        let mut armed = self.arm(&selections.borrow_and_update());
        state_tx.send_replace(Self::state(&armed));

        loop {
            tokio::select! {
                // Selection changes win over a simultaneously ready tick
                biased;

                changed = selections.changed() => {
                    if changed.is_err() {
                        debug!("session store dropped, stopping live poller");
                        break;
                    }
                    armed = self.arm(&selections.borrow_and_update());
                }

                Some((ticket, instrument, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.settle(&mut armed, ticket, instrument, result);
                }

                _ = tick(&mut armed) => {
                    let Some(current) = armed.as_mut() else {
                        continue;
                    };

                    // The store may have moved on before its change notification was observed
                    let Some(ticket) = self.store.issue_ticket(current.generation) else {
                        debug!(
                            generation = current.generation,
                            "skipping tick for superseded selection"
                        );
                        continue;
                    };

                    current.in_flight += 1;
                    in_flight.push(self.fetch(ticket, current.instrument.clone()));
                }
            }

            state_tx.send_replace(Self::state(&armed));
        }
    }

    /// Arm a fresh timer for `selection`, or disarm if it cannot be polled.
    fn arm(&self, selection: &Selection) -> Option<Armed> {
        match selection.pollable() {
            Some(instrument) => {
                info!(
                    %instrument,
                    generation = selection.generation,
                    interval_ms = self.config.interval.as_millis() as u64,
                    "live poller scheduled"
                );
                Some(Armed {
                    timer: interval(self.config.interval),
                    instrument,
                    generation: selection.generation,
                    in_flight: 0,
                })
            }
            None => {
                info!(
                    symbol = %selection.symbol,
                    expiry = ?selection.expiry,
                    polling_enabled = selection.polling_enabled,
                    "live poller idle"
                );
                None
            }
        }
    }

    fn fetch(
        &self,
        ticket: FetchTicket,
        instrument: InstrumentSelection,
    ) -> BoxFuture<'static, FetchOutput> {
        let gateway = Arc::clone(&self.gateway);
        debug!(%instrument, ?ticket, "fetching live snapshot");

        async move {
            let result = gateway.live_data(&instrument).await;
            (ticket, instrument, result)
        }
        .boxed()
    }

    fn settle(
        &self,
        armed: &mut Option<Armed>,
        ticket: FetchTicket,
        instrument: InstrumentSelection,
        result: Result<LiveSnapshot, DataError>,
    ) {
        if let Some(current) = armed
            .as_mut()
            .filter(|current| current.generation == ticket.generation)
        {
            current.in_flight = current.in_flight.saturating_sub(1);
        }

        match result {
            Ok(snapshot) => {
                if self.store.apply_snapshot(ticket, snapshot) {
                    debug!(%instrument, ?ticket, "live snapshot applied");
                }
            }
            Err(error) => {
                warn!(
                    %instrument,
                    ?ticket,
                    %error,
                    "live snapshot fetch failed, retaining previous snapshot"
                );
            }
        }
    }

    fn state(armed: &Option<Armed>) -> PollerState {
        match armed {
            None => PollerState::Idle,
            Some(armed) if armed.in_flight > 0 => PollerState::Fetching,
            Some(_) => PollerState::Scheduled,
        }
    }
}

/// Handle to a running [`LivePoller`]. Dropping the handle cancels the poller.
#[derive(Debug)]
pub struct PollerHandle {
    task: JoinHandle<()>,
    state: watch::Receiver<PollerState>,
}

impl PollerHandle {
    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Cancel the poller and wait for the task to wind down.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
