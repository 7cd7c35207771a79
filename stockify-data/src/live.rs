//! One-call mount of the live option chain session.

use crate::{
    config::{PollerConfig, SessionConfig},
    expiry::{ExpiryResolver, ResolverHandle},
    gateway::MarketGateway,
    history::{HistoryFetcher, HistoryPanel, HistoryRequest},
    model::{OptionSide, Strike},
    poller::{LivePoller, PollerHandle, PollerState},
    session::SessionStore,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Running live session: store, expiry resolver, poller and history popup.
///
/// Dropping the session cancels every background task it owns.
#[derive(Debug)]
pub struct LiveSession<Gateway> {
    store: SessionStore,
    history: HistoryFetcher<Gateway>,
    panel: HistoryPanel,
    resolver: ResolverHandle,
    poller: PollerHandle,
    history_task: Option<HistoryTask>,
}

/// In-flight history request, aborted on drop.
#[derive(Debug)]
struct HistoryTask(JoinHandle<bool>);

impl Drop for HistoryTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl<Gateway> LiveSession<Gateway>
where
    Gateway: MarketGateway + 'static,
{
    /// Mount the session on the current Tokio runtime.
    pub fn start(gateway: Arc<Gateway>, session: &SessionConfig, poller: PollerConfig) -> Self {
        let store = SessionStore::new(session);
        info!(
            symbol = %session.symbol,
            polling_enabled = session.polling_enabled,
            interval_ms = poller.interval.as_millis() as u64,
            "starting live session"
        );

        let resolver = ExpiryResolver::new(Arc::clone(&gateway), store.clone()).spawn();
        let poller = LivePoller::new(Arc::clone(&gateway), store.clone(), poller).spawn();

        Self {
            store,
            history: HistoryFetcher::new(gateway),
            panel: HistoryPanel::default(),
            resolver,
            poller,
            history_task: None,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    pub fn history_panel(&self) -> &HistoryPanel {
        &self.panel
    }

    /// Open the history popup for `strike` and `side` of the selected instrument.
    ///
    /// Returns false if no instrument is resolved yet.
    pub fn open_history(&mut self, strike: Strike, side: OptionSide) -> bool {
        let Some(instrument) = self.store.instrument() else {
            debug!(%strike, %side, "history requested before instrument resolved");
            return false;
        };

        let request = HistoryRequest::new(&instrument, strike, side);
        let history = self.history.clone();
        let panel = self.panel.clone();

        // Replacing the task aborts any earlier request
        self.history_task = Some(HistoryTask(tokio::spawn(async move {
            history.show(&panel, request).await
        })));
        true
    }

    pub fn close_history(&mut self) {
        self.history_task = None;
        self.panel.close();
    }

    /// Cancel all background tasks and wait for them to wind down.
    pub async fn shutdown(self) {
        info!("stopping live session");
        self.panel.close();

        let Self {
            resolver,
            poller,
            history_task,
            ..
        } = self;
        drop(history_task);
        resolver.shutdown().await;
        poller.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        history::HistoryView,
        model::Expiry,
        test_utils::MockGateway,
    };
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use tokio::time::sleep;

    fn gateway() -> Arc<MockGateway> {
        Arc::new(MockGateway::new().with_expiries("NIFTY", Ok(vec![Expiry(100), Expiry(200)])))
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_session_resolves_expiry_then_polls() {
        let gateway = gateway();
        let session = LiveSession::start(
            Arc::clone(&gateway),
            &SessionConfig::default(),
            PollerConfig::default().with_interval(Duration::from_secs(10)),
        );

        sleep(Duration::from_secs(1)).await;
        assert_eq!(session.store().expiry(), Some(Expiry(100)));
        assert!(session.store().snapshot().is_some());
        assert_eq!(session.poller_state(), PollerState::Scheduled);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(gateway.live_call_count(), 2);

        session.shutdown().await;
        sleep(Duration::from_secs(60)).await;
        assert_eq!(gateway.live_call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_session_history_popup() {
        let gateway = gateway();
        let mut session = LiveSession::start(
            Arc::clone(&gateway),
            &SessionConfig::default(),
            PollerConfig::default(),
        );
        let strike = Strike::new(dec!(24000));

        // No instrument resolved yet
        assert!(!session.open_history(strike, OptionSide::Call));

        sleep(Duration::from_millis(10)).await;
        assert!(session.open_history(strike, OptionSide::Put));
        sleep(Duration::from_millis(10)).await;

        let series = session.history_panel().series().unwrap();
        assert_eq!(series.strike, strike);
        assert_eq!(series.side, OptionSide::Put);
        assert_eq!(gateway.history_calls.lock()[0].expiry, Expiry(100));

        session.close_history();
        assert_eq!(session.history_panel().view(), HistoryView::Closed);
    }
}
