//! In-memory [`MarketGateway`] double with scripted latency and responses.

use crate::{
    error::DataError,
    gateway::MarketGateway,
    history::{HistoryRequest, HistorySeries},
    model::{Expiry, InstrumentSelection, Strike},
    snapshot::{LiveSnapshot, SpotQuote},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use smol_str::SmolStr;
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

type LiveScript =
    Box<dyn Fn(usize, &InstrumentSelection) -> (Duration, Result<LiveSnapshot, DataError>) + Send + Sync>;

pub fn snapshot_with_ltp(ltp: f64) -> LiveSnapshot {
    LiveSnapshot {
        spot: SpotQuote {
            ltp: Some(ltp),
            ..SpotQuote::default()
        },
        ..LiveSnapshot::default()
    }
}

pub fn transport_error() -> DataError {
    DataError::Transport {
        endpoint: "/api/test".to_string(),
        message: "connection refused".to_string(),
    }
}

pub struct MockGateway {
    live: LiveScript,
    expiries: Mutex<HashMap<SmolStr, Result<Vec<Expiry>, DataError>>>,
    history_latency: Mutex<HashMap<Strike, Duration>>,
    history_failures: Mutex<Vec<Strike>>,
    pub live_calls: Mutex<Vec<(Instant, InstrumentSelection)>>,
    pub expiry_calls: Mutex<Vec<(SmolStr, Option<Expiry>)>>,
    pub history_calls: Mutex<Vec<HistoryRequest>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Gateway answering every live request instantly with an LTP equal to the call index.
    pub fn new() -> Self {
        Self {
            live: Box::new(|call, _| (Duration::ZERO, Ok(snapshot_with_ltp(call as f64)))),
            expiries: Mutex::new(HashMap::new()),
            history_latency: Mutex::new(HashMap::new()),
            history_failures: Mutex::new(Vec::new()),
            live_calls: Mutex::new(Vec::new()),
            expiry_calls: Mutex::new(Vec::new()),
            history_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_live<F>(mut self, script: F) -> Self
    where
        F: Fn(usize, &InstrumentSelection) -> (Duration, Result<LiveSnapshot, DataError>)
            + Send
            + Sync
            + 'static,
    {
        self.live = Box::new(script);
        self
    }

    pub fn with_expiries(self, symbol: &str, expiries: Result<Vec<Expiry>, DataError>) -> Self {
        self.expiries.lock().insert(SmolStr::new(symbol), expiries);
        self
    }

    pub fn with_history_latency(self, strike: Strike, latency: Duration) -> Self {
        self.history_latency.lock().insert(strike, latency);
        self
    }

    pub fn with_history_failure(self, strike: Strike) -> Self {
        self.history_failures.lock().push(strike);
        self
    }

    pub fn live_call_count(&self) -> usize {
        self.live_calls.lock().len()
    }
}

#[async_trait]
impl MarketGateway for MockGateway {
    async fn live_data(&self, selection: &InstrumentSelection) -> Result<LiveSnapshot, DataError> {
        let call = {
            let mut calls = self.live_calls.lock();
            calls.push((Instant::now(), selection.clone()));
            calls.len() - 1
        };

        let (latency, response) = (self.live)(call, selection);
        tokio::time::sleep(latency).await;
        response
    }

    async fn expiries(
        &self,
        symbol: &str,
        expiry: Option<Expiry>,
    ) -> Result<Vec<Expiry>, DataError> {
        self.expiry_calls
            .lock()
            .push((SmolStr::new(symbol), expiry));

        self.expiries
            .lock()
            .get(symbol)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn history(&self, request: &HistoryRequest) -> Result<HistorySeries, DataError> {
        self.history_calls.lock().push(request.clone());

        let latency = self
            .history_latency
            .lock()
            .get(&request.strike)
            .copied()
            .unwrap_or_default();
        tokio::time::sleep(latency).await;

        if self.history_failures.lock().contains(&request.strike) {
            return Err(transport_error());
        }

        let base = request.strike.value().to_f64().unwrap_or(0.0);
        Ok(HistorySeries {
            strike: request.strike,
            side: request.side,
            timestamps: vec![1, 2],
            oi: vec![base, base + 1.0],
            oi_change: vec![0.0, 1.0],
            volume: vec![10.0, 20.0],
        })
    }
}
