//! Per-strike intraday history: request/response types, the fetcher and the popup state.
//!
//! Opening the history popup for a (strike, side) pair bumps the [`HistoryPanel`] generation.
//! A response is only shown if no other popup was opened, or the popup closed, since its
//! request was issued.

use crate::{
    de::de_vec_f64,
    error::DataError,
    gateway::MarketGateway,
    model::{Expiry, InstrumentSelection, OptionSide, Strike},
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifies one strike history series.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct HistoryRequest {
    pub symbol: SmolStr,
    pub expiry: Expiry,
    pub strike: Strike,
    pub side: OptionSide,
}

impl HistoryRequest {
    pub fn new(instrument: &InstrumentSelection, strike: Strike, side: OptionSide) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            expiry: instrument.expiry,
            strike,
            side,
        }
    }
}

/// `POST api/percentage-data` body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct PercentageDataRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub strike: rust_decimal::Decimal,
    pub exp: Expiry,
    #[serde(rename = "isCe")]
    pub is_ce: bool,
    pub sid: SmolStr,
}

impl From<&HistoryRequest> for PercentageDataRequest {
    fn from(request: &HistoryRequest) -> Self {
        Self {
            strike: request.strike.value(),
            exp: request.expiry,
            is_ce: request.side.is_call(),
            sid: request.symbol.clone(),
        }
    }
}

/// `POST api/percentage-data` response: parallel series indexed by `timestamp`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    #[serde(default, deserialize_with = "de_vec_f64")]
    pub oichng: Vec<f64>,
    #[serde(default, deserialize_with = "de_vec_f64")]
    pub oi: Vec<f64>,
    #[serde(default, deserialize_with = "de_vec_f64")]
    pub vol: Vec<f64>,
}

impl HistoryResponse {
    /// Validate series alignment and attach the requested strike and side.
    pub fn into_series(self, request: &HistoryRequest) -> Result<HistorySeries, DataError> {
        let timestamps = self.timestamp.len();
        if self.oi.len() != timestamps
            || self.oichng.len() != timestamps
            || self.vol.len() != timestamps
        {
            return Err(DataError::InvalidHistory {
                timestamps,
                oi: self.oi.len(),
                oi_change: self.oichng.len(),
                volume: self.vol.len(),
            });
        }

        Ok(HistorySeries {
            strike: request.strike,
            side: request.side,
            timestamps: self.timestamp,
            oi: self.oi,
            oi_change: self.oichng,
            volume: self.vol,
        })
    }
}

/// Intraday OI, OI change and volume for one strike and side.
///
/// Series are equal length and aligned by index with `timestamps` (epoch seconds).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistorySeries {
    pub strike: Strike,
    pub side: OptionSide,
    pub timestamps: Vec<i64>,
    pub oi: Vec<f64>,
    pub oi_change: Vec<f64>,
    pub volume: Vec<f64>,
}

impl HistorySeries {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Latest (timestamp, oi, oi change, volume) sample.
    pub fn latest(&self) -> Option<(i64, f64, f64, f64)> {
        let last = self.len().checked_sub(1)?;
        Some((
            self.timestamps[last],
            self.oi[last],
            self.oi_change[last],
            self.volume[last],
        ))
    }

    pub fn datetimes(&self) -> impl Iterator<Item = Option<DateTime<Utc>>> + '_ {
        self.timestamps
            .iter()
            .map(|timestamp| DateTime::from_timestamp(*timestamp, 0))
    }
}

/// History popup state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HistoryView {
    #[default]
    Closed,
    Loading {
        request: HistoryRequest,
    },
    Loaded(HistorySeries),
    Failed {
        request: HistoryRequest,
        message: String,
    },
}

/// Proof that a history request was issued for a given panel generation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PanelTicket(u64);

#[derive(Debug, Default)]
struct PanelState {
    generation: u64,
    view: HistoryView,
}

/// Shared history popup state. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct HistoryPanel {
    state: Arc<Mutex<PanelState>>,
}

impl HistoryPanel {
    /// Open the popup for `request` in the loading state, superseding any pending request.
    pub fn open(&self, request: HistoryRequest) -> PanelTicket {
        let mut state = self.state.lock();
        state.generation += 1;
        state.view = HistoryView::Loading { request };
        PanelTicket(state.generation)
    }

    /// Apply the outcome of the request issued under `ticket`, if it is still current.
    pub fn complete(&self, ticket: PanelTicket, result: Result<HistorySeries, DataError>) -> bool {
        let mut state = self.state.lock();
        if state.generation != ticket.0 {
            debug!(?ticket, current = state.generation, "discarding superseded history");
            return false;
        }

        let request = match &state.view {
            HistoryView::Loading { request } => request.clone(),
            _ => return false,
        };

        state.view = match result {
            Ok(series) => HistoryView::Loaded(series),
            Err(error) => HistoryView::Failed {
                request,
                message: error.to_string(),
            },
        };
        true
    }

    /// Close the popup and discard the series. Pending responses are ignored.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.view = HistoryView::Closed;
    }

    pub fn view(&self) -> HistoryView {
        self.state.lock().view.clone()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state.lock().view, HistoryView::Closed)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state.lock().view, HistoryView::Loading { .. })
    }

    pub fn error(&self) -> Option<String> {
        match &self.state.lock().view {
            HistoryView::Failed { message, .. } => Some(message.clone()),
            _ => None,
        }
    }

    pub fn series(&self) -> Option<HistorySeries> {
        match &self.state.lock().view {
            HistoryView::Loaded(series) => Some(series.clone()),
            _ => None,
        }
    }
}

/// Fetches strike history through a [`MarketGateway`].
#[derive(Debug)]
pub struct HistoryFetcher<Gateway> {
    gateway: Arc<Gateway>,
}

impl<Gateway> Clone for HistoryFetcher<Gateway> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
        }
    }
}

impl<Gateway> HistoryFetcher<Gateway>
where
    Gateway: MarketGateway,
{
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Issue one history request. Every call hits the backend.
    pub async fn fetch(&self, request: &HistoryRequest) -> Result<HistorySeries, DataError> {
        self.gateway.history(request).await
    }

    /// Open `panel` for `request`, fetch, and apply the outcome if still current.
    pub async fn show(&self, panel: &HistoryPanel, request: HistoryRequest) -> bool {
        let ticket = panel.open(request.clone());
        info!(
            symbol = %request.symbol,
            expiry = %request.expiry,
            strike = %request.strike,
            side = %request.side,
            "fetching strike history"
        );

        let result = self.fetch(&request).await;
        if let Err(error) = &result {
            warn!(strike = %request.strike, side = %request.side, %error, "strike history fetch failed");
        }

        panel.complete(ticket, result)
    }
}
