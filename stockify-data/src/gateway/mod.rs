//! Remote data gateway: the request/response contract the core depends on.
//!
//! [`MarketGateway`] is the seam between the live session and the network. [`HttpGateway`] is
//! the production implementation; tests substitute an in-memory double.

use crate::{
    error::DataError,
    history::{HistoryRequest, HistorySeries},
    model::{Expiry, InstrumentSelection},
    snapshot::LiveSnapshot,
};
use async_trait::async_trait;
use std::sync::Arc;

pub mod http;

pub use http::HttpGateway;

/// Backend endpoints consumed by the core.
pub mod endpoint {
    /// `GET` live option chain snapshot.
    pub const LIVE_DATA: &str = "api/live-data";

    /// `GET` available expiries for an instrument.
    pub const EXPIRY_DATES: &str = "api/exp-date";

    /// `POST` intraday OI / OI change / volume history for one strike.
    pub const PERCENTAGE_DATA: &str = "api/percentage-data";
}

/// Request/response contract of the remote backend.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Fetch the latest option chain snapshot for the selected instrument.
    async fn live_data(&self, selection: &InstrumentSelection) -> Result<LiveSnapshot, DataError>;

    /// Fetch the expiries available for `symbol`.
    ///
    /// `expiry` is forwarded as the currently selected expiry, if any.
    async fn expiries(&self, symbol: &str, expiry: Option<Expiry>)
    -> Result<Vec<Expiry>, DataError>;

    /// Fetch the intraday series for one (strike, side) pair.
    async fn history(&self, request: &HistoryRequest) -> Result<HistorySeries, DataError>;
}

#[async_trait]
impl<Gateway> MarketGateway for Arc<Gateway>
where
    Gateway: MarketGateway + ?Sized,
{
    async fn live_data(&self, selection: &InstrumentSelection) -> Result<LiveSnapshot, DataError> {
        self.as_ref().live_data(selection).await
    }

    async fn expiries(
        &self,
        symbol: &str,
        expiry: Option<Expiry>,
    ) -> Result<Vec<Expiry>, DataError> {
        self.as_ref().expiries(symbol, expiry).await
    }

    async fn history(&self, request: &HistoryRequest) -> Result<HistorySeries, DataError> {
        self.as_ref().history(request).await
    }
}
