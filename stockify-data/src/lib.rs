//! # Stockify-Data
//! Live option chain core: keeps one view of a derivatives option chain fresh by polling a
//! REST backend, resolves the available expiries, splits the strike ladder into in-the-money
//! and out-of-the-money bands around spot, flags the strikes holding each column maximum, and
//! fetches per-strike intraday history on demand.
//!
//! ## Components
//! - [`session::SessionStore`]: injectable state store, the single writer point for market data.
//! - [`expiry::ExpiryResolver`]: fetches expiries on symbol change and selects a default.
//! - [`poller::LivePoller`]: fixed-rate snapshot polling with generation-guarded writes.
//! - [`chain`]: pure stratification and hot-cell computation over a snapshot.
//! - [`history`]: strike history fetcher and popup state.
//! - [`live::LiveSession`]: mounts all of the above with teardown on drop.
//!
//! ## Example
//! ```rust,no_run
//! use stockify_data::{
//!     chain::{ChainView, ViewOptions},
//!     config::{GatewayConfig, PollerConfig, SessionConfig},
//!     gateway::HttpGateway,
//!     live::LiveSession,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stockify_data::error::DataError> {
//!     let gateway = Arc::new(HttpGateway::new(GatewayConfig::from_env()?)?);
//!     let session = LiveSession::start(gateway, &SessionConfig::from_env(), PollerConfig::from_env());
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(2)).await;
//!
//!     if let Some(snapshot) = session.store().snapshot() {
//!         if let Some(view) = ChainView::build(&snapshot, session.store().view_options()) {
//!             println!("{} rows around spot {}", view.rows.len(), view.stratification.spot);
//!         }
//!     }
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Strike stratification, hot-cell detection and the assembled chain view.
pub mod chain;

/// Gateway, poller and session configuration with environment overrides.
pub mod config;

/// Deserialisation helpers for loosely typed numeric payloads.
pub mod de;

/// All errors generated in `stockify-data`.
pub mod error;

pub mod expiry;

/// Remote backend contract ([`gateway::MarketGateway`]) and its HTTP implementation.
pub mod gateway;

pub mod history;

pub mod live;

/// Core identifiers: [`model::Strike`], [`model::Expiry`], [`model::OptionSide`].
pub mod model;

pub mod poller;

pub mod session;

/// Live snapshot payload: spot quote, option chain summary and futures expiries.
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::DataError;
pub use live::LiveSession;
pub use model::{Expiry, InstrumentSelection, OptionSide, Strike};
pub use session::SessionStore;
pub use snapshot::LiveSnapshot;
