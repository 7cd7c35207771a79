//! Expiry resolver: fetches the expiry list whenever the symbol (or the polling switch) changes
//! and selects the nearest expiry when none is selected yet.

use crate::{
    error::DataError,
    gateway::MarketGateway,
    model::Expiry,
    session::{Selection, SessionStore},
};
use futures::{FutureExt, future::BoxFuture};
use smol_str::SmolStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

type ResolveOutput = (SmolStr, Result<Vec<Expiry>, DataError>);

/// Resolves with the pending request's output, never if nothing is pending.
async fn settle(pending: &mut Option<BoxFuture<'static, ResolveOutput>>) -> ResolveOutput {
    match pending {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

/// Resolves the expiry list for the selected symbol into the [`SessionStore`].
#[derive(Debug)]
pub struct ExpiryResolver<Gateway> {
    gateway: Arc<Gateway>,
    store: SessionStore,
}

impl<Gateway> ExpiryResolver<Gateway>
where
    Gateway: MarketGateway + 'static,
{
    pub fn new(gateway: Arc<Gateway>, store: SessionStore) -> Self {
        Self { gateway, store }
    }

    /// Resolve the expiry list for the current selection once.
    ///
    /// Returns `Ok(None)` without a request when polling is disabled or no symbol is selected.
    pub async fn resolve(&self) -> Result<Option<Vec<Expiry>>, DataError> {
        let selection = self.store.selection();
        let Some(request) = self.request(&selection) else {
            return Ok(None);
        };

        let (symbol, result) = request.await;
        let expiries = result?;
        self.store.apply_expiries(&symbol, expiries.clone());
        Ok(Some(expiries))
    }

    /// Spawn a task re-resolving expiries whenever the symbol or polling switch changes.
    ///
    /// A pending request is dropped when its symbol is superseded.
    pub fn spawn(self) -> ResolverHandle {
        ResolverHandle {
            task: tokio::spawn(self.run()),
        }
    }

    async fn run(self) {
        let mut selections = self.store.subscribe();

        let initial = selections.borrow_and_update().clone();
        let mut key = Self::key(&initial);
        let mut pending = self.request(&initial);

        loop {
            tokio::select! {
                biased;

                changed = selections.changed() => {
                    if changed.is_err() {
                        debug!("session store dropped, stopping expiry resolver");
                        break;
                    }

                    let selection = selections.borrow_and_update().clone();
                    let next = Self::key(&selection);
                    if next != key {
                        key = next;
                        pending = self.request(&selection);
                    }
                }

                (symbol, result) = settle(&mut pending) => {
                    pending = None;
                    match result {
                        Ok(expiries) => {
                            info!(%symbol, count = expiries.len(), "expiries resolved");
                            self.store.apply_expiries(&symbol, expiries);
                        }
                        Err(error) => {
                            warn!(%symbol, %error, "failed to resolve expiries");
                        }
                    }
                }
            }
        }
    }

    fn key(selection: &Selection) -> (SmolStr, bool) {
        (selection.symbol.clone(), selection.polling_enabled)
    }

    fn request(&self, selection: &Selection) -> Option<BoxFuture<'static, ResolveOutput>> {
        if !selection.polling_enabled || selection.symbol.is_empty() {
            debug!(symbol = %selection.symbol, "expiry resolution skipped");
            return None;
        }

        let gateway = Arc::clone(&self.gateway);
        let symbol = selection.symbol.clone();
        let expiry = selection.expiry;

        Some(
            async move {
                let result = gateway.expiries(&symbol, expiry).await;
                (symbol, result)
            }
            .boxed(),
        )
    }
}

/// Handle to a running [`ExpiryResolver`]. Dropping the handle cancels the resolver.
#[derive(Debug)]
pub struct ResolverHandle {
    task: JoinHandle<()>,
}

impl ResolverHandle {
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
