//! Session bootstrap and recovery
//!
//! Before any cart call the client needs credentials and a cached cart.
//! [`CartClient::ensure_ready`] establishes both with at most one bootstrap
//! in flight; concurrent callers share its result.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use reqwest::StatusCode;

use crate::api::{CartRequest, Endpoint};
use crate::client::{BootstrapTask, CartClient, Inner, Readiness};
use crate::domain::Cart;
use crate::error::{CartError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(PoisonError::into_inner) }

impl CartClient {
    /// Ensures a session exists. Idempotent and safe to call concurrently.
    pub async fn ensure_ready(&self) -> Result<()> { self.prepare().await.map(|_| ()) }

    /// Like [`ensure_ready`](Self::ensure_ready), but reports whether the
    /// cached cart was just fetched.
    pub(crate) async fn prepare(&self) -> Result<Readiness> {
        if self.inner.session.is_ready().await { return Ok(Readiness::Cached); }
        let task = {
            let mut slot = lock(&self.inner.in_flight);
            slot.get_or_insert_with(|| Inner::spawn_bootstrap(self.inner.clone())).clone()
        };
        task.await
    }
}

impl Inner {
    pub(crate) fn bootstrap_in_flight(&self) -> bool { lock(&self.in_flight).is_some() }

    fn spawn_bootstrap(inner: Arc<Inner>) -> BootstrapTask {
        async move {
            let result = inner.bootstrap().await;
            *lock(&inner.in_flight) = None;
            if let Err(e) = &result { tracing::warn!(error = %e, "Cart session bootstrap failed"); }
            result
        }
        .boxed()
        .shared()
    }

    async fn bootstrap(&self) -> Result<Readiness> {
        // A task that finished just before this one was created may already have done the work.
        if self.session.is_ready().await { return Ok(Readiness::Cached); }

        if self.session.credentials().await.cart_token.is_some() {
            tracing::debug!("Refreshing cart snapshot for existing session");
            let response = self.dispatch(&CartRequest::GetCart).await?;
            self.apply_cart(&response).await?;
            return Ok(Readiness::Refreshed);
        }

        tracing::info!("Establishing cart session");
        let response = self.send(&CartRequest::GetCart).await?;
        let not_found = response.status == StatusCode::NOT_FOUND;
        if !response.is_success() && !not_found {
            return Err(self.fail(Endpoint::Cart, &response).await);
        }
        self.reconciler.reconcile(&self.session, Endpoint::Cart, &response, None).await;

        let credentials = self.session.credentials().await;
        if !credentials.is_established() {
            tracing::warn!(status = response.status.as_u16(), "Store API issued neither a cart token nor a nonce");
            return Err(CartError::AuthenticationRequired);
        }

        if not_found {
            self.session.replace_snapshot(Cart::default()).await;
        } else {
            self.apply_cart(&response).await?;
        }
        tracing::info!(has_token = credentials.cart_token.is_some(), has_nonce = credentials.nonce.is_some(), "Cart session established");
        Ok(Readiness::Refreshed)
    }
}
