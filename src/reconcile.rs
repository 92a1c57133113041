//! Token reconciliation
//!
//! Every cart response passes through [`TokenReconciler::reconcile`], which
//! keeps the session's cart token and nonce in step with what the Store API
//! sends back and clears them when the server rejects the session.

use std::sync::Arc;

use reqwest::StatusCode;

use crate::api::Endpoint;
use crate::session::SessionHolder;
use crate::store::{KeyValueStore, CART_TOKEN_KEY};
use crate::transport::HttpResponse;

// Lowercase: static header names must be lowercase for `http`. Lookups ignore case.
pub const CART_TOKEN_HEADER: &str = "cart-token";
pub const NONCE_HEADER: &str = "nonce";
pub const STORE_API_NONCE_HEADER: &str = "x-wc-store-api-nonce";

/// Error codes that mean the server no longer accepts our credentials.
pub const INVALIDATING_CODES: &[&str] = &[
    "woocommerce_rest_cart_token_invalid",
    "woocommerce_rest_invalid_nonce",
    "woocommerce_rest_missing_nonce",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    Current,
    Invalidated,
}

pub fn is_invalidating(status: StatusCode, code: Option<&str>) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
        || code.is_some_and(|c| INVALIDATING_CODES.contains(&c))
}

pub struct TokenReconciler {
    store: Arc<dyn KeyValueStore>,
}

impl TokenReconciler {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self { Self { store } }

    /// Token persisted by an earlier process, if any. Unreadable storage is treated as empty.
    pub fn restore_token(&self) -> Option<String> {
        match self.store.get(CART_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted cart token");
                None
            }
        }
    }

    pub async fn reconcile(
        &self,
        session: &SessionHolder,
        endpoint: Endpoint,
        response: &HttpResponse,
        error_code: Option<&str>,
    ) -> Reconciliation {
        if is_invalidating(response.status, error_code) {
            tracing::warn!(status = response.status.as_u16(), code = error_code, endpoint = endpoint.path(), "Cart session rejected by server");
            self.invalidate(session).await;
            return Reconciliation::Invalidated;
        }

        let nonce = response.header(NONCE_HEADER).or_else(|| response.header(STORE_API_NONCE_HEADER));
        let token = response.header(CART_TOKEN_HEADER);

        let (token_changed, had_token) = session
            .update_credentials(|creds| {
                if let Some(nonce) = nonce {
                    if creds.nonce.as_deref() != Some(nonce) { creds.nonce = Some(nonce.to_string()); }
                }
                let had_token = creds.cart_token.is_some();
                let changed = match token {
                    Some(token) if creds.cart_token.as_deref() != Some(token) => {
                        creds.cart_token = Some(token.to_string());
                        true
                    }
                    _ => false,
                };
                (changed, had_token)
            })
            .await;

        if let (true, Some(token)) = (token_changed, token) {
            tracing::debug!(endpoint = endpoint.path(), rotated = had_token, "Cart token updated");
            if let Err(e) = self.store.set(CART_TOKEN_KEY, token) {
                tracing::warn!(error = %e, "Could not persist cart token");
            }
        }

        if endpoint == Endpoint::Cart && token.is_none() && had_token {
            tracing::warn!(status = response.status.as_u16(), "Cart fetch returned no Cart-Token header while a token is held");
        }

        Reconciliation::Current
    }

    /// Drops both credentials and the persisted token.
    pub async fn invalidate(&self, session: &SessionHolder) {
        session
            .update_credentials(|creds| {
                creds.cart_token = None;
                creds.nonce = None;
            })
            .await;
        if let Err(e) = self.store.remove(CART_TOKEN_KEY) {
            tracing::warn!(error = %e, "Could not remove persisted cart token");
        }
    }
}
