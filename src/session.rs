//! Session state: credentials plus the last cart snapshot

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::Cart;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Credentials {
    pub cart_token: Option<String>,
    pub nonce: Option<String>,
}

impl Credentials {
    /// At least one credential is known.
    pub fn is_established(&self) -> bool { self.cart_token.is_some() || self.nonce.is_some() }
}

/// Where a logical session is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Unbootstrapped,
    Bootstrapping,
    Ready,
}

#[derive(Debug, Default)]
struct SessionState {
    credentials: Credentials,
    snapshot: Option<Cart>,
    refreshed_at: Option<DateTime<Utc>>,
}

/// Single authority for credentials and the cached cart. Readers get copies.
#[derive(Debug, Default)]
pub struct SessionHolder {
    state: RwLock<SessionState>,
}

impl SessionHolder {
    pub fn new(cart_token: Option<String>) -> Self {
        let credentials = Credentials { cart_token, nonce: None };
        Self { state: RwLock::new(SessionState { credentials, ..Default::default() }) }
    }

    pub async fn credentials(&self) -> Credentials { self.state.read().await.credentials.clone() }

    pub async fn snapshot(&self) -> Option<Cart> { self.state.read().await.snapshot.clone() }

    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> { self.state.read().await.refreshed_at }

    pub async fn is_ready(&self) -> bool {
        let state = self.state.read().await;
        state.credentials.is_established() && state.snapshot.is_some()
    }

    /// Applies `f` to the credentials under the write lock.
    pub(crate) async fn update_credentials<R>(&self, f: impl FnOnce(&mut Credentials) -> R) -> R {
        f(&mut self.state.write().await.credentials)
    }

    pub(crate) async fn replace_snapshot(&self, cart: Cart) {
        let mut state = self.state.write().await;
        state.snapshot = Some(cart);
        state.refreshed_at = Some(Utc::now());
    }

    pub(crate) async fn clear_snapshot(&self) {
        let mut state = self.state.write().await;
        state.snapshot = None;
        state.refreshed_at = None;
    }
}
