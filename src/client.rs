//! Request dispatcher
//!
//! [`CartClient`] is the context object handed to callers. It attaches the
//! session credentials to each Store API call, routes every response through
//! the token reconciler and keeps the cached cart in step with the server.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use serde::Deserialize;

use crate::api::{AddItem, CartRequest, CouponCode, CustomerUpdate, Endpoint, RemoveItem, SelectShippingRate, UpdateItem, VariationAttribute};
use crate::config::ClientConfig;
use crate::domain::{Cart, ShippingPackage};
use crate::error::{CartError, Result};
use crate::reconcile::{Reconciliation, TokenReconciler, CART_TOKEN_HEADER, STORE_API_NONCE_HEADER};
use crate::session::{Credentials, SessionHolder, SessionPhase};
use crate::store::KeyValueStore;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

pub(crate) type BootstrapTask = Shared<BoxFuture<'static, Result<Readiness>>>;

/// Outcome of making sure a session exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Session was already usable; nothing was fetched.
    Cached,
    /// A bootstrap just replaced the cached cart from the server.
    Refreshed,
}

/// Error body returned by the Store API on failure.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Clone)]
pub struct CartClient {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    base_url: Url,
    transport: Arc<dyn Transport>,
    pub(crate) session: SessionHolder,
    pub(crate) reconciler: TokenReconciler,
    pub(crate) in_flight: Mutex<Option<BootstrapTask>>,
}

impl CartClient {
    pub fn new(config: &ClientConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config)?);
        Ok(Self::with_transport(config.base_url.clone(), transport, store))
    }

    /// Builds a client over any transport. A token persisted in `store` is restored.
    pub fn with_transport(base_url: Url, transport: Arc<dyn Transport>, store: Arc<dyn KeyValueStore>) -> Self {
        let reconciler = TokenReconciler::new(store);
        let restored = reconciler.restore_token();
        if restored.is_some() { tracing::debug!("Restored persisted cart token"); }
        Self {
            inner: Arc::new(Inner {
                base_url,
                transport,
                session: SessionHolder::new(restored),
                reconciler,
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Dispatches `request` and returns the cart the server answered with.
    pub async fn perform(&self, request: &CartRequest) -> Result<Cart> {
        let readiness = self.prepare().await?;
        if readiness == Readiness::Refreshed && *request == CartRequest::GetCart {
            if let Some(cart) = self.inner.session.snapshot().await { return Ok(cart); }
        }
        let response = self.inner.dispatch(request).await?;
        self.inner.apply_cart(&response).await
    }

    /// Dispatches `request` and returns the body unparsed. The cached cart is not touched.
    pub async fn perform_raw(&self, request: &CartRequest) -> Result<Vec<u8>> {
        self.ensure_ready().await?;
        let response = self.inner.dispatch(request).await?;
        Ok(response.body)
    }

    pub async fn get_cart(&self) -> Result<Cart> { self.perform(&CartRequest::GetCart).await }

    pub async fn add_item(&self, product_id: u64, quantity: u32) -> Result<Cart> {
        self.add_variation(product_id, quantity, vec![]).await
    }

    pub async fn add_variation(&self, product_id: u64, quantity: u32, variation: Vec<VariationAttribute>) -> Result<Cart> {
        if quantity == 0 { return Err(CartError::InvalidRequest("quantity must be at least 1".into())); }
        self.perform(&CartRequest::AddItem(AddItem { id: product_id, quantity, variation })).await
    }

    /// Sets an item's quantity; zero or less removes it.
    pub async fn update_item_quantity(&self, key: &str, quantity: i64) -> Result<Cart> {
        if quantity <= 0 { return self.remove_item(key).await; }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::InvalidRequest(format!("quantity {quantity} out of range")))?;
        self.perform(&CartRequest::UpdateItem(UpdateItem { key: key.to_string(), quantity })).await
    }

    pub async fn remove_item(&self, key: &str) -> Result<Cart> {
        self.perform(&CartRequest::RemoveItem(RemoveItem { key: key.to_string() })).await
    }

    pub async fn clear_cart(&self) -> Result<Cart> { self.perform(&CartRequest::ClearItems).await }

    pub async fn update_customer(&self, update: CustomerUpdate) -> Result<Cart> {
        update.validate()?;
        self.perform(&CartRequest::UpdateCustomer(update)).await
    }

    pub async fn list_shipping_rates(&self) -> Result<Vec<ShippingPackage>> {
        let body = self.perform_raw(&CartRequest::ShippingRates).await?;
        if body.is_empty() { return Err(CartError::NoData); }
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn select_shipping_rate(&self, package_id: u64, rate_id: &str) -> Result<Cart> {
        let payload = SelectShippingRate { package_id, rate_id: rate_id.to_string() };
        self.perform(&CartRequest::SelectShippingRate(payload)).await
    }

    pub async fn apply_coupon(&self, code: &str) -> Result<Cart> {
        self.perform(&CartRequest::ApplyCoupon(CouponCode { code: code.to_string() })).await
    }

    pub async fn remove_coupon(&self, code: &str) -> Result<Cart> {
        self.perform(&CartRequest::RemoveCoupon(CouponCode { code: code.to_string() })).await
    }

    pub async fn cached_cart(&self) -> Option<Cart> { self.inner.session.snapshot().await }

    pub async fn credentials(&self) -> Credentials { self.inner.session.credentials().await }

    /// When the cached cart was last replaced from a server response.
    pub async fn refreshed_at(&self) -> Option<DateTime<Utc>> { self.inner.session.refreshed_at().await }

    pub async fn phase(&self) -> SessionPhase {
        if self.inner.bootstrap_in_flight() { return SessionPhase::Bootstrapping; }
        if self.inner.session.is_ready().await { SessionPhase::Ready } else { SessionPhase::Unbootstrapped }
    }

    /// Forgets the session locally; the next call bootstraps a fresh one.
    pub async fn reset_session(&self) {
        self.inner.reconciler.invalidate(&self.inner.session).await;
        self.inner.session.clear_snapshot().await;
        tracing::info!("Cart session reset");
    }
}

impl Inner {
    fn headers(&self, credentials: &Credentials, has_body: bool) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if has_body { headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json")); }
        let invalid = |name: &str| CartError::InvalidRequest(format!("{name} is not a valid header value"));
        if let Some(token) = &credentials.cart_token {
            headers.insert(CART_TOKEN_HEADER, HeaderValue::from_str(token).map_err(|_| invalid(CART_TOKEN_HEADER))?);
        }
        if let Some(nonce) = &credentials.nonce {
            headers.insert(STORE_API_NONCE_HEADER, HeaderValue::from_str(nonce).map_err(|_| invalid(STORE_API_NONCE_HEADER))?);
        }
        Ok(headers)
    }

    /// Sends `request` with the current credentials. No status handling.
    pub(crate) async fn send(&self, request: &CartRequest) -> Result<HttpResponse> {
        let endpoint = request.endpoint();
        let url = self.base_url.join(endpoint.path()).map_err(|e| CartError::InvalidUrl(e.to_string()))?;
        let body = request.body()?;
        let credentials = self.session.credentials().await;
        let headers = self.headers(&credentials, body.is_some())?;
        let method = request.method();
        tracing::debug!(%method, endpoint = endpoint.path(), has_token = credentials.cart_token.is_some(), "Store API request");
        let response = self.transport.send(HttpRequest { method, url, headers, body }).await?;
        tracing::debug!(status = response.status.as_u16(), endpoint = endpoint.path(), bytes = response.body.len(), "Store API response");
        Ok(response)
    }

    /// Sends `request`, reconciles the response headers and turns non-2xx
    /// statuses into errors.
    pub(crate) async fn dispatch(&self, request: &CartRequest) -> Result<HttpResponse> {
        let response = self.send(request).await?;
        let endpoint = request.endpoint();
        if !response.is_success() { return Err(self.fail(endpoint, &response).await); }
        self.reconciler.reconcile(&self.session, endpoint, &response, None).await;
        Ok(response)
    }

    pub(crate) async fn fail(&self, endpoint: Endpoint, response: &HttpResponse) -> CartError {
        let body: ApiErrorBody = serde_json::from_slice(&response.body).unwrap_or_default();
        match self.reconciler.reconcile(&self.session, endpoint, response, body.code.as_deref()).await {
            Reconciliation::Invalidated => CartError::AuthenticationRequired,
            Reconciliation::Current => {
                tracing::warn!(status = response.status.as_u16(), code = body.code.as_deref(), endpoint = endpoint.path(), "Store API call failed");
                CartError::Server { status: response.status.as_u16(), message: body.message, code: body.code }
            }
        }
    }

    /// Replaces the cached cart with the one in a successful response. An
    /// empty body means the cart is empty, whatever the 2xx status.
    pub(crate) async fn apply_cart(&self, response: &HttpResponse) -> Result<Cart> {
        let cart = if response.body.iter().all(u8::is_ascii_whitespace) {
            Cart::default()
        } else {
            serde_json::from_slice(&response.body).map_err(|e| {
                tracing::error!(error = %e, status = response.status.as_u16(), "Cart response did not decode");
                CartError::Decoding(e.to_string())
            })?
        };
        self.session.replace_snapshot(cart.clone()).await;
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Address;
    use crate::store::{MemoryStore, CART_TOKEN_KEY};
    use crate::transport::testing::*;
    use serde_json::json;

    const BASE: &str = "https://shop.example.com/wp-json/wc/store/v1/";

    fn client(transport: Arc<ScriptedTransport>, store: Arc<MemoryStore>) -> CartClient {
        CartClient::with_transport(Url::parse(BASE).unwrap(), transport, store)
    }

    fn store_with_token(token: &str) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.set(CART_TOKEN_KEY, token).unwrap();
        store
    }

    fn body_of(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_add_item_bootstraps_first() {
        let transport = ScriptedTransport::new(|req| {
            let r = match path_of(req) {
                "cart" => with_header(json_response(200, cart_json(&[])), CART_TOKEN_HEADER, "tok-1"),
                "cart/add-item" => {
                    assert_eq!(req.header(CART_TOKEN_HEADER), Some("tok-1"));
                    assert_eq!(req.header(STORE_API_NONCE_HEADER), Some("nonce-1"));
                    json_response(201, cart_json(&[(42, 1)]))
                }
                other => panic!("unexpected path {other}"),
            };
            Ok(with_header(r, "Nonce", "nonce-1"))
        });
        let store = Arc::new(MemoryStore::new());
        let client = client(transport.clone(), store.clone());
        assert_eq!(client.phase().await, SessionPhase::Unbootstrapped);

        let cart = client.add_item(42, 1).await.unwrap();

        assert_eq!(transport.paths(), vec!["cart", "cart/add-item"]);
        assert_eq!(body_of(&transport.requests()[1]), json!({"id": 42, "quantity": 1}));
        assert_eq!(cart.item_for_product(42).unwrap().quantity, 1);
        assert_eq!(client.cached_cart().await, Some(cart));
        assert_eq!(client.credentials().await.cart_token.as_deref(), Some("tok-1"));
        assert_eq!(store.get(CART_TOKEN_KEY).unwrap().as_deref(), Some("tok-1"));
        assert_eq!(client.phase().await, SessionPhase::Ready);
        assert!(client.refreshed_at().await.is_some());
    }

    #[tokio::test]
    async fn test_invalid_token_clears_session() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => with_header(json_response(200, cart_json(&[(1, 1)])), "Nonce", "n"),
                _ => json_response(403, json!({"code": "woocommerce_rest_cart_token_invalid", "message": "Invalid cart token", "data": {"status": 403}})),
            })
        });
        let store = store_with_token("stale");
        let client = client(transport.clone(), store.clone());

        let err = client.add_item(7, 1).await.unwrap_err();

        assert_eq!(err, CartError::AuthenticationRequired);
        assert_eq!(client.credentials().await, Credentials::default());
        assert_eq!(store.get(CART_TOKEN_KEY).unwrap(), None);
        // The snapshot from the successful fetch is kept; only credentials go.
        assert_eq!(client.cached_cart().await.unwrap().quantity(), 1);
        assert_eq!(client.phase().await, SessionPhase::Unbootstrapped);
    }

    #[tokio::test]
    async fn test_server_error_carries_code_and_keeps_snapshot() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(1, 2)])),
                _ => json_response(400, json!({"code": "woocommerce_rest_cart_invalid_product", "message": "This product cannot be added to the cart."})),
            })
        });
        let client = client(transport, store_with_token("tok"));

        let err = client.add_item(99, 1).await.unwrap_err();

        assert_eq!(err, CartError::Server {
            status: 400,
            message: Some("This product cannot be added to the cart.".into()),
            code: Some("woocommerce_rest_cart_invalid_product".into()),
        });
        assert_eq!(client.credentials().await.cart_token.as_deref(), Some("tok"));
        assert_eq!(client.cached_cart().await.unwrap().quantity(), 2);
    }

    #[tokio::test]
    async fn test_server_error_without_json_body() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[])),
                _ => response(502, "<html>Bad Gateway</html>"),
            })
        });
        let client = client(transport, store_with_token("tok"));
        let err = client.clear_cart().await.unwrap_err();
        assert_eq!(err, CartError::Server { status: 502, message: None, code: None });
    }

    #[tokio::test]
    async fn test_empty_success_body_empties_snapshot() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 3)])),
                "cart/items" => response(204, ""),
                other => panic!("unexpected path {other}"),
            })
        });
        let client = client(transport.clone(), store_with_token("tok"));
        client.get_cart().await.unwrap();
        assert_eq!(client.cached_cart().await.unwrap().quantity(), 3);

        let cart = client.clear_cart().await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(client.cached_cart().await, Some(Cart::default()));
        assert_eq!(transport.requests().last().unwrap().method, reqwest::Method::DELETE);
    }

    #[tokio::test]
    async fn test_empty_created_body_empties_snapshot() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 3)])),
                "cart/remove-item" => response(201, ""),
                other => panic!("unexpected path {other}"),
            })
        });
        let client = client(transport, store_with_token("tok"));
        client.get_cart().await.unwrap();

        let cart = client.remove_item("key-5").await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(client.cached_cart().await, Some(Cart::default()));
    }

    #[tokio::test]
    async fn test_decode_failure_keeps_snapshot_but_applies_headers() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 1)])),
                _ => with_header(response(200, "{\"unexpected\": true}"), CART_TOKEN_HEADER, "rotated"),
            })
        });
        let client = client(transport, store_with_token("tok"));
        client.get_cart().await.unwrap();
        let before = client.cached_cart().await;

        let err = client.update_item_quantity("key-5", 4).await.unwrap_err();

        assert!(matches!(err, CartError::Decoding(_)));
        assert_eq!(client.cached_cart().await, before);
        assert_eq!(client.credentials().await.cart_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn test_non_positive_quantity_removes_item() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 1)])),
                "cart/remove-item" => json_response(200, cart_json(&[])),
                other => panic!("unexpected path {other}"),
            })
        });
        let client = client(transport.clone(), store_with_token("tok"));
        let cart = client.update_item_quantity("key-5", 0).await.unwrap();
        assert!(cart.is_empty());
        client.update_item_quantity("key-5", -3).await.unwrap();
        let requests = transport.requests();
        assert_eq!(transport.paths(), vec!["cart", "cart/remove-item", "cart/remove-item"]);
        assert_eq!(body_of(&requests[1]), json!({"key": "key-5"}));
    }

    #[tokio::test]
    async fn test_update_item_sends_quantity() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 1)])),
                _ => json_response(200, cart_json(&[(5, 4)])),
            })
        });
        let client = client(transport.clone(), store_with_token("tok"));
        let cart = client.update_item_quantity("key-5", 4).await.unwrap();
        assert_eq!(cart.item("key-5").unwrap().quantity, 4);
        assert_eq!(body_of(&transport.requests()[1]), json!({"key": "key-5", "quantity": 4}));
    }

    #[tokio::test]
    async fn test_shipping_rates_are_raw() {
        let rates = json!([{"package_id": 0, "name": "Shipment 1", "shipping_rates": [
            {"rate_id": "flat_rate:1", "name": "Flat rate", "price": "500", "selected": true, "currency_code": "USD", "currency_minor_unit": 2}
        ]}]);
        let transport = ScriptedTransport::new(move |req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[(5, 1)])),
                "cart/shipping-rates" => json_response(200, rates.clone()),
                "cart/select-shipping-rate" => json_response(200, cart_json(&[(5, 1)])),
                other => panic!("unexpected path {other}"),
            })
        });
        let client = client(transport.clone(), store_with_token("tok"));
        let before = client.get_cart().await.unwrap();

        let packages = client.list_shipping_rates().await.unwrap();
        assert_eq!(packages[0].selected_rate().unwrap().price().unwrap().to_string(), "5.00 USD");
        assert_eq!(client.cached_cart().await, Some(before));

        client.select_shipping_rate(0, "flat_rate:1").await.unwrap();
        assert_eq!(body_of(&transport.requests()[2]), json!({"package_id": 0, "rate_id": "flat_rate:1"}));
    }

    #[tokio::test]
    async fn test_empty_shipping_rates_is_no_data() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart" => json_response(200, cart_json(&[])),
                _ => response(200, ""),
            })
        });
        let client = client(transport, store_with_token("tok"));
        assert_eq!(client.list_shipping_rates().await.unwrap_err(), CartError::NoData);
    }

    #[tokio::test]
    async fn test_update_customer_validates_before_sending() {
        let transport = ScriptedTransport::new(|_| Ok(json_response(200, cart_json(&[]))));
        let client = client(transport.clone(), store_with_token("tok"));
        let update = CustomerUpdate {
            billing_address: Some(Address { email: Some("broken".into()), ..Default::default() }),
            shipping_address: None,
        };
        assert!(matches!(client.update_customer(update).await, Err(CartError::InvalidRequest(_))));
        assert_eq!(transport.calls(), 0);

        let update = CustomerUpdate {
            billing_address: Some(Address { email: Some("ada@example.com".into()), country: "GB".into(), ..Default::default() }),
            shipping_address: None,
        };
        client.update_customer(update).await.unwrap();
        let last = transport.requests().pop().unwrap();
        assert_eq!(path_of(&last), "cart/update-customer");
        assert_eq!(last.header("content-type"), Some("application/json"));
        assert_eq!(body_of(&last)["billing_address"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn test_coupons() {
        let transport = ScriptedTransport::new(|req| {
            Ok(match path_of(req) {
                "cart/apply-coupon" => {
                    let mut cart = cart_json(&[(5, 1)]);
                    cart["coupons"] = json!([{"code": "summer"}]);
                    json_response(200, cart)
                }
                _ => json_response(200, cart_json(&[(5, 1)])),
            })
        });
        let client = client(transport.clone(), store_with_token("tok"));
        assert!(client.apply_coupon("summer").await.unwrap().has_coupon("summer"));
        assert!(!client.remove_coupon("summer").await.unwrap().has_coupon("summer"));
        assert_eq!(body_of(&transport.requests()[2]), json!({"code": "summer"}));
    }

    #[tokio::test]
    async fn test_network_error_surfaces() {
        let transport = ScriptedTransport::new(|_| Err(CartError::Network("connection refused".into())));
        let client = client(transport, store_with_token("tok"));
        assert_eq!(client.get_cart().await.unwrap_err(), CartError::Network("connection refused".into()));
        assert_eq!(client.credentials().await.cart_token.as_deref(), Some("tok"));
    }

    #[tokio::test]
    async fn test_add_zero_quantity_rejected() {
        let transport = ScriptedTransport::new(|_| Ok(json_response(200, cart_json(&[]))));
        let client = client(transport.clone(), store_with_token("tok"));
        assert!(matches!(client.add_item(1, 0).await, Err(CartError::InvalidRequest(_))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_reset_session() {
        let transport = ScriptedTransport::new(|_| Ok(json_response(200, cart_json(&[]))));
        let store = store_with_token("tok");
        let client = client(transport, store.clone());
        client.get_cart().await.unwrap();
        client.reset_session().await;
        assert_eq!(client.credentials().await, Credentials::default());
        assert_eq!(client.cached_cart().await, None);
        assert_eq!(store.get(CART_TOKEN_KEY).unwrap(), None);
    }
}
