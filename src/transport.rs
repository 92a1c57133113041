//! HTTP transport seam
//!
//! The coordinator only sees [`HttpRequest`] and [`HttpResponse`]; the
//! production implementation is backed by `reqwest`.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};

use crate::config::ClientConfig;
use crate::error::{CartError, Result};

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> { self.headers.get(name).and_then(|v| v.to_str().ok()) }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Header value, ignoring absent, non-UTF-8 and blank values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    pub fn is_success(&self) -> bool { self.status.is_success() }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request. Only transport failures are errors; any HTTP
    /// status is returned as a response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CartError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method, request.url).headers(request.headers);
        if let Some(body) = request.body { builder = builder.body(body); }
        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse { status, headers, body })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for coordinator tests.

    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

    pub struct ScriptedTransport {
        handler: Handler,
        delay: Option<Duration>,
        calls: AtomicUsize,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(handler: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self { handler: Box::new(handler), delay: None, calls: AtomicUsize::new(0), requests: Mutex::new(vec![]) })
        }

        pub fn with_delay(
            delay: Duration,
            handler: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self { handler: Box::new(handler), delay: Some(delay), calls: AtomicUsize::new(0), requests: Mutex::new(vec![]) })
        }

        pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

        pub fn requests(&self) -> Vec<HttpRequest> { self.requests.lock().unwrap().clone() }

        /// Paths relative to the test base URL, in call order.
        pub fn paths(&self) -> Vec<String> {
            self.requests().iter().map(|r| path_of(r).to_string()).collect()
        }
    }

    pub fn path_of(request: &HttpRequest) -> &str {
        request.url.path().trim_start_matches("/wp-json/wc/store/v1/")
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay { tokio::time::sleep(delay).await; }
            (self.handler)(&request)
        }
    }

    pub fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse { status: StatusCode::from_u16(status).unwrap(), headers: HeaderMap::new(), body: body.as_bytes().to_vec() }
    }

    pub fn json_response(status: u16, body: serde_json::Value) -> HttpResponse { response(status, &body.to_string()) }

    pub fn with_header(mut response: HttpResponse, name: &str, value: &str) -> HttpResponse {
        response.headers.insert(HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_str(value).unwrap());
        response
    }

    pub fn cart_json(items: &[(u64, u32)]) -> serde_json::Value {
        let items: Vec<_> = items
            .iter()
            .map(|(id, qty)| serde_json::json!({
                "key": format!("key-{id}"),
                "id": id,
                "quantity": qty,
                "name": format!("Product {id}"),
                "prices": {"price": "1000", "regular_price": "1000", "sale_price": "1000", "currency_code": "USD", "currency_minor_unit": 2},
                "totals": {"line_subtotal": "1000", "line_total": "1000", "currency_code": "USD", "currency_minor_unit": 2}
            }))
            .collect();
        serde_json::json!({
            "items": items,
            "totals": {"total_items": "1000", "total_price": "1000", "currency_code": "USD", "currency_minor_unit": 2},
            "items_count": items.len()
        })
    }
}
