//! HTTP routing collaborator
//!
//! Dispatch goes out through reqwest. Bindings share one axum listener per
//! socket address and are routed by request path; unbound paths answer 404
//! and a handler that drops its reply channel answers 202 Accepted.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use shared::{Address, ContentType, Fault, Headers, Message, Payload, Reply};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{HarnessError, HarnessResult};
use crate::traits::{Binding, InboundCall, Router};

/// Carries `Fault::code` across HTTP
pub const FAULT_CODE_HEADER: &str = "x-fault-code";

const CHANNEL_CAPACITY: usize = 64;

type PathRoutes = Arc<RwLock<HashMap<String, mpsc::Sender<InboundCall>>>>;

struct Listener {
    routes: PathRoutes,
    server_handle: JoinHandle<()>,
}

pub struct HttpRouter {
    client: reqwest::Client,
    listeners: Mutex<HashMap<(String, u16), Listener>>,
}

impl HttpRouter {
    pub fn new(timeout: Duration) -> HarnessResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::transport("http client", e.to_string()))?;
        Ok(Self {
            client,
            listeners: Mutex::new(HashMap::new()),
        })
    }

    fn socket_of(address: &Address) -> HarnessResult<(String, u16)> {
        address
            .host_port()
            .ok_or_else(|| HarnessError::transport(address, "not an HTTP address"))
    }

    async fn post_message(&self, address: &Address, message: Message) -> HarnessResult<reqwest::Response> {
        let mut request = self
            .client
            .post(address.as_str())
            .header(reqwest::header::CONTENT_TYPE, message.payload.content_type.mime());
        for (key, value) in message.headers.iter().filter(|(key, _)| !is_transport_header(key)) {
            request = request.header(key, value);
        }

        request
            .body(message.payload.body)
            .send()
            .await
            .map_err(|e| HarnessError::transport(address, e.to_string()))
    }

    /// Stop every listener
    pub async fn shutdown(&self) {
        let mut listeners = self.listeners.lock().await;
        for ((host, port), listener) in listeners.drain() {
            listener.server_handle.abort();
            debug!("🛑 HTTP listener {}:{} stopped", host, port);
        }
    }
}

impl Drop for HttpRouter {
    fn drop(&mut self) {
        for listener in self.listeners.get_mut().values() {
            listener.server_handle.abort();
        }
    }
}

#[async_trait]
impl Router for HttpRouter {
    async fn send(&self, address: &Address, message: Message) -> HarnessResult<Reply> {
        let response = self.post_message(address, message).await?;
        let status = response.status();

        let content_type = ContentType::from_mime(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default(),
        );
        let mut headers = Headers::new();
        for (key, value) in response.headers() {
            if let (false, Ok(value)) = (is_transport_header(key.as_str()), value.to_str()) {
                headers.insert(key.as_str(), value);
            }
        }
        let body = response
            .text()
            .await
            .map_err(|e| HarnessError::transport(address, e.to_string()))?;
        let payload = Payload::new(content_type, body);

        if status.is_success() {
            return Ok(Reply::Success(Message::with_headers(payload, headers)));
        }

        let mut fault = Fault::new(status.as_u16());
        if let Some(code) = headers.get(FAULT_CODE_HEADER) {
            fault = fault.with_code(code);
        }
        if !payload.is_empty() {
            fault = fault.with_body(payload);
        }
        Ok(Reply::Fault(fault))
    }

    async fn post(&self, address: &Address, message: Message) -> HarnessResult<()> {
        let response = self.post_message(address, message).await?;
        if !response.status().is_success() {
            return Err(HarnessError::transport(
                address,
                format!("message rejected with status {}", response.status()),
            ));
        }
        Ok(())
    }

    async fn bind(&self, address: &Address) -> HarnessResult<Binding> {
        let socket = Self::socket_of(address)?;
        let mut listeners = self.listeners.lock().await;

        if !listeners.contains_key(&socket) {
            let routes: PathRoutes = Arc::new(RwLock::new(HashMap::new()));
            let app = axum::Router::new().fallback(handle_inbound).with_state(routes.clone());

            let listener = TcpListener::bind(format!("{}:{}", socket.0, socket.1))
                .await
                .map_err(|e| HarnessError::transport(address, e.to_string()))?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| HarnessError::transport(address, e.to_string()))?;

            let server_handle = tokio::spawn(async move {
                info!("📡 Mock HTTP listener on {}", local_addr);
                if let Err(e) = axum::serve(listener, app).await {
                    error!("Mock HTTP listener error: {}", e);
                }
            });
            listeners.insert(socket.clone(), Listener { routes, server_handle });
        }

        let Some(listener) = listeners.get(&socket) else {
            return Err(HarnessError::transport(address, "listener vanished while binding"));
        };
        let mut routes = listener.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if routes.get(address.path()).is_some_and(|sender| !sender.is_closed()) {
            return Err(HarnessError::transport(address, "path is already bound"));
        }

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        routes.insert(address.path().to_string(), tx);
        Ok(Binding {
            address: address.clone(),
            inbound: rx,
        })
    }

    async fn unbind(&self, address: &Address) -> HarnessResult<()> {
        let socket = Self::socket_of(address)?;
        let mut listeners = self.listeners.lock().await;

        // Idle listeners stay up until shutdown so the port can be rebound at once
        if let Some(listener) = listeners.get(&socket) {
            let mut routes = listener.routes.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            if routes.remove(address.path()).is_some() {
                debug!("🔌 Released {} on {}:{}", address.path(), socket.0, socket.1);
            }
        }
        Ok(())
    }
}

async fn handle_inbound(
    State(routes): State<PathRoutes>,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    let sender = routes
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&path)
        .cloned();
    let Some(sender) = sender else {
        return (StatusCode::NOT_FOUND, format!("nothing bound at {path}")).into_response();
    };

    let content_type = ContentType::from_mime(
        headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default(),
    );
    let mut message_headers = Headers::new();
    for (key, value) in &headers {
        if let (false, Ok(value)) = (is_transport_header(key.as_str()), value.to_str()) {
            message_headers.insert(key.as_str(), value);
        }
    }
    let message = Message::with_headers(Payload::new(content_type, body), message_headers);

    let (reply_tx, reply_rx) = oneshot::channel();
    if sender.send(InboundCall::request(message, reply_tx)).await.is_err() {
        return (StatusCode::NOT_FOUND, format!("nothing bound at {path}")).into_response();
    }

    match reply_rx.await {
        Ok(reply) => reply_response(reply),
        Err(_) => StatusCode::ACCEPTED.into_response(),
    }
}

fn reply_response(reply: Reply) -> Response {
    let (status, mut headers, payload) = match reply {
        Reply::Success(message) => (StatusCode::OK, to_header_map(&message.headers), message.payload),
        Reply::Fault(fault) => {
            let status = StatusCode::from_u16(fault.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut headers = HeaderMap::new();
            if let Some(code) = fault.code.as_deref().and_then(|c| HeaderValue::from_str(c).ok()) {
                headers.insert(FAULT_CODE_HEADER, code);
            }
            (status, headers, fault.body.unwrap_or_default())
        }
    };

    if let Ok(mime) = HeaderValue::from_str(payload.content_type.mime()) {
        headers.insert(axum::http::header::CONTENT_TYPE, mime);
    }
    (status, headers, payload.body).into_response()
}

/// Headers owned by the HTTP connection rather than the message
fn is_transport_header(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "host"
            | "connection"
            | "content-length"
            | "content-type"
            | "transfer-encoding"
            | "accept"
            | "accept-encoding"
            | "date"
    )
}

fn to_header_map(headers: &Headers) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers.iter().filter(|(key, _)| !is_transport_header(key)) {
        if let (Ok(name), Ok(value)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
            map.insert(name, value);
        }
    }
    map
}
