//! Behaviour of the demo ESB services
//!
//! The XML and JSON ping services answer `PONG` to `PING` and reject anything
//! else with an `INVALID_REQUEST` fault. The proxies validate first and only
//! then call out to their targets. The canonicaliser is fire-and-forget.

use futures_util::future::join_all;
use harness::Router;
use serde_json::{Value, json};
use shared::{Address, Fault, Message, Payload, Reply};
use tracing::{debug, warn};

use super::EsbLayout;

pub const PING_NAMESPACE: &str = "urn:com:acme:integration:wsdl:pingservice";
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
pub const UPSTREAM_UNAVAILABLE: &str = "UPSTREAM_UNAVAILABLE";

pub const USERNAME_HEADER: &str = "x-username";
pub const PASSWORD_HEADER: &str = "x-password";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Ping,
    SecurePing,
    JsonPing,
    Proxy,
    MultiProxy,
    MultiProxyUnordered,
    Canonicaliser,
}

impl Service {
    /// Handle one inbound message; `None` means nothing to reply
    pub async fn handle(self, router: &dyn Router, layout: &EsbLayout, message: Message) -> Option<Reply> {
        match self {
            Service::Ping => Some(answer_ping(&message)),
            Service::SecurePing => Some(answer_secure_ping(&message, &layout.username, &layout.password)),
            Service::JsonPing => Some(answer_json_ping(&message)),
            Service::Proxy => Some(proxy(router, message, &layout.target_ws).await),
            Service::MultiProxy => Some(
                multi_proxy(
                    router,
                    message,
                    &[layout.target_ws.clone(), layout.another_target_ws.clone()],
                )
                .await,
            ),
            Service::MultiProxyUnordered => Some(
                multi_proxy_unordered(
                    router,
                    message,
                    &[layout.target_ws.clone(), layout.another_target_ws.clone()],
                )
                .await,
            ),
            Service::Canonicaliser => {
                canonicalise_and_forward(router, &message, &layout.output_queue).await;
                None
            }
        }
    }
}

pub fn ping_request(word: &str) -> Payload {
    Payload::xml(format!(
        r#"<ns:pingRequest xmlns:ns="{PING_NAMESPACE}"><request>{word}</request></ns:pingRequest>"#
    ))
}

pub fn ping_response(word: &str) -> Payload {
    Payload::xml(format!(
        r#"<ns:pingResponse xmlns:ns="{PING_NAMESPACE}"><response>{word}</response></ns:pingResponse>"#
    ))
}

fn invalid_request<S: Into<String>>(reason: S) -> Reply {
    Reply::Fault(
        Fault::new(500)
            .with_code(INVALID_REQUEST)
            .with_body(Payload::text(reason)),
    )
}

/// Text of the `<request>` child of a ping request, if the body is one
fn requested_word(body: &str) -> Option<String> {
    let document = roxmltree::Document::parse(body).ok()?;
    let root = document.root_element();
    if root.tag_name().name() != "pingRequest" || root.tag_name().namespace() != Some(PING_NAMESPACE) {
        return None;
    }
    root.children()
        .find(|node| node.is_element() && node.tag_name().name() == "request")
        .map(|node| node.text().unwrap_or_default().trim().to_string())
}

/// `None` when `message` is a valid PING request, otherwise the rejection
fn validate(message: &Message) -> Option<Reply> {
    match requested_word(message.body()).as_deref() {
        Some("PING") => None,
        Some(other) => Some(invalid_request(format!("expected PING, got {other:?}"))),
        None => Some(invalid_request("body is not a ping request")),
    }
}

pub fn answer_ping(message: &Message) -> Reply {
    validate(message).unwrap_or_else(|| Reply::success(ping_response("PONG")))
}

pub fn answer_secure_ping(message: &Message, username: &str, password: &str) -> Reply {
    let presented = (
        message.headers.get(USERNAME_HEADER),
        message.headers.get(PASSWORD_HEADER),
    );
    if presented != (Some(username), Some(password)) {
        return Reply::Fault(
            Fault::new(401)
                .with_code(UNAUTHORIZED)
                .with_body(Payload::text("missing or wrong credentials")),
        );
    }
    answer_ping(message)
}

pub fn answer_json_ping(message: &Message) -> Reply {
    let request: Value = match serde_json::from_str(message.body()) {
        Ok(value) => value,
        Err(e) => return invalid_request(format!("body is not JSON: {e}")),
    };
    match request.get("request").and_then(Value::as_str) {
        Some("PING") => Reply::success(Payload::json(json!({ "response": "PONG" }).to_string())),
        Some(other) => invalid_request(format!("expected PING, got {other:?}")),
        None => invalid_request("missing \"request\" field"),
    }
}

async fn forward(router: &dyn Router, target: &Address, message: Message) -> Reply {
    debug!("↪️ Forwarding to {}", target);
    match router.send(target, message).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Upstream {} unavailable: {}", target, e);
            Reply::Fault(
                Fault::new(502)
                    .with_code(UPSTREAM_UNAVAILABLE)
                    .with_body(Payload::text(e.to_string())),
            )
        }
    }
}

pub async fn proxy(router: &dyn Router, message: Message, target: &Address) -> Reply {
    if let Some(rejection) = validate(&message) {
        return rejection;
    }
    forward(router, target, message).await
}

/// Call each target in turn; the first fault stops the chain
pub async fn multi_proxy(router: &dyn Router, message: Message, targets: &[Address]) -> Reply {
    if let Some(rejection) = validate(&message) {
        return rejection;
    }

    let mut last = invalid_request("no targets configured");
    for target in targets {
        last = forward(router, target, message.clone()).await;
        if last.is_fault() {
            break;
        }
    }
    last
}

/// Call every target concurrently; any fault wins over the successes
pub async fn multi_proxy_unordered(router: &dyn Router, message: Message, targets: &[Address]) -> Reply {
    if let Some(rejection) = validate(&message) {
        return rejection;
    }

    let replies = join_all(targets.iter().map(|target| forward(router, target, message.clone()))).await;
    match replies.iter().find(|reply| reply.is_fault()) {
        Some(fault) => fault.clone(),
        None => replies
            .into_iter()
            .next_back()
            .unwrap_or_else(|| invalid_request("no targets configured")),
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Rewrite a `<SystemField>` document into its canonical `<CanonicalField>` form
pub fn canonicalise(body: &str) -> Result<Payload, String> {
    let document = roxmltree::Document::parse(body).map_err(|e| e.to_string())?;
    let root = document.root_element();
    if root.tag_name().name() != "SystemField" {
        return Err(format!("unexpected root element <{}>", root.tag_name().name()));
    }
    let value = root.text().unwrap_or_default();
    Ok(Payload::xml(format!("<CanonicalField>{}</CanonicalField>", escape_xml(value))))
}

async fn canonicalise_and_forward(router: &dyn Router, message: &Message, output: &Address) {
    let payload = match canonicalise(message.body()) {
        Ok(payload) => payload,
        Err(reason) => {
            warn!("🗑️ Dropping message that cannot be canonicalised: {}", reason);
            return;
        }
    };
    if let Err(e) = router.post(output, Message::new(payload)).await {
        warn!("Failed to deliver canonical message to {}: {}", output, e);
    }
}
