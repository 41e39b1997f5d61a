// HTTP client for the bonus server API

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

/// Thin blocking client over the `/api/v1` endpoints.
pub struct BonusClient {
    base_url: String,
    agent: ureq::Agent,
}

impl BonusClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(std::time::Duration::from_secs(10))
                .build(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn customer_url(&self, customer_key: &str, suffix: &str) -> String {
        self.url(&format!("/customers/{}{}", encode_segment(customer_key), suffix))
    }

    pub fn register(&self, customer_key: &str) -> Result<Value> {
        send(
            self.agent.post(&self.url("/customers")),
            Some(json!({ "customerKey": customer_key })),
        )
    }

    pub fn customer(&self, customer_key: &str) -> Result<Value> {
        send(self.agent.get(&self.customer_url(customer_key, "")), None)
    }

    pub fn deactivate(&self, customer_key: &str) -> Result<Value> {
        send(
            self.agent
                .post(&self.customer_url(customer_key, "/deactivate")),
            Some(json!({})),
        )
    }

    pub fn ledger(&self, customer_key: &str) -> Result<Value> {
        send(
            self.agent.get(&self.customer_url(customer_key, "/ledger")),
            None,
        )
    }

    pub fn verify_ledger(&self, customer_key: &str) -> Result<Value> {
        send(
            self.agent
                .get(&self.customer_url(customer_key, "/ledger/verify")),
            None,
        )
    }

    pub fn balance(&self, customer_key: &str) -> Result<Value> {
        send(
            self.agent
                .get(&self.url("/orders/balance"))
                .query("customerKey", customer_key),
            None,
        )
    }

    pub fn orders(&self, customer_key: &str, limit: Option<i64>) -> Result<Value> {
        let mut request = self
            .agent
            .get(&self.url("/orders"))
            .query("customerKey", customer_key);
        if let Some(limit) = limit {
            request = request.query("limit", &limit.to_string());
        }
        send(request, None)
    }

    pub fn place_order(&self, customer_key: &str, line_items: Value, spend: i64) -> Result<Value> {
        send(
            self.agent.post(&self.url("/orders")),
            Some(json!({
                "customerKey": customer_key,
                "lineItems": line_items,
                "bonusToSpend": spend,
            })),
        )
    }
}

/// Sends a request and decodes the JSON response, turning the server's
/// `{error, message}` body into a readable error.
fn send(request: ureq::Request, body: Option<Value>) -> Result<Value> {
    let result = match body {
        Some(body) => request.send_json(body),
        None => request.call(),
    };

    match result {
        Ok(response) => response
            .into_json()
            .map_err(|e| anyhow!("Invalid response from server: {}", e)),
        Err(ureq::Error::Status(code, response)) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            Err(anyhow!(describe_error(code, &body)))
        }
        Err(ureq::Error::Transport(e)) => Err(anyhow!("Failed to reach bonus server: {}", e)),
    }
}

/// Formats an API error body as `Kind (status): message`.
fn describe_error(code: u16, body: &Value) -> String {
    let kind = body["error"].as_str().unwrap_or("Error");
    match body["message"].as_str() {
        Some(message) => format!("{} ({}): {}", kind, code, message),
        None => format!("{} ({})", kind, code),
    }
}

/// Percent-encodes a path segment, leaving RFC 3986 unreserved characters.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
