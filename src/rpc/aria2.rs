//! aria2 JSON-RPC 2.0 over HTTP

use async_trait::async_trait;
use serde_json::{Value, json};
use url::Url;
use uuid::Uuid;

use super::EngineClient;
use crate::config::EngineConfig;
use crate::error::{Result, RpcError};

/// HTTP JSON-RPC client for an aria2 daemon
#[derive(Clone, Debug)]
pub struct Aria2Client {
    endpoint: Url,
    secret: Option<String>,
    http: reqwest::Client,
}

impl Aria2Client {
    /// Build a client from engine settings
    ///
    /// # Errors
    ///
    /// Invalid endpoint, or the HTTP client could not be constructed.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let endpoint = config.endpoint_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            endpoint,
            secret: config.secret.clone(),
            http,
        })
    }

    /// Endpoint requests are posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl EngineClient for Aria2Client {
    async fn call(&self, method: &str, mut params: Vec<Value>) -> Result<Value> {
        if let Some(secret) = &self.secret {
            params.insert(0, json!(format!("token:{secret}")));
        }
        let body = json!({
            "jsonrpc": "2.0",
            "id": Uuid::new_v4().to_string(),
            "method": method,
            "params": params,
        });

        tracing::trace!(method, endpoint = %self.endpoint, "engine call");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?;

        // aria2 answers faults with a 4xx status and a JSON-RPC error body,
        // so the body is read before looking at the status.
        let status = response.status();
        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(_) if !status.is_success() => return Err(RpcError::Http(status.as_u16()).into()),
            Err(e) => return Err(e.into()),
        };

        parse_reply(method, payload)
    }
}

fn parse_reply(method: &str, mut payload: Value) -> Result<Value> {
    if let Some(err) = payload.get("error") {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(RpcError::Fault { code, message }.into());
    }

    match payload.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(RpcError::InvalidResponse {
            method: method.to_string(),
            reason: "missing result".to_string(),
        }
        .into()),
    }
}
