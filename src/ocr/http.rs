use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;

use crate::core::error::EngineError;

pub(crate) const USER_AGENT: &str = concat!("ocrverify/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client shared by the adapters. Each adapter owns one, so
/// every engine carries its own timeout. No retries happen here.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    provider: &'static str,
    timeout: Duration,
}

impl ProviderClient {
    pub fn new(provider: &'static str, timeout: Duration) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;
        Ok(Self {
            http,
            provider,
            timeout,
        })
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn post_json(&self, request: RequestBuilder, body: &Value) -> Result<Value, EngineError> {
        let response = request
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;
        self.read_json(response)
    }

    pub fn get_json(&self, request: RequestBuilder) -> Result<Value, EngineError> {
        let response = request.send().map_err(|e| self.transport_error(e))?;
        self.read_json(response)
    }

    fn read_json(&self, response: Response) -> Result<Value, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EngineError::Http {
                provider: self.provider,
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }
        response.json::<Value>().map_err(|e| {
            if e.is_timeout() {
                EngineError::Timeout(self.timeout)
            } else {
                EngineError::Parse(e.to_string())
            }
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> EngineError {
        if err.is_timeout() {
            EngineError::Timeout(self.timeout)
        } else {
            EngineError::Network(err.to_string())
        }
    }
}

/// Pulls `error.message` out of a provider error body, else the raw body.
pub(crate) fn provider_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
