use std::time::Duration;

use reqwest::{Client, Method, StatusCode, header::HeaderMap};
use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;

/// Sends one request to the Mailgun API and yields the decoded JSON body.
///
/// Non-2xx answers become [`ProviderError::Api`], except 404 which is
/// [`ProviderError::NotFound`] so callers can tell "gone" from "broken".
pub trait HttpTransport: Send + Sync {
    fn request(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<String>,
    ) -> impl Future<Output = Result<Value, ProviderError>> + Send;
}

pub struct DefaultHttpTransport {
    inner: Client,
}

impl DefaultHttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, ProviderError> {
        let inner = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("mailgun-provider/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { inner })
    }
}

impl HttpTransport for DefaultHttpTransport {
    async fn request(
        &self,
        method: Method,
        url: String,
        headers: HeaderMap,
        body: Option<String>,
    ) -> Result<Value, ProviderError> {
        debug!("{} {}", method, url);

        let mut req = self.inner.request(method, url.as_str()).headers(headers);
        if let Some(body) = body {
            req = req.body(body);
        }
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(error_message(&text, &url)));
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: error_message(&text, status.as_str()),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Mailgun wraps errors as `{"message": "..."}`; fall back to the raw body.
fn error_message(body: &str, fallback: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));

    match from_json {
        Some(message) => message,
        None if body.trim().is_empty() => fallback.to_string(),
        None => body.trim().to_string(),
    }
}
