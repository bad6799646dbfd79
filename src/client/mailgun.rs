// Copyright 2023 mailgun-provider authors
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use mailgun_provider_macros::form_params;
use reqwest::{Method, Url};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::MailgunApi;
use crate::error::ProviderError;
use crate::models::{
    ApiKey, ApiKeyListResponse, ApiKeyResponse, CreateApiKeyOptions, CreateDomainOptions,
    DomainSnapshot, DomainTracking, TrackingResponse, UpdateDomainOptions,
};
use crate::utils::request::{DefaultHttpTransport, HttpTransport};

pub struct MailgunClient<T: HttpTransport = DefaultHttpTransport> {
    /// HTTP transport for making requests
    http_client: T,
    /// API host, e.g. `https://api.mailgun.net`
    api: String,
    /// Private API key
    api_key: String,
}

impl MailgunClient<DefaultHttpTransport> {
    pub fn new(api: impl Into<String>, api_key: impl Into<String>, request_timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self::with_transport(
            DefaultHttpTransport::new(request_timeout)?,
            api,
            api_key,
        ))
    }
}

impl<T: HttpTransport> MailgunClient<T> {
    pub fn with_transport(http_client: T, api: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api: api.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api
    }

    /// Joins `segments` onto the API host, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.api)
            .map_err(|e| ProviderError::Configuration(format!("invalid api_base {:?}: {e}", self.api)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Configuration(format!("api_base {:?} cannot carry a path", self.api)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, segments: &[&str], body: Option<String>) -> Result<Value, ProviderError> {
        let url = self.endpoint(segments)?;
        let headers = build_headers(&self.api_key)?;
        self.http_client.request(method, url.to_string(), headers, body).await
    }

    async fn send_form<B: Serialize>(&self, method: Method, segments: &[&str], form: &B) -> Result<Value, ProviderError> {
        let body = serde_urlencoded::to_string(form)?;
        self.send(method, segments, Some(body)).await
    }
}

#[async_trait]
impl<T: HttpTransport> MailgunApi for MailgunClient<T> {
    async fn get_domain(&self, domain: &str) -> Result<DomainSnapshot, ProviderError> {
        let response = self.send(Method::GET, &["v4", "domains", domain], None).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn create_domain(&self, options: &CreateDomainOptions) -> Result<DomainSnapshot, ProviderError> {
        let form = form_params!(options, CreateDomainForm, {
            required name: String => "name",
            optional spam_action: String => "spam_action",
            optional smtp_password: String => "smtp_password",
            optional wildcard: bool => "wildcard",
            optional force_dkim_authority: bool => "force_dkim_authority",
            optional dkim_key_size: u32 => "dkim_key_size",
            optional web_scheme: String => "web_scheme"
        });
        debug!("Creating domain {}", form.name);

        let response = self.send_form(Method::POST, &["v4", "domains"], &form).await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn update_domain(&self, domain: &str, options: &UpdateDomainOptions) -> Result<(), ProviderError> {
        let form = form_params!(options, UpdateDomainForm, {
            optional web_scheme: String => "web_scheme",
            optional use_automatic_sender_security: bool => "use_automatic_sender_security"
        });

        self.send_form(Method::PUT, &["v4", "domains", domain], &form).await?;
        Ok(())
    }

    async fn delete_domain(&self, domain: &str) -> Result<(), ProviderError> {
        self.send(Method::DELETE, &["v3", "domains", domain], None).await?;
        Ok(())
    }

    async fn verify_domain(&self, domain: &str) -> Result<DomainSnapshot, ProviderError> {
        let response = self
            .send(Method::PUT, &["v4", "domains", domain, "verify"], None)
            .await?;
        Ok(serde_json::from_value(response)?)
    }

    async fn get_domain_tracking(&self, domain: &str) -> Result<DomainTracking, ProviderError> {
        let response = self
            .send(Method::GET, &["v3", "domains", domain, "tracking"], None)
            .await?;
        let parsed: TrackingResponse = serde_json::from_value(response)?;
        Ok(parsed.tracking)
    }

    async fn update_open_tracking(&self, domain: &str, active: bool) -> Result<(), ProviderError> {
        self.send_form(
            Method::PUT,
            &["v3", "domains", domain, "tracking", "open"],
            &[("active", yes_no(active))],
        )
        .await?;
        Ok(())
    }

    async fn update_click_tracking(&self, domain: &str, active: bool) -> Result<(), ProviderError> {
        self.send_form(
            Method::PUT,
            &["v3", "domains", domain, "tracking", "click"],
            &[("active", yes_no(active))],
        )
        .await?;
        Ok(())
    }

    async fn update_dkim_selector(&self, domain: &str, selector: &str) -> Result<(), ProviderError> {
        self.send_form(
            Method::PUT,
            &["v3", "domains", domain, "dkim_selector"],
            &[("dkim_selector", selector)],
        )
        .await?;
        Ok(())
    }

    async fn change_credential_password(
        &self,
        domain: &str,
        login: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        self.send_form(
            Method::PUT,
            &["v3", "domains", domain, "credentials", login],
            &[("password", password)],
        )
        .await?;
        Ok(())
    }

    async fn create_api_key(&self, options: &CreateApiKeyOptions) -> Result<ApiKey, ProviderError> {
        let form = form_params!(options, CreateApiKeyForm, {
            required role: String => "role",
            optional kind: String => "kind",
            optional description: String => "description",
            optional domain_name: String => "domain_name",
            optional email: String => "email",
            optional user_id: String => "user_id",
            optional user_name: String => "user_name",
            optional expiration: u64 => "expiration"
        });

        let response = self.send_form(Method::POST, &["v1", "keys"], &form).await?;
        let parsed: ApiKeyResponse = serde_json::from_value(response)?;
        Ok(parsed.key)
    }

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ProviderError> {
        let response = self.send(Method::GET, &["v1", "keys"], None).await?;
        let parsed: ApiKeyListResponse = serde_json::from_value(response)?;
        Ok(parsed.items)
    }

    async fn delete_api_key(&self, id: &str) -> Result<(), ProviderError> {
        self.send(Method::DELETE, &["v1", "keys", id], None).await?;
        Ok(())
    }
}

fn yes_no(active: bool) -> &'static str {
    if active { "yes" } else { "no" }
}

fn build_headers(api_key: &str) -> Result<HeaderMap, ProviderError> {
    let credentials = STANDARD.encode(format!("api:{api_key}"));
    let mut authorization = HeaderValue::from_str(&format!("Basic {credentials}"))
        .map_err(|e| ProviderError::Configuration(format!("invalid api_key: {e}")))?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );
    Ok(headers)
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_mock_client(mock_server: &MockServer) -> MailgunClient {
        MailgunClient::new(mock_server.uri(), "key-test", Duration::from_secs(5)).unwrap()
    }

    fn basic_auth() -> String {
        format!("Basic {}", STANDARD.encode("api:key-test"))
    }

    #[tokio::test]
    async fn test_get_domain() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/domains/example.com"))
            .and(header("Authorization", basic_auth().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "domain": {"name": "example.com", "state": "active", "smtp_login": "postmaster@example.com"},
                "receiving_dns_records": [
                    {"priority": "10", "record_type": "MX", "valid": "valid", "value": "mxa.mailgun.org"}
                ],
                "sending_dns_records": [
                    {"record_type": "TXT", "valid": "Valid", "name": "example.com", "value": "v=spf1 include:mailgun.org ~all"}
                ]
            })))
            .mount(&mock_server)
            .await;

        let snapshot = create_mock_client(&mock_server).get_domain("example.com").await.unwrap();
        assert_eq!(snapshot.domain.state, "active");
        assert!(snapshot.records_are_valid());
    }

    #[tokio::test]
    async fn test_get_missing_domain_is_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v4/domains/missing.com"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"message": "Domain not found"})),
            )
            .mount(&mock_server)
            .await;

        let err = create_mock_client(&mock_server)
            .get_domain("missing.com")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_tracking_round() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v3/domains/example.com/tracking"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tracking": {
                    "open": {"active": true},
                    "click": {"active": false},
                    "unsubscribe": {"active": false, "html_footer": "", "text_footer": ""}
                }
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/v3/domains/example.com/tracking/click"))
            .and(body_string("active=yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "ok"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server);
        let tracking = client.get_domain_tracking("example.com").await.unwrap();
        assert!(tracking.open.active);
        assert!(!tracking.click.active);

        client.update_click_tracking("example.com", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_and_delete_api_keys() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/keys"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_count": 2,
                "items": [
                    {"id": "a", "role": "admin", "requestor": "ops@example.com"},
                    {"id": "b", "role": "sending", "is_disabled": true, "disabled_reason": "rotated"}
                ]
            })))
            .mount(&mock_server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/v1/keys/b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"message": "deleted"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_mock_client(&mock_server);
        let keys = client.list_api_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys[1].is_disabled);
        assert_eq!(keys[1].disabled_reason, "rotated");

        client.delete_api_key("b").await.unwrap();
    }
}
