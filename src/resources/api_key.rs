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

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::Resource;
use crate::error::ProviderError;
use crate::models::{ApiKey, CreateApiKeyOptions};
use crate::provider::MailgunProvider;

/// Every field forces a new key; Mailgun keys cannot be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeyConfig {
    pub role: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Lifetime in seconds; unset keys never expire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            role: String::new(),
            kind: "user".to_string(),
            description: None,
            domain_name: None,
            email: None,
            user_id: None,
            user_name: None,
            expires_at: None,
        }
    }
}

impl ApiKeyConfig {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            ..Default::default()
        }
    }

    fn create_options(&self) -> CreateApiKeyOptions {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        CreateApiKeyOptions {
            role: Some(self.role.clone()).filter(|r| !r.is_empty()),
            kind: Some(self.kind.clone()).filter(|k| !k.is_empty()),
            description: non_empty(&self.description),
            domain_name: non_empty(&self.domain_name),
            email: non_empty(&self.email),
            user_id: non_empty(&self.user_id),
            user_name: non_empty(&self.user_name),
            expiration: self.expires_at.filter(|e| *e > 0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyState {
    pub id: String,
    pub requestor: String,
    /// Only returned when the key is created.
    pub secret: String,
    pub is_disabled: bool,
    pub disabled_reason: String,
}

impl ApiKeyState {
    fn from_key(key: &ApiKey) -> Self {
        Self {
            id: key.id.clone(),
            requestor: key.requestor.clone(),
            secret: key.secret.clone(),
            is_disabled: key.is_disabled,
            disabled_reason: key.disabled_reason.clone(),
        }
    }

    /// Refreshes from a listed key, keeping the secret captured at creation.
    pub fn refreshed(&self, key: &ApiKey) -> Self {
        let mut next = Self::from_key(key);
        if next.secret.is_empty() {
            next.secret = self.secret.clone();
        }
        next
    }
}

#[derive(Clone)]
pub struct ApiKeyResource {
    provider: MailgunProvider,
}

impl ApiKeyResource {
    pub fn new(provider: MailgunProvider) -> Self {
        Self { provider }
    }

    async fn find(&self, id: &str) -> Result<Option<ApiKey>, ProviderError> {
        let client = self.provider.default_client()?;
        let key = client.list_api_keys().await?.into_iter().find(|key| key.id == id);
        if key.is_none() {
            debug!("API key not found with ID: {}", id);
        }
        Ok(key)
    }

    /// Like [`Resource::read`], but keeps the secret from `state`.
    pub async fn refresh(&self, state: &ApiKeyState) -> Result<Option<ApiKeyState>, ProviderError> {
        Ok(self.find(&state.id).await?.map(|key| state.refreshed(&key)))
    }
}

#[async_trait]
impl Resource for ApiKeyResource {
    type Config = ApiKeyConfig;
    type State = ApiKeyState;

    const TYPE_NAME: &'static str = "mailgun_api_key";

    async fn create(
        &self,
        config: &ApiKeyConfig,
        _cancel: &CancellationToken,
    ) -> Result<ApiKeyState, ProviderError> {
        let client = self.provider.default_client()?;
        let key = client.create_api_key(&config.create_options()).await?;

        info!("API key ID: {}", key.id);
        Ok(ApiKeyState::from_key(&key))
    }

    async fn read(&self, id: &str, _config: &ApiKeyConfig) -> Result<Option<ApiKeyState>, ProviderError> {
        match self.find(id).await? {
            Some(key) => Ok(Some(ApiKeyState::from_key(&key))),
            None => {
                warn!("API key {} no longer exists, removing from state", id);
                Ok(None)
            }
        }
    }

    async fn delete(
        &self,
        id: &str,
        _config: &ApiKeyConfig,
        _cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        info!("Deleting API key: {}", id);
        let client = self.provider.default_client()?;
        client.delete_api_key(id).await
    }
}
