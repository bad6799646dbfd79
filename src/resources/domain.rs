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

//! `mailgun_domain`: a sending domain with its SMTP credential and tracking settings.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Resource, replacement_fields};
use crate::client::MailgunApi;
use crate::config::Region;
use crate::error::ProviderError;
use crate::models::{CreateDomainOptions, DomainSnapshot, UpdateDomainOptions};
use crate::poller::{PollConfig, PollError, poll};
use crate::provider::MailgunProvider;
use crate::utils::serde_utils::is_empty_str;

const DELETE_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DELETE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

pub const VERIFICATION_TRIGGERED: &str = "verification_triggered";
pub const VERIFICATION_FAILED: &str = "verification_failed";

/// Receiving (MX) hosts Mailgun assigns to every domain.
pub const RECEIVING_HOSTS: [&str; 2] = ["mxa.mailgun.org", "mxb.mailgun.org"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub name: String,
    pub region: Region,
    pub spam_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smtp_password: Option<String>,
    pub wildcard: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dkim_selector: Option<String>,
    pub force_dkim_authority: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dkim_key_size: Option<u32>,
    pub open_tracking: bool,
    pub click_tracking: bool,
    pub web_scheme: String,
    pub use_automatic_sender_security: bool,
    pub trigger_verification: bool,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            region: Region::Us,
            spam_action: "disabled".to_string(),
            smtp_password: None,
            wildcard: false,
            dkim_selector: None,
            force_dkim_authority: false,
            dkim_key_size: None,
            open_tracking: false,
            click_tracking: false,
            web_scheme: "http".to_string(),
            use_automatic_sender_security: true,
            trigger_verification: false,
        }
    }
}

impl DomainConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Fields that changed between `prior` and `self` and force a new domain.
    pub fn replacement_changes(&self, prior: &DomainConfig) -> Vec<String> {
        replacement_fields([
            ("name", self.name != prior.name),
            ("region", self.region != prior.region),
            ("spam_action", self.spam_action != prior.spam_action),
            ("wildcard", self.wildcard != prior.wildcard),
            ("dkim_selector", self.dkim_selector != prior.dkim_selector),
            ("force_dkim_authority", self.force_dkim_authority != prior.force_dkim_authority),
            ("dkim_key_size", self.dkim_key_size != prior.dkim_key_size),
        ])
    }

    fn create_options(&self) -> CreateDomainOptions {
        CreateDomainOptions {
            name: Some(self.name.clone()),
            spam_action: Some(self.spam_action.clone()).filter(|s| !s.is_empty()),
            smtp_password: self.smtp_password.clone().filter(|p| !p.is_empty()),
            wildcard: Some(self.wildcard),
            force_dkim_authority: Some(self.force_dkim_authority),
            dkim_key_size: self.dkim_key_size.filter(|size| *size > 0),
            web_scheme: Some(self.web_scheme.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// Record ids a new domain is expected to end up with, known before it exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRecordIds {
    pub sending: Vec<String>,
    pub receiving: Vec<String>,
}

pub fn planned_record_ids(name: &str) -> PlannedRecordIds {
    PlannedRecordIds {
        sending: vec![
            name.to_string(),
            format!("_domainkey.{name}"),
            format!("email.{name}"),
        ],
        receiving: RECEIVING_HOSTS.iter().map(|h| h.to_string()).collect(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceivingRecord {
    /// Stable identity: the MX host.
    pub id: String,
    pub priority: String,
    pub record_type: String,
    pub valid: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendingRecord {
    /// Stable identity: the record name, with DKIM selectors collapsed to
    /// `_domainkey.<domain>` so a rotated selector keeps the same id.
    pub id: String,
    pub name: String,
    pub record_type: String,
    pub valid: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainState {
    pub id: String,
    pub name: String,
    pub region: Region,
    pub smtp_login: String,
    pub spam_action: String,
    pub wildcard: bool,
    pub web_scheme: String,
    pub open_tracking: bool,
    pub click_tracking: bool,
    /// Only reported by the operation that triggered verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<String>,
    #[serde(default, skip_serializing_if = "is_empty_str")]
    pub state: String,
    pub receiving_records: Vec<ReceivingRecord>,
    pub sending_records: Vec<SendingRecord>,
}

impl DomainState {
    fn from_snapshot(snapshot: &DomainSnapshot, region: Region) -> Self {
        let domain = &snapshot.domain;
        let dkim_id = format!("_domainkey.{}", domain.name);

        let receiving_records = snapshot
            .receiving_dns_records
            .iter()
            .map(|r| ReceivingRecord {
                id: r.value.clone(),
                priority: r.priority.clone(),
                record_type: r.record_type.clone(),
                valid: r.valid.clone(),
                value: r.value.clone(),
            })
            .collect();

        let sending_records = snapshot
            .sending_dns_records
            .iter()
            .map(|r| SendingRecord {
                id: if r.name.contains("._domainkey.") {
                    dkim_id.clone()
                } else {
                    r.name.clone()
                },
                name: r.name.clone(),
                record_type: r.record_type.clone(),
                valid: r.valid.clone(),
                value: r.value.clone(),
            })
            .collect();

        DomainState {
            id: domain.name.clone(),
            name: domain.name.clone(),
            region,
            smtp_login: domain.smtp_login.clone(),
            spam_action: domain.spam_action.clone(),
            wildcard: domain.wildcard,
            web_scheme: domain.web_scheme.clone(),
            open_tracking: false,
            click_tracking: false,
            verification_status: None,
            state: domain.state.clone(),
            receiving_records,
            sending_records,
        }
    }
}

#[derive(Clone)]
pub struct DomainResource {
    provider: MailgunProvider,
}

impl DomainResource {
    pub fn new(provider: MailgunProvider) -> Self {
        Self { provider }
    }

    /// Adopts an existing domain. Imported domains are assumed to live in the US region.
    pub async fn import(&self, id: &str) -> Result<(DomainConfig, DomainState), ProviderError> {
        let client = self.provider.client(Region::Us)?;
        let state = retrieve(client.as_ref(), id, Region::Us).await?;

        let config = DomainConfig {
            name: state.name.clone(),
            region: Region::Us,
            spam_action: state.spam_action.clone(),
            wildcard: state.wildcard,
            web_scheme: state.web_scheme.clone(),
            open_tracking: state.open_tracking,
            click_tracking: state.click_tracking,
            ..Default::default()
        };
        Ok((config, state))
    }
}

#[async_trait]
impl Resource for DomainResource {
    type Config = DomainConfig;
    type State = DomainState;

    const TYPE_NAME: &'static str = "mailgun_domain";

    async fn create(
        &self,
        config: &DomainConfig,
        _cancel: &CancellationToken,
    ) -> Result<DomainState, ProviderError> {
        let client = self.provider.client(config.region)?;
        let api = client.as_ref();
        let name = config.name.as_str();

        info!("Creating domain {} in region {}", name, config.region);
        api.create_domain(&config.create_options()).await?;

        if let Some(selector) = config.dkim_selector.as_deref().filter(|s| !s.is_empty()) {
            api.update_dkim_selector(name, selector).await?;
        }
        if config.open_tracking {
            api.update_open_tracking(name, true).await?;
        }
        if config.click_tracking {
            api.update_click_tracking(name, true).await?;
        }
        if config.use_automatic_sender_security {
            enable_automatic_sender_security(api, name).await;
        }

        let mut state = retrieve(api, name, config.region).await?;

        if config.trigger_verification {
            state.verification_status = trigger_verification(api, name).await;
        }

        info!("Domain ID: {}", state.id);
        Ok(state)
    }

    async fn read(&self, id: &str, config: &DomainConfig) -> Result<Option<DomainState>, ProviderError> {
        let client = self.provider.client(config.region)?;
        match retrieve(client.as_ref(), id, config.region).await {
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_not_found() => {
                warn!("Domain {} no longer exists, removing from state", id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    async fn update(
        &self,
        prior: &DomainConfig,
        state: &DomainState,
        config: &DomainConfig,
    ) -> Result<DomainState, ProviderError> {
        let replaced = config.replacement_changes(prior);
        if !replaced.is_empty() {
            return Err(ProviderError::RequiresReplacement(replaced.join(", ")));
        }

        let client = self.provider.client(config.region)?;
        let api = client.as_ref();
        let name = state.id.as_str();

        let current = retrieve(api, name, config.region).await?;

        if prior.smtp_password != config.smtp_password {
            if let Some(password) = config.smtp_password.as_deref().filter(|p| !p.is_empty()) {
                info!("Changing SMTP password for {}", current.smtp_login);
                api.change_credential_password(name, &current.smtp_login, password)
                    .await?;
            }
        }
        if current.open_tracking != config.open_tracking {
            api.update_open_tracking(name, config.open_tracking).await?;
        }
        if current.click_tracking != config.click_tracking {
            api.update_click_tracking(name, config.click_tracking).await?;
        }
        if current.web_scheme != config.web_scheme {
            let options = UpdateDomainOptions {
                web_scheme: Some(config.web_scheme.clone()),
                ..Default::default()
            };
            api.update_domain(name, &options).await?;
        }
        if config.use_automatic_sender_security && !prior.use_automatic_sender_security {
            enable_automatic_sender_security(api, name).await;
        }

        let verification_status = if config.trigger_verification && !prior.trigger_verification {
            trigger_verification(api, name)
                .await
                .or_else(|| state.verification_status.clone())
        } else {
            state.verification_status.clone()
        };

        let mut updated = retrieve(api, name, config.region).await?;
        updated.verification_status = verification_status;
        Ok(updated)
    }

    async fn delete(
        &self,
        id: &str,
        config: &DomainConfig,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        let client = self.provider.client(config.region)?;
        let api = client.as_ref();

        info!("Deleting Domain: {}", id);
        api.delete_domain(id).await?;

        // Deletion is eventually consistent; wait until reads stop finding it.
        let poll_config = PollConfig::new(DELETE_POLL_INTERVAL, DELETE_TIMEOUT)?;
        let gone = poll(
            || async move {
                match api.get_domain(id).await {
                    Ok(_) => {
                        info!("Retrying until domain disappears...");
                        Ok(false)
                    }
                    Err(err) => {
                        info!("Got error looking for domain, seems gone: {}", err);
                        Ok(true)
                    }
                }
            },
            |gone: &bool| *gone,
            &poll_config,
            cancel,
        )
        .await;

        match gone {
            Ok(_) => Ok(()),
            Err(PollError::Timeout { elapsed, .. }) => Err(ProviderError::Timeout(format!(
                "domain {id} still exists {elapsed:?} after deletion"
            ))),
            Err(PollError::Fetch(err)) => Err(err),
            Err(PollError::Cancelled) => Err(ProviderError::Cancelled),
        }
    }
}

/// Reads the domain and its tracking settings into resource state.
async fn retrieve(api: &dyn MailgunApi, id: &str, region: Region) -> Result<DomainState, ProviderError> {
    let snapshot = api.get_domain(id).await?;
    let tracking = api.get_domain_tracking(id).await?;

    let mut state = DomainState::from_snapshot(&snapshot, region);
    state.open_tracking = tracking.open.active;
    state.click_tracking = tracking.click.active;
    Ok(state)
}

async fn enable_automatic_sender_security(api: &dyn MailgunApi, name: &str) {
    let options = UpdateDomainOptions {
        use_automatic_sender_security: Some(true),
        ..Default::default()
    };
    match api.update_domain(name, &options).await {
        Ok(()) => info!("Automatic sender security enabled for domain: {}", name),
        Err(err) => warn!("Failed to set automatic sender security: {}", err),
    }
}

/// Asks Mailgun to re-check DNS. Any 2xx answer counts as triggered, even
/// with a body that does not decode; any other status is `verification_failed`.
/// Transport failures leave the status unknown.
async fn trigger_verification(api: &dyn MailgunApi, name: &str) -> Option<String> {
    match api.verify_domain(name).await {
        Ok(_) => {
            info!("Domain verification triggered for: {}", name);
            Some(VERIFICATION_TRIGGERED.to_string())
        }
        Err(ProviderError::Serialization(err)) => {
            debug!("Verification response for {} not decoded: {}", name, err);
            info!("Domain verification triggered for: {}", name);
            Some(VERIFICATION_TRIGGERED.to_string())
        }
        Err(ProviderError::Api { status, message }) => {
            warn!("Domain verification returned status {}: {}", status, message);
            Some(VERIFICATION_FAILED.to_string())
        }
        Err(ProviderError::NotFound(message)) => {
            warn!("Domain verification returned status 404: {}", message);
            Some(VERIFICATION_FAILED.to_string())
        }
        Err(err) => {
            warn!("Failed to trigger verification: {}", err);
            None
        }
    }
}
