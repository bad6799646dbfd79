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

//! `mailgun_domain_verification`: triggers DNS verification of a domain and
//! optionally waits until Mailgun reports every record as valid.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::Resource;
use crate::config::Region;
use crate::error::ProviderError;
use crate::models::{DnsRecord, DomainSnapshot};
use crate::poller::{DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, PollConfig, VerificationPoller};
use crate::provider::MailgunProvider;
use crate::utils::duration::{format_duration, parse_duration_with_default};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainVerificationConfig {
    pub domain: String,
    pub region: Region,
    /// Wait until all DNS records are reported as valid before completing.
    pub wait_for_active: bool,
    /// Polling interval used while waiting, e.g. `"15s"`.
    pub poll_interval: String,
    /// Maximum time to wait for every record to become valid, e.g. `"10m"`.
    pub timeout: String,
}

impl Default for DomainVerificationConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            region: Region::Us,
            wait_for_active: true,
            poll_interval: format_duration(DEFAULT_POLL_INTERVAL),
            timeout: format_duration(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl DomainVerificationConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Default::default()
        }
    }

    /// Parses `poll_interval` and `timeout`; empty strings take the defaults.
    pub fn poll_config(&self) -> Result<PollConfig, ProviderError> {
        let timeout = parse_duration_with_default(&self.timeout, DEFAULT_POLL_TIMEOUT)?;
        let interval = parse_duration_with_default(&self.poll_interval, DEFAULT_POLL_INTERVAL)?;
        PollConfig::new(interval, timeout)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub name: String,
    pub record_type: String,
    pub value: String,
    pub priority: String,
    pub valid: String,
    pub is_active: bool,
    pub cached: Vec<String>,
}

impl From<&DnsRecord> for VerificationRecord {
    fn from(record: &DnsRecord) -> Self {
        Self {
            name: record.name.clone(),
            record_type: record.record_type.clone(),
            value: record.value.clone(),
            priority: record.priority.clone(),
            valid: record.valid.clone(),
            is_active: record.is_active,
            cached: record.cached.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainVerificationState {
    pub id: String,
    pub domain: String,
    pub region: Region,
    pub status: String,
    pub receiving_records: Vec<VerificationRecord>,
    pub sending_records: Vec<VerificationRecord>,
}

impl DomainVerificationState {
    fn from_snapshot(snapshot: &DomainSnapshot, region: Region) -> Self {
        Self {
            id: snapshot.domain.name.clone(),
            domain: snapshot.domain.name.clone(),
            region,
            status: snapshot.domain.state.clone(),
            receiving_records: snapshot.receiving_dns_records.iter().map(Into::into).collect(),
            sending_records: snapshot.sending_dns_records.iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone)]
pub struct DomainVerificationResource {
    provider: MailgunProvider,
}

impl DomainVerificationResource {
    pub fn new(provider: MailgunProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Resource for DomainVerificationResource {
    type Config = DomainVerificationConfig;
    type State = DomainVerificationState;

    const TYPE_NAME: &'static str = "mailgun_domain_verification";

    async fn create(
        &self,
        config: &DomainVerificationConfig,
        cancel: &CancellationToken,
    ) -> Result<DomainVerificationState, ProviderError> {
        // Bad durations fail before anything is sent.
        let poll_config = if config.wait_for_active {
            Some(config.poll_config()?)
        } else {
            None
        };

        let client = self.provider.client(config.region)?;
        let domain = config.domain.as_str();

        info!("Triggering verification for domain {}", domain);
        client.verify_domain(domain).await?;

        let snapshot = match poll_config {
            Some(poll_config) => {
                let snapshot = VerificationPoller::new(poll_config)
                    .wait(client.as_ref(), domain, cancel)
                    .await
                    .map_err(|err| err.into_provider_error(domain))?;
                info!("All DNS records of {} are valid", domain);
                snapshot
            }
            // The verify answer can predate the re-check; read the domain back.
            None => client.get_domain(domain).await?,
        };

        let mut state = DomainVerificationState::from_snapshot(&snapshot, config.region);
        state.id = domain.to_string();
        Ok(state)
    }

    async fn read(
        &self,
        id: &str,
        config: &DomainVerificationConfig,
    ) -> Result<Option<DomainVerificationState>, ProviderError> {
        let client = self.provider.client(config.region)?;
        match client.get_domain(id).await {
            Ok(snapshot) => {
                let mut state = DomainVerificationState::from_snapshot(&snapshot, config.region);
                state.id = id.to_string();
                Ok(Some(state))
            }
            Err(err) if err.is_not_found() => {
                warn!("Domain {} not found, removing verification from state", id);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Verification has no remote object of its own; dropping it from state is enough.
    async fn delete(
        &self,
        _id: &str,
        _config: &DomainVerificationConfig,
        _cancel: &CancellationToken,
    ) -> Result<(), ProviderError> {
        Ok(())
    }
}
