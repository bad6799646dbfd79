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

//! Provider entry point: one configured API client per region, shared by
//! every resource.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::{MailgunApi, MailgunClient};
use crate::config::{ProviderConfig, Region};
use crate::error::ProviderError;
use crate::resources::{
    ApiKeyResource, DomainResource, DomainVerificationResource, Resource,
};

/// Resource type names served by this provider.
pub const RESOURCE_TYPES: [&str; 3] = [
    DomainResource::TYPE_NAME,
    ApiKeyResource::TYPE_NAME,
    DomainVerificationResource::TYPE_NAME,
];

#[derive(Clone)]
pub struct MailgunProvider {
    config: Arc<ProviderConfig>,
    clients: Arc<HashMap<Region, Arc<dyn MailgunApi>>>,
}

impl MailgunProvider {
    /// Builds an HTTP client for every region.
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let mut clients: HashMap<Region, Arc<dyn MailgunApi>> = HashMap::new();
        for region in [Region::Us, Region::Eu] {
            let api = config.api_base_for(region);
            debug!("Mailgun {} client uses {}", region, api);
            let client = MailgunClient::new(api, config.api_key.clone(), config.request_timeout)?;
            clients.insert(region, Arc::new(client));
        }

        info!("Mailgun provider configured, default region {}", config.region);
        Ok(Self::with_clients(config, clients))
    }

    /// Uses prebuilt clients, e.g. fakes in tests.
    pub fn with_clients(config: ProviderConfig, clients: HashMap<Region, Arc<dyn MailgunApi>>) -> Self {
        Self {
            config: Arc::new(config),
            clients: Arc::new(clients),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn client(&self, region: Region) -> Result<Arc<dyn MailgunApi>, ProviderError> {
        self.clients
            .get(&region)
            .cloned()
            .ok_or_else(|| ProviderError::Configuration(format!("no client configured for region {region}")))
    }

    /// Client for the provider's default region.
    pub fn default_client(&self) -> Result<Arc<dyn MailgunApi>, ProviderError> {
        self.client(self.config.region)
    }

    pub fn domains(&self) -> DomainResource {
        DomainResource::new(self.clone())
    }

    pub fn api_keys(&self) -> ApiKeyResource {
        ApiKeyResource::new(self.clone())
    }

    pub fn domain_verifications(&self) -> DomainVerificationResource {
        DomainVerificationResource::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::API_BASE_EU;

    fn config(params: &[(&str, &str)]) -> ProviderConfig {
        params
            .iter()
            .try_fold(ProviderConfig::builder(), |b, (k, v)| b.set_param(k, v))
            .and_then(|b| b.build())
            .unwrap()
    }

    #[test]
    fn test_resource_types() {
        assert_eq!(
            RESOURCE_TYPES,
            ["mailgun_domain", "mailgun_api_key", "mailgun_domain_verification"]
        );
    }

    #[test]
    fn test_clients_per_region() {
        let provider = MailgunProvider::new(config(&[("api_key", "key-test"), ("region", "eu")])).unwrap();

        assert_eq!(provider.config().region, Region::Eu);
        assert!(provider.client(Region::Us).is_ok());
        assert!(provider.default_client().is_ok());
        assert_eq!(provider.config().api_base_for(Region::Eu), API_BASE_EU);
    }

    #[test]
    fn test_missing_region_client() {
        let provider = MailgunProvider::with_clients(config(&[("api_key", "key-test")]), HashMap::new());

        let err = provider.client(Region::Eu).err().unwrap();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }
}
