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

//! Typed access to the Mailgun REST API.

mod mailgun;

pub use mailgun::MailgunClient;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{
    ApiKey, CreateApiKeyOptions, CreateDomainOptions, DomainSnapshot, DomainTracking,
    UpdateDomainOptions,
};

/// Operations the resources need from Mailgun.
#[async_trait]
pub trait MailgunApi: Send + Sync {
    /// Reads a domain with its receiving and sending DNS records.
    async fn get_domain(&self, domain: &str) -> Result<DomainSnapshot, ProviderError>;

    async fn create_domain(&self, options: &CreateDomainOptions) -> Result<DomainSnapshot, ProviderError>;

    async fn update_domain(&self, domain: &str, options: &UpdateDomainOptions) -> Result<(), ProviderError>;

    async fn delete_domain(&self, domain: &str) -> Result<(), ProviderError>;

    /// Asks Mailgun to re-check the domain's DNS records and returns the fresh snapshot.
    async fn verify_domain(&self, domain: &str) -> Result<DomainSnapshot, ProviderError>;

    async fn get_domain_tracking(&self, domain: &str) -> Result<DomainTracking, ProviderError>;

    async fn update_open_tracking(&self, domain: &str, active: bool) -> Result<(), ProviderError>;

    async fn update_click_tracking(&self, domain: &str, active: bool) -> Result<(), ProviderError>;

    async fn update_dkim_selector(&self, domain: &str, selector: &str) -> Result<(), ProviderError>;

    async fn change_credential_password(
        &self,
        domain: &str,
        login: &str,
        password: &str,
    ) -> Result<(), ProviderError>;

    async fn create_api_key(&self, options: &CreateApiKeyOptions) -> Result<ApiKey, ProviderError>;

    async fn list_api_keys(&self) -> Result<Vec<ApiKey>, ProviderError>;

    async fn delete_api_key(&self, id: &str) -> Result<(), ProviderError>;
}
