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

//! Managed resources and their lifecycle.

pub mod api_key;
pub mod domain;
pub mod domain_verification;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;

pub use api_key::{ApiKeyConfig, ApiKeyResource, ApiKeyState};
pub use domain::{DomainConfig, DomainResource, DomainState};
pub use domain_verification::{
    DomainVerificationConfig, DomainVerificationResource, DomainVerificationState,
};

/// Lifecycle contract between the state engine and one resource kind.
///
/// `Config` is the desired state written by the user; `State` is what the
/// provider reports back after talking to Mailgun.
#[async_trait]
pub trait Resource: Send + Sync {
    type Config: Send + Sync;
    type State: Send + Sync;

    /// Type name as it appears in configuration, e.g. `mailgun_domain`.
    const TYPE_NAME: &'static str;

    async fn create(
        &self,
        config: &Self::Config,
        cancel: &CancellationToken,
    ) -> Result<Self::State, ProviderError>;

    /// Reads the remote object. `Ok(None)` means it no longer exists and
    /// should be dropped from state.
    async fn read(&self, id: &str, config: &Self::Config) -> Result<Option<Self::State>, ProviderError>;

    /// Applies in-place changes. Kinds without updatable fields reject every change.
    async fn update(
        &self,
        prior: &Self::Config,
        state: &Self::State,
        config: &Self::Config,
    ) -> Result<Self::State, ProviderError> {
        let _ = (prior, state, config);
        Err(ProviderError::RequiresReplacement(Self::TYPE_NAME.to_string()))
    }

    async fn delete(
        &self,
        id: &str,
        config: &Self::Config,
        cancel: &CancellationToken,
    ) -> Result<(), ProviderError>;
}

/// Names of the fields that differ between two configs and cannot change in place.
pub(crate) fn replacement_fields<'a>(changes: impl IntoIterator<Item = (&'a str, bool)>) -> Vec<String> {
    changes
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(field, _)| field.to_string())
        .collect()
}
