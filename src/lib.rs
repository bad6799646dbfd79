//! Mailgun provider for infrastructure-as-code engines
//!
//! Supported resources:
//! - `mailgun_domain`: sending domains, tracking and SMTP credentials
//! - `mailgun_api_key`: scoped API keys
//! - `mailgun_domain_verification`: triggers DNS verification and waits for it
//!
//! # Example
//! ```no_run
//! use mailgun_provider::{DomainVerificationConfig, MailgunProvider, ProviderConfig, Resource};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), mailgun_provider::ProviderError> {
//! let config = ProviderConfig::builder()
//!     .set_param("api_key", "your_key")?
//!     .set_param("region", "eu")?
//!     .build()?;
//! let provider = MailgunProvider::new(config)?;
//!
//! let verification = provider
//!     .domain_verifications()
//!     .create(&DomainVerificationConfig::new("example.com"), &CancellationToken::new())
//!     .await?;
//! println!("{} is {}", verification.domain, verification.status);
//! # Ok(())
//! # }
//! ```

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

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod poller;
pub mod provider;
pub mod resources;
pub mod utils;

pub use client::{MailgunApi, MailgunClient};
pub use config::{ProviderConfig, Region};
pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use models::{DnsRecord, DomainSnapshot};
pub use poller::{PollConfig, PollError, VerificationPoller, poll};
pub use provider::MailgunProvider;
pub use resources::{
    ApiKeyConfig, ApiKeyResource, ApiKeyState, DomainConfig, DomainResource, DomainState,
    DomainVerificationConfig, DomainVerificationResource, DomainVerificationState, Resource,
};
