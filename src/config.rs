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

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::utils::duration::parse_duration;

pub const API_BASE_US: &str = "https://api.mailgun.net";
pub const API_BASE_EU: &str = "https://api.eu.mailgun.net";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mailgun data region. Each region has its own API host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Us,
    Eu,
}

impl Region {
    /// `"eu"` in any case selects the EU region; anything else is US.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("eu") {
            Region::Eu
        } else {
            Region::Us
        }
    }

    pub fn api_base(self) -> &'static str {
        match self {
            Region::Us => API_BASE_US,
            Region::Eu => API_BASE_EU,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Us => write!(f, "us"),
            Region::Eu => write!(f, "eu"),
        }
    }
}

/// Provider-level settings shared by every resource.
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    /// Region used by resources that do not carry their own.
    pub region: Region,
    /// Overrides the per-region API host (proxies, tests).
    pub api_base: Option<String>,
    pub request_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Reads `MAILGUN_API_KEY`, `MAILGUN_REGION`, `MAILGUN_API_BASE` and
    /// `MAILGUN_REQUEST_TIMEOUT`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProviderError> {
        let mut builder = Self::builder();
        for (var, key) in [
            ("MAILGUN_API_KEY", "api_key"),
            ("MAILGUN_REGION", "region"),
            ("MAILGUN_API_BASE", "api_base"),
            ("MAILGUN_REQUEST_TIMEOUT", "request_timeout"),
        ] {
            if let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) {
                builder = builder.set_param(key, &value)?;
            }
        }
        builder.build()
    }

    /// API host for `region`, honouring the `api_base` override.
    pub fn api_base_for(&self, region: Region) -> String {
        match &self.api_base {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => region.api_base().to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProviderConfigBuilder {
    api_key: Option<String>,
    region: Option<Region>,
    api_base: Option<String>,
    request_timeout: Option<Duration>,
}

impl ProviderConfigBuilder {
    /// Sets a configuration parameter.
    ///
    /// Supported keys:
    /// - "api_key"
    /// - "region" (`us` or `eu`)
    /// - "api_base"
    /// - "request_timeout" (duration string such as `"30s"`)
    pub fn set_param(mut self, key: &str, value: &str) -> Result<Self, ProviderError> {
        match key {
            "api_key" => self.api_key = Some(value.trim().to_string()),
            "region" => self.region = Some(Region::parse(value)),
            "api_base" => self.api_base = Some(value.trim().to_string()),
            "request_timeout" => self.request_timeout = Some(parse_duration(value.trim())?),
            _ => {
                return Err(ProviderError::Configuration(format!(
                    "unknown parameter: {key}"
                )));
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Result<ProviderConfig, ProviderError> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::Configuration("api_key is required".into()))?;

        Ok(ProviderConfig {
            api_key,
            region: self.region.unwrap_or_default(),
            api_base: self.api_base.filter(|b| !b.is_empty()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        })
    }
}
