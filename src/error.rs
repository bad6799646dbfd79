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

//! Error types for the provider

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("invalid duration value {value:?}: {reason}")]
    InvalidDuration { value: String, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("Mailgun API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("changing {0} requires replacing the resource")]
    RequiresReplacement(String),

    #[error(
        "timed out after {elapsed:?} waiting for domain {domain} to verify; records not yet valid: [{}]",
        .pending_records.join(", ")
    )]
    VerificationTimeout {
        domain: String,
        elapsed: Duration,
        pending_records: Vec<String>,
    },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ProviderError {
    /// True when the remote API reported that the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Serialization(err.to_string())
    }
}

impl From<serde_urlencoded::ser::Error> for ProviderError {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        ProviderError::Serialization(err.to_string())
    }
}

// Missing-field messages produced by `form_params!`.
impl From<String> for ProviderError {
    fn from(message: String) -> Self {
        ProviderError::Validation(message)
    }
}
