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

//! Tracing setup for hosts embedding the provider.
//!
//! Output goes to stderr; stdout belongs to the host's plugin protocol.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable holding the filter directives.
pub const LOG_ENV: &str = "MAILGUN_PROVIDER_LOG";

const DEFAULT_DIRECTIVES: &str = "info";

/// Installs the global subscriber. Does nothing if one is already set.
pub fn init_logging() {
    let _ = try_init_logging();
}

/// Same as [`init_logging_with_default`] with `info` as the fallback level.
pub fn try_init_logging() -> Result<(), TryInitError> {
    init_logging_with_default(DEFAULT_DIRECTIVES)
}

/// Installs the global subscriber, using `default` when `MAILGUN_PROVIDER_LOG`
/// is unset or unparsable.
pub fn init_logging_with_default(default: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init()
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}
