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

//! Typed views of Mailgun API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::serde_utils::{null_as_default, string_or_number};

/// Status string Mailgun reports for a DNS record that resolves as expected.
pub const VALID_STATUS: &str = "valid";

/// Domain attributes returned under the `domain` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainInfo {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub smtp_login: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spam_action: String,
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub web_scheme: String,
    #[serde(default, with = "rfc2822_opt")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A DNS record Mailgun expects to see for the domain, with its observed status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub record_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub priority: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub valid: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cached: Vec<String>,
}

impl DnsRecord {
    pub fn is_valid(&self) -> bool {
        self.valid.eq_ignore_ascii_case(VALID_STATUS)
    }

    /// Name used in diagnostics; receiving (MX) records carry no name.
    pub fn label(&self) -> &str {
        if self.name.is_empty() { &self.value } else { &self.name }
    }
}

/// Point-in-time read of a domain, as returned by `GET /v4/domains/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainSnapshot {
    pub domain: DomainInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub receiving_dns_records: Vec<DnsRecord>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sending_dns_records: Vec<DnsRecord>,
}

impl DomainSnapshot {
    /// Every receiving and sending record reports `valid`, case-insensitively.
    ///
    /// A snapshot without records is considered valid.
    pub fn records_are_valid(&self) -> bool {
        self.records().all(DnsRecord::is_valid)
    }

    pub fn records(&self) -> impl Iterator<Item = &DnsRecord> {
        self.receiving_dns_records
            .iter()
            .chain(self.sending_dns_records.iter())
    }

    /// Labels of the records that are not yet valid.
    pub fn pending_records(&self) -> Vec<String> {
        self.records()
            .filter(|r| !r.is_valid())
            .map(|r| r.label().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatus {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainTracking {
    #[serde(default)]
    pub open: TrackingStatus,
    #[serde(default)]
    pub click: TrackingStatus,
    #[serde(default)]
    pub unsubscribe: TrackingStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TrackingResponse {
    pub tracking: DomainTracking,
}

/// Options for `POST /v4/domains`.
#[derive(Debug, Clone, Default)]
pub struct CreateDomainOptions {
    pub name: Option<String>,
    pub spam_action: Option<String>,
    pub smtp_password: Option<String>,
    pub wildcard: Option<bool>,
    pub force_dkim_authority: Option<bool>,
    pub dkim_key_size: Option<u32>,
    pub web_scheme: Option<String>,
}

/// Options for `PUT /v4/domains/{name}`.
#[derive(Debug, Clone, Default)]
pub struct UpdateDomainOptions {
    pub web_scheme: Option<String>,
    pub use_automatic_sender_security: Option<bool>,
}

/// Options for `POST /v1/keys`.
#[derive(Debug, Clone, Default)]
pub struct CreateApiKeyOptions {
    pub role: Option<String>,
    pub kind: Option<String>,
    pub description: Option<String>,
    pub domain_name: Option<String>,
    pub email: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub expiration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub domain_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requestor: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub secret: String,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub disabled_reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiKeyResponse {
    pub key: ApiKey,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiKeyListResponse {
    #[serde(default)]
    pub items: Vec<ApiKey>,
}

/// Mailgun's v3/v4 domain endpoints use RFC 2822 timestamps,
/// e.g. `"Thu, 13 Oct 2011 18:02:00 +0000"`.
mod rfc2822_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc2822()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
            .map(|ts| ts.with_timezone(&Utc)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, valid: &str) -> DnsRecord {
        DnsRecord {
            name: name.to_string(),
            record_type: "TXT".to_string(),
            valid: valid.to_string(),
            ..Default::default()
        }
    }

    fn snapshot(receiving: Vec<DnsRecord>, sending: Vec<DnsRecord>) -> DomainSnapshot {
        DomainSnapshot {
            domain: DomainInfo {
                name: "example.com".into(),
                ..Default::default()
            },
            receiving_dns_records: receiving,
            sending_dns_records: sending,
        }
    }

    #[test]
    fn test_no_records_is_valid() {
        assert!(snapshot(vec![], vec![]).records_are_valid());
    }

    #[test]
    fn test_valid_is_case_insensitive() {
        let s = snapshot(
            vec![record("", "VALID")],
            vec![record("example.com", "Valid"), record("email.example.com", "valid")],
        );
        assert!(s.records_are_valid());
        assert!(s.pending_records().is_empty());
    }

    #[test]
    fn test_one_unknown_record_blocks() {
        let s = snapshot(
            vec![record("", "valid")],
            vec![record("example.com", "valid"), record("k1._domainkey.example.com", "unknown")],
        );
        assert!(!s.records_are_valid());
        assert_eq!(s.pending_records(), vec!["k1._domainkey.example.com".to_string()]);

        let s = snapshot(vec![record("", "pending")], vec![]);
        assert!(!s.records_are_valid());
    }

    #[test]
    fn test_deserialize_domain_response() {
        let body = serde_json::json!({
            "domain": {
                "name": "example.com",
                "state": "unverified",
                "smtp_login": "postmaster@example.com",
                "spam_action": "disabled",
                "wildcard": false,
                "web_scheme": "https",
                "created_at": "Thu, 13 Oct 2011 18:02:00 +0000"
            },
            "receiving_dns_records": [
                {"priority": "10", "record_type": "MX", "valid": "valid", "value": "mxa.mailgun.org", "cached": null}
            ],
            "sending_dns_records": [
                {"record_type": "TXT", "valid": "unknown", "name": "example.com", "value": "v=spf1 include:mailgun.org ~all", "cached": [], "is_active": true}
            ]
        });

        let s: DomainSnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(s.domain.smtp_login, "postmaster@example.com");
        assert_eq!(s.domain.created_at.unwrap().to_rfc3339(), "2011-10-13T18:02:00+00:00");
        assert_eq!(s.receiving_dns_records[0].priority, "10");
        assert_eq!(s.receiving_dns_records[0].label(), "mxa.mailgun.org");
        assert!(s.sending_dns_records[0].is_active);
        assert!(!s.records_are_valid());
    }

    #[test]
    fn test_deserialize_null_record_lists() {
        let s: DomainSnapshot = serde_json::from_value(serde_json::json!({
            "domain": {"name": "example.com"},
            "receiving_dns_records": null,
            "sending_dns_records": null
        }))
        .unwrap();
        assert!(s.records_are_valid());
    }
}
