//! Claims carried by structured (JWT) credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use relay_core::types::id::IdentityId;

/// JWT claims payload of a structured credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the identity id. Accepted as a JSON string or number.
    #[serde(deserialize_with = "deserialize_subject")]
    pub sub: IdentityId,
    /// Role at the time of issuance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Capabilities; absent means "use the default grant".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Contact email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
}

impl Claims {
    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubject {
    Text(String),
    Number(u64),
}

fn deserialize_subject<'de, D>(deserializer: D) -> Result<IdentityId, D::Error>
where
    D: Deserializer<'de>,
{
    let id = match RawSubject::deserialize(deserializer)? {
        RawSubject::Text(s) => IdentityId::new(s),
        RawSubject::Number(n) => IdentityId::from(n),
    };
    if id.is_empty() {
        return Err(serde::de::Error::custom("subject claim is empty"));
    }
    Ok(id)
}
