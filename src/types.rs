//! Wire DTOs shared by the API client, the session and iqub stores, and the guard.
//!
//! DESIGN
//! ======
//! Field names mirror the REST payloads so the persisted `user` entry is the
//! same JSON the server sent. Roles are a closed enum; any unknown wire value
//! lands in `Role::Unrecognized` instead of an open string.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Deserializer, Serialize};

/// Authorization category of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Runs iqub groups: creates them and collects contributions.
    Collector,
    /// Joins groups and contributes.
    Member,
    /// Any role string this client does not know about.
    ///
    /// The original wire value is not kept: a persisted user whose role was
    /// `"admin"` is written back as `"unrecognized"` and reloads as this
    /// variant. The guard treats every unknown role the same way, so nothing
    /// downstream depends on the raw string.
    #[serde(other)]
    Unrecognized,
}

impl Role {
    /// Parse a role selector such as a `?role=` query value.
    ///
    /// Only the two known roles parse; anything else is `None`.
    #[must_use]
    pub fn from_selector(raw: &str) -> Option<Self> {
        match raw {
            "collector" => Some(Self::Collector),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Member => "member",
            Self::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated user's profile record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned identifier. Numeric ids are normalized to strings.
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Contact email, if the user registered one.
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number; the primary login identifier.
    pub phone: String,
    /// Sole authorization input for the navigation guard.
    pub role: Role,
    pub gender: String,
}

/// Login form payload for `POST /login`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

/// Signup form payload for `POST /signup`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SignupRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub phone: String,
    pub password: String,
    pub role: Role,
    pub gender: String,
}

/// Successful `POST /login` body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

/// `POST /signup` body. Both fields are optional on the wire; the session
/// store rejects a response missing either one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SignupResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// `GET /user` body.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// Error body shape the API uses for rejected requests.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

// =============================================================================
// IQUBS
// =============================================================================

/// A savings group as listed by `GET /iqubs`.
///
/// Amounts and patterns arrive as either JSON numbers or strings and are kept
/// as the server's text.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Iqub {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub collector_id: String,
    /// Contribution cadence, e.g. days between rounds.
    #[serde(deserialize_with = "deserialize_id")]
    pub saving_pattern: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub saving_amount: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub credit_pattern: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub credit_amount: String,
    /// Seats in the group.
    pub members_count: u32,
    #[serde(default)]
    pub current_members: Option<u32>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub members: Option<Vec<Member>>,
    #[serde(default)]
    pub hosted_lottery: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_id")]
    pub total_collected: Option<String>,
    #[serde(default)]
    pub next_lottery_date: Option<String>,
}

impl Iqub {
    /// Seats still open, when the server reported current membership.
    #[must_use]
    pub fn open_seats(&self) -> Option<u32> {
        self.current_members
            .map(|current| self.members_count.saturating_sub(current))
    }
}

/// One membership row inside an iqub.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub iqub_id: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub join_date: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub saving_rounds: Option<String>,
}

/// `GET /iqubs` body: a bare array, or an object wrapping it under `iqubs`
/// or `data`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum IqubList {
    Bare(Vec<Iqub>),
    Wrapped {
        #[serde(alias = "data")]
        iqubs: Vec<Iqub>,
    },
}

impl IqubList {
    #[must_use]
    pub fn into_iqubs(self) -> Vec<Iqub> {
        match self {
            Self::Bare(iqubs) | Self::Wrapped { iqubs } => iqubs,
        }
    }
}

fn scalar_to_string<E: serde::de::Error>(value: serde_json::Value) -> Result<String, E> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        _ => Err(E::custom("expected string or number")),
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    scalar_to_string(serde_json::Value::deserialize(deserializer)?)
}

fn deserialize_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        value => scalar_to_string(value).map(Some),
    }
}
