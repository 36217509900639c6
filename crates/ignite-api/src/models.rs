//! Wire types exchanged with the API

use serde::{Deserialize, Deserializer, Serialize};

/// The authenticated person, as returned by `POST /sessions` and persisted
/// locally as the cold-start cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub email: String,
    /// Server-relative avatar file name, not a resolved URL
    #[serde(rename = "avatar", default, skip_serializing_if = "Option::is_none")]
    pub avatar_path: Option<String>,
}

/// Body of a successful `POST /sessions`. Tokens are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    #[serde(default)]
    pub user: Option<UserSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub series: u32,
    pub repetitions: u32,
    pub group: String,
    /// Demo animation file name, see `HttpGateway::exercise_demo_url`
    pub demo: String,
    /// Thumbnail file name, see `HttpGateway::exercise_thumb_url`
    pub thumb: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One day of workout history, as grouped by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryDay {
    pub title: String,
    pub data: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub name: String,
    pub group: String,
    pub hour: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// The API hands out integer ids; local records store them as strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}
