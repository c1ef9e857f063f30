use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;

/// `None` when the key is absent, `Some(None)` for an explicit `null`.
fn nullable<'de, D, T>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

fn nullable_rfc3339<'de, D>(d: D) -> Result<Option<Option<OffsetDateTime>>, D::Error>
where
    D: Deserializer<'de>,
{
    time::serde::rfc3339::option::deserialize(d).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: String,
    pub detail: Option<String>,
    #[serde(default, alias = "datetime", with = "time::serde::rfc3339::option")]
    pub due_at: Option<OffsetDateTime>,
    pub status: Option<String>,
}

/// Absent fields stay unchanged, `null` clears them (status falls back to
/// pending). Unknown keys (e.g. an owner id) are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub detail: Option<Option<String>>,
    #[serde(default, alias = "datetime", deserialize_with = "nullable_rfc3339")]
    pub due_at: Option<Option<OffsetDateTime>>,
    #[serde(default, deserialize_with = "nullable")]
    pub status: Option<Option<String>>,
}
