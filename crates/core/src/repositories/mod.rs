//! Storage seams.
//!
//! Each trait describes one group of remote tables. The Supabase implementations talk to
//! PostgREST and GoTrue; tests substitute the in-memory stores from [`crate::memory`].

pub mod accounts;
pub mod knowledge;
pub mod narratives;
pub mod sessions;

pub use accounts::{AuthProvider, SupabaseAuthProvider};
pub use knowledge::{KnowledgeStore, SupabaseKnowledgeStore};
pub use narratives::{NarrativeStore, SupabaseNarrativeStore};
pub use sessions::{SessionStore, SupabaseSessionStore};

use serde::{Deserialize, Deserializer};

/// Row ids may be text, uuid or bigint columns; they are handled as strings throughout.
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported id value: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Row {
        #[serde(deserialize_with = "deserialize_id")]
        id: String,
    }

    #[test]
    fn ids_accept_strings_and_numbers() {
        let row: Row = serde_json::from_value(json!({ "id": 42 })).unwrap();
        assert_eq!(row.id, "42");
        let row: Row = serde_json::from_value(json!({ "id": "abc" })).unwrap();
        assert_eq!(row.id, "abc");
        assert!(serde_json::from_value::<Row>(json!({ "id": [1] })).is_err());
    }
}
