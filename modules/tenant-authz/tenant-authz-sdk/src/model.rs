//! Authorization model comparison.
//!
//! Models are compared on their schema version and, per type, on the relation
//! rewrites and directly related user types. Ids, ordering of type definitions,
//! and empty or null fields that stores add on the way back are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An authorization model in the store's JSON syntax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub schema_version: String,
    #[serde(default)]
    pub type_definitions: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
}

impl AuthorizationModel {
    /// Parses a model from its JSON form.
    ///
    /// # Errors
    /// Returns the JSON error if `json` is not a model.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether both models grant the same relations.
    #[must_use]
    pub fn equivalent(&self, other: &Self) -> bool {
        self.schema_version == other.schema_version && self.signature() == other.signature()
    }

    /// Names of the types defined by this model.
    #[must_use]
    pub fn type_names(&self) -> Vec<&str> {
        self.type_definitions
            .iter()
            .filter_map(|t| t.get("type").and_then(Value::as_str))
            .collect()
    }

    fn signature(&self) -> BTreeMap<String, (Value, Value)> {
        self.type_definitions
            .iter()
            .filter_map(|def| {
                let name = def.get("type")?.as_str()?.to_owned();
                let rewrites = normalize(def.get("relations").cloned().unwrap_or(Value::Null));
                let direct = normalize(
                    def.pointer("/metadata/relations")
                        .cloned()
                        .unwrap_or(Value::Null),
                );
                Some((name, (rewrites, direct)))
            })
            .collect()
    }
}

/// Drops null and empty-string fields recursively; an absent map becomes `{}`.
fn normalize(value: Value) -> Value {
    match value {
        Value::Null => Value::Object(serde_json::Map::new()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !matches!(v, Value::Null) && v.as_str() != Some(""))
                .map(|(k, v)| (k, normalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}
