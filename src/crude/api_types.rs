//! Serde types matching crude API responses.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Generic key-value payload sent to and read from the entry endpoints.
pub type JsonObject = Map<String, Value>;

// ============================================================================
// Schema (models/browse)
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ForeignRelation {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub related_model: String,
  #[serde(default)]
  pub related_field: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ModelIndex {
  #[serde(default)]
  pub keys: Vec<BTreeMap<String, i64>>,
  #[serde(default)]
  pub unique: bool,
}

/// Schema metadata for one entry type.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Model {
  pub name: String,
  #[serde(default)]
  pub display_template: String,
  #[serde(default)]
  pub display_fields: Vec<String>,
  #[serde(default)]
  pub indexes: Vec<ModelIndex>,
  #[serde(default)]
  pub search_fields: Vec<String>,
  #[serde(default)]
  pub fields: Vec<JsonObject>,
  #[serde(default)]
  pub foreign_relations: Vec<ForeignRelation>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModelResponse {
  #[serde(default)]
  pub model_names: Vec<String>,
  #[serde(default)]
  pub models: HashMap<String, Model>,
}

// ============================================================================
// Entry save response
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SaveResponse {
  pub data: Option<SavedEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SavedEntry {
  pub id: Option<Value>,
}

impl SaveResponse {
  /// The server-assigned entry id, if the response carries a usable one.
  pub fn entry_id(&self) -> Option<String> {
    let id = match self.data.as_ref()?.id.as_ref()? {
      Value::String(s) => s.trim().to_string(),
      Value::Number(n) => n.to_string(),
      _ => return None,
    };
    (!id.is_empty()).then_some(id)
  }
}
