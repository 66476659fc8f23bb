//! Compound identifiers: `model` for a collection, `model/entryId` for one entry.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
  #[error("identifier is empty")]
  Empty,
  #[error("identifier '{0}' has no model name")]
  EmptyModel(String),
  #[error("identifier '{0}' ends in '/' without an entry id")]
  EmptyEntryId(String),
  #[error("identifier '{0}' contains a '.' or '..' component")]
  DotComponent(String),
}

/// Identity of a model collection or of a single entry within it.
///
/// The presence of an entry id is the only thing that decides between
/// create and update semantics; see [`CompoundId::is_update_target`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundId {
  model: String,
  entry_id: Option<String>,
}

impl CompoundId {
  pub fn model(model: impl Into<String>) -> Self {
    Self {
      model: model.into(),
      entry_id: None,
    }
  }

  pub fn model_name(&self) -> &str {
    &self.model
  }

  pub fn entry_id(&self) -> Option<&str> {
    self.entry_id.as_deref()
  }

  /// True iff this id names an existing entry (update), false for a collection (create).
  pub fn is_update_target(&self) -> bool {
    self.entry_id.is_some()
  }

  /// The entry `entry_id` inside this id's model.
  pub fn with_entry(&self, entry_id: &str) -> Result<Self, IdError> {
    let raw = format!("{}/{}", self.model, entry_id);
    if entry_id.is_empty() {
      return Err(IdError::EmptyEntryId(raw));
    }
    if is_dot(entry_id) {
      return Err(IdError::DotComponent(raw));
    }
    Ok(Self {
      model: self.model.clone(),
      entry_id: Some(entry_id.to_string()),
    })
  }

  /// URL path segments, unencoded.
  pub fn segments(&self) -> Vec<&str> {
    let mut segments = vec![self.model.as_str()];
    if let Some(entry) = &self.entry_id {
      segments.push(entry);
    }
    segments
  }
}

fn is_dot(component: &str) -> bool {
  component == "." || component == ".."
}

impl FromStr for CompoundId {
  type Err = IdError;

  /// Splits on the first `/`; anything after it is the entry id.
  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    let raw = raw.trim();
    if raw.is_empty() {
      return Err(IdError::Empty);
    }

    let (model, entry_id) = match raw.split_once('/') {
      Some((model, entry)) => (model, Some(entry)),
      None => (raw, None),
    };

    if model.is_empty() {
      return Err(IdError::EmptyModel(raw.to_string()));
    }
    if is_dot(model) {
      return Err(IdError::DotComponent(raw.to_string()));
    }

    let id = Self::model(model);
    match entry_id {
      Some(entry) => id.with_entry(entry),
      None => Ok(id),
    }
  }
}

impl fmt::Display for CompoundId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.entry_id {
      Some(entry) => write!(f, "{}/{}", self.model, entry),
      None => f.write_str(&self.model),
    }
  }
}
