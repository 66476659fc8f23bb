//! Typed failures surfaced by the crude client core.

use std::path::PathBuf;

use thiserror::Error;

use super::compound_id::{CompoundId, IdError};

#[derive(Debug, Error)]
pub enum CrudeError {
  /// Connection-level failure; the request may or may not have reached the server.
  #[error("request to {url} failed")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("server answered {status} for {url}: {body}")]
  Status { status: u16, url: String, body: String },

  /// The server rejected an update because the entry changed since `etag` was cached.
  #[error("{}", conflict_message(.id, .etag))]
  Conflict { id: CompoundId, etag: Option<String> },

  #[error("no models returned by {endpoint}; check the endpoint and credentials")]
  SchemaEmpty { endpoint: String },

  /// The model list could not be fetched; wraps the transport or status failure.
  #[error("could not load the model list")]
  SchemaFetch(#[source] Box<CrudeError>),

  #[error("model list from the server could not be parsed")]
  SchemaParse(#[source] serde_json::Error),

  #[error("failed to write cache file {}", .path.display())]
  CacheIo {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("save of {id} was accepted but the response carries no data.id")]
  MalformedResponse { id: CompoundId },

  #[error(transparent)]
  InvalidId(#[from] IdError),

  #[error("unknown model '{0}'")]
  UnknownModel(String),

  #[error("'{0}' names a model, not an entry")]
  NotAnEntry(CompoundId),

  #[error("payload is not a JSON object: {0}")]
  InvalidPayload(String),

  #[error("invalid header value for {name}")]
  InvalidHeader { name: &'static str },

  #[error("cannot build request url from {0}")]
  InvalidUrl(String),
}

fn conflict_message(id: &CompoundId, etag: &Option<String>) -> String {
  match etag {
    Some(etag) => format!(
      "{} was modified on the server since etag {} was cached; read it again before updating",
      id, etag
    ),
    None => format!(
      "{} was rejected by the server precondition check; read it again before updating",
      id
    ),
  }
}

impl CrudeError {
  /// Errors after which no further command may safely run.
  pub fn is_fatal(&self) -> bool {
    matches!(
      self,
      Self::SchemaEmpty { .. }
        | Self::SchemaFetch(_)
        | Self::SchemaParse(_)
        | Self::CacheIo { .. }
    )
  }

  /// Process exit code for this failure.
  pub fn exit_code(&self) -> u8 {
    match self {
      Self::Conflict { .. } => 3,
      e if e.is_fatal() => 2,
      _ => 1,
    }
  }
}

pub type Result<T, E = CrudeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_exit_codes() {
    let id: CompoundId = "topics/abc123".parse().unwrap();
    let conflict = CrudeError::Conflict {
      id: id.clone(),
      etag: Some("E1".into()),
    };
    assert_eq!(conflict.exit_code(), 3);
    assert!(!conflict.is_fatal());

    let empty = CrudeError::SchemaEmpty {
      endpoint: "http://localhost".into(),
    };
    assert_eq!(empty.exit_code(), 2);

    let unauthorized = CrudeError::SchemaFetch(Box::new(CrudeError::Status {
      status: 401,
      url: "models/browse".into(),
      body: "unauthorized".into(),
    }));
    assert!(unauthorized.is_fatal());
    assert_eq!(unauthorized.exit_code(), 2);

    assert_eq!(CrudeError::MalformedResponse { id }.exit_code(), 1);
  }

  #[test]
  fn test_conflict_message_names_etag() {
    let err = CrudeError::Conflict {
      id: "topics/abc123".parse().unwrap(),
      etag: Some("E1".into()),
    };
    let msg = err.to_string();
    assert!(msg.contains("topics/abc123"));
    assert!(msg.contains("E1"));
  }
}
