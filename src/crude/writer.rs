//! Entry reads and writes guarded by cached ETags.
//!
//! An update carries the last ETag this machine saw for the entry as an
//! `If-Match` precondition. The server is the only authority: a mismatch
//! comes back as [`CrudeError::Conflict`] and is never retried, and the
//! local cache is only advanced after the server accepted a write or
//! served a read.

use reqwest::Method;
use tracing::{debug, info, warn};

use super::api_types::{JsonObject, SaveResponse};
use super::client::{ApiRequest, Transport};
use super::compound_id::CompoundId;
use super::error::{CrudeError, Result};
use crate::cache::CacheStorage;

/// HTTP status the server answers with when `If-Match` does not hold.
const PRECONDITION_FAILED: u16 = 412;

pub struct EntryWriter<'a, T: Transport, S: CacheStorage> {
  transport: &'a T,
  cache: &'a S,
}

impl<'a, T: Transport, S: CacheStorage> EntryWriter<'a, T, S> {
  pub fn new(transport: &'a T, cache: &'a S) -> Self {
    Self { transport, cache }
  }

  /// Create an entry (bare model id) or update one (`model/entryId`).
  ///
  /// Returns the id of the written entry. Its ETag from the response is
  /// recorded before returning; failing to record it is fatal because the
  /// next update of the entry would run on a wrong precondition.
  pub fn save(&self, id: &CompoundId, payload: &JsonObject) -> Result<CompoundId> {
    if payload.contains_key("_etag") {
      warn!(%id, "payload field _etag is sent as data; the precondition comes from the etag cache");
    }
    let body = serde_json::to_string(payload).map_err(|e| CrudeError::InvalidPayload(e.to_string()))?;

    let etag = if id.is_update_target() {
      let etag = self.cache.load_etag(id);
      if etag.is_none() {
        warn!(%id, "no cached etag, updating unconditionally");
      }
      etag
    } else {
      None
    };

    let request = ApiRequest::new(Method::POST, entry_path(&["entries"], id))
      .json(body)
      .if_match(etag.clone());
    let path = request.display_path();
    let response = self.transport.send(request)?;

    if response.status == PRECONDITION_FAILED {
      return Err(CrudeError::Conflict {
        id: id.clone(),
        etag,
      });
    }

    let new_etag = response.etag.clone();
    let body = response.into_body(&path)?;
    let malformed = || CrudeError::MalformedResponse { id: id.clone() };

    let entry_id = serde_json::from_str::<SaveResponse>(&body)
      .ok()
      .and_then(|r| r.entry_id())
      .ok_or_else(malformed)?;

    let saved = if id.is_update_target() {
      if id.entry_id() != Some(entry_id.as_str()) {
        warn!(%id, returned = %entry_id, "update answered with a different entry id");
      }
      id.clone()
    } else {
      id.with_entry(&entry_id).map_err(|_| malformed())?
    };

    self.record_etag(&saved, new_etag.as_deref())?;
    info!(id = %saved, "saved");
    Ok(saved)
  }

  /// Read an entry or a model listing. Reading an entry refreshes its cached ETag.
  pub fn read(&self, id: &CompoundId) -> Result<String> {
    let request = ApiRequest::get(entry_path(&["entries", "read"], id));
    let path = request.display_path();
    let response = self.transport.send(request)?;

    let etag = response.etag.clone();
    let body = response.into_body(&path)?;
    if id.is_update_target() {
      self.record_etag(id, etag.as_deref())?;
    }
    Ok(body)
  }

  /// Delete one entry and forget its ETag.
  pub fn delete(&self, id: &CompoundId) -> Result<String> {
    if !id.is_update_target() {
      return Err(CrudeError::NotAnEntry(id.clone()));
    }

    let request = ApiRequest::new(Method::DELETE, entry_path(&["entries"], id));
    let path = request.display_path();
    let body = self.transport.send(request)?.into_body(&path)?;

    self.cache.remove_etag(id)?;
    info!(%id, "deleted");
    Ok(body)
  }

  fn record_etag(&self, id: &CompoundId, etag: Option<&str>) -> Result<()> {
    match etag {
      Some(etag) if !etag.is_empty() => self.cache.save_etag(id, etag),
      _ => {
        debug!(%id, "response carried no etag, dropping cached one");
        self.cache.remove_etag(id)
      }
    }
  }
}

fn entry_path(prefix: &[&str], id: &CompoundId) -> Vec<String> {
  prefix
    .iter()
    .copied()
    .chain(id.segments())
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::FileStorage;
  use crate::crude::testing::FakeTransport;
  use serde_json::json;
  use tempfile::TempDir;

  fn id(raw: &str) -> CompoundId {
    raw.parse().unwrap()
  }

  fn payload() -> JsonObject {
    json!({"name": "Da new topic", "status": "open"})
      .as_object()
      .unwrap()
      .clone()
  }

  fn setup() -> (TempDir, FileStorage, FakeTransport) {
    let dir = TempDir::new().unwrap();
    let storage = FileStorage::new(dir.path());
    (dir, storage, FakeTransport::new())
  }

  #[test]
  fn test_create_returns_compound_id_and_records_etag() {
    let (_dir, storage, transport) = setup();
    transport.respond(200, r#"{"data": {"id": "abc123"}}"#, Some("E1"));

    let saved = EntryWriter::new(&transport, &storage)
      .save(&id("topics"), &payload())
      .unwrap();

    assert_eq!(saved.to_string(), "topics/abc123");
    let sent = transport.last();
    assert_eq!(sent.method, Method::POST);
    assert_eq!(sent.path, "entries/topics");
    assert_eq!(sent.if_match, None);
    assert_eq!(
      serde_json::from_str::<serde_json::Value>(&sent.body.unwrap()).unwrap(),
      json!({"name": "Da new topic", "status": "open"})
    );
    assert_eq!(storage.load_etag(&saved).as_deref(), Some("E1"));
  }

  #[test]
  fn test_read_etag_is_next_precondition() {
    let (_dir, storage, transport) = setup();
    transport
      .respond(200, r#"{"data": {"id": "abc123"}}"#, Some("E1"))
      .respond(200, r#"{"data": {"id": "abc123", "name": "x"}}"#, Some("E2"))
      .respond(200, r#"{"data": {"id": "abc123"}}"#, Some("E3"));
    let writer = EntryWriter::new(&transport, &storage);

    let saved = writer.save(&id("topics"), &payload()).unwrap();
    writer.read(&saved).unwrap();
    assert_eq!(transport.last().path, "entries/read/topics/abc123");
    assert_eq!(storage.load_etag(&saved).as_deref(), Some("E2"));

    let updated = writer.save(&saved, &payload()).unwrap();
    assert_eq!(updated, saved);
    let sent = transport.last();
    assert_eq!(sent.path, "entries/topics/abc123");
    assert_eq!(sent.if_match.as_deref(), Some("E2"));
    assert_eq!(storage.load_etag(&saved).as_deref(), Some("E3"));
  }

  #[test]
  fn test_conflict_keeps_cached_etag() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(412, "precondition failed", Some("E2"));

    let err = EntryWriter::new(&transport, &storage)
      .save(&topic, &payload())
      .unwrap_err();

    assert!(matches!(
      &err,
      CrudeError::Conflict { id, etag: Some(etag) } if id == &topic && etag == "E1"
    ));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(transport.last().if_match.as_deref(), Some("E1"));
    assert_eq!(storage.load_etag(&topic).as_deref(), Some("E1"));
    assert_eq!(transport.count(), 1);
  }

  #[test]
  fn test_update_without_cached_etag_is_unconditional() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    transport.respond(200, r#"{"data": {"id": "abc123"}}"#, Some("E5"));

    let saved = EntryWriter::new(&transport, &storage)
      .save(&topic, &payload())
      .unwrap();

    assert_eq!(saved, topic);
    assert_eq!(transport.last().if_match, None);
    assert_eq!(storage.load_etag(&topic).as_deref(), Some("E5"));
  }

  #[test]
  fn test_malformed_create_writes_no_etag() {
    let (dir, storage, transport) = setup();
    transport.respond(200, r#"{"data": {}}"#, Some("E1"));

    let err = EntryWriter::new(&transport, &storage)
      .save(&id("topics"), &payload())
      .unwrap_err();

    assert!(matches!(err, CrudeError::MalformedResponse { .. }));
    assert!(!dir.path().join("etag_cache").exists());
  }

  #[test]
  fn test_malformed_update_keeps_etag() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(200, "not json at all", Some("E2"));

    let err = EntryWriter::new(&transport, &storage)
      .save(&topic, &payload())
      .unwrap_err();

    assert!(matches!(err, CrudeError::MalformedResponse { .. }));
    assert_eq!(storage.load_etag(&topic).as_deref(), Some("E1"));
  }

  #[test]
  fn test_server_error_is_status_not_conflict() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(500, "boom", None);

    let err = EntryWriter::new(&transport, &storage)
      .save(&topic, &payload())
      .unwrap_err();

    assert!(matches!(err, CrudeError::Status { status: 500, .. }));
    assert_eq!(storage.load_etag(&topic).as_deref(), Some("E1"));
  }

  #[test]
  fn test_write_touches_only_its_own_etag() {
    let (_dir, storage, transport) = setup();
    let other = id("topics/other");
    storage.save_etag(&other, "EO").unwrap();
    transport.respond(200, r#"{"data": {"id": "abc123"}}"#, Some("E1"));

    EntryWriter::new(&transport, &storage)
      .save(&id("topics/abc123"), &payload())
      .unwrap();

    assert_eq!(storage.load_etag(&other).as_deref(), Some("EO"));
  }

  #[test]
  fn test_missing_response_etag_drops_stale_one() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(200, r#"{"data": {"id": "abc123"}}"#, None);

    EntryWriter::new(&transport, &storage)
      .save(&topic, &payload())
      .unwrap();

    assert_eq!(storage.load_etag(&topic), None);
  }

  #[test]
  fn test_read_of_model_records_nothing() {
    let (dir, storage, transport) = setup();
    transport.respond(200, "[]", Some("EM"));

    EntryWriter::new(&transport, &storage)
      .read(&id("topics"))
      .unwrap();

    assert!(!dir.path().join("etag_cache").exists());
  }

  #[test]
  fn test_failed_read_keeps_etag() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(404, "not found", None);

    let err = EntryWriter::new(&transport, &storage)
      .read(&topic)
      .unwrap_err();

    assert!(matches!(err, CrudeError::Status { status: 404, .. }));
    assert_eq!(storage.load_etag(&topic).as_deref(), Some("E1"));
  }

  #[test]
  fn test_delete() {
    let (_dir, storage, transport) = setup();
    let topic = id("topics/abc123");
    storage.save_etag(&topic, "E1").unwrap();
    transport.respond(200, r#"{"deleted": true}"#, None);

    let writer = EntryWriter::new(&transport, &storage);
    let body = writer.delete(&topic).unwrap();

    assert_eq!(body, r#"{"deleted": true}"#);
    let sent = transport.last();
    assert_eq!(sent.method, Method::DELETE);
    assert_eq!(sent.path, "entries/topics/abc123");
    assert_eq!(storage.load_etag(&topic), None);

    assert!(matches!(
      writer.delete(&id("topics")),
      Err(CrudeError::NotAnEntry(_))
    ));
    assert_eq!(transport.count(), 1);
  }
}
