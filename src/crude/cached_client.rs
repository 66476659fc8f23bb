//! Crude client with the schema and ETag caches wired in.

use std::io::Read;

use reqwest::Method;
use tracing::debug;

use super::api_types::{JsonObject, Model};
use super::client::{ApiRequest, HttpTransport, Transport};
use super::compound_id::CompoundId;
use super::error::Result;
use super::schema::{Schema, SchemaRegistry};
use super::writer::EntryWriter;
use crate::cache::{CacheLayer, CacheStorage, FileStorage};
use crate::config::Config;

/// How a model listing is narrowed down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseQuery {
  Page(u32),
  Search(String),
}

impl Default for BrowseQuery {
  fn default() -> Self {
    Self::Page(1)
  }
}

/// The operations the command layer needs, each checking model names
/// against the schema before touching entries.
pub struct CrudeClient<T: Transport, S: CacheStorage> {
  transport: T,
  cache: CacheLayer<S>,
  schema: SchemaRegistry,
}

impl CrudeClient<HttpTransport, FileStorage> {
  pub fn new(config: &Config) -> Result<Self> {
    let transport = HttpTransport::new(config.endpoint.clone(), config.credentials.clone())?;
    let storage = FileStorage::for_endpoint(&config.cache_dir, config.endpoint.as_str());
    debug!(endpoint = %config.endpoint, cache = %storage.root().display(), "client ready");
    let cache = CacheLayer::new(storage).with_stale_time(config.schema_freshness);
    Ok(Self::with_parts(transport, cache))
  }
}

impl<T: Transport, S: CacheStorage> CrudeClient<T, S> {
  pub fn with_parts(transport: T, cache: CacheLayer<S>) -> Self {
    Self {
      transport,
      cache,
      schema: SchemaRegistry::new(),
    }
  }

  pub fn ensure_schema_loaded(&mut self) -> Result<&Schema> {
    self.schema.ensure_loaded(&self.transport, &self.cache)
  }

  fn check_model(&mut self, name: &str) -> Result<()> {
    self.ensure_schema_loaded()?.model_by_name(name)?;
    Ok(())
  }

  fn writer(&self) -> EntryWriter<'_, T, S> {
    EntryWriter::new(&self.transport, self.cache.storage())
  }

  /// All models, in the server's order.
  pub fn models(&mut self) -> Result<Vec<Model>> {
    Ok(self.ensure_schema_loaded()?.models_in_order().cloned().collect())
  }

  /// The server's catalogue of field types.
  pub fn fields(&self) -> Result<String> {
    let request = ApiRequest::get(["models", "fields"]);
    let path = request.display_path();
    self.transport.send(request)?.into_body(&path)
  }

  pub fn browse(&mut self, model: &str, query: &BrowseQuery) -> Result<String> {
    self.check_model(model)?;

    let request = ApiRequest::get(["entries", "read", model]);
    let request = match query {
      BrowseQuery::Page(page) => request.query("page", page.to_string()),
      BrowseQuery::Search(text) => request.query("q", text.as_str()),
    };
    let path = request.display_path();
    self.transport.send(request)?.into_body(&path)
  }

  pub fn read(&mut self, id: &CompoundId) -> Result<String> {
    self.check_model(id.model_name())?;
    self.writer().read(id)
  }

  pub fn save(&mut self, id: &CompoundId, payload: &JsonObject) -> Result<CompoundId> {
    self.check_model(id.model_name())?;
    self.writer().save(id, payload)
  }

  pub fn delete(&mut self, id: &CompoundId) -> Result<String> {
    self.check_model(id.model_name())?;
    self.writer().delete(id)
  }

  /// Stream CSV rows into the model's bulk import endpoint.
  pub fn import(&mut self, model: &str, csv: Box<dyn Read + Send>) -> Result<String> {
    self.check_model(model)?;

    let request = ApiRequest::new(Method::POST, ["imports", model]).stream("text/csv", csv);
    let path = request.display_path();
    self.transport.send(request)?.into_body(&path)
  }
}
