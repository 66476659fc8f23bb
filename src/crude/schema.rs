//! Model schema, loaded cache-first from `models/browse`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::api_types::{Model, ModelResponse};
use super::client::{ApiRequest, Transport};
use super::error::{CrudeError, Result};
use crate::cache::{CacheLayer, CacheSource, CacheStorage};

/// Cache key of the raw model list.
pub const SCHEMA_CACHE_KEY: &str = "model_cache.json";

/// The models known to the server, as of `fetched_at`.
#[derive(Debug, Clone)]
pub struct Schema {
  model_names: Vec<String>,
  models: HashMap<String, Model>,
  fetched_at: DateTime<Utc>,
}

impl Schema {
  fn from_response(response: ModelResponse, fetched_at: DateTime<Utc>) -> Self {
    Self {
      model_names: response.model_names,
      models: response.models,
      fetched_at,
    }
  }

  pub fn model_names(&self) -> &[String] {
    &self.model_names
  }

  pub fn fetched_at(&self) -> DateTime<Utc> {
    self.fetched_at
  }

  pub fn model_by_name(&self, name: &str) -> Result<&Model> {
    self
      .models
      .get(name)
      .ok_or_else(|| CrudeError::UnknownModel(name.to_string()))
  }

  /// Models in server order; names without a definition are skipped.
  pub fn models_in_order(&self) -> impl Iterator<Item = &Model> {
    self
      .model_names
      .iter()
      .filter_map(|name| self.models.get(name))
  }
}

fn parse_models(content: &str) -> serde_json::Result<ModelResponse> {
  serde_json::from_str(content)
}

/// Loads the schema once per process and hands out the in-memory copy.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
  schema: Option<Schema>,
}

impl SchemaRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// The loaded schema, fetching it on first use.
  ///
  /// A fresh cached copy is used when it parses and lists at least one
  /// model; otherwise the list is fetched from the network and written to
  /// the cache. A failed fetch or an empty model list from the network is fatal.
  pub fn ensure_loaded<T, S>(&mut self, transport: &T, cache: &CacheLayer<S>) -> Result<&Schema>
  where
    T: Transport,
    S: CacheStorage,
  {
    let schema = match self.schema.take() {
      Some(schema) => schema,
      None => load(transport, cache)?,
    };
    Ok(self.schema.insert(schema))
  }
}

fn load<T: Transport, S: CacheStorage>(transport: &T, cache: &CacheLayer<S>) -> Result<Schema> {
  let usable = |content: &str| matches!(parse_models(content), Ok(r) if !r.model_names.is_empty());

  let result = cache.fetch(SCHEMA_CACHE_KEY, usable, || {
    info!(endpoint = transport.endpoint(), "fetching model list");
    let request = ApiRequest::get(["models", "browse"]);
    let path = request.display_path();
    transport
      .send(request)
      .and_then(|response| response.into_body(&path))
      .map_err(|e| CrudeError::SchemaFetch(Box::new(e)))
  })?;

  let response = parse_models(&result.data).map_err(CrudeError::SchemaParse)?;
  if response.model_names.is_empty() {
    return Err(CrudeError::SchemaEmpty {
      endpoint: transport.endpoint().to_string(),
    });
  }

  let fetched_at = match result.source {
    CacheSource::CacheFresh => result.cached_at.unwrap_or_else(Utc::now),
    CacheSource::Network => Utc::now(),
  };
  debug!(models = response.model_names.len(), source = ?result.source, "schema loaded");
  Ok(Schema::from_response(response, fetched_at))
}
