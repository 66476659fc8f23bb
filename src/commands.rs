//! CLI verbs and how each one maps onto the client.

use std::io::{BufRead, BufReader, Read, Write};

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use tracing::{debug, error};

use crate::cache::CacheStorage;
use crate::crude::api_types::JsonObject;
use crate::crude::cached_client::{BrowseQuery, CrudeClient};
use crate::crude::client::Transport;
use crate::crude::{CompoundId, CrudeError};

/// Argument that switches save/delete to reading stdin.
const STDIN_MARKER: &str = "-";

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// List the models of the schema
  Models,
  /// Show the field types the server knows
  Fields,
  /// List entries of a model
  Browse {
    model: String,
    /// Page number, starting at 1
    #[arg(default_value_t = 1)]
    page: u32,
    /// Search text instead of a page
    #[arg(short, long)]
    query: Option<String>,
  },
  /// Show one entry (model/entryId) and remember its etag
  Read { id: String },
  /// Create an entry in a model, or update model/entryId.
  /// With `-` as data, CSV rows are streamed from stdin into a bulk import.
  Save { id: String, data: String },
  /// Delete model/entryId, or every id read from stdin with `-`
  Delete { id: String },
}

/// Run one command, reading streamed input from `input` and printing to `out`.
pub fn run<T, S, W>(
  command: Command,
  client: &mut CrudeClient<T, S>,
  input: Box<dyn Read + Send>,
  out: &mut W,
) -> Result<()>
where
  T: Transport,
  S: CacheStorage,
  W: Write,
{
  let schema = client.ensure_schema_loaded()?;
  debug!(
    models = schema.model_names().len(),
    fetched_at = %schema.fetched_at(),
    "schema ready"
  );

  match command {
    Command::Models => {
      let models = client.models()?;
      writeln!(out, "{}", serde_json::to_string_pretty(&models)?)?;
    }
    Command::Fields => print_body(out, &client.fields()?)?,
    Command::Browse { model, page, query } => {
      let query = match query {
        Some(text) => BrowseQuery::Search(text),
        None => BrowseQuery::Page(page),
      };
      print_body(out, &client.browse(&model, &query)?)?;
    }
    Command::Read { id } => print_body(out, &client.read(&parse_id(&id)?)?)?,
    Command::Save { id, data } => {
      let id = parse_id(&id)?;
      if data == STDIN_MARKER {
        if id.is_update_target() {
          return Err(eyre!("streaming import needs a model name, got {}", id));
        }
        print_body(out, &client.import(id.model_name(), input)?)?;
      } else {
        let saved = client.save(&id, &parse_payload(&data)?)?;
        writeln!(out, "{}", saved)?;
      }
    }
    Command::Delete { id } if id == STDIN_MARKER => delete_stream(client, BufReader::new(input), out)?,
    Command::Delete { id } => print_body(out, &client.delete(&parse_id(&id)?)?)?,
  }

  Ok(())
}

/// Delete every compound id read line by line, continuing past failures.
fn delete_stream<T, S, R, W>(client: &mut CrudeClient<T, S>, input: R, out: &mut W) -> Result<()>
where
  T: Transport,
  S: CacheStorage,
  R: BufRead,
  W: Write,
{
  let mut failed = 0usize;
  let mut total = 0usize;

  for line in input.lines() {
    let line = line?;
    let line = line.trim();
    if !line.contains('/') {
      continue;
    }
    total += 1;

    match parse_id(line).and_then(|id| client.delete(&id)) {
      Ok(body) => print_body(out, &body)?,
      Err(e) if e.is_fatal() => return Err(e.into()),
      Err(e) => {
        error!(id = line, error = %e, "delete failed");
        failed += 1;
      }
    }
  }

  if failed > 0 {
    return Err(eyre!("{} of {} deletes failed", failed, total));
  }
  Ok(())
}

fn parse_id(raw: &str) -> Result<CompoundId, CrudeError> {
  Ok(raw.parse::<CompoundId>()?)
}

fn parse_payload(raw: &str) -> Result<JsonObject, CrudeError> {
  match serde_json::from_str::<Value>(raw) {
    Ok(Value::Object(map)) => Ok(map),
    Ok(other) => Err(CrudeError::InvalidPayload(format!(
      "expected an object, got {}",
      other
    ))),
    Err(e) => Err(CrudeError::InvalidPayload(e.to_string())),
  }
}

/// Print a response body, pretty-printed when it is JSON.
fn print_body<W: Write>(out: &mut W, body: &str) -> Result<()> {
  match serde_json::from_str::<Value>(body) {
    Ok(value) => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
    Err(_) => writeln!(out, "{}", body)?,
  }
  Ok(())
}
