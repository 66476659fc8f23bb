//! Scripted in-memory transport for tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Read;

use reqwest::Method;

use super::client::{ApiRequest, RequestBody, ResourceResult, Transport};
use super::error::Result;

/// What the fake transport saw of one request.
#[derive(Debug, Clone)]
pub struct SentRequest {
  pub method: Method,
  pub path: String,
  pub query: Vec<(String, String)>,
  pub if_match: Option<String>,
  pub body: Option<String>,
}

/// Replies to requests in order from a queue of canned responses.
#[derive(Default)]
pub struct FakeTransport {
  responses: RefCell<VecDeque<ResourceResult>>,
  sent: RefCell<Vec<SentRequest>>,
}

impl FakeTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, status: u16, body: &str, etag: Option<&str>) -> &Self {
    self.responses.borrow_mut().push_back(ResourceResult {
      status,
      body: body.to_string(),
      etag: etag.map(String::from),
    });
    self
  }

  pub fn sent(&self) -> Vec<SentRequest> {
    self.sent.borrow().clone()
  }

  pub fn last(&self) -> SentRequest {
    self.sent.borrow().last().cloned().expect("no request sent")
  }

  pub fn count(&self) -> usize {
    self.sent.borrow().len()
  }
}

impl Transport for FakeTransport {
  fn send(&self, request: ApiRequest) -> Result<ResourceResult> {
    let body = match request.body {
      RequestBody::Empty => None,
      RequestBody::Json(body) => Some(body),
      RequestBody::Stream { mut reader, .. } => {
        let mut body = String::new();
        reader.read_to_string(&mut body).expect("readable stream");
        Some(body)
      }
    };

    self.sent.borrow_mut().push(SentRequest {
      method: request.method,
      path: request.path.join("/"),
      query: request.query,
      if_match: request.if_match,
      body,
    });

    let response = self.responses.borrow_mut().pop_front();
    Ok(response.expect("unexpected request: no response scripted"))
  }

  fn endpoint(&self) -> &str {
    "http://fake.test"
  }
}

/// A minimal two-model schema response.
pub const SCHEMA_JSON: &str = r#"{
  "model_names": ["topics", "people"],
  "models": {
    "people": {"name": "people", "display_fields": ["name"]},
    "topics": {"name": "topics", "display_template": "{{name}}", "search_fields": ["name"]}
  }
}"#;
