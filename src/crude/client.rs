use std::fmt;
use std::io::Read;

use reqwest::blocking::{Body, Client, RequestBuilder};
use reqwest::header::{HeaderValue, CONTENT_TYPE, COOKIE, ETAG, IF_MATCH};
use reqwest::Method;
use tracing::{debug, info};
use url::Url;

use super::error::{CrudeError, Result};

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Crude-Api-Key";

/// Credential attached to every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
  ApiKey(String),
  SessionCookie { name: String, value: String },
}

impl Credentials {
  /// Decorate a request with this credential.
  fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder> {
    match self {
      Self::ApiKey(key) => Ok(request.header(API_KEY_HEADER, header_value(API_KEY_HEADER, key)?)),
      Self::SessionCookie { name, value } => {
        let cookie = format!("{}={}", name, value);
        Ok(request.header(COOKIE, header_value("Cookie", &cookie)?))
      }
    }
  }
}

// Keep secrets out of logs and panic messages.
impl fmt::Debug for Credentials {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ApiKey(_) => f.write_str("ApiKey(..)"),
      Self::SessionCookie { name, .. } => write!(f, "SessionCookie({name}=..)"),
    }
  }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue> {
  HeaderValue::from_str(value).map_err(|_| CrudeError::InvalidHeader { name })
}

/// Request body variants.
pub enum RequestBody {
  Empty,
  Json(String),
  /// Forwarded to the server as it is read, never buffered whole.
  Stream {
    content_type: &'static str,
    reader: Box<dyn Read + Send>,
  },
}

impl fmt::Debug for RequestBody {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Empty => f.write_str("Empty"),
      Self::Json(body) => f.debug_tuple("Json").field(body).finish(),
      Self::Stream { content_type, .. } => write!(f, "Stream({content_type})"),
    }
  }
}

/// One request against the API, relative to the configured endpoint.
#[derive(Debug)]
pub struct ApiRequest {
  pub method: Method,
  /// Unencoded path segments, e.g. `["entries", "read", "topics"]`
  pub path: Vec<String>,
  pub query: Vec<(String, String)>,
  pub body: RequestBody,
  /// Precondition sent as `If-Match`
  pub if_match: Option<String>,
}

impl ApiRequest {
  pub fn new<I, P>(method: Method, path: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<String>,
  {
    Self {
      method,
      path: path.into_iter().map(Into::into).collect(),
      query: Vec::new(),
      body: RequestBody::Empty,
      if_match: None,
    }
  }

  pub fn get<I, P>(path: I) -> Self
  where
    I: IntoIterator<Item = P>,
    P: Into<String>,
  {
    Self::new(Method::GET, path)
  }

  pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
    self.query.push((key.to_string(), value.into()));
    self
  }

  pub fn json(mut self, body: String) -> Self {
    self.body = RequestBody::Json(body);
    self
  }

  pub fn stream(mut self, content_type: &'static str, reader: Box<dyn Read + Send>) -> Self {
    self.body = RequestBody::Stream {
      content_type,
      reader,
    };
    self
  }

  pub fn if_match(mut self, etag: Option<String>) -> Self {
    self.if_match = etag;
    self
  }

  /// Path relative to the endpoint, for messages.
  pub fn display_path(&self) -> String {
    self.path.join("/")
  }
}

/// Outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceResult {
  pub status: u16,
  pub body: String,
  pub etag: Option<String>,
}

impl ResourceResult {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// The body of a 2xx response, or a `Status` error for anything else.
  pub fn into_body(self, url: &str) -> Result<String> {
    if self.is_success() {
      Ok(self.body)
    } else {
      Err(CrudeError::Status {
        status: self.status,
        url: url.to_string(),
        body: self.body,
      })
    }
  }
}

/// Anything that can carry an [`ApiRequest`] to the server.
pub trait Transport {
  fn send(&self, request: ApiRequest) -> Result<ResourceResult>;

  /// Endpoint requests are resolved against, for messages.
  fn endpoint(&self) -> &str;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
  client: Client,
  endpoint: Url,
  credentials: Credentials,
}

impl HttpTransport {
  pub fn new(endpoint: Url, credentials: Credentials) -> Result<Self> {
    let client = Client::builder()
      .user_agent(concat!("crude/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|source| CrudeError::Transport {
        url: endpoint.to_string(),
        source,
      })?;

    Ok(Self {
      client,
      endpoint,
      credentials,
    })
  }

  fn url_for(&self, request: &ApiRequest) -> Result<Url> {
    let mut url = self.endpoint.clone();
    url
      .path_segments_mut()
      .map_err(|_| CrudeError::InvalidUrl(self.endpoint.to_string()))?
      .pop_if_empty()
      .extend(&request.path);

    if !request.query.is_empty() {
      url.query_pairs_mut().extend_pairs(&request.query);
    }
    Ok(url)
  }
}

impl Transport for HttpTransport {
  fn send(&self, request: ApiRequest) -> Result<ResourceResult> {
    let url = self.url_for(&request)?;
    debug!(method = %request.method, %url, "sending request");

    let mut builder = self.client.request(request.method.clone(), url.clone());
    builder = self.credentials.apply(builder)?;

    if let Some(etag) = &request.if_match {
      info!(%url, etag, "conditional update");
      builder = builder.header(IF_MATCH, header_value("If-Match", etag)?);
    }

    builder = match request.body {
      RequestBody::Empty => builder.header(CONTENT_TYPE, "application/json"),
      RequestBody::Json(body) => builder.header(CONTENT_TYPE, "application/json").body(body),
      RequestBody::Stream {
        content_type,
        reader,
      } => builder
        .header(CONTENT_TYPE, content_type)
        .body(Body::new(reader)),
    };

    let transport_err = |source| CrudeError::Transport {
      url: url.to_string(),
      source,
    };

    let response = builder.send().map_err(transport_err)?;
    let status = response.status().as_u16();
    let etag = response
      .headers()
      .get(ETAG)
      .and_then(|v| v.to_str().ok())
      .map(String::from);
    let body = response.text().map_err(transport_err)?;

    debug!(status, etag = etag.as_deref(), "response received");
    Ok(ResourceResult { status, body, etag })
  }

  fn endpoint(&self) -> &str {
    self.endpoint.as_str()
  }
}
