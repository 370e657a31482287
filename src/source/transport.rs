//! JSON-over-HTTP transport to the bird backend.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Response};
use serde_json::Value;
use tracing::debug;
use url::{form_urlencoded, Url};

use crate::error::{DataError, Result, ValidationError};

/// Header carrying the edit secret on every request.
pub const EDIT_KEY_HEADER: &str = "x-edit-key";

/// Page query parameter that carries the edit secret.
pub const EDIT_QUERY_PARAM: &str = "edit";

/// Edit-mode token derived from the page URL.
///
/// Edit mode is granted only when the token equals the configured secret.
/// Otherwise the header is still sent, with an empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditKey {
  provided: Option<String>,
  valid: bool,
}

impl EditKey {
  pub fn new(provided: Option<&str>, secret: Option<&str>) -> Self {
    let valid = match (provided, secret) {
      (Some(p), Some(s)) => !s.is_empty() && p == s,
      _ => false,
    };
    Self {
      provided: provided.map(String::from),
      valid,
    }
  }

  /// Read the `edit` query parameter of the page URL.
  pub fn from_page_url(page_url: &Url, secret: Option<&str>) -> Self {
    let provided = page_url
      .query_pairs()
      .find(|(k, _)| k == EDIT_QUERY_PARAM)
      .map(|(_, v)| v.into_owned());
    Self::new(provided.as_deref(), secret)
  }

  /// No token at all: read-only browsing.
  pub fn none() -> Self {
    Self::default()
  }

  pub fn is_edit_allowed(&self) -> bool {
    self.valid
  }

  /// Whether the page carried an `edit` parameter, valid or not.
  pub fn was_provided(&self) -> bool {
    self.provided.is_some()
  }

  pub fn header_value(&self) -> &str {
    match (&self.provided, self.valid) {
      (Some(key), true) => key,
      _ => "",
    }
  }
}

/// One request against the backend, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
  pub method: Method,
  pub endpoint: String,
  pub body: Option<Value>,
  /// Parse the response body as JSON; otherwise it is discarded
  pub expect_json: bool,
}

impl ApiRequest {
  pub fn get(endpoint: impl Into<String>) -> Self {
    Self {
      method: Method::GET,
      endpoint: endpoint.into(),
      body: None,
      expect_json: true,
    }
  }

  pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
    Self {
      method: Method::POST,
      endpoint: endpoint.into(),
      body: Some(body),
      expect_json: false,
    }
  }

  pub fn delete(endpoint: impl Into<String>) -> Self {
    Self {
      method: Method::DELETE,
      endpoint: endpoint.into(),
      body: None,
      expect_json: false,
    }
  }
}

/// An image file to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
  pub file_name: String,
  pub content_type: String,
  pub bytes: Vec<u8>,
}

/// Sends requests to the backend. Single attempt, no retries.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Perform a request; `Some(body)` only when `expect_json` was set.
  async fn send(&self, request: ApiRequest) -> Result<Option<Value>>;

  /// Multipart upload of one file under the form field `file`.
  async fn upload(&self, endpoint: &str, file: FileUpload) -> Result<Value>;
}

/// Percent-encode one path segment.
pub fn encode_segment(segment: &str) -> String {
  // form encoding writes spaces as '+' and escapes a literal '+' as %2B
  form_urlencoded::byte_serialize(segment.as_bytes())
    .collect::<String>()
    .replace('+', "%20")
}

/// Build `endpoint?key=value` with proper query encoding.
pub fn with_query(endpoint: &str, pairs: &[(&str, &str)]) -> String {
  let query = form_urlencoded::Serializer::new(String::new())
    .extend_pairs(pairs)
    .finish();
  format!("{}?{}", endpoint, query)
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: String,
  edit_key: EditKey,
}

impl HttpTransport {
  pub fn new(base_url: &str, edit_key: EditKey) -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| DataError::Transport(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url: base_url.trim_end_matches('/').to_string(),
      edit_key,
    })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn edit_key(&self) -> &EditKey {
    &self.edit_key
  }

  fn url(&self, endpoint: &str) -> String {
    format!("{}{}", self.base_url, endpoint)
  }

  fn request(&self, method: Method, endpoint: &str) -> reqwest::RequestBuilder {
    self
      .client
      .request(method, self.url(endpoint))
      .header(ACCEPT, "application/json")
      .header(EDIT_KEY_HEADER, self.edit_key.header_value())
  }
}

fn transport_error(e: reqwest::Error) -> DataError {
  DataError::Transport(e.to_string())
}

fn check_status(response: Response) -> Result<Response> {
  let status = response.status();
  if status.is_success() {
    return Ok(response);
  }
  Err(DataError::RequestFailed {
    status: status.as_u16(),
    status_text: status.canonical_reason().unwrap_or_default().to_string(),
  })
}

async fn read_json(response: Response) -> Result<Value> {
  response.json::<Value>().await.map_err(|e| {
    if e.is_decode() {
      DataError::Decode(e.to_string())
    } else {
      transport_error(e)
    }
  })
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: ApiRequest) -> Result<Option<Value>> {
    debug!(
      method = %request.method,
      endpoint = %request.endpoint,
      edit_allowed = self.edit_key.is_edit_allowed(),
      "sending request"
    );

    let mut builder = self.request(request.method, &request.endpoint);
    if let Some(body) = &request.body {
      builder = builder.json(body);
    }

    let response = builder.send().await.map_err(transport_error)?;
    let response = check_status(response)?;

    if !request.expect_json {
      return Ok(None);
    }
    read_json(response).await.map(Some)
  }

  async fn upload(&self, endpoint: &str, file: FileUpload) -> Result<Value> {
    debug!(endpoint, file = %file.file_name, size = file.bytes.len(), "uploading file");

    let part = Part::bytes(file.bytes)
      .file_name(file.file_name)
      .mime_str(&file.content_type)
      .map_err(|e| ValidationError::new("contentType", e.to_string()))?;
    let form = Form::new().part("file", part);

    let response = self
      .request(Method::POST, endpoint)
      .multipart(form)
      .send()
      .await
      .map_err(transport_error)?;
    let response = check_status(response)?;

    read_json(response).await
  }
}
