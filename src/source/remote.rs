//! Provider backed by the bird REST backend.

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::birds::api_types::{decode, unwrap_root, ApiCount};
use crate::birds::{BirdImage, BirdObservation, BirdSpecies};
use crate::error::{DataError, Result};

use super::transport::{
  encode_segment, with_query, ApiRequest, EditKey, FileUpload, HttpTransport, Transport,
};
use super::{BirdProvider, Shortcut};

/// Remote provider speaking to the backend through a [`Transport`].
pub struct RemoteProvider<T = HttpTransport> {
  transport: T,
}

impl RemoteProvider<HttpTransport> {
  /// Connect to the backend at `base_url` (trailing slashes are ignored).
  pub fn connect(base_url: &str, edit_key: EditKey) -> Result<Self> {
    let transport = HttpTransport::new(base_url, edit_key)?;
    info!(
      base_url = transport.base_url(),
      edit_allowed = transport.edit_key().is_edit_allowed(),
      "remote data source initialized"
    );
    Ok(Self { transport })
  }
}

impl<T: Transport> RemoteProvider<T> {
  pub fn with_transport(transport: T) -> Self {
    Self { transport }
  }

  pub fn transport(&self) -> &T {
    &self.transport
  }

  async fn get_json(&self, endpoint: String) -> Result<Value> {
    let body = self.transport.send(ApiRequest::get(endpoint)).await?;
    Ok(body.unwrap_or(Value::Null))
  }

  async fn post_json(&self, endpoint: &str, body: Value) -> Result<()> {
    self.transport.send(ApiRequest::post(endpoint, body)).await?;
    Ok(())
  }

  async fn delete(&self, endpoint: String) -> Result<()> {
    self.transport.send(ApiRequest::delete(endpoint)).await?;
    Ok(())
  }
}

fn to_body<S: serde::Serialize>(value: &S) -> Result<Value> {
  serde_json::to_value(value).map_err(|e| DataError::Decode(e.to_string()))
}

#[async_trait]
impl<T: Transport> BirdProvider for RemoteProvider<T> {
  fn name(&self) -> &'static str {
    "remote"
  }

  async fn fetch_species(&self) -> Result<Vec<BirdSpecies>> {
    unwrap_root(self.get_json("/species".to_string()).await?)
  }

  async fn fetch_observations(&self) -> Result<Vec<BirdObservation>> {
    unwrap_root(self.get_json("/observations".to_string()).await?)
  }

  async fn save_species(&self, species: &BirdSpecies) -> Result<()> {
    self.post_json("/species", to_body(species)?).await
  }

  async fn save_observation(&self, observation: &BirdObservation) -> Result<()> {
    self.post_json("/observations", to_body(observation)?).await
  }

  async fn delete_species(&self, species_id: &str) -> Result<()> {
    self
      .delete(format!("/species/{}", encode_segment(species_id)))
      .await
  }

  async fn delete_observation(&self, observation_id: &str) -> Result<()> {
    self
      .delete(format!("/observations/{}", encode_segment(observation_id)))
      .await
  }

  async fn upload_image(&self, file: FileUpload) -> Result<BirdImage> {
    decode(self.transport.upload("/upload-image", file).await?)
  }

  async fn server_species_by_id(&self, species_id: &str) -> Result<Shortcut<Option<BirdSpecies>>> {
    let endpoint = format!("/species/{}", encode_segment(species_id));
    match self.get_json(endpoint).await {
      Ok(body) => Ok(Shortcut::Answered(Some(decode(body)?))),
      Err(DataError::RequestFailed { status: 404, .. }) => Ok(Shortcut::Answered(None)),
      Err(e) => Err(e),
    }
  }

  async fn server_species_has_observations(&self, species_id: &str) -> Result<Shortcut<bool>> {
    let endpoint = format!("/species/{}/has-observations", encode_segment(species_id));
    when_available(self.get_json(endpoint).await.and_then(decode))
  }

  async fn server_species_count(&self) -> Result<Shortcut<usize>> {
    let count = self
      .get_json("/species/count".to_string())
      .await
      .and_then(decode::<ApiCount>);
    when_available(count.map(|c| c.count))
  }

  async fn server_observation_count(&self) -> Result<Shortcut<usize>> {
    let count = self
      .get_json("/observations/count".to_string())
      .await
      .and_then(decode::<ApiCount>);
    when_available(count.map(|c| c.count))
  }

  async fn server_observations_by_species(
    &self,
    species_id: &str,
  ) -> Result<Shortcut<Vec<BirdObservation>>> {
    let endpoint = with_query("/observations", &[("speciesId", species_id)]);
    when_available(self.get_json(endpoint).await.and_then(unwrap_root))
  }
}

/// Backends without a shortcut endpoint answer 404, 405 or 501; the caller
/// then computes the answer from the cached collections.
fn when_available<T>(result: Result<T>) -> Result<Shortcut<T>> {
  match result {
    Ok(value) => Ok(Shortcut::Answered(value)),
    Err(DataError::RequestFailed {
      status: 404 | 405 | 501,
      ..
    }) => Ok(Shortcut::Unsupported),
    Err(e) => Err(e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::{BirdData, DataOptions};
  use reqwest::Method;
  use serde_json::json;
  use std::collections::HashMap;
  use std::sync::{Arc, Mutex};

  /// Records every request and answers from a fixed route table.
  #[derive(Default)]
  struct RecordingTransport {
    routes: HashMap<String, std::result::Result<Value, DataError>>,
    requests: Mutex<Vec<ApiRequest>>,
  }

  impl RecordingTransport {
    fn route(mut self, endpoint: &str, response: std::result::Result<Value, DataError>) -> Self {
      self.routes.insert(endpoint.to_string(), response);
      self
    }

    fn requests(&self) -> Vec<ApiRequest> {
      self.requests.lock().unwrap().clone()
    }
  }

  #[async_trait]
  impl Transport for RecordingTransport {
    async fn send(&self, request: ApiRequest) -> Result<Option<Value>> {
      self.requests.lock().unwrap().push(request.clone());
      tokio::task::yield_now().await;
      let key = format!("{} {}", request.method, request.endpoint);
      let response = self
        .routes
        .get(&key)
        .cloned()
        .unwrap_or(Ok(Value::Null))?;
      Ok(request.expect_json.then_some(response))
    }

    async fn upload(&self, endpoint: &str, file: FileUpload) -> Result<Value> {
      self
        .requests
        .lock()
        .unwrap()
        .push(ApiRequest::post(endpoint, json!({ "file": file.file_name })));
      Ok(json!({"url": "/uploads/abc.jpg", "description": "Uploaded tit.jpg"}))
    }
  }

  fn species_json(id: &str) -> Value {
    json!({"id": id, "commonName": id, "scientificName": id, "family": "Paridae", "images": []})
  }

  fn observation_json(id: &str, species_id: &str) -> Value {
    json!({
      "id": id,
      "speciesId": species_id,
      "date": "2024-05-01",
      "location": {"latitude": 52.0, "longitude": 13.0},
      "observer": "Ada",
      "title": id
    })
  }

  #[tokio::test]
  async fn test_fetch_accepts_both_list_shapes() {
    let transport = RecordingTransport::default()
      .route("GET /species", Ok(json!([species_json("a")])))
      .route(
        "GET /observations",
        Ok(json!({"root": [observation_json("o1", "a")]})),
      );
    let provider = RemoteProvider::with_transport(transport);

    assert_eq!(provider.fetch_species().await.unwrap()[0].id, "a");
    assert_eq!(provider.fetch_observations().await.unwrap()[0].id, "o1");
  }

  #[tokio::test]
  async fn test_same_tick_reads_hit_transport_once() {
    let transport =
      RecordingTransport::default().route("GET /species", Ok(json!([species_json("a")])));
    let data = BirdData::new(
      Arc::new(RemoteProvider::with_transport(transport)),
      DataOptions::default(),
    );

    let (a, b) = tokio::join!(data.get_bird_species(), data.get_bird_species());
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(data.provider().transport().requests().len(), 1);
  }

  #[tokio::test]
  async fn test_mutations_use_expected_endpoints() {
    let provider = RemoteProvider::with_transport(RecordingTransport::default());
    let species: BirdSpecies = serde_json::from_value(species_json("parus major")).unwrap();

    provider.save_species(&species).await.unwrap();
    provider.delete_species("parus major").await.unwrap();
    provider.delete_observation("obs/1").await.unwrap();

    let requests = provider.transport().requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].endpoint, "/species");
    assert_eq!(requests[0].body.as_ref().unwrap()["commonName"], "parus major");
    assert!(!requests[0].expect_json);
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].endpoint, "/species/parus%20major");
    assert_eq!(requests[2].endpoint, "/observations/obs%2F1");
  }

  #[tokio::test]
  async fn test_delete_then_read_refetches() {
    let transport = RecordingTransport::default().route(
      "GET /observations",
      Ok(json!([observation_json("obs-1", "sp-1")])),
    );
    let data = BirdData::new(
      Arc::new(RemoteProvider::with_transport(transport)),
      DataOptions::default(),
    );

    data.get_bird_observations().await.unwrap();
    data.delete_bird_observation("obs-1").await.unwrap();
    data.get_bird_observations().await.unwrap();

    let endpoints: Vec<String> = data
      .provider()
      .transport()
      .requests()
      .into_iter()
      .map(|r| format!("{} {}", r.method, r.endpoint))
      .collect();
    assert_eq!(
      endpoints,
      vec![
        "GET /observations",
        "DELETE /observations/obs-1",
        "GET /observations"
      ]
    );
  }

  #[tokio::test]
  async fn test_species_by_id_not_found_is_absent() {
    let transport = RecordingTransport::default()
      .route("GET /species/known", Ok(species_json("known")))
      .route(
        "GET /species/missing",
        Err(DataError::RequestFailed {
          status: 404,
          status_text: "Not Found".to_string(),
        }),
      )
      .route(
        "GET /species/broken",
        Err(DataError::RequestFailed {
          status: 500,
          status_text: "Internal Server Error".to_string(),
        }),
      );
    let provider = RemoteProvider::with_transport(transport);

    let known = provider.server_species_by_id("known").await.unwrap();
    assert!(matches!(known, Shortcut::Answered(Some(s)) if s.id == "known"));
    let missing = provider.server_species_by_id("missing").await.unwrap();
    assert_eq!(missing, Shortcut::Answered(None));
    assert_eq!(
      provider
        .server_species_by_id("broken")
        .await
        .unwrap_err()
        .status(),
      Some(500)
    );
  }

  #[tokio::test]
  async fn test_server_shortcuts() {
    let transport = RecordingTransport::default()
      .route("GET /species/count", Ok(json!({"count": 12})))
      .route("GET /observations/count", Ok(json!({"count": 30})))
      .route("GET /species/sp-1/has-observations", Ok(json!(true)))
      .route(
        "GET /observations?speciesId=sp-1",
        Ok(json!([observation_json("o1", "sp-1")])),
      );
    let data = BirdData::new(
      Arc::new(RemoteProvider::with_transport(transport)),
      DataOptions {
        server_queries: true,
        ..DataOptions::default()
      },
    );

    assert_eq!(data.get_species_count().await.unwrap(), 12);
    assert_eq!(data.get_observation_count().await.unwrap(), 30);
    assert!(data.species_has_observations("sp-1").await.unwrap());
    let observations = data
      .get_bird_observations_by_species_id("sp-1")
      .await
      .unwrap();
    assert_eq!(observations.len(), 1);
  }

  #[tokio::test]
  async fn test_missing_shortcut_endpoints_fall_back_to_cache() {
    let not_found = || {
      Err(DataError::RequestFailed {
        status: 404,
        status_text: "Not Found".to_string(),
      })
    };
    let transport = RecordingTransport::default()
      .route("GET /species", Ok(json!([species_json("a"), species_json("b")])))
      .route("GET /observations", Ok(json!([observation_json("o1", "a")])))
      .route("GET /species/count", not_found())
      .route(
        "GET /observations/count",
        Err(DataError::RequestFailed {
          status: 501,
          status_text: "Not Implemented".to_string(),
        }),
      )
      .route("GET /species/b/has-observations", not_found())
      .route(
        "GET /observations?speciesId=a",
        Err(DataError::RequestFailed {
          status: 405,
          status_text: "Method Not Allowed".to_string(),
        }),
      );
    let data = BirdData::new(
      Arc::new(RemoteProvider::with_transport(transport)),
      DataOptions {
        server_queries: true,
        ..DataOptions::default()
      },
    );

    assert_eq!(data.get_species_count().await.unwrap(), 2);
    assert_eq!(data.get_observation_count().await.unwrap(), 1);
    assert!(!data.species_has_observations("b").await.unwrap());
    let observations = data.get_bird_observations_by_species_id("a").await.unwrap();
    assert_eq!(observations[0].id, "o1");
  }

  #[tokio::test]
  async fn test_shortcut_server_error_is_not_masked() {
    let transport = RecordingTransport::default().route(
      "GET /species/count",
      Err(DataError::RequestFailed {
        status: 500,
        status_text: "Internal Server Error".to_string(),
      }),
    );
    let provider = RemoteProvider::with_transport(transport);
    let err = provider.server_species_count().await.unwrap_err();
    assert_eq!(err.status(), Some(500));
  }

  #[tokio::test]
  async fn test_upload_decodes_image() {
    let provider = RemoteProvider::with_transport(RecordingTransport::default());
    let image = provider
      .upload_image(FileUpload {
        file_name: "tit.jpg".to_string(),
        content_type: "image/jpeg".to_string(),
        bytes: vec![1, 2, 3],
      })
      .await
      .unwrap();
    assert_eq!(image.url, "/uploads/abc.jpg");
    assert_eq!(image.description.as_deref(), Some("Uploaded tit.jpg"));
  }
}
