use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::{BackendError, ListBackend, MetadataSource};
use crate::error::{ErrorBody, ErrorCode};
use crate::metadata::UrlMetadata;
use crate::model::{List, ListDetails, ListSummary, NewList, UrlChange};
use crate::routes::{CollaboratorRequest, SuccessBody, UrlChangeRequest, VisibilityRequest};

/// Client for the server's JSON API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url = Url::parse(base_url)
            .map_err(|err| BackendError::Invalid(format!("invalid base url {}: {}", base_url, err)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::Invalid(format!(
                "base url cannot carry paths: {}",
                base_url
            )));
        }
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch_metadata_checked(&self, address: &str) -> Result<UrlMetadata, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["api", "metadata"]))
            .query(&[("url", address)])
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.json::<ErrorBody>().await.unwrap_or_else(|_| ErrorBody {
        error: status.to_string(),
        code: None,
    });
    Err(match body.code {
        Some(ErrorCode::NotFound) => BackendError::NotFound(body.error),
        Some(ErrorCode::SlugTaken) => BackendError::SlugTaken(body.error),
        Some(ErrorCode::VersionConflict) => BackendError::Conflict(body.error),
        Some(ErrorCode::Invalid) => BackendError::Invalid(body.error),
        Some(ErrorCode::Internal) | None => BackendError::Remote {
            status: status.as_u16(),
            message: body.error,
        },
    })
}

async fn read_success(response: reqwest::Response) -> Result<(), BackendError> {
    let body: SuccessBody = read_json(response).await?;
    if body.success {
        Ok(())
    } else {
        Err(BackendError::Remote {
            status: 200,
            message: "server reported failure".to_string(),
        })
    }
}

impl ListBackend for HttpBackend {
    async fn fetch_by_slug(&self, slug: &str) -> Result<List, BackendError> {
        let response = self
            .client
            .get(self.endpoint(&["api", "lists", "slug", slug]))
            .send()
            .await?;
        read_json(response).await
    }

    async fn insert(&self, new_list: NewList) -> Result<List, BackendError> {
        let response = self
            .client
            .post(self.endpoint(&["api", "lists"]))
            .json(&new_list)
            .send()
            .await?;
        read_json(response).await
    }

    async fn apply_change(
        &self,
        list_id: &str,
        expected_version: Option<i64>,
        change: UrlChange,
    ) -> Result<List, BackendError> {
        let response = self
            .client
            .patch(self.endpoint(&["api", "lists", list_id, "urls"]))
            .json(&UrlChangeRequest {
                expected_version,
                change,
            })
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_details(&self, list_id: &str, details: ListDetails) -> Result<List, BackendError> {
        let response = self
            .client
            .put(self.endpoint(&["api", "lists", list_id]))
            .json(&details)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete(&self, list_id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.endpoint(&["api", "lists", list_id]))
            .send()
            .await?;
        read_success(response).await
    }

    async fn add_collaborator(&self, list_id: &str, email: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint(&["api", "lists", list_id, "collaborators"]))
            .json(&CollaboratorRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        read_success(response).await
    }

    async fn set_visibility(&self, list_id: &str, is_public: bool) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.endpoint(&["api", "lists", list_id, "visibility"]))
            .json(&VisibilityRequest { is_public })
            .send()
            .await?;
        read_success(response).await
    }

    async fn lists_for_owner(&self, owner_id: Option<&str>) -> Result<Vec<ListSummary>, BackendError> {
        let mut request = self.client.get(self.endpoint(&["api", "lists"]));
        if let Some(owner_id) = owner_id {
            request = request.query(&[("owner", owner_id)]);
        }
        read_json(request.send().await?).await
    }
}

impl MetadataSource for HttpBackend {
    async fn fetch_metadata(&self, address: &str) -> UrlMetadata {
        match self.fetch_metadata_checked(address).await {
            Ok(metadata) => metadata,
            Err(err) => {
                debug!("metadata unavailable for {}: {}", address, err);
                UrlMetadata::default()
            }
        }
    }
}
