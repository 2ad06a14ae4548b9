//! Storage seam between the list store and wherever list rows live.

pub mod http;
pub mod sqlite;

use std::future::Future;

use thiserror::Error;

use crate::metadata::UrlMetadata;
use crate::model::{ChangeError, List, ListDetails, ListSummary, NewList, UrlChange};

pub use http::HttpBackend;
pub use sqlite::Database;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SlugTaken(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("malformed list row: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Remote { status: u16, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<ChangeError> for BackendError {
    fn from(err: ChangeError) -> Self {
        match err {
            ChangeError::DuplicateId(_) => BackendError::Conflict(err.to_string()),
            ChangeError::UnknownItem(_) => BackendError::NotFound(err.to_string()),
            ChangeError::InvalidUrl(_) => BackendError::Invalid(err.to_string()),
        }
    }
}

/// Row operations on lists. Every write returns the stored row so callers can
/// mirror server-confirmed state.
pub trait ListBackend {
    fn fetch_by_slug(&self, slug: &str) -> impl Future<Output = Result<List, BackendError>> + Send;

    fn insert(&self, new_list: NewList) -> impl Future<Output = Result<List, BackendError>> + Send;

    /// Applies one targeted change. With `expected_version` set the write is
    /// refused unless the stored collection is still at that revision.
    fn apply_change(
        &self,
        list_id: &str,
        expected_version: Option<i64>,
        change: UrlChange,
    ) -> impl Future<Output = Result<List, BackendError>> + Send;

    fn update_details(
        &self,
        list_id: &str,
        details: ListDetails,
    ) -> impl Future<Output = Result<List, BackendError>> + Send;

    fn delete(&self, list_id: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn add_collaborator(
        &self,
        list_id: &str,
        email: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn set_visibility(
        &self,
        list_id: &str,
        is_public: bool,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    fn lists_for_owner(
        &self,
        owner_id: Option<&str>,
    ) -> impl Future<Output = Result<Vec<ListSummary>, BackendError>> + Send;
}

/// Something that can summarize a page. Never fails; unknown pages come back
/// as empty metadata.
pub trait MetadataSource {
    fn fetch_metadata(&self, address: &str) -> impl Future<Output = UrlMetadata> + Send;
}
