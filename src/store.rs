//! Client-side mirror of the list being viewed or edited.
//!
//! The store holds at most one [`List`]. Every mutation goes to the backend
//! first and the mirror is replaced with the row the backend confirms, so the
//! in-memory list never runs ahead of storage.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::backend::{BackendError, ListBackend, MetadataSource};
use crate::metadata::cache::MetadataCache;
use crate::metadata::UrlMetadata;
use crate::model::{
    normalize_collaborator_email, normalize_optional_trimmed_string, normalize_url_input, List,
    ListDetails, ListSummary, NewList, UrlChange, UrlItem, UrlItemPatch,
};
use crate::slug;

pub const DEFAULT_METADATA_CONCURRENCY: usize = 4;

/// Input gathered by the "new list" form.
#[derive(Debug, Clone, Default)]
pub struct ListForm {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub first_url: Option<String>,
    pub owner_id: Option<String>,
}

pub struct ListStore<B> {
    backend: B,
    current: Option<List>,
    loading: bool,
    error: Option<String>,
    metadata: MetadataCache,
    metadata_concurrency: usize,
}

impl<B: ListBackend> ListStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            current: None,
            loading: false,
            error: None,
            metadata: MetadataCache::default(),
            metadata_concurrency: DEFAULT_METADATA_CONCURRENCY,
        }
    }

    pub fn with_metadata_cache(mut self, cache: MetadataCache) -> Self {
        self.metadata = cache;
        self
    }

    /// Upper bound on metadata requests in flight during [`Self::load_metadata`].
    pub fn with_metadata_concurrency(mut self, limit: usize) -> Self {
        self.metadata_concurrency = limit.max(1);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn current(&self) -> Option<&List> {
        self.current.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Replaces the mirror with the list stored under `slug`. On failure the
    /// mirror is cleared so later edits cannot target a stale list.
    pub async fn load(&mut self, slug: &str) -> Option<&List> {
        self.begin();
        let result = self.backend.fetch_by_slug(slug).await;
        if result.is_err() {
            self.current = None;
        }
        self.finish(result)
    }

    /// Creates an empty private list. A short random slug is generated when
    /// none is given.
    pub async fn create(&mut self, slug: Option<&str>) -> Option<&List> {
        let slug = match slug.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => value.to_string(),
            None => slug::generate(),
        };
        let new_list = NewList {
            slug: Some(slug),
            ..NewList::default()
        };

        self.begin();
        let result = self.backend.insert(new_list).await;
        self.finish(result)
    }

    pub async fn create_from_form(&mut self, form: ListForm) -> Option<&List> {
        let title = form.title.trim().to_string();
        if title.is_empty() {
            self.error = Some("Title is required".to_string());
            return None;
        }

        let mut urls = Vec::new();
        if let Some(raw) = form.first_url.as_deref().filter(|value| !value.trim().is_empty()) {
            match UrlItem::new(raw, None) {
                Ok(item) => urls.push(item),
                Err(err) => {
                    self.error = Some(err);
                    return None;
                }
            }
        }

        let slug = normalize_optional_trimmed_string(form.slug).unwrap_or_else(|| {
            let derived = slug::from_title(&title);
            if derived.is_empty() {
                slug::generate()
            } else {
                derived
            }
        });
        let new_list = NewList {
            slug: Some(slug),
            title: Some(title),
            description: normalize_optional_trimmed_string(form.description),
            is_public: form.is_public,
            owner_id: normalize_optional_trimmed_string(form.owner_id),
            urls,
        };

        self.begin();
        let result = self.backend.insert(new_list).await;
        self.finish(result)
    }

    pub async fn add_url(&mut self, url: &str, title: Option<String>) -> Option<&List> {
        let (list_id, version) = self.active()?;
        let item = match UrlItem::new(url, title) {
            Ok(item) => item,
            Err(err) => {
                self.error = Some(err);
                return None;
            }
        };

        self.submit(list_id, version, UrlChange::Add { item }).await
    }

    /// Adds `url` titled with whatever `source` reports for it. The fetched
    /// metadata is cached for later rendering.
    pub async fn add_url_with_metadata<M: MetadataSource>(
        &mut self,
        url: &str,
        source: &M,
    ) -> Option<&List> {
        self.active()?;
        if let Err(err) = normalize_url_input(url) {
            self.error = Some(err);
            return None;
        }

        let address = url.trim().to_string();
        let metadata = source.fetch_metadata(&address).await;
        let title = metadata.title.clone();
        self.metadata.insert(address.clone(), metadata);
        self.add_url(&address, title).await
    }

    pub async fn update_url(&mut self, item_id: &str, patch: UrlItemPatch) -> Option<&List> {
        let (list_id, version) = self.active()?;
        let change = UrlChange::Update {
            id: item_id.to_string(),
            patch,
        };
        self.submit(list_id, version, change).await
    }

    pub async fn remove_url(&mut self, item_id: &str) -> Option<&List> {
        let (list_id, version) = self.active()?;
        let change = UrlChange::Remove {
            id: item_id.to_string(),
        };
        self.submit(list_id, version, change).await
    }

    pub async fn toggle_favorite(&mut self, item_id: &str) -> Option<&List> {
        let current = self.current.as_ref()?;
        let Some(item) = current.url(item_id) else {
            warn!("toggle_favorite: no item {} in list {}", item_id, current.id);
            return None;
        };

        let patch = UrlItemPatch::favorite(!item.is_favorite);
        self.update_url(item_id, patch).await
    }

    pub async fn update_details(&mut self, details: ListDetails) -> Option<&List> {
        let (list_id, _) = self.active()?;
        self.begin();
        let result = self.backend.update_details(&list_id, details).await;
        self.finish(result)
    }

    pub async fn set_visibility(&mut self, is_public: bool) -> Option<&List> {
        let (list_id, _) = self.active()?;
        self.begin();
        let result = self.backend.set_visibility(&list_id, is_public).await;
        self.loading = false;
        match result {
            Ok(()) => {
                let current = self.current.as_mut()?;
                current.is_public = is_public;
                Some(&*current)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    pub async fn invite_collaborator(&mut self, email: &str) -> Option<&List> {
        let (list_id, _) = self.active()?;
        let email = match normalize_collaborator_email(email) {
            Ok(email) => email,
            Err(err) => {
                self.error = Some(err);
                return None;
            }
        };

        self.begin();
        let result = self.backend.add_collaborator(&list_id, &email).await;
        self.loading = false;
        match result {
            Ok(()) => {
                let current = self.current.as_mut()?;
                if !current.collaborators.contains(&email) {
                    current.collaborators.push(email);
                }
                Some(&*current)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Deletes the loaded list and clears the mirror. Returns whether a
    /// delete happened.
    pub async fn delete(&mut self) -> bool {
        let Some((list_id, _)) = self.active() else {
            return false;
        };

        self.begin();
        let result = self.backend.delete(&list_id).await;
        self.loading = false;
        match result {
            Ok(()) => {
                self.current = None;
                true
            }
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    pub async fn owned_lists(&mut self, owner_id: &str) -> Option<Vec<ListSummary>> {
        self.begin();
        let result = self.backend.lists_for_owner(Some(owner_id)).await;
        self.loading = false;
        match result {
            Ok(lists) => Some(lists),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Fetches metadata for every address in the loaded list that is not yet
    /// cached. Each distinct address is requested once, at most
    /// `metadata_concurrency` at a time. Returns how many were fetched.
    ///
    /// The cache grows to hold every address of the list, so a repeated call
    /// fetches nothing.
    pub async fn load_metadata<M: MetadataSource>(&mut self, source: &M) -> usize {
        let Some(list) = self.current.as_ref() else {
            return 0;
        };

        let mut seen = HashSet::new();
        let addresses: Vec<String> = list
            .urls
            .iter()
            .filter(|item| seen.insert(item.url.as_str()))
            .map(|item| item.url.clone())
            .collect();
        self.metadata.reserve(addresses.len());

        let pending: Vec<String> = addresses
            .into_iter()
            .filter(|address| !self.metadata.contains(address))
            .collect();
        if pending.is_empty() {
            return 0;
        }

        debug!(
            "fetching metadata for {} urls, {} at a time",
            pending.len(),
            self.metadata_concurrency
        );
        let fetched: Vec<(String, UrlMetadata)> = stream::iter(pending)
            .map(|address| async move {
                let metadata = source.fetch_metadata(&address).await;
                (address, metadata)
            })
            .buffered(self.metadata_concurrency)
            .collect()
            .await;

        let count = fetched.len();
        for (address, metadata) in fetched {
            self.metadata.insert(address, metadata);
        }
        count
    }

    pub fn metadata_for(&mut self, address: &str) -> Option<&UrlMetadata> {
        self.metadata.get(address)
    }

    fn active(&self) -> Option<(String, i64)> {
        self.current
            .as_ref()
            .filter(|list| !list.id.is_empty())
            .map(|list| (list.id.clone(), list.version))
    }

    async fn submit(&mut self, list_id: String, version: i64, change: UrlChange) -> Option<&List> {
        self.begin();
        let result = self
            .backend
            .apply_change(&list_id, Some(version), change)
            .await;
        self.finish(result)
    }

    fn begin(&mut self) {
        self.loading = true;
        self.error = None;
    }

    fn finish(&mut self, result: Result<List, BackendError>) -> Option<&List> {
        self.loading = false;
        match result {
            Ok(list) => {
                self.current = Some(list);
                self.current.as_ref()
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn fail(&mut self, err: BackendError) {
        warn!("list store operation failed: {}", err);
        self.error = Some(err.to_string());
    }
}
