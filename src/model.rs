use std::cmp::Reverse;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// One bookmarked address nested inside a [`List`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlItem {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reminder: Option<NaiveDate>,
    #[serde(default)]
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
}

impl UrlItem {
    /// Validates `address` and keeps it as typed, minus surrounding
    /// whitespace.
    pub fn new(address: &str, title: Option<String>) -> Result<Self, String> {
        normalize_url_input(address)?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            url: address.trim().to_string(),
            title: normalize_optional_trimmed_string(title),
            description: None,
            notes: None,
            reminder: None,
            is_favorite: false,
            created_at: Utc::now(),
        })
    }

    fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub urls: Vec<UrlItem>,
    #[serde(default)]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Revision of `urls`; bumped by one for every accepted [`UrlChange`].
    pub version: i64,
}

impl List {
    pub fn url(&self, id: &str) -> Option<&UrlItem> {
        self.urls.iter().find(|item| item.id == id)
    }

    /// Reordered view of the collection. The stored order is never touched.
    pub fn sorted_urls(&self, sort: UrlSort) -> Vec<&UrlItem> {
        let mut view: Vec<&UrlItem> = self.urls.iter().collect();
        match sort {
            UrlSort::Insertion => {}
            UrlSort::Newest => view.sort_by_key(|item| Reverse(item.created_at)),
            UrlSort::Oldest => view.sort_by_key(|item| item.created_at),
            UrlSort::Title => view.sort_by_cached_key(|item| item.display_title().to_lowercase()),
            UrlSort::FavoritesFirst => view.sort_by_key(|item| !item.is_favorite),
        }
        view
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrlSort {
    #[default]
    Insertion,
    Newest,
    Oldest,
    Title,
    FavoritesFirst,
}

/// Row of the owner listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub id: String,
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_public: bool,
    pub url_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewList {
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub urls: Vec<UrlItem>,
}

/// Partial update of the list's own fields. An absent field is left alone,
/// an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDetails {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl ListDetails {
    pub fn apply_to(self, list: &mut List) {
        if let Some(title) = self.title {
            list.title = normalize_optional_trimmed_string(title);
        }
        if let Some(description) = self.description {
            list.description = normalize_optional_trimmed_string(description);
        }
    }
}

/// Partial update of one [`UrlItem`]. Same absent/`null` convention as
/// [`ListDetails`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub reminder: Option<Option<NaiveDate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
}

impl UrlItemPatch {
    pub fn favorite(is_favorite: bool) -> Self {
        Self {
            is_favorite: Some(is_favorite),
            ..Self::default()
        }
    }

    fn apply_to(self, item: &mut UrlItem) -> Result<(), ChangeError> {
        if let Some(raw) = self.url {
            normalize_url_input(&raw).map_err(ChangeError::InvalidUrl)?;
            item.url = raw.trim().to_string();
        }
        if let Some(title) = self.title {
            item.title = normalize_optional_trimmed_string(title);
        }
        if let Some(description) = self.description {
            item.description = normalize_optional_trimmed_string(description);
        }
        if let Some(notes) = self.notes {
            item.notes = normalize_optional_trimmed_string(notes);
        }
        if let Some(reminder) = self.reminder {
            item.reminder = reminder;
        }
        if let Some(is_favorite) = self.is_favorite {
            item.is_favorite = is_favorite;
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error("url item {0} already exists in this list")]
    DuplicateId(String),
    #[error("url item {0} not found in this list")]
    UnknownItem(String),
    #[error("{0}")]
    InvalidUrl(String),
}

/// A targeted change to a list's URL collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum UrlChange {
    Add { item: UrlItem },
    Update { id: String, patch: UrlItemPatch },
    Remove { id: String },
}

impl UrlChange {
    /// Applies the change in place and reports whether the collection moved.
    /// Items other than the target keep their position and contents.
    pub fn apply(self, urls: &mut Vec<UrlItem>) -> Result<bool, ChangeError> {
        match self {
            UrlChange::Add { mut item } => {
                if item.id.trim().is_empty() {
                    item.id = Uuid::new_v4().to_string();
                }
                if urls.iter().any(|existing| existing.id == item.id) {
                    return Err(ChangeError::DuplicateId(item.id));
                }
                normalize_url_input(&item.url).map_err(ChangeError::InvalidUrl)?;
                item.url = item.url.trim().to_string();
                urls.push(item);
                Ok(true)
            }
            UrlChange::Update { id, patch } => {
                let Some(item) = urls.iter_mut().find(|item| item.id == id) else {
                    return Err(ChangeError::UnknownItem(id));
                };
                patch.apply_to(item)?;
                Ok(true)
            }
            UrlChange::Remove { id } => {
                let before = urls.len();
                urls.retain(|item| item.id != id);
                Ok(urls.len() != before)
            }
        }
    }
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn is_http_or_https_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

pub fn normalize_url_input(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("url cannot be empty".to_string());
    }

    let parsed = Url::parse(trimmed).map_err(|err| format!("invalid url: {}", err))?;
    if !is_http_or_https_url(&parsed) {
        return Err("only http:// and https:// URLs are supported".to_string());
    }
    if parsed.host_str().is_none() {
        return Err("url must include a host".to_string());
    }
    Ok(parsed)
}

pub fn normalize_collaborator_email(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("email cannot be empty".to_string());
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err("email cannot contain whitespace".to_string());
    }
    match trimmed.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(trimmed.to_string())
        }
        _ => Err(format!("invalid email address: {}", trimmed)),
    }
}

pub(crate) fn normalize_optional_trimmed_string(value: Option<String>) -> Option<String> {
    value
        .map(|candidate| candidate.trim().to_string())
        .filter(|candidate| !candidate.is_empty())
}

pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
