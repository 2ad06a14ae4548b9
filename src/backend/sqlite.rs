use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::{BackendError, ListBackend};
use crate::model::{
    normalize_collaborator_email, normalize_optional_trimmed_string, List, ListDetails, ListSummary,
    NewList, UrlChange, UrlItem,
};
use crate::slug;

const LIST_COLUMNS: &str =
    "id, slug, title, description, urls, is_public, collaborators, owner_id, version, created_at";
const GENERATED_SLUG_ATTEMPTS: usize = 8;

/// `lists` row as stored: collections are JSON text, timestamps are
/// milliseconds.
struct StoredListRow {
    id: String,
    slug: String,
    title: Option<String>,
    description: Option<String>,
    urls: String,
    is_public: i64,
    collaborators: String,
    owner_id: Option<String>,
    version: i64,
    created_at: i64,
}

impl StoredListRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            slug: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            urls: row.get(4)?,
            is_public: row.get(5)?,
            collaborators: row.get(6)?,
            owner_id: row.get(7)?,
            version: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_list(self) -> Result<List, BackendError> {
        let urls: Vec<UrlItem> = serde_json::from_str(&self.urls)?;
        let collaborators: Vec<String> = serde_json::from_str(&self.collaborators)?;
        Ok(List {
            created_at: timestamp_from_millis(self.created_at)?,
            id: self.id,
            slug: self.slug,
            title: self.title,
            description: self.description,
            is_public: self.is_public != 0,
            collaborators,
            urls,
            owner_id: self.owner_id,
            version: self.version,
        })
    }

    fn into_summary(self) -> Result<ListSummary, BackendError> {
        let urls: Vec<serde_json::Value> = serde_json::from_str(&self.urls)?;
        Ok(ListSummary {
            created_at: timestamp_from_millis(self.created_at)?,
            id: self.id,
            slug: self.slug,
            title: self.title,
            description: self.description,
            is_public: self.is_public != 0,
            url_count: urls.len(),
        })
    }
}

fn timestamp_from_millis(millis: i64) -> Result<DateTime<Utc>, BackendError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BackendError::Invalid(format!("invalid stored timestamp: {}", millis)))
}

fn run_db_migrations(connection: &Connection) -> Result<(), BackendError> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS lists (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            title TEXT NULL,
            description TEXT NULL,
            urls TEXT NOT NULL DEFAULT '[]',
            is_public INTEGER NOT NULL DEFAULT 0,
            collaborators TEXT NOT NULL DEFAULT '[]',
            owner_id TEXT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lists_owner_created
            ON lists (owner_id, created_at DESC);
        "#,
    )?;
    Ok(())
}

fn load_list_by_slug(connection: &Connection, slug: &str) -> Result<List, BackendError> {
    let row = connection
        .query_row(
            &format!("SELECT {} FROM lists WHERE slug = ?1", LIST_COLUMNS),
            params![slug],
            StoredListRow::from_row,
        )
        .optional()?;
    match row {
        Some(row) => row.into_list(),
        None => Err(BackendError::NotFound(format!("list '{}' not found", slug))),
    }
}

fn load_list_in_tx(transaction: &Transaction<'_>, list_id: &str) -> Result<List, BackendError> {
    let row = transaction
        .query_row(
            &format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS),
            params![list_id],
            StoredListRow::from_row,
        )
        .optional()?;
    match row {
        Some(row) => row.into_list(),
        None => Err(BackendError::NotFound(format!("list {} not found", list_id))),
    }
}

fn slug_exists_in_tx(transaction: &Transaction<'_>, slug: &str) -> Result<bool, BackendError> {
    let exists = transaction
        .query_row("SELECT 1 FROM lists WHERE slug = ?1", params![slug], |row| {
            row.get::<_, i64>(0)
        })
        .optional()?;
    Ok(exists.is_some())
}

fn resolve_slug_in_tx(
    transaction: &Transaction<'_>,
    requested: Option<String>,
) -> Result<String, BackendError> {
    if let Some(requested) = normalize_optional_trimmed_string(requested) {
        slug::validate(&requested).map_err(BackendError::Invalid)?;
        if slug_exists_in_tx(transaction, &requested)? {
            return Err(BackendError::SlugTaken(format!(
                "slug '{}' is already taken",
                requested
            )));
        }
        return Ok(requested);
    }

    for _ in 0..GENERATED_SLUG_ATTEMPTS {
        let candidate = slug::generate();
        if !slug_exists_in_tx(transaction, &candidate)? {
            return Ok(candidate);
        }
        debug!("generated slug {} collided, retrying", candidate);
    }
    Err(BackendError::SlugTaken(
        "could not generate an unused slug".to_string(),
    ))
}

fn insert_list(connection: &mut Connection, new_list: NewList) -> Result<List, BackendError> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let slug = resolve_slug_in_tx(&transaction, new_list.slug)?;

    let mut urls = Vec::with_capacity(new_list.urls.len());
    for item in new_list.urls {
        UrlChange::Add { item }.apply(&mut urls)?;
    }

    let list_id = Uuid::new_v4().to_string();
    let now = Utc::now().timestamp_millis();
    transaction.execute(
        "INSERT INTO lists (
            id,
            slug,
            title,
            description,
            urls,
            is_public,
            collaborators,
            owner_id,
            version,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, '[]', ?7, 0, ?8, ?8)",
        params![
            &list_id,
            &slug,
            normalize_optional_trimmed_string(new_list.title),
            normalize_optional_trimmed_string(new_list.description),
            serde_json::to_string(&urls)?,
            new_list.is_public,
            normalize_optional_trimmed_string(new_list.owner_id),
            now
        ],
    )?;

    let list = load_list_in_tx(&transaction, &list_id)?;
    transaction.commit()?;
    info!("created list {} ({})", list.slug, list.id);
    Ok(list)
}

fn apply_change_in_db(
    connection: &mut Connection,
    list_id: &str,
    expected_version: Option<i64>,
    change: UrlChange,
) -> Result<List, BackendError> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut list = load_list_in_tx(&transaction, list_id)?;

    if let Some(expected) = expected_version {
        if expected != list.version {
            return Err(BackendError::Conflict(format!(
                "list {} is at version {}, expected {}",
                list_id, list.version, expected
            )));
        }
    }

    if !change.apply(&mut list.urls)? {
        return Ok(list);
    }

    transaction.execute(
        "UPDATE lists SET urls = ?1, version = version + 1, updated_at = ?2 WHERE id = ?3",
        params![
            serde_json::to_string(&list.urls)?,
            Utc::now().timestamp_millis(),
            list_id
        ],
    )?;
    let updated = load_list_in_tx(&transaction, list_id)?;
    transaction.commit()?;
    debug!("list {} now at version {}", updated.id, updated.version);
    Ok(updated)
}

fn update_details_in_db(
    connection: &mut Connection,
    list_id: &str,
    details: ListDetails,
) -> Result<List, BackendError> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut list = load_list_in_tx(&transaction, list_id)?;
    details.apply_to(&mut list);

    transaction.execute(
        "UPDATE lists SET title = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        params![
            list.title.as_deref(),
            list.description.as_deref(),
            Utc::now().timestamp_millis(),
            list_id
        ],
    )?;
    let updated = load_list_in_tx(&transaction, list_id)?;
    transaction.commit()?;
    Ok(updated)
}

fn add_collaborator_in_db(
    connection: &mut Connection,
    list_id: &str,
    email: &str,
) -> Result<(), BackendError> {
    let email = normalize_collaborator_email(email).map_err(BackendError::Invalid)?;
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut collaborators = load_list_in_tx(&transaction, list_id)?.collaborators;
    if collaborators.contains(&email) {
        return Ok(());
    }
    collaborators.push(email);

    transaction.execute(
        "UPDATE lists SET collaborators = ?1, updated_at = ?2 WHERE id = ?3",
        params![
            serde_json::to_string(&collaborators)?,
            Utc::now().timestamp_millis(),
            list_id
        ],
    )?;
    transaction.commit()?;
    Ok(())
}

fn set_visibility_in_db(
    connection: &Connection,
    list_id: &str,
    is_public: bool,
) -> Result<(), BackendError> {
    let affected_rows = connection.execute(
        "UPDATE lists SET is_public = ?1, updated_at = ?2 WHERE id = ?3",
        params![is_public, Utc::now().timestamp_millis(), list_id],
    )?;
    if affected_rows == 0 {
        return Err(BackendError::NotFound(format!("list {} not found", list_id)));
    }
    Ok(())
}

fn delete_list_in_db(connection: &Connection, list_id: &str) -> Result<(), BackendError> {
    let affected_rows = connection.execute("DELETE FROM lists WHERE id = ?1", params![list_id])?;
    if affected_rows == 0 {
        return Err(BackendError::NotFound(format!("list {} not found", list_id)));
    }
    info!("deleted list {}", list_id);
    Ok(())
}

fn lists_for_owner_in_db(
    connection: &Connection,
    owner_id: Option<&str>,
) -> Result<Vec<ListSummary>, BackendError> {
    let mut stmt = connection.prepare(&format!(
        "SELECT {} FROM lists
         WHERE ?1 IS NULL OR owner_id = ?1
         ORDER BY created_at DESC, rowid DESC",
        LIST_COLUMNS
    ))?;
    let rows = stmt
        .query_map(params![owner_id], StoredListRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(StoredListRow::into_summary).collect()
}

/// SQLite-backed list rows. Clones share one connection; every operation runs
/// on the blocking pool.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let connection = Connection::open(path)?;
        info!("opened list database at {}", path.display());
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, BackendError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self, BackendError> {
        run_db_migrations(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn blocking<T, F>(&self, operation: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, BackendError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| BackendError::Task("list database lock poisoned".to_string()))?;
            operation(&mut guard)
        })
        .await
        .map_err(|err| BackendError::Task(err.to_string()))?
    }
}

impl ListBackend for Database {
    async fn fetch_by_slug(&self, slug: &str) -> Result<List, BackendError> {
        let slug = slug.to_string();
        self.blocking(move |connection| load_list_by_slug(connection, &slug))
            .await
    }

    async fn insert(&self, new_list: NewList) -> Result<List, BackendError> {
        self.blocking(move |connection| insert_list(connection, new_list))
            .await
    }

    async fn apply_change(
        &self,
        list_id: &str,
        expected_version: Option<i64>,
        change: UrlChange,
    ) -> Result<List, BackendError> {
        let list_id = list_id.to_string();
        self.blocking(move |connection| {
            apply_change_in_db(connection, &list_id, expected_version, change)
        })
        .await
    }

    async fn update_details(&self, list_id: &str, details: ListDetails) -> Result<List, BackendError> {
        let list_id = list_id.to_string();
        self.blocking(move |connection| update_details_in_db(connection, &list_id, details))
            .await
    }

    async fn delete(&self, list_id: &str) -> Result<(), BackendError> {
        let list_id = list_id.to_string();
        self.blocking(move |connection| delete_list_in_db(connection, &list_id))
            .await
    }

    async fn add_collaborator(&self, list_id: &str, email: &str) -> Result<(), BackendError> {
        let list_id = list_id.to_string();
        let email = email.to_string();
        self.blocking(move |connection| add_collaborator_in_db(connection, &list_id, &email))
            .await
    }

    async fn set_visibility(&self, list_id: &str, is_public: bool) -> Result<(), BackendError> {
        let list_id = list_id.to_string();
        self.blocking(move |connection| set_visibility_in_db(connection, &list_id, is_public))
            .await
    }

    async fn lists_for_owner(&self, owner_id: Option<&str>) -> Result<Vec<ListSummary>, BackendError> {
        let owner_id = owner_id.map(str::to_string);
        self.blocking(move |connection| lists_for_owner_in_db(connection, owner_id.as_deref()))
            .await
    }
}
