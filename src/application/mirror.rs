use crate::domain::models::{DateEntry, DateSchedule, TemplateEntry, TimeInterval, Weekday};
use crate::infrastructure::document_store::{Document, DocumentStore, FieldMap, WriteBatch};
use crate::infrastructure::error::StoreError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

pub const ORDER_FIELD: &str = "startMinute";
const SOURCE_FIELD: &str = "source";
const ENABLED_FIELD: &str = "enabled";
const AD_HOC_SOURCE: &str = "ad_hoc";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("window seed failed for {} of {attempted} dates", failures.len())]
    PartialWindow {
        attempted: usize,
        failures: Vec<(String, String)>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileOutcome {
    pub enabled: bool,
    pub upserted: Vec<String>,
    pub deleted: Vec<String>,
    pub wrote_enabled: bool,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        !self.wrote_enabled && self.upserted.is_empty() && self.deleted.is_empty()
    }
}

pub(crate) fn template_doc_path(uid: &str, weekday: Weekday) -> String {
    format!("users/{uid}/routineTemplate/{weekday}")
}

pub(crate) fn template_entries_path(uid: &str, weekday: Weekday) -> String {
    format!("users/{uid}/routineTemplate/{weekday}/entries")
}

pub(crate) fn schedule_doc_path(uid: &str, date_iso: &str) -> String {
    format!("users/{uid}/dateSchedule/{date_iso}")
}

pub(crate) fn schedule_entries_path(uid: &str, date_iso: &str) -> String {
    format!("users/{uid}/dateSchedule/{date_iso}/entries")
}

fn schedule_entry_path(uid: &str, date_iso: &str, entry_id: &str) -> String {
    format!("users/{uid}/dateSchedule/{date_iso}/entries/{entry_id}")
}

pub struct MirrorService<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> MirrorService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn reconcile_date(
        &self,
        uid: &str,
        weekday: Weekday,
        date_iso: &str,
    ) -> Result<ReconcileOutcome, SyncError> {
        let template_doc = self.store.get(&template_doc_path(uid, weekday)).await?;
        let enabled = template_doc
            .as_ref()
            .and_then(|fields| fields.get(ENABLED_FIELD))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let schedule_path = schedule_doc_path(uid, date_iso);
        let schedule_doc = self.store.get(&schedule_path).await?;
        let current_enabled = schedule_doc
            .as_ref()
            .and_then(|fields| fields.get(ENABLED_FIELD))
            .and_then(Value::as_bool);

        let mut batch = WriteBatch::new();
        let wrote_enabled = current_enabled != Some(enabled);
        if wrote_enabled {
            batch.set_merge(&schedule_path, fields_of(&DateSchedule { enabled })?);
        }

        if !enabled {
            // Disabling clears every mirrored entry without reading the
            // template entries at all; ad-hoc entries stay.
            let existing = self
                .store
                .list_collection(&schedule_entries_path(uid, date_iso), ORDER_FIELD)
                .await?;
            let mut deleted = Vec::new();
            for document in existing {
                if is_mirrored_fields(&document.fields) {
                    batch.delete(schedule_entry_path(uid, date_iso, &document.id));
                    deleted.push(document.id);
                }
            }
            if !batch.is_empty() {
                self.store.commit(batch).await?;
            }
            return Ok(ReconcileOutcome {
                enabled,
                upserted: Vec::new(),
                deleted,
                wrote_enabled,
            });
        }

        let template_path = template_entries_path(uid, weekday);
        let schedule_path = schedule_entries_path(uid, date_iso);
        let (template_entries, existing) = tokio::join!(
            self.store.list_collection(&template_path, ORDER_FIELD),
            self.store.list_collection(&schedule_path, ORDER_FIELD),
        );
        let template_entries = template_entries?;
        let existing = existing?;

        let mut mirrored = Vec::with_capacity(template_entries.len());
        for document in &template_entries {
            let entry = template_entry_from_doc(document)?;
            entry.validate().map_err(SyncError::InvalidInterval)?;
            mirrored.push(DateEntry::mirrored_from(&entry));
        }

        let template_ids: HashSet<&str> = mirrored.iter().map(|entry| entry.id.as_str()).collect();
        let mut upserted = Vec::new();
        for entry in &mirrored {
            let desired = entry_fields(entry)?;
            let unchanged = existing
                .iter()
                .find(|document| document.id == entry.id)
                .is_some_and(|document| fields_subsume(&document.fields, &desired));
            if !unchanged {
                batch.set_merge(schedule_entry_path(uid, date_iso, &entry.id), desired);
                upserted.push(entry.id.clone());
            }
        }

        let mut deleted = Vec::new();
        for document in &existing {
            if is_mirrored_fields(&document.fields) && !template_ids.contains(document.id.as_str())
            {
                batch.delete(schedule_entry_path(uid, date_iso, &document.id));
                deleted.push(document.id.clone());
            }
        }

        if !batch.is_empty() {
            self.store.commit(batch).await?;
        }
        Ok(ReconcileOutcome {
            enabled,
            upserted,
            deleted,
            wrote_enabled,
        })
    }

    pub async fn list_day_entries(
        &self,
        uid: &str,
        date_iso: &str,
    ) -> Result<Vec<DateEntry>, SyncError> {
        let documents = self
            .store
            .list_collection(&schedule_entries_path(uid, date_iso), ORDER_FIELD)
            .await?;
        documents
            .iter()
            .map(date_entry_from_doc)
            .collect::<Result<Vec<_>, _>>()
    }

    pub async fn day_intervals(
        &self,
        uid: &str,
        date_iso: &str,
    ) -> Result<Vec<TimeInterval>, SyncError> {
        let entries = self.list_day_entries(uid, date_iso).await?;
        Ok(entries.iter().map(TimeInterval::from).collect())
    }
}

fn fields_of<T: Serialize>(value: &T) -> Result<FieldMap, SyncError> {
    match serde_json::to_value(value).map_err(StoreError::from)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))
        .into()),
    }
}

// The entry id lives in the document path, not its fields.
fn entry_fields(entry: &DateEntry) -> Result<FieldMap, SyncError> {
    let mut fields = fields_of(entry)?;
    fields.remove("id");
    Ok(fields)
}

fn template_entry_from_doc(document: &Document) -> Result<TemplateEntry, SyncError> {
    let mut fields = document.fields.clone();
    fields.insert("id".to_string(), Value::String(document.id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|error| {
        StoreError::InvalidDocument(format!("template entry '{}': {error}", document.id)).into()
    })
}

fn date_entry_from_doc(document: &Document) -> Result<DateEntry, SyncError> {
    let mut fields = document.fields.clone();
    fields.insert("id".to_string(), Value::String(document.id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|error| {
        StoreError::InvalidDocument(format!("date entry '{}': {error}", document.id)).into()
    })
}

fn is_mirrored_fields(fields: &FieldMap) -> bool {
    fields
        .get(SOURCE_FIELD)
        .and_then(Value::as_str)
        .map(|source| source != AD_HOC_SOURCE)
        .unwrap_or(true)
}

fn fields_subsume(existing: &FieldMap, desired: &FieldMap) -> bool {
    desired
        .iter()
        .all(|(key, value)| existing.get(key) == Some(value))
}
