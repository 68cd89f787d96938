use crate::infrastructure::document_store::{
    ChangeListener, Document, DocumentStore, FieldMap, ListenerRegistry, SubscriptionHandle,
    WriteBatch, WriteOp, compare_order_field,
};
use crate::infrastructure::error::StoreError;
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::path::{Path, PathBuf};

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub struct SqliteDocumentStore {
    db_path: PathBuf,
    registry: ListenerRegistry,
}

impl SqliteDocumentStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        let connection = Connection::open(&db_path)?;
        connection.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            db_path,
            registry: ListenerRegistry::default(),
        })
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Connection::open(&self.db_path).map_err(StoreError::from)
    }

    fn parse_fields(path: &str, raw: &str) -> Result<FieldMap, StoreError> {
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::InvalidDocument(format!(
                "document '{path}' is not a JSON object"
            ))),
        }
    }

    fn merge_into(connection: &Connection, path: &str, fields: &FieldMap) -> Result<(), StoreError> {
        let existing: Option<String> = connection
            .query_row(
                "SELECT fields FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;

        let mut merged = match existing {
            Some(raw) => Self::parse_fields(path, &raw)?,
            None => FieldMap::new(),
        };
        for (key, value) in fields {
            merged.insert(key.clone(), value.clone());
        }

        connection.execute(
            "INSERT INTO documents (path, fields) VALUES (?1, ?2)
             ON CONFLICT(path) DO UPDATE SET fields = excluded.fields",
            params![path, Value::Object(merged).to_string()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<FieldMap>, StoreError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT fields FROM documents WHERE path = ?1",
                params![path],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| Self::parse_fields(path, &raw)).transpose()
    }

    async fn set_merge(&self, path: &str, fields: FieldMap) -> Result<(), StoreError> {
        let connection = self.connect()?;
        Self::merge_into(&connection, path, &fields)?;
        self.registry.notify(&[path.to_string()]);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM documents WHERE path = ?1", params![path])?;
        self.registry.notify(&[path.to_string()]);
        Ok(())
    }

    async fn list_collection(
        &self,
        path: &str,
        order_by: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT path, fields FROM documents
             WHERE path LIKE ?1 || '/%' AND path NOT LIKE ?1 || '/%/%'",
        )?;
        let rows = statement.query_map(params![path], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let prefix_len = path.len() + 1;
        let mut documents = Vec::new();
        for row in rows {
            let (doc_path, raw) = row?;
            documents.push(Document {
                id: doc_path[prefix_len..].to_string(),
                fields: Self::parse_fields(&doc_path, &raw)?,
            });
        }

        documents.sort_by(|a, b| {
            compare_order_field(a.fields.get(order_by), b.fields.get(order_by))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(documents)
    }

    fn subscribe(
        &self,
        path: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        self.registry.register(path, on_change)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        let ops = batch.into_ops();
        let mut touched: Vec<String> = Vec::with_capacity(ops.len());
        for op in &ops {
            match op {
                WriteOp::SetMerge { path, fields } => {
                    Self::merge_into(&transaction, path, fields)?;
                }
                WriteOp::Delete { path } => {
                    transaction.execute("DELETE FROM documents WHERE path = ?1", params![path])?;
                }
            }
            if !touched.iter().any(|path| path == op.path()) {
                touched.push(op.path().to_string());
            }
        }
        transaction.commit()?;
        self.registry.notify(&touched);
        Ok(())
    }
}
