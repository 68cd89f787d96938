use crate::infrastructure::document_store::{
    ChangeListener, Document, DocumentStore, FieldMap, ListenerRegistry, SubscriptionHandle,
    WriteBatch, WriteOp, compare_order_field,
};
use crate::infrastructure::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: Mutex<BTreeMap<String, FieldMap>>,
    registry: ListenerRegistry,
    write_ops: AtomicUsize,
    commits: AtomicUsize,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op_count(&self) -> usize {
        self.write_ops.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn document_count(&self) -> usize {
        self.documents
            .lock()
            .map(|documents| documents.len())
            .unwrap_or(0)
    }

    fn lock_documents(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, FieldMap>>, StoreError> {
        self.documents
            .lock()
            .map_err(|error| StoreError::Unavailable(format!("document lock poisoned: {error}")))
    }

    fn apply(documents: &mut BTreeMap<String, FieldMap>, op: &WriteOp) {
        match op {
            WriteOp::SetMerge { path, fields } => {
                let target = documents.entry(path.clone()).or_default();
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
            WriteOp::Delete { path } => {
                documents.remove(path);
            }
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &str) -> Result<Option<FieldMap>, StoreError> {
        Ok(self.lock_documents()?.get(path).cloned())
    }

    async fn set_merge(&self, path: &str, fields: FieldMap) -> Result<(), StoreError> {
        let op = WriteOp::SetMerge {
            path: path.to_string(),
            fields,
        };
        {
            let mut documents = self.lock_documents()?;
            Self::apply(&mut documents, &op);
        }
        self.write_ops.fetch_add(1, Ordering::SeqCst);
        self.registry.notify(&[path.to_string()]);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        {
            let mut documents = self.lock_documents()?;
            documents.remove(path);
        }
        self.write_ops.fetch_add(1, Ordering::SeqCst);
        self.registry.notify(&[path.to_string()]);
        Ok(())
    }

    async fn list_collection(
        &self,
        path: &str,
        order_by: &str,
    ) -> Result<Vec<Document>, StoreError> {
        let prefix = format!("{path}/");
        let mut documents: Vec<Document> = self
            .lock_documents()?
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(key, fields)| Document {
                id: key[prefix.len()..].to_string(),
                fields: fields.clone(),
            })
            .collect();

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

        let ops = batch.into_ops();
        let mut touched: Vec<String> = Vec::with_capacity(ops.len());
        {
            let mut documents = self.lock_documents()?;
            for op in &ops {
                Self::apply(&mut documents, op);
                if !touched.iter().any(|path| path == op.path()) {
                    touched.push(op.path().to_string());
                }
            }
        }
        self.write_ops.fetch_add(ops.len(), Ordering::SeqCst);
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.registry.notify(&touched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn fields(value: serde_json::Value) -> FieldMap {
        value.as_object().expect("object literal").clone()
    }

    #[tokio::test]
    async fn set_merge_preserves_unrelated_fields() {
        let store = InMemoryDocumentStore::new();
        store
            .set_merge("users/u1/dateSchedule/2026-02-20", fields(json!({"enabled": true, "note": "keep"})))
            .await
            .expect("seed");
        store
            .set_merge("users/u1/dateSchedule/2026-02-20", fields(json!({"enabled": false})))
            .await
            .expect("merge");

        let doc = store
            .get("users/u1/dateSchedule/2026-02-20")
            .await
            .expect("get")
            .expect("document exists");
        assert_eq!(doc.get("enabled"), Some(&json!(false)));
        assert_eq!(doc.get("note"), Some(&json!("keep")));
    }

    #[tokio::test]
    async fn list_collection_returns_direct_children_ordered() {
        let store = InMemoryDocumentStore::new();
        let base = "users/u1/dateSchedule/2026-02-20/entries";
        store
            .set_merge(&format!("{base}/late"), fields(json!({"startMinute": 600})))
            .await
            .expect("seed late");
        store
            .set_merge(&format!("{base}/early"), fields(json!({"startMinute": 60})))
            .await
            .expect("seed early");
        // Not a direct child; must not be listed.
        store
            .set_merge(&format!("{base}/early/nested"), fields(json!({"startMinute": 0})))
            .await
            .expect("seed nested");

        let children = store.list_collection(base, "startMinute").await.expect("list");
        let ids: Vec<&str> = children.iter().map(|doc| doc.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[tokio::test]
    async fn commit_applies_all_ops_and_counts_once() {
        let store = InMemoryDocumentStore::new();
        store
            .set_merge("col/a", fields(json!({"v": 1})))
            .await
            .expect("seed");

        let mut batch = WriteBatch::new();
        batch.set_merge("col/b", fields(json!({"v": 2})));
        batch.delete("col/a");
        store.commit(batch).await.expect("commit");

        assert!(store.get("col/a").await.expect("get").is_none());
        assert!(store.get("col/b").await.expect("get").is_some());
        assert_eq!(store.commit_count(), 1);
        assert_eq!(store.write_op_count(), 3);
    }

    #[tokio::test]
    async fn empty_commit_is_a_no_op() {
        let store = InMemoryDocumentStore::new();
        store.commit(WriteBatch::new()).await.expect("commit");
        assert_eq!(store.commit_count(), 0);
        assert_eq!(store.write_op_count(), 0);
    }

    #[tokio::test]
    async fn commit_notifies_collection_subscribers() {
        let store = InMemoryDocumentStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = store
            .subscribe(
                "col",
                Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .expect("subscribe");

        let mut batch = WriteBatch::new();
        batch.set_merge("col/a", fields(json!({"v": 1})));
        batch.set_merge("col/b", fields(json!({"v": 2})));
        store.commit(batch).await.expect("commit");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.unsubscribe();
        store
            .set_merge("col/c", fields(json!({"v": 3})))
            .await
            .expect("set");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
