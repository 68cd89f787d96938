use crate::infrastructure::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub type FieldMap = Map<String, Value>;
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: FieldMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    SetMerge { path: String, fields: FieldMap },
    Delete { path: String },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::SetMerge { path, .. } => path,
            WriteOp::Delete { path } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_merge(&mut self, path: impl Into<String>, fields: FieldMap) {
        self.ops.push(WriteOp::SetMerge {
            path: path.into(),
            fields,
        });
    }

    pub fn delete(&mut self, path: impl Into<String>) {
        self.ops.push(WriteOp::Delete { path: path.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[derive(Debug)]
pub struct SubscriptionHandle {
    active: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub(crate) fn new(active: Arc<AtomicBool>) -> Self {
        Self { active }
    }

    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Option<FieldMap>, StoreError>;
    async fn set_merge(&self, path: &str, fields: FieldMap) -> Result<(), StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
    async fn list_collection(&self, path: &str, order_by: &str)
    -> Result<Vec<Document>, StoreError>;
    fn subscribe(
        &self,
        path: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError>;
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

struct Listener {
    path: String,
    active: Arc<AtomicBool>,
    on_change: ChangeListener,
}

#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: Mutex<Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn register(
        &self,
        path: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let active = Arc::new(AtomicBool::new(true));
        let mut listeners = self
            .listeners
            .lock()
            .map_err(|error| StoreError::Unavailable(format!("listener lock poisoned: {error}")))?;
        listeners.push(Listener {
            path: path.to_string(),
            active: Arc::clone(&active),
            on_change,
        });
        Ok(SubscriptionHandle::new(active))
    }

    // A listener fires when a touched path is the listener path itself or a
    // direct child of it (document and collection subscriptions respectively).
    // Each listener fires at most once per call.
    pub fn notify(&self, touched: &[String]) {
        let callbacks: Vec<ChangeListener> = {
            let Ok(mut listeners) = self.listeners.lock() else {
                return;
            };
            listeners.retain(|listener| listener.active.load(Ordering::SeqCst));
            listeners
                .iter()
                .filter(|listener| {
                    touched.iter().any(|path| {
                        path == &listener.path
                            || parent_collection(path) == Some(listener.path.as_str())
                    })
                })
                .map(|listener| Arc::clone(&listener.on_change))
                .collect()
        };

        for callback in callbacks {
            callback();
        }
    }
}

pub(crate) fn parent_collection(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

pub(crate) fn compare_order_field(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
    match (a, b) {
        (None, None) => CmpOrdering::Equal,
        (None, Some(_)) => CmpOrdering::Greater,
        (Some(_), None) => CmpOrdering::Less,
        (Some(left), Some(right)) => match (left, right) {
            (Value::Number(l), Value::Number(r)) => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .unwrap_or(CmpOrdering::Equal),
            (Value::String(l), Value::String(r)) => l.cmp(r),
            (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
            _ => left.to_string().cmp(&right.to_string()),
        },
    }
}
