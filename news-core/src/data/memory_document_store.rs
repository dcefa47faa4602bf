use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data::auth::Identity;
use crate::data::document_store::{
    Direction, Document, DocumentStore, FieldOp, Fields, Snapshot, Subscription,
    is_server_timestamp,
};
use crate::domain::article::now;
use crate::domain::error::StoreError;

type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot, StoreError>>;

struct Subscriber {
    order_field: String,
    direction: Direction,
    tx: SnapshotSender,
}

#[derive(Default)]
struct Collection {
    docs: Vec<Document>,
    subscribers: Vec<Subscriber>,
}

impl Collection {
    fn snapshot(&self, order_field: &str, direction: Direction) -> Snapshot {
        let mut docs = self.docs.clone();
        docs.sort_by(|a, b| compare_by_field(a, b, order_field, direction));
        docs
    }

    fn publish(&mut self) {
        let before = self.subscribers.len();
        let mut live = Vec::with_capacity(before);
        for sub in self.subscribers.drain(..) {
            let snapshot = {
                let mut docs = self.docs.clone();
                docs.sort_by(|a, b| compare_by_field(a, b, &sub.order_field, sub.direction));
                docs
            };
            if sub.tx.send(Ok(snapshot)).is_ok() {
                live.push(sub);
            }
        }
        if live.len() < before {
            debug!(dropped = before - live.len(), "pruned closed subscriptions");
        }
        self.subscribers = live;
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.docs.iter_mut().find(|d| d.id == id)
    }
}

/// Document store kept in process memory. Every write is applied under one
/// lock and pushes a fresh ordered snapshot to each live subscriber.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
        info!(offline, "document store connectivity changed");
    }

    /// Places a document as-is, bypassing auth and sentinels. Used to seed fixtures.
    pub fn put(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        let coll = collections.entry(collection.to_string()).or_default();
        match coll.find_mut(id) {
            Some(doc) => doc.fields = fields,
            None => coll.docs.push(Document {
                id: id.to_string(),
                fields,
            }),
        }
        coll.publish();
        Ok(())
    }

    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.lock().ok()?;
        collections
            .get(collection)?
            .docs
            .iter()
            .find(|d| d.id == id)
            .cloned()
    }

    /// Delivers `error` to every subscriber of `collection`.
    pub fn fail_subscriptions(&self, collection: &str, error: &str) -> Result<(), StoreError> {
        let mut collections = self.lock()?;
        if let Some(coll) = collections.get_mut(collection) {
            coll.subscribers.retain(|sub| {
                sub.tx
                    .send(Err(StoreError::Unavailable(error.to_string())))
                    .is_ok()
            });
        }
        Ok(())
    }

    pub fn subscriber_count(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .ok()
            .and_then(|c| {
                c.get(collection)
                    .map(|coll| coll.subscribers.iter().filter(|s| !s.tx.is_closed()).count())
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Storage("document store lock poisoned".into()))
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("document store is offline".into()));
        }
        Ok(())
    }
}

fn authorize(identity: &Identity) -> Result<(), StoreError> {
    if identity.uid.trim().is_empty() {
        return Err(StoreError::PermissionDenied);
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut collections = self.lock()?;
        let coll = collections.entry(collection.to_string()).or_default();

        // Initial snapshot goes out before any later write.
        let _ = tx.send(Ok(coll.snapshot(order_field, direction)));
        coll.subscribers.push(Subscriber {
            order_field: order_field.to_string(),
            direction,
            tx,
        });
        debug!(collection, order_field, "subscription opened");
        Ok(Subscription::new(rx))
    }

    async fn insert(
        &self,
        identity: &Identity,
        collection: &str,
        mut fields: Fields,
    ) -> Result<String, StoreError> {
        self.ensure_online()?;
        authorize(identity)?;

        let stamp = now().timestamp_millis();
        for value in fields.values_mut() {
            resolve_sentinels(value, stamp);
        }

        let id = Uuid::new_v4().simple().to_string();
        let mut collections = self.lock()?;
        let coll = collections.entry(collection.to_string()).or_default();
        coll.docs.push(Document {
            id: id.clone(),
            fields,
        });
        coll.publish();

        info!(collection, doc_id = %id, uid = %identity.uid, "document inserted");
        Ok(id)
    }

    async fn update_field(
        &self,
        identity: &Identity,
        collection: &str,
        id: &str,
        field: &str,
        op: FieldOp,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        authorize(identity)?;

        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let stamp = now().timestamp_millis();

        let mut collections = self.lock()?;
        let coll = collections.get_mut(collection).ok_or_else(not_found)?;
        let doc = coll.find_mut(id).ok_or_else(not_found)?;
        let changed = apply_op(&mut doc.fields, field, op, stamp)?;
        if changed {
            coll.publish();
        }

        debug!(collection, doc_id = %id, field, changed, "field updated");
        Ok(())
    }
}

/// Applies one atomic op. Returns false when the document did not change.
fn apply_op(fields: &mut Fields, field: &str, op: FieldOp, stamp: i64) -> Result<bool, StoreError> {
    match op {
        FieldOp::Increment(by) => {
            let next = match fields.get(field) {
                None | Some(Value::Null) => Value::from(by),
                Some(current) => {
                    if let Some(n) = current.as_i64() {
                        let sum = n.checked_add(by).ok_or_else(|| {
                            StoreError::Storage(format!("increment on {field} overflows"))
                        })?;
                        Value::from(sum)
                    } else if let Some(f) = current.as_f64() {
                        Value::from(f + by as f64)
                    } else {
                        warn!(field, "increment on non-numeric field");
                        return Err(StoreError::Storage(format!("field {field} is not numeric")));
                    }
                }
            };
            fields.insert(field.to_string(), next);
            Ok(true)
        }
        FieldOp::AppendUnique(mut value) => {
            resolve_sentinels(&mut value, stamp);
            let slot = fields
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot
                .as_array_mut()
                .ok_or_else(|| StoreError::Storage(format!("field {field} is not an array")))?;
            if items.contains(&value) {
                return Ok(false);
            }
            items.push(value);
            Ok(true)
        }
    }
}

fn resolve_sentinels(value: &mut Value, stamp: i64) {
    if is_server_timestamp(value) {
        *value = Value::from(stamp);
        return;
    }
    match value {
        Value::Array(items) => items.iter_mut().for_each(|v| resolve_sentinels(v, stamp)),
        Value::Object(map) => map.values_mut().for_each(|v| resolve_sentinels(v, stamp)),
        _ => {}
    }
}

enum OrderKey<'a> {
    Number(f64),
    Text(&'a str),
}

fn order_key<'a>(doc: &'a Document, field: &str) -> Option<OrderKey<'a>> {
    match doc.fields.get(field)? {
        Value::Number(n) => n.as_f64().map(OrderKey::Number),
        Value::String(s) => Some(OrderKey::Text(s)),
        _ => None,
    }
}

/// Orders by one field; documents missing it sort last in either direction.
fn compare_by_field(a: &Document, b: &Document, field: &str, direction: Direction) -> Ordering {
    match (order_key(a, field), order_key(b, field)) {
        (Some(x), Some(y)) => {
            let ord = match (x, y) {
                (OrderKey::Number(x), OrderKey::Number(y)) => {
                    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
                }
                (OrderKey::Text(x), OrderKey::Text(y)) => x.cmp(y),
                (OrderKey::Number(_), OrderKey::Text(_)) => Ordering::Less,
                (OrderKey::Text(_), OrderKey::Number(_)) => Ordering::Greater,
            };
            match direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
