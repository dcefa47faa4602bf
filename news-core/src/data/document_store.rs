use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;

use crate::data::auth::Identity;
use crate::domain::error::StoreError;

/// Field values keyed by name, as stored in one document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Full point-in-time copy of a collection, already ordered.
pub type Snapshot = Vec<Document>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Single-field write applied by the store itself, so concurrent writers
/// never read-modify-write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Increment(i64),
    AppendUnique(Value),
}

/// Placeholder resolved to the store's clock (epoch millis) when written.
pub fn server_timestamp() -> Value {
    json!({ ".sv": "timestamp" })
}

pub fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|o| o.len() == 1 && o.get(".sv").and_then(Value::as_str) == Some("timestamp"))
}

/// Live query over one collection. Dropping it (or calling
/// [`Subscription::unsubscribe`]) stops delivery.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Snapshot, StoreError>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Result<Snapshot, StoreError>> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn subscribe(
        &self,
        collection: &str,
        order_field: &str,
        direction: Direction,
    ) -> Result<Subscription, StoreError>;

    async fn insert(
        &self,
        identity: &Identity,
        collection: &str,
        fields: Fields,
    ) -> Result<String, StoreError>;

    async fn update_field(
        &self,
        identity: &Identity,
        collection: &str,
        id: &str,
        field: &str,
        op: FieldOp,
    ) -> Result<(), StoreError>;
}
