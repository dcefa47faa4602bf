use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::data::article_store::ArticleStore;
use crate::data::auth::{AuthProvider, Identity};
use crate::data::document_store::{
    Direction, Document, DocumentStore, FieldOp, Fields, Snapshot, Subscription,
    server_timestamp,
};
use crate::domain::article::{Article, NewArticle, NewComment};
use crate::domain::error::StoreError;

const ORDER_FIELD: &str = "createdAt";

/// Decoded view over a collection subscription.
pub struct ArticleFeed {
    subscription: Subscription,
}

impl ArticleFeed {
    pub fn new(subscription: Subscription) -> Self {
        Self { subscription }
    }

    pub async fn next(&mut self) -> Option<Result<Vec<Article>, StoreError>> {
        let snapshot = self.subscription.next().await?;
        Some(snapshot.map(decode_snapshot))
    }

    pub fn close(self) {
        self.subscription.unsubscribe();
    }
}

/// Documents that do not decode as articles are skipped.
pub fn decode_snapshot(snapshot: Snapshot) -> Vec<Article> {
    snapshot
        .into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match decode_document(doc) {
                Ok(article) => Some(article),
                Err(e) => {
                    warn!(doc_id = %id, error = %e, "skipping malformed article document");
                    None
                }
            }
        })
        .collect()
}

fn decode_document(doc: Document) -> Result<Article, serde_json::Error> {
    let mut fields = doc.fields;
    fields.insert("id".to_string(), Value::String(doc.id));
    serde_json::from_value(Value::Object(fields))
}

/// Adapter over a remote document collection with anonymous auth.
pub struct RemoteStore<D: DocumentStore> {
    docs: Arc<D>,
    auth: Arc<dyn AuthProvider>,
    collection: String,
}

impl<D> RemoteStore<D>
where
    D: DocumentStore + 'static,
{
    /// Signs in anonymously when no identity is present yet.
    pub async fn connect(
        docs: Arc<D>,
        auth: Arc<dyn AuthProvider>,
        collection: impl Into<String>,
    ) -> Result<Self, StoreError> {
        if auth.current_user().is_none() {
            auth.sign_in_anonymously().await?;
        }
        Ok(Self::new(docs, auth, collection))
    }

    pub fn new(docs: Arc<D>, auth: Arc<dyn AuthProvider>, collection: impl Into<String>) -> Self {
        Self {
            docs,
            auth,
            collection: collection.into(),
        }
    }

    /// Current identity, signing in anonymously again once it has lapsed.
    async fn identity(&self) -> Result<Identity, StoreError> {
        if let Some(identity) = self.auth.current_user() {
            return Ok(identity);
        }
        warn!(collection = %self.collection, "signed out, signing in anonymously again");
        self.auth.sign_in_anonymously().await
    }

    async fn open(&self) -> Result<Subscription, StoreError> {
        self.docs
            .subscribe(&self.collection, ORDER_FIELD, Direction::Descending)
            .await
    }
}

fn article_fields(article: &NewArticle) -> Fields {
    let value = json!({
        "title": article.title,
        "body": article.body,
        "author": article.author,
        "category": article.category,
        "likes": 0,
        "comments": [],
        "createdAt": article.created_at.timestamp_millis(),
    });
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

#[async_trait]
impl<D> ArticleStore for RemoteStore<D>
where
    D: DocumentStore + 'static,
{
    async fn load(&self) -> Result<Vec<Article>, StoreError> {
        let mut subscription = self.open().await?;
        let first = subscription
            .next()
            .await
            .ok_or_else(|| StoreError::Unavailable("subscription closed".into()))??;
        subscription.unsubscribe();
        Ok(decode_snapshot(first))
    }

    async fn subscribe(&self) -> Result<Option<ArticleFeed>, StoreError> {
        let subscription = self.open().await?;
        info!(collection = %self.collection, "article feed subscribed");
        Ok(Some(ArticleFeed::new(subscription)))
    }

    #[instrument(skip(self, article), fields(collection = %self.collection))]
    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        let identity = self.identity().await?;
        let id = self
            .docs
            .insert(&identity, &self.collection, article_fields(&article))
            .await
            .inspect_err(|e| error!("failed to insert article: {}", e))?;
        info!(article_id = %id, "article created");
        Ok(article.into_article(id))
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn like(&self, id: &str) -> Result<Option<Article>, StoreError> {
        let identity = self.identity().await?;
        self.docs
            .update_field(&identity, &self.collection, id, "likes", FieldOp::Increment(1))
            .await?;
        Ok(None)
    }

    #[instrument(skip(self, comment), fields(collection = %self.collection))]
    async fn add_comment(
        &self,
        id: &str,
        comment: NewComment,
    ) -> Result<Option<Article>, StoreError> {
        let identity = self.identity().await?;
        let value = json!({
            "author": comment.author,
            "text": comment.text,
            "uid": identity.uid,
            "createdAt": server_timestamp(),
        });
        self.docs
            .update_field(
                &identity,
                &self.collection,
                id,
                "comments",
                FieldOp::AppendUnique(value),
            )
            .await?;
        Ok(None)
    }
}
