use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::data::article_store::ArticleStore;
use crate::data::key_value::KeyValueStorage;
use crate::domain::article::{Article, NewArticle, NewComment, now};
use crate::domain::error::StoreError;
use crate::infrastructure::ids::ArticleIdGenerator;
use crate::infrastructure::seed::sample_articles;

/// Adapter keeping the whole article list as one JSON array under a single
/// storage key. Every mutation rewrites the full list.
///
/// Writes from this process are serialised; separate processes sharing the
/// storage are last-writer-wins.
pub struct LocalStore {
    storage: Arc<dyn KeyValueStorage>,
    key: String,
    seed: Vec<Article>,
    ids: ArticleIdGenerator,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, key: impl Into<String>) -> Self {
        Self::with_seed(storage, key, sample_articles(now()))
    }

    pub fn with_seed(
        storage: Arc<dyn KeyValueStorage>,
        key: impl Into<String>,
        seed: Vec<Article>,
    ) -> Self {
        Self {
            storage,
            key: key.into(),
            seed,
            ids: ArticleIdGenerator::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Stored list, or the seed when nothing usable is stored.
    pub fn read(&self) -> Result<Vec<Article>, StoreError> {
        let Some(bytes) = self.storage.get(&self.key)? else {
            debug!(key = %self.key, "no stored articles, using seed");
            return Ok(self.seed.clone());
        };

        match parse_snapshot(&self.key, &bytes) {
            Ok(Some(articles)) => Ok(articles),
            Ok(None) => Ok(self.seed.clone()),
            Err(e) => {
                warn!(key = %self.key, error = %e, "stored articles are malformed, using seed");
                Ok(self.seed.clone())
            }
        }
    }

    pub fn save(&self, articles: &[Article]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(articles)?;
        self.storage
            .set(&self.key, &bytes)
            .inspect_err(|e| error!(key = %self.key, "failed to save articles: {}", e))?;
        debug!(key = %self.key, count = articles.len(), "articles saved");
        Ok(())
    }

    /// Re-reads the latest list, applies `change`, and writes the result back.
    async fn mutate<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Vec<Article>) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut articles = self.read()?;
        let out = change(&mut articles)?;
        self.save(&articles)?;
        Ok(out)
    }

    fn not_found(&self, id: &str) -> StoreError {
        StoreError::NotFound {
            collection: self.key.clone(),
            id: id.to_string(),
        }
    }
}

/// Decodes the stored list entry by entry, skipping entries that do not
/// decode. `Ok(None)` when the value is not an array or nothing in it decodes.
fn parse_snapshot(key: &str, bytes: &[u8]) -> Result<Option<Vec<Article>>, serde_json::Error> {
    let Value::Array(items) = serde_json::from_slice::<Value>(bytes)? else {
        return Ok(None);
    };
    let articles: Vec<Article> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(article) => Some(article),
            Err(e) => {
                warn!(key, index, error = %e, "skipping malformed stored article");
                None
            }
        })
        .collect();
    Ok((!articles.is_empty()).then_some(articles))
}

#[async_trait]
impl ArticleStore for LocalStore {
    async fn load(&self) -> Result<Vec<Article>, StoreError> {
        self.read()
    }

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError> {
        let id = self.ids.next_id(article.created_at);
        let article = article.into_article(id);
        let created = article.clone();
        self.mutate(move |articles| {
            articles.insert(0, article);
            Ok(())
        })
        .await?;
        info!(article_id = %created.id, "article created");
        Ok(created)
    }

    async fn like(&self, id: &str) -> Result<Option<Article>, StoreError> {
        let not_found = self.not_found(id);
        self.mutate(|articles| {
            let article = articles
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(not_found)?;
            article.likes += 1;
            Ok(Some(article.clone()))
        })
        .await
    }

    async fn add_comment(
        &self,
        id: &str,
        comment: NewComment,
    ) -> Result<Option<Article>, StoreError> {
        let not_found = self.not_found(id);
        let comment = comment.stamp(now(), None);
        self.mutate(move |articles| {
            let article = articles
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or(not_found)?;
            article.comments.push(comment);
            Ok(Some(article.clone()))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::key_value::MemoryStorage;
    use crate::domain::article::{ArticleDraft, CommentDraft};

    const KEY: &str = "fictional-news-articles";

    fn store() -> (Arc<MemoryStorage>, LocalStore) {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalStore::new(storage.clone(), KEY);
        (storage, store)
    }

    #[tokio::test]
    async fn falls_back_to_seed_for_absent_empty_or_malformed() {
        let (storage, store) = store();
        assert_eq!(store.load().await.unwrap().len(), 3);

        let inputs: [&[u8]; 5] = [b"[]", b"{}", b"not json", b"[{\"title\": 1}]", b"null"];
        for raw in inputs {
            storage.set(KEY, raw).unwrap();
            let loaded = store.load().await.unwrap();
            assert_eq!(loaded.len(), 3, "input {:?}", String::from_utf8_lossy(raw));
            assert_eq!(loaded[0].id, "sample-1");
        }
    }

    #[tokio::test]
    async fn save_then_load_is_deep_equal() {
        let (_, store) = store();
        let mut list = store.load().await.unwrap();
        list[0].likes += 5;
        list.truncate(2);
        store.save(&list).unwrap();
        assert_eq!(store.load().await.unwrap(), list);
    }

    #[tokio::test]
    async fn mutations_rewrite_the_full_list() {
        let (storage, store) = store();
        let created = store
            .create(ArticleDraft::new("X", "Y").validate("Anonymous Reporter").unwrap())
            .await
            .unwrap();
        assert!(created.id.starts_with("art-"));

        let liked = store.like(&created.id).await.unwrap().unwrap();
        assert_eq!(liked.likes, 1);
        let commented = store
            .add_comment(&created.id, CommentDraft::new("hi").validate("Anonymous").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(commented.comments.len(), 1);
        assert_eq!(commented.likes, 1);

        let raw = storage.get(KEY).unwrap().unwrap();
        let stored: Vec<Article> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[0], commented);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found_and_writes_nothing() {
        let (storage, store) = store();
        let err = store.like("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { ref id, .. } if id == "missing"));
        assert!(storage.get(KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn undecodable_entries_are_skipped_and_the_rest_survive() {
        let (storage, store) = store();
        let raw = serde_json::json!([
            {
                "id": "mine-1",
                "title": "Kept",
                "body": "b",
                "category": "politics",
                "likes": 7,
                "createdAt": 1_700_000_000_000i64
            },
            { "id": "mine-2", "title": "Broken", "body": "b", "likes": 1.5, "createdAt": 1 }
        ]);
        storage.set(KEY, &serde_json::to_vec(&raw).unwrap()).unwrap();

        let loaded = store.load().await.unwrap();
        let ids: Vec<&str> = loaded.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["mine-1"]);
        assert_eq!(loaded[0].category, None);

        let liked = store.like("mine-1").await.unwrap().unwrap();
        assert_eq!(liked.likes, 8);
        let stored: Vec<Article> = serde_json::from_slice(&storage.get(KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "mine-1");
        assert_eq!(stored[0].likes, 8);
    }
}
