use async_trait::async_trait;

use crate::data::remote_store::ArticleFeed;
use crate::domain::article::{Article, NewArticle, NewComment};
use crate::domain::error::StoreError;

/// Persistence strategy behind the article service.
///
/// Mutations return `Some(article)` when the adapter knows the committed
/// state right away, and `None` when the change will arrive through the live
/// feed instead.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Article>, StoreError>;

    /// Live feed of full snapshots, for adapters that have one.
    async fn subscribe(&self) -> Result<Option<ArticleFeed>, StoreError> {
        Ok(None)
    }

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError>;

    async fn like(&self, id: &str) -> Result<Option<Article>, StoreError>;

    async fn add_comment(
        &self,
        id: &str,
        comment: NewComment,
    ) -> Result<Option<Article>, StoreError>;
}
