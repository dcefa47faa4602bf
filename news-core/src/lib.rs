//! Client-side state and persistence for the fictional news board.
//!
//! [`ArticleService`] holds the article list and applies intents. It is built
//! over one [`ArticleStore`]: [`RemoteStore`] (live document collection) or
//! [`LocalStore`] (single JSON snapshot in key-value storage).

pub mod application;
pub mod data;
pub mod domain;
pub mod infrastructure;

pub use application::article_service::{ArticleService, FeedState, LoadStatus, Mount, Notice};
pub use data::article_store::ArticleStore;
pub use data::local_store::LocalStore;
pub use data::remote_store::RemoteStore;
pub use domain::article::{Article, ArticleDraft, Comment, CommentDraft};
pub use domain::category::{Category, CategoryFilter};
pub use domain::error::{NewsError, StoreError};
