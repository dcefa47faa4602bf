use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::data::article_store::ArticleStore;
use crate::data::remote_store::ArticleFeed;
use crate::domain::article::{Article, ArticleDraft, CommentDraft, now};
use crate::domain::category::CategoryFilter;
use crate::domain::error::{NewsError, StoreError};
use crate::infrastructure::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
}

/// Transient failure message for the user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything a view needs to render the board.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub status: LoadStatus,
    /// Newest first.
    pub articles: Vec<Article>,
    pub notice: Option<Notice>,
    /// Created through a live feed but not yet seen in a snapshot.
    pending: Vec<Article>,
    mount_generation: u64,
    live: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            status: LoadStatus::Loading,
            articles: Vec::new(),
            notice: None,
            pending: Vec::new(),
            mount_generation: 0,
            live: false,
        }
    }
}

impl FeedState {
    pub fn filtered(&self, filter: CategoryFilter) -> Vec<Article> {
        self.articles
            .iter()
            .filter(|a| filter.matches(a.category))
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Article> {
        self.articles.iter().find(|a| a.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Full replace by a snapshot; pending creates missing from it are kept.
    fn apply_snapshot(&mut self, snapshot: Vec<Article>) {
        self.pending
            .retain(|p| !snapshot.iter().any(|a| a.id == p.id));
        let mut next = snapshot;
        next.extend(self.pending.iter().cloned());
        sort_newest_first(&mut next);
        self.articles = next;
        self.status = LoadStatus::Ready;
    }

    fn insert_created(&mut self, article: Article) {
        if self.get(&article.id).is_some() {
            return;
        }
        if self.live {
            self.pending.push(article.clone());
        }
        self.articles.insert(0, article);
        sort_newest_first(&mut self.articles);
    }

    /// Applies an adapter result unless the displayed article is already newer.
    fn merge(&mut self, article: Article) {
        match self.articles.iter_mut().find(|a| a.id == article.id) {
            Some(current) if article.supersedes(current) => *current = article,
            Some(current) => {
                debug!(article_id = %current.id, "ignoring stale article result");
            }
            None => {
                self.articles.push(article);
                sort_newest_first(&mut self.articles);
            }
        }
    }
}

fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Author names used when a draft leaves them blank.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub author: String,
    pub commenter: String,
}

impl Placeholders {
    /// Names stored documents left blank, such as remote comments written
    /// without an author.
    fn fill(&self, articles: &mut [Article]) {
        for article in articles {
            if article.author.trim().is_empty() {
                article.author = self.author.clone();
            }
            for comment in &mut article.comments {
                if comment.author.trim().is_empty() {
                    comment.author = self.commenter.clone();
                }
            }
        }
    }
}

impl Default for Placeholders {
    fn default() -> Self {
        let config = AppConfig::default();
        Self {
            author: config.default_author,
            commenter: config.default_commenter,
        }
    }
}

/// Keeps the board's article list and applies user intents through one
/// [`ArticleStore`].
pub struct ArticleService<S: ArticleStore + 'static> {
    store: Arc<S>,
    state: Arc<watch::Sender<FeedState>>,
    placeholders: Placeholders,
}

impl<S: ArticleStore + 'static> Clone for ArticleService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            state: Arc::clone(&self.state),
            placeholders: self.placeholders.clone(),
        }
    }
}

impl<S> ArticleService<S>
where
    S: ArticleStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_placeholders(store, Placeholders::default())
    }

    pub fn from_config(store: Arc<S>, config: &AppConfig) -> Self {
        Self::with_placeholders(
            store,
            Placeholders {
                author: config.default_author.clone(),
                commenter: config.default_commenter.clone(),
            },
        )
    }

    pub fn with_placeholders(store: Arc<S>, placeholders: Placeholders) -> Self {
        let (state, _) = watch::channel(FeedState::default());
        Self {
            store,
            state: Arc::new(state),
            placeholders,
        }
    }

    /// Receiver that observes every state change.
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn status(&self) -> LoadStatus {
        self.state.borrow().status
    }

    pub fn articles(&self) -> Vec<Article> {
        self.state.borrow().articles.clone()
    }

    pub fn filtered_view(&self, filter: CategoryFilter) -> Vec<Article> {
        self.state.borrow().filtered(filter)
    }

    pub fn article(&self, id: &str) -> Option<Article> {
        self.state.borrow().get(id).cloned()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.state.borrow().notice.clone()
    }

    pub fn take_notice(&self) -> Option<Notice> {
        let mut taken = None;
        self.state.send_if_modified(|s| {
            taken = s.notice.take();
            taken.is_some()
        });
        taken
    }

    /// Populates the list from the store. Adapters with a live feed keep
    /// pushing snapshots until the returned [`Mount`] is unmounted.
    #[instrument(skip(self))]
    pub async fn load_initial(&self) -> Result<Mount, NewsError> {
        let mut generation = 0;
        self.state.send_modify(|s| {
            s.mount_generation += 1;
            s.status = LoadStatus::Loading;
            s.live = false;
            s.pending.clear();
            generation = s.mount_generation;
        });

        let feed = match self.store.subscribe().await {
            Ok(feed) => feed,
            Err(e) => return Err(self.load_failed(generation, e)),
        };

        if let Some(feed) = feed {
            self.state.send_modify(|s| {
                if s.mount_generation == generation {
                    s.live = true;
                }
            });
            let task = tokio::spawn(pump(
                feed,
                Arc::clone(&self.state),
                self.placeholders.clone(),
                generation,
            ));
            info!(generation, "feed mounted");
            return Ok(Mount::new(Arc::clone(&self.state), generation, Some(task)));
        }

        match self.store.load().await {
            Ok(mut articles) => {
                self.placeholders.fill(&mut articles);
                let count = articles.len();
                self.state.send_modify(|s| {
                    if s.mount_generation == generation {
                        s.apply_snapshot(articles);
                    }
                });
                info!(count, "articles loaded");
                Ok(Mount::new(Arc::clone(&self.state), generation, None))
            }
            Err(e) => Err(self.load_failed(generation, e)),
        }
    }

    #[instrument(skip(self, draft))]
    pub async fn submit_article(&self, draft: ArticleDraft) -> Result<Article, NewsError> {
        let new = draft.validate(&self.placeholders.author)?;
        let article = self
            .store
            .create(new)
            .await
            .map_err(|e| self.report("submit article", e))?;

        self.state.send_modify(|s| s.insert_created(article.clone()));
        info!(article_id = %article.id, "article submitted");
        Ok(article)
    }

    /// Adds one like. Unknown ids are a no-op reported as `ArticleNotFound`.
    #[instrument(skip(self))]
    pub async fn like(&self, id: &str) -> Result<(), NewsError> {
        self.ensure_known(id)?;
        let committed = self
            .store
            .like(id)
            .await
            .map_err(|e| self.report("like article", e))?;

        if let Some(article) = committed {
            self.state.send_modify(|s| s.merge(article));
        }
        Ok(())
    }

    #[instrument(skip(self, draft))]
    pub async fn add_comment(&self, id: &str, draft: CommentDraft) -> Result<(), NewsError> {
        let comment = draft.validate(&self.placeholders.commenter)?;
        self.ensure_known(id)?;
        let committed = self
            .store
            .add_comment(id, comment)
            .await
            .map_err(|e| self.report("add comment", e))?;

        if let Some(article) = committed {
            self.state.send_modify(|s| s.merge(article));
        }
        Ok(())
    }

    fn ensure_known(&self, id: &str) -> Result<(), NewsError> {
        if self.state.borrow().get(id).is_none() {
            debug!(article_id = %id, "intent for unknown article ignored");
            return Err(NewsError::ArticleNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Logs a store failure and, for persistence failures, raises a notice.
    fn report(&self, action: &str, err: StoreError) -> NewsError {
        let err = NewsError::from(err);
        if err.is_persistence() {
            error!(action, error = %err, "store operation failed");
            let notice = Notice {
                message: format!("Could not {action}. Please try again."),
                at: now(),
            };
            self.state.send_modify(|s| s.notice = Some(notice));
        } else {
            debug!(action, error = %err, "store operation was a no-op");
        }
        err
    }

    fn load_failed(&self, generation: u64, err: StoreError) -> NewsError {
        let err = self.report("load articles", err);
        self.state.send_modify(|s| {
            if s.mount_generation == generation {
                s.status = LoadStatus::Ready;
            }
        });
        err
    }
}

/// Applies feed snapshots in arrival order until the feed ends or the mount
/// that started it is gone.
async fn pump(
    mut feed: ArticleFeed,
    state: Arc<watch::Sender<FeedState>>,
    placeholders: Placeholders,
    generation: u64,
) {
    while let Some(mut event) = feed.next().await {
        if let Ok(articles) = &mut event {
            placeholders.fill(articles);
        }
        let mut stale = false;
        state.send_if_modified(|s| {
            if s.mount_generation != generation {
                stale = true;
                return false;
            }
            match event {
                Ok(articles) => {
                    debug!(count = articles.len(), "snapshot applied");
                    s.apply_snapshot(articles);
                }
                Err(e) => {
                    error!(error = %e, "article feed failed");
                    s.notice = Some(Notice {
                        message: "Could not load articles. Please try again.".into(),
                        at: now(),
                    });
                    s.status = LoadStatus::Ready;
                }
            }
            true
        });
        if stale {
            break;
        }
    }
    feed.close();
    debug!(generation, "feed closed");
}

/// Lifetime of one `load_initial`. Unmounting (explicitly or on drop) stops
/// the feed; nothing from it reaches the state afterwards.
pub struct Mount {
    state: Arc<watch::Sender<FeedState>>,
    generation: u64,
    task: Option<JoinHandle<()>>,
    active: bool,
}

impl Mount {
    fn new(
        state: Arc<watch::Sender<FeedState>>,
        generation: u64,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            state,
            generation,
            task,
            active: true,
        }
    }

    /// True when the store delivers live snapshots.
    pub fn is_live(&self) -> bool {
        self.task.is_some()
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let generation = self.generation;
        self.state.send_modify(|s| {
            if s.mount_generation == generation {
                s.mount_generation += 1;
                s.live = false;
                s.pending.clear();
            }
        });
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!(generation, "unmounted");
    }
}

impl Drop for Mount {
    fn drop(&mut self) {
        self.teardown();
    }
}
