use chrono::{DateTime, SubsecRound, Utc};
use derive_more::Display;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::category::Category;
use crate::domain::error::NewsError;

/// Current time at the precision articles are persisted with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display("Comment {{ author: {}, text: {} }}", author, text)]
pub struct Comment {
    #[serde(default)]
    pub author: String,
    pub text: String,
    #[serde(
        rename = "time",
        alias = "createdAt",
        with = "chrono::serde::ts_milliseconds"
    )]
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Display)]
#[display("Article {{ id: {}, title: {}, likes: {} }}", id, title, likes)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, deserialize_with = "lenient_category")]
    pub category: Option<Category>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Unknown or mistyped category ids read as uncategorised.
fn lenient_category<'de, D>(deserializer: D) -> Result<Option<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

impl Article {
    /// True when `self` is at least as far along as `other`. Likes and
    /// comments only grow, so a result that is behind is stale.
    pub fn supersedes(&self, other: &Article) -> bool {
        self.likes >= other.likes && self.comments.len() >= other.comments.len()
    }

    pub fn age_label(&self, now: DateTime<Utc>) -> String {
        age_label(self.created_at, now)
    }
}

/// Relative age in the board's short form: "just now", "5m ago", "3h ago", "2d ago".
pub fn age_label(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mins = (now - at).num_minutes();
    if mins < 1 {
        return "just now".to_string();
    }
    if mins < 60 {
        return format!("{mins}m ago");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{hours}h ago");
    }
    format!("{}d ago", hours / 24)
}

/// User input for a new article, before validation.
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub title: String,
    pub body: String,
    pub author: String,
    pub category: Option<Category>,
}

impl ArticleDraft {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            author: String::new(),
            category: Some(Category::default()),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn validate(self, default_author: &str) -> Result<NewArticle, NewsError> {
        let title = self.title.trim();
        let body = self.body.trim();
        if title.is_empty() {
            return Err(NewsError::Validation("title must not be empty".into()));
        }
        if body.is_empty() {
            return Err(NewsError::Validation("body must not be empty".into()));
        }

        Ok(NewArticle {
            title: title.to_string(),
            body: body.to_string(),
            author: or_default(&self.author, default_author),
            category: self.category,
            created_at: now(),
        })
    }
}

/// A validated article that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub author: String,
    pub category: Option<Category>,
    pub created_at: DateTime<Utc>,
}

impl NewArticle {
    pub fn into_article(self, id: String) -> Article {
        Article {
            id,
            title: self.title,
            body: self.body,
            author: self.author,
            category: self.category,
            likes: 0,
            comments: Vec::new(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommentDraft {
    pub author: String,
    pub text: String,
}

impl CommentDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            author: String::new(),
            text: text.into(),
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn validate(self, default_author: &str) -> Result<NewComment, NewsError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(NewsError::Validation("comment must not be empty".into()));
        }
        Ok(NewComment {
            author: or_default(&self.author, default_author),
            text: text.to_string(),
        })
    }
}

/// A validated comment; the adapter stamps time and writer.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub author: String,
    pub text: String,
}

impl NewComment {
    pub fn stamp(self, time: DateTime<Utc>, uid: Option<String>) -> Comment {
        Comment {
            author: self.author,
            text: self.text,
            time,
            uid,
        }
    }
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        trimmed => trimmed.to_string(),
    }
}
