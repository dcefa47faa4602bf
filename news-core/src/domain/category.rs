use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::domain::error::NewsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[display("breaking")]
    Breaking,
    #[display("world")]
    World,
    #[display("science")]
    Science,
    #[display("entertainment")]
    Entertainment,
    #[display("sports")]
    Sports,
    #[default]
    #[display("bizarre")]
    Bizarre,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Breaking,
        Category::World,
        Category::Science,
        Category::Entertainment,
        Category::Sports,
        Category::Bizarre,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Category::Breaking => "breaking",
            Category::World => "world",
            Category::Science => "science",
            Category::Entertainment => "entertainment",
            Category::Sports => "sports",
            Category::Bizarre => "bizarre",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Breaking => "Breaking",
            Category::World => "World",
            Category::Science => "Science",
            Category::Entertainment => "Entertainment",
            Category::Sports => "Sports",
            Category::Bizarre => "Bizarre",
        }
    }
}

impl FromStr for Category {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.id() == wanted)
            .ok_or_else(|| NewsError::Validation(format!("unknown category: {s}")))
    }
}

/// Selection applied by the filtered view. `All` keeps every article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum CategoryFilter {
    #[default]
    #[display("all")]
    All,
    #[display("{_0}")]
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(self, category: Option<Category>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(wanted),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = NewsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(CategoryFilter::All);
        }
        s.parse().map(CategoryFilter::Only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ids_and_all() {
        assert_eq!("science".parse::<Category>().unwrap(), Category::Science);
        assert_eq!(" Sports ".parse::<Category>().unwrap(), Category::Sports);
        assert_eq!("all".parse::<CategoryFilter>().unwrap(), CategoryFilter::All);
        assert_eq!(
            "bizarre".parse::<CategoryFilter>().unwrap(),
            CategoryFilter::Only(Category::Bizarre)
        );
        assert!("weather".parse::<Category>().is_err());
    }

    #[test]
    fn serializes_as_lowercase_id() {
        let json = serde_json::to_string(&Category::Entertainment).unwrap();
        assert_eq!(json, "\"entertainment\"");
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.id());
        }
    }

    #[test]
    fn filter_matching() {
        assert!(CategoryFilter::All.matches(None));
        assert!(CategoryFilter::Only(Category::World).matches(Some(Category::World)));
        assert!(!CategoryFilter::Only(Category::World).matches(Some(Category::Sports)));
        assert!(!CategoryFilter::Only(Category::World).matches(None));
    }
}
