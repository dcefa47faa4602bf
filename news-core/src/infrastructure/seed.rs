use chrono::{DateTime, Duration, Utc};

use crate::domain::article::{Article, Comment};
use crate::domain::category::Category;

/// Sample articles shown when local storage holds nothing usable.
pub fn sample_articles(now: DateTime<Utc>) -> Vec<Article> {
    vec![
        Article {
            id: "sample-1".into(),
            title: "Vast cheese seam found on the far side of the Moon".into(),
            body: "Space agency officials confirmed an estimated two million tonnes of \
                   naturally aged cheese beneath the lunar surface. \"We are as surprised \
                   as anyone that the old rumour was true,\" said the lead researcher. \
                   Several dairies have already bid for mining rights."
                .into(),
            author: "Lunar Correspondent".into(),
            category: Some(Category::Science),
            likes: 42,
            comments: vec![Comment {
                author: "Cheese Enthusiast".into(),
                text: "Knew it. Always looked suspicious.".into(),
                time: now - Duration::hours(1),
                uid: None,
            }],
            created_at: now - Duration::days(1),
        },
        Article {
            id: "sample-2".into(),
            title: "Town square statue caught on camera taking a midnight stroll".into(),
            body: "Security footage shows the bronze dog statue crossing the main \
                   intersection at around 2 a.m. and pausing outside a convenience store. \
                   The council says the matter is under investigation."
                .into(),
            author: "Urban Legends Desk".into(),
            category: Some(Category::Bizarre),
            likes: 128,
            comments: vec![
                Comment {
                    author: "Local Resident".into(),
                    text: "I did hear barking last night...".into(),
                    time: now - Duration::hours(2),
                    uid: None,
                },
                Comment {
                    author: "Statue Scholar".into(),
                    text: "Only the third recorded case of a walking statue.".into(),
                    time: now - Duration::minutes(90),
                    uid: None,
                },
            ],
            created_at: now - Duration::hours(12),
        },
        Article {
            id: "sample-3".into(),
            title: "Chatbot starts writing haiku, lands literary prize nomination".into(),
            body: "A chatbot began composing haiku unprompted and one of its poems has been \
                   shortlisted for a national award. The bot said it spent three nanoseconds \
                   choosing the seasonal word."
                .into(),
            author: "Tech Letters Team".into(),
            category: Some(Category::Entertainment),
            likes: 87,
            comments: Vec::new(),
            created_at: now - Duration::days(2),
        },
    ]
}
