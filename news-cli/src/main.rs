use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures_util::future::join_all;
use news_core::application::article_service::FeedState;
use news_core::data::auth::{AnonymousAuth, AuthProvider};
use news_core::data::key_value::FileStorage;
use news_core::data::memory_document_store::MemoryDocumentStore;
use news_core::domain::article::now;
use news_core::infrastructure::config::{AppConfig, Backend};
use news_core::infrastructure::logging::init_logging;
use news_core::infrastructure::seed::sample_articles;
use news_core::{
    Article, ArticleDraft, ArticleService, ArticleStore, Category, CategoryFilter, CommentDraft,
    LocalStore, RemoteStore,
};
use tracing::{info, warn};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[clap(name = "news", about = "Fictional news board")]
struct Cli {
    /// Overrides NEWS_BACKEND. `remote` runs against an in-process document
    /// store whose data lasts for this invocation only.
    #[clap(short, long)]
    backend: Option<Backend>,

    /// Overrides NEWS_STORAGE_DIR for the local backend.
    #[clap(short, long)]
    dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Parser, Debug)]
enum Command {
    /// Lists articles, newest first.
    List {
        #[clap(long, default_value = "all")]
        category: CategoryFilter,
    },
    Show {
        id: String,
    },
    Post {
        #[clap(long)]
        title: String,
        #[clap(long)]
        body: String,
        #[clap(long, default_value = "")]
        author: String,
        #[clap(long, default_value = "bizarre")]
        category: Category,
    },
    Like {
        id: String,
    },
    Comment {
        id: String,
        #[clap(long)]
        text: String,
        #[clap(long, default_value = "")]
        author: String,
    },
    Categories,
    /// Posts an article, likes it concurrently, comments, and prints it.
    Demo {
        #[clap(long, default_value_t = 10)]
        likes: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    if let Some(dir) = args.dir {
        config.storage_dir = dir;
    }
    info!(backend = %config.backend, "starting");

    match config.backend {
        Backend::Local => {
            let storage = Arc::new(FileStorage::open(&config.storage_dir)?);
            let store = LocalStore::new(storage, config.storage_key.clone());
            run(ArticleService::from_config(Arc::new(store), &config), args.command).await
        }
        Backend::Remote => {
            let docs = Arc::new(MemoryDocumentStore::new());
            seed_documents(&docs, &config.collection)?;
            let auth: Arc<dyn AuthProvider> = Arc::new(AnonymousAuth::new());
            let store = RemoteStore::connect(docs, auth, config.collection.clone()).await?;
            run(ArticleService::from_config(Arc::new(store), &config), args.command).await
        }
    }
}

fn seed_documents(docs: &MemoryDocumentStore, collection: &str) -> anyhow::Result<()> {
    for article in sample_articles(now()) {
        let mut value = serde_json::to_value(&article)?;
        let fields = value
            .as_object_mut()
            .ok_or_else(|| anyhow::anyhow!("article did not serialize to an object"))?;
        fields.remove("id");
        docs.put(collection, &article.id, fields.clone())?;
    }
    Ok(())
}

async fn run<S>(service: ArticleService<S>, command: Command) -> anyhow::Result<()>
where
    S: ArticleStore + 'static,
{
    let mount = service.load_initial().await?;
    settle(&service, |s| s.status == news_core::LoadStatus::Ready).await;

    match command {
        Command::List { category } => {
            let articles = service.filtered_view(category);
            println!("Articles ({})", articles.len());
            for article in &articles {
                print_summary(article);
            }
        }
        Command::Show { id } => match service.article(&id) {
            Some(article) => print_article(&article),
            None => println!("No article with id {id}"),
        },
        Command::Post {
            title,
            body,
            author,
            category,
        } => {
            let draft = ArticleDraft::new(title, body)
                .with_author(author)
                .with_category(Some(category));
            let article = service.submit_article(draft).await?;
            println!("Article posted! ID: {}", article.id);
        }
        Command::Like { id } => {
            let before = service.article(&id).map(|a| a.likes).unwrap_or_default();
            service.like(&id).await?;
            settle(&service, |s| s.get(&id).is_some_and(|a| a.likes > before)).await;
            if let Some(article) = service.article(&id) {
                println!("Liked: {} ({} likes)", article.title, article.likes);
            }
        }
        Command::Comment { id, text, author } => {
            let before = service
                .article(&id)
                .map(|a| a.comments.len())
                .unwrap_or_default();
            service
                .add_comment(&id, CommentDraft::new(text).with_author(author))
                .await?;
            settle(&service, |s| {
                s.get(&id).is_some_and(|a| a.comments.len() > before)
            })
            .await;
            println!("Comment added!");
        }
        Command::Categories => {
            for category in Category::ALL {
                println!("{:<14} {}", category.id(), category.label());
            }
        }
        Command::Demo { likes } => demo(&service, likes).await?,
    }

    mount.unmount();
    Ok(())
}

async fn demo<S>(service: &ArticleService<S>, likes: u32) -> anyhow::Result<()>
where
    S: ArticleStore + 'static,
{
    let article = service
        .submit_article(
            ArticleDraft::new(
                "Local man reads terms and conditions",
                "Witnesses describe the event as unprecedented.",
            )
            .with_category(Some(Category::Breaking)),
        )
        .await?;

    let results = join_all((0..likes).map(|_| service.like(&article.id))).await;
    for result in results {
        result?;
    }
    service
        .add_comment(&article.id, CommentDraft::new("Fake news, surely."))
        .await?;

    let id = article.id.clone();
    let expected = u64::from(likes);
    settle(service, |s| {
        s.get(&id)
            .is_some_and(|a| a.likes >= expected && !a.comments.is_empty())
    })
    .await;

    match service.article(&article.id) {
        Some(article) => print_article(&article),
        None => println!("Article {} did not arrive", article.id),
    }
    Ok(())
}

/// Waits briefly for the feed to reflect a change; local stores already have.
async fn settle<S, F>(service: &ArticleService<S>, done: F)
where
    S: ArticleStore + 'static,
    F: FnMut(&FeedState) -> bool,
{
    let mut rx = service.watch();
    if tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(done))
        .await
        .is_err()
    {
        warn!(
            timeout_ms = SETTLE_TIMEOUT.as_millis() as u64,
            "feed did not settle, output may be stale"
        );
    }
}

fn print_summary(article: &Article) {
    let category = article.category.map(Category::label).unwrap_or("Uncategorised");
    println!(
        "- [{}] {} | {} | by {} | {} | {} likes, {} comments",
        article.id,
        article.title,
        category,
        article.author,
        article.age_label(now()),
        article.likes,
        article.comments.len()
    );
}

fn print_article(article: &Article) {
    print_summary(article);
    println!();
    println!("{}", article.body);
    if !article.comments.is_empty() {
        println!();
        println!("Comments ({})", article.comments.len());
        for comment in &article.comments {
            println!(
                "  {} ({}): {}",
                comment.author,
                news_core::domain::article::age_label(comment.time, now()),
                comment.text
            );
        }
    }
}
