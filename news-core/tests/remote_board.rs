use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use news_core::application::article_service::{FeedState, LoadStatus, Mount};
use news_core::data::auth::{AnonymousAuth, AuthProvider};
use news_core::data::memory_document_store::MemoryDocumentStore;
use news_core::{ArticleDraft, ArticleService, CommentDraft, NewsError, RemoteStore};
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

type RemoteBoard = ArticleService<RemoteStore<MemoryDocumentStore>>;

async fn session(docs: &Arc<MemoryDocumentStore>) -> (RemoteBoard, Mount) {
    let auth: Arc<dyn AuthProvider> = Arc::new(AnonymousAuth::new());
    let store = RemoteStore::connect(docs.clone(), auth, "articles")
        .await
        .expect("connect");
    let service = ArticleService::new(Arc::new(store));
    let mount = service.load_initial().await.expect("mount");
    assert!(mount.is_live());
    wait_for(&mut service.watch(), |s| s.status == LoadStatus::Ready).await;
    (service, mount)
}

async fn wait_for(rx: &mut watch::Receiver<FeedState>, done: impl FnMut(&FeedState) -> bool) {
    timeout(Duration::from_secs(5), rx.wait_for(done))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

#[tokio::test]
async fn submitted_article_appears_first_with_zero_likes() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (service, _mount) = session(&docs).await;
    assert!(service.articles().is_empty());

    service
        .submit_article(ArticleDraft::new("Older", "first"))
        .await
        .unwrap();
    let created = service
        .submit_article(ArticleDraft::new("X", "Y"))
        .await
        .unwrap();

    let mut rx = service.watch();
    wait_for(&mut rx, |s| s.articles.len() == 2 && s.pending_count() == 0).await;
    let articles = service.articles();
    assert_eq!(articles[0].id, created.id);
    assert_eq!(articles[0].likes, 0);
    assert!(articles[0].comments.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_likes_from_two_sessions_are_all_counted() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (alice, _a) = session(&docs).await;
    let (bob, _b) = session(&docs).await;

    let created = alice
        .submit_article(ArticleDraft::new("Cats elect mayor", "Landslide"))
        .await
        .unwrap();
    wait_for(&mut bob.watch(), |s| s.get(&created.id).is_some()).await;

    let mut likes = Vec::new();
    for i in 0..40 {
        let service = if i % 2 == 0 { alice.clone() } else { bob.clone() };
        let id = created.id.clone();
        likes.push(tokio::spawn(async move { service.like(&id).await }));
    }
    for result in join_all(likes).await {
        result.expect("join").expect("like");
    }

    for board in [&alice, &bob] {
        wait_for(&mut board.watch(), |s| {
            s.get(&created.id).is_some_and(|a| a.likes == 40)
        })
        .await;
    }
}

#[tokio::test]
async fn comments_are_appended_with_writer_uid() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (service, _mount) = session(&docs).await;
    let created = service
        .submit_article(ArticleDraft::new("t", "b"))
        .await
        .unwrap();

    service
        .add_comment(&created.id, CommentDraft::new("first!").with_author("Reader"))
        .await
        .unwrap();
    let err = service
        .add_comment(&created.id, CommentDraft::new("   "))
        .await
        .unwrap_err();
    assert!(matches!(err, NewsError::Validation(_)));

    wait_for(&mut service.watch(), |s| {
        s.get(&created.id).is_some_and(|a| a.comments.len() == 1)
    })
    .await;
    let comment = &service.article(&created.id).unwrap().comments[0];
    assert_eq!(comment.author, "Reader");
    assert_eq!(comment.text, "first!");
    assert!(comment.uid.is_some());
}

#[tokio::test]
async fn offline_write_raises_notice_and_keeps_state() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (service, _mount) = session(&docs).await;
    let created = service
        .submit_article(ArticleDraft::new("t", "b"))
        .await
        .unwrap();
    wait_for(&mut service.watch(), |s| s.pending_count() == 0).await;
    let before = service.articles();

    docs.set_offline(true);
    assert!(service.like(&created.id).await.unwrap_err().is_persistence());
    assert!(
        service
            .submit_article(ArticleDraft::new("lost", "lost"))
            .await
            .unwrap_err()
            .is_persistence()
    );

    assert_eq!(service.articles(), before);
    let notice = service.take_notice().expect("notice");
    assert!(notice.message.contains("Could not"));
}

#[tokio::test]
async fn feed_error_ends_loading_with_notice() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (service, _mount) = session(&docs).await;

    docs.fail_subscriptions("articles", "permission revoked").unwrap();
    wait_for(&mut service.watch(), |s| s.notice.is_some()).await;
    assert_eq!(service.status(), LoadStatus::Ready);
}

#[tokio::test]
async fn failed_subscribe_is_reported() {
    let docs = Arc::new(MemoryDocumentStore::new());
    docs.set_offline(true);
    let store = RemoteStore::new(docs.clone(), Arc::new(AnonymousAuth::new()), "articles");
    let service = ArticleService::new(Arc::new(store));

    let err = service.load_initial().await.err().expect("load fails");
    assert!(err.is_persistence());
    assert_eq!(service.status(), LoadStatus::Ready);
    assert!(service.notice().is_some());
}

#[tokio::test]
async fn no_updates_after_unmount() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (watcher, mount) = session(&docs).await;
    let (writer, _w) = session(&docs).await;

    writer
        .submit_article(ArticleDraft::new("seen", "seen"))
        .await
        .unwrap();
    wait_for(&mut watcher.watch(), |s| s.articles.len() == 1).await;

    mount.unmount();
    writer
        .submit_article(ArticleDraft::new("unseen", "unseen"))
        .await
        .unwrap();
    sleep(Duration::from_millis(50)).await;

    assert_eq!(watcher.articles().len(), 1);
    assert_eq!(docs.subscriber_count("articles"), 1);
}

#[tokio::test]
async fn remounting_resubscribes() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let (service, mount) = session(&docs).await;
    drop(mount);

    let (writer, _w) = session(&docs).await;
    writer
        .submit_article(ArticleDraft::new("later", "later"))
        .await
        .unwrap();

    let _again = service.load_initial().await.unwrap();
    wait_for(&mut service.watch(), |s| {
        s.status == LoadStatus::Ready && s.articles.len() == 1
    })
    .await;
}

#[tokio::test]
async fn documents_without_authors_show_placeholders() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let fields = serde_json::json!({
        "title": "Owls file complaint",
        "body": "Too much daylight.",
        "createdAt": 1_700_000_000_000i64,
        "comments": [{ "text": "hoot", "uid": "u1", "createdAt": 1_700_000_000_500i64 }]
    });
    docs.put("articles", "owls", fields.as_object().cloned().unwrap())
        .unwrap();

    let (service, _mount) = session(&docs).await;
    let article = service.article("owls").expect("loaded");
    assert_eq!(article.author, "Anonymous Reporter");
    assert_eq!(article.comments[0].author, "Anonymous");
    assert_eq!(article.comments[0].text, "hoot");
}

#[tokio::test]
async fn writes_continue_after_sign_out() {
    let docs = Arc::new(MemoryDocumentStore::new());
    let auth = Arc::new(AnonymousAuth::new());
    let store = RemoteStore::connect(docs.clone(), auth.clone(), "articles")
        .await
        .expect("connect");
    let service = ArticleService::new(Arc::new(store));
    let _mount = service.load_initial().await.expect("mount");

    auth.sign_out();
    let created = service
        .submit_article(ArticleDraft::new("Still here", "after sign-out"))
        .await
        .expect("submit after sign-out");
    assert!(auth.current_user().is_some());
    wait_for(&mut service.watch(), |s| s.get(&created.id).is_some()).await;
    assert!(service.take_notice().is_none());
}
