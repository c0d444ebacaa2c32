//! Integration tests for the news-stash personal content service
//!
//! These tests verify the full workflow from configuration loading
//! through database operations and the HTTP API.

use std::io::Write;
use tempfile::NamedTempFile;

mod common {
    use tempfile::TempDir;

    /// Create a temporary directory for test databases
    pub fn create_temp_dir() -> TempDir {
        tempfile::tempdir().expect("Failed to create temp directory")
    }

    /// Create a test database path
    pub fn create_db_path(temp_dir: &TempDir) -> String {
        let db_path = temp_dir.path().join("test.db");
        format!("sqlite:{}?mode=rwc", db_path.display())
    }
}

#[cfg(test)]
mod config_integration_tests {
    use super::*;
    use news_stash::config::Config;

    #[test]
    fn test_load_shipped_config() {
        let config = Config::load("config.toml");
        assert!(config.is_ok(), "Failed to load config.toml: {:?}", config.err());

        let config = config.unwrap();
        assert!(config.default_page_size > 0);
        assert!(config.max_page_size >= config.default_page_size);
    }

    #[test]
    fn test_config_round_trip() {
        let toml_content = r#"
            bind_addr = "127.0.0.1:8002"
            database_url = "sqlite:content.db?mode=rwc"
            default_page_size = 15
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:8002");
        assert_eq!(config.database_url, "sqlite:content.db?mode=rwc");
        assert_eq!(config.default_page_size, 15);
        assert_eq!(config.max_page_size, 100); // default
    }
}

#[cfg(test)]
mod database_integration_tests {
    use super::common::*;
    use chrono::Utc;
    use news_stash::db::{Database, FavoriteDraft, ReactionKind, ToggleOutcome};

    fn draft(url: &str, title: &str) -> FavoriteDraft {
        FavoriteDraft {
            url: url.to_string(),
            title: Some(title.to_string()),
            description: Some("Integration test article".to_string()),
            url_to_image: None,
            source_name: Some("Test Wire".to_string()),
            published_at: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_full_content_workflow() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        let db = Database::new(&db_url).await.unwrap();
        db.initialize().await.unwrap();

        // Favorite 25 articles
        for i in 1..=25 {
            let outcome = db
                .toggle_favorite(
                    7,
                    &draft(
                        &format!("https://news.example.com/{}", i),
                        &format!("Article {}", i),
                    ),
                )
                .await
                .unwrap();
            assert_eq!(outcome, ToggleOutcome::Added);
        }
        assert_eq!(db.count_favorites(7).await.unwrap(), 25);

        // Pagination - second page of ten
        let page2 = db.get_favorites(7, 10, 10).await.unwrap();
        assert_eq!(page2.len(), 10);

        // Last page holds the remainder
        let page3 = db.get_favorites(7, 10, 20).await.unwrap();
        assert_eq!(page3.len(), 5);

        // Comment on one favorite
        let article = db
            .find_favorite_by_url(7, "https://news.example.com/3")
            .await
            .unwrap()
            .unwrap();
        let comment = db.add_comment(article.id, 7, "worth a re-read").await.unwrap();
        assert_eq!(
            db.count_comments_for_article(article.id, 7).await.unwrap(),
            1
        );

        // Edit it, created_at untouched
        db.update_comment_text(comment.id, "definitely worth a re-read")
            .await
            .unwrap();
        let edited = db.get_comment(comment.id).await.unwrap().unwrap();
        assert_eq!(edited.created_at, comment.created_at);

        // React to the article, replace, then clear
        let url = &article.url;
        assert_eq!(
            db.set_reaction(7, url, ReactionKind::Interesting)
                .await
                .unwrap(),
            Some(ReactionKind::Interesting)
        );
        assert_eq!(
            db.set_reaction(7, url, ReactionKind::Useful).await.unwrap(),
            Some(ReactionKind::Useful)
        );
        assert_eq!(db.set_reaction(7, url, ReactionKind::Useful).await.unwrap(), None);
        let counts = db.reaction_counts(url).await.unwrap();
        assert!(counts.values().all(|&n| n == 0));

        // Unfavorite removes the article and cascades to its comments
        let outcome = db
            .toggle_favorite(7, &draft(url, "Article 3"))
            .await
            .unwrap();
        assert_eq!(outcome, ToggleOutcome::Removed);
        assert!(db.get_comment(comment.id).await.unwrap().is_none());
        assert_eq!(db.count_favorites(7).await.unwrap(), 24);
    }

    #[tokio::test]
    async fn test_database_persistence() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        // Create database and add data
        {
            let db = Database::new(&db_url).await.unwrap();
            db.initialize().await.unwrap();

            db.toggle_favorite(1, &draft("https://persistent.example.com/a", "Persistent"))
                .await
                .unwrap();
            db.set_reaction(1, "https://persistent.example.com/a", ReactionKind::Liked)
                .await
                .unwrap();
        }

        // Reopen database and verify data persists
        {
            let db = Database::new(&db_url).await.unwrap();

            let favorites = db.get_favorites(1, 10, 0).await.unwrap();
            assert_eq!(favorites.len(), 1);
            assert_eq!(favorites[0].title, "Persistent");

            assert_eq!(
                db.get_reaction(1, "https://persistent.example.com/a")
                    .await
                    .unwrap(),
                Some(ReactionKind::Liked)
            );
        }
    }

    #[tokio::test]
    async fn test_repeated_toggles_settle_on_one_row() {
        let temp_dir = create_temp_dir();
        let db_url = create_db_path(&temp_dir);

        let db = Database::new(&db_url).await.unwrap();
        db.initialize().await.unwrap();

        let d = draft("https://news.example.com/hot-take", "Hot Take");
        for _ in 0..7 {
            db.toggle_favorite(3, &d).await.unwrap();
        }

        // Odd number of toggles: exactly one row
        assert_eq!(db.count_favorites(3).await.unwrap(), 1);

        db.toggle_favorite(3, &d).await.unwrap();
        assert_eq!(db.count_favorites(3).await.unwrap(), 0);
    }
}

#[cfg(test)]
mod api_integration_tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use news_stash::config::Config;
    use news_stash::db::Database;
    use news_stash::routes::{router, AppState};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn create_test_app() -> axum::Router {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();

        router(Arc::new(AppState {
            db: Arc::new(db),
            config: Config::default(),
        }))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_favorite_lifecycle_over_http() {
        let app = create_test_app().await;
        let toggle = json!({
            "user_id": 1,
            "url": "https://news.example.com/lead-story",
            "title": "Lead Story",
            "source_name": "Example Daily",
        });

        // Add
        let response = app
            .clone()
            .oneshot(post("/favorites/toggle", toggle.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["is_favorite"], true);

        // Visible in the url list
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/favorites/urls?user_id=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["urls"][0], "https://news.example.com/lead-story");

        // Remove
        let response = app
            .clone()
            .oneshot(post("/favorites/toggle", toggle))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["is_favorite"], false);

        // Gone from the url list
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/favorites/urls?user_id=1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn test_comment_requires_favorited_article() {
        let app = create_test_app().await;

        let response = app
            .oneshot(post(
                "/favorites/999/comments",
                json!({"user_id": 1, "text": "into the void"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["code"], 404);
        assert!(body["error"].as_str().unwrap().contains("favorites"));
    }

    #[tokio::test]
    async fn test_reaction_round_trip_over_http() {
        let app = create_test_app().await;
        let url = "https://news.example.com/lead-story";

        let response = app
            .clone()
            .oneshot(post(
                "/reactions/toggle",
                json!({"user_id": 1, "url": url, "reaction_type": "shocking"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reaction_type"], "shocking");
        assert_eq!(body["reactions_count"]["shocking"], 1);

        let response = app
            .clone()
            .oneshot(post(
                "/reactions/toggle",
                json!({"user_id": 1, "url": url, "reaction_type": "shocking"}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["reaction_type"], Value::Null);
        assert_eq!(body["reactions_count"]["shocking"], 0);
    }
}
