use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FavoriteArticle {
    pub id: i64,
    pub user_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    pub source_name: String,
    pub published_at: String,
    pub added_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub text: String,
    pub created_at: String,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ReactionKind {
    Important,
    Interesting,
    Shocking,
    Useful,
    Liked,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 5] = [
        ReactionKind::Important,
        ReactionKind::Interesting,
        ReactionKind::Shocking,
        ReactionKind::Useful,
        ReactionKind::Liked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Important => "important",
            ReactionKind::Interesting => "interesting",
            ReactionKind::Shocking => "shocking",
            ReactionKind::Useful => "useful",
            ReactionKind::Liked => "liked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Article metadata sent with a favorite toggle. Only the url is required;
/// display fields get placeholder values when the feed did not supply them.
#[derive(Debug, Clone, Default)]
pub struct FavoriteDraft {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Added,
    Removed,
}

impl ToggleOutcome {
    pub fn is_favorite(self) -> bool {
        matches!(self, ToggleOutcome::Added)
    }

    pub fn action(self) -> &'static str {
        match self {
            ToggleOutcome::Added => "added",
            ToggleOutcome::Removed => "removed",
        }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .after_connect(|conn, _meta| {
                // Comment cascade relies on foreign keys, which SQLite
                // leaves off per connection unless asked.
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS favorite_articles (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                url_to_image TEXT,
                source_name TEXT NOT NULL,
                published_at TEXT NOT NULL,
                added_at TEXT NOT NULL,
                UNIQUE(user_id, url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                article_id INTEGER NOT NULL
                    REFERENCES favorite_articles(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                article_url TEXT NOT NULL,
                reaction_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, article_url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_favorites_user_added
            ON favorite_articles(user_id, added_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_comments_article_user
            ON comments(article_id, user_id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_reactions_url
            ON reactions(article_url)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- Favorites ---

    /// Flip favorite membership for (user, url). Deleting comments for a
    /// removed favorite happens through the cascade.
    pub async fn toggle_favorite(
        &self,
        user_id: i64,
        draft: &FavoriteDraft,
    ) -> anyhow::Result<ToggleOutcome> {
        let removed = sqlx::query("DELETE FROM favorite_articles WHERE user_id = ? AND url = ?")
            .bind(user_id)
            .bind(&draft.url)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(ToggleOutcome::Removed);
        }

        let published_at = draft.published_at.unwrap_or_else(Utc::now).to_rfc3339();
        let added_at = Utc::now().to_rfc3339();

        let inserted = sqlx::query(
            r#"
            INSERT INTO favorite_articles
                (user_id, url, title, description, url_to_image, source_name, published_at, added_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&draft.url)
        .bind(draft.title.as_deref().unwrap_or("Untitled article"))
        .bind(draft.description.as_deref())
        .bind(draft.url_to_image.as_deref())
        .bind(draft.source_name.as_deref().unwrap_or("Unknown source"))
        .bind(&published_at)
        .bind(&added_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(ToggleOutcome::Added),
            // A concurrent toggle for the same (user, url) beat us to the
            // insert, so this call takes the remove side.
            Err(e) if is_unique_violation(&e) => {
                sqlx::query("DELETE FROM favorite_articles WHERE user_id = ? AND url = ?")
                    .bind(user_id)
                    .bind(&draft.url)
                    .execute(&self.pool)
                    .await?;
                Ok(ToggleOutcome::Removed)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_favorites(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<FavoriteArticle>> {
        let favorites = sqlx::query_as::<_, FavoriteArticle>(
            r#"
            SELECT * FROM favorite_articles
            WHERE user_id = ?
            ORDER BY added_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(favorites)
    }

    pub async fn count_favorites(&self, user_id: i64) -> anyhow::Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM favorite_articles WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    pub async fn find_favorite_by_url(
        &self,
        user_id: i64,
        url: &str,
    ) -> anyhow::Result<Option<FavoriteArticle>> {
        let favorite = sqlx::query_as::<_, FavoriteArticle>(
            "SELECT * FROM favorite_articles WHERE user_id = ? AND url = ?",
        )
        .bind(user_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(favorite)
    }

    /// Favorite by id, scoped to its owner. Other users get None.
    pub async fn get_favorite_for_user(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<FavoriteArticle>> {
        let favorite = sqlx::query_as::<_, FavoriteArticle>(
            "SELECT * FROM favorite_articles WHERE id = ? AND user_id = ?",
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(favorite)
    }

    pub async fn get_favorite_urls(&self, user_id: i64) -> anyhow::Result<Vec<String>> {
        let urls = sqlx::query_scalar::<_, String>(
            "SELECT url FROM favorite_articles WHERE user_id = ? ORDER BY added_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(urls)
    }

    // --- Reactions ---

    /// Apply toggle semantics for a user's reaction to an article and return
    /// the resulting reaction, None when it was cleared.
    pub async fn set_reaction(
        &self,
        user_id: i64,
        article_url: &str,
        kind: ReactionKind,
    ) -> anyhow::Result<Option<ReactionKind>> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<ReactionKind> = sqlx::query_scalar(
            "SELECT reaction_type FROM reactions WHERE user_id = ? AND article_url = ?",
        )
        .bind(user_id)
        .bind(article_url)
        .fetch_optional(&mut *tx)
        .await?;

        let result = match existing {
            None => {
                // The upsert absorbs a concurrent first reaction on the same
                // unique key instead of failing the request.
                sqlx::query(
                    r#"
                    INSERT INTO reactions (user_id, article_url, reaction_type, created_at)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT(user_id, article_url) DO UPDATE SET
                        reaction_type = excluded.reaction_type
                    "#,
                )
                .bind(user_id)
                .bind(article_url)
                .bind(kind)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
                Some(kind)
            }
            Some(current) if current == kind => {
                sqlx::query("DELETE FROM reactions WHERE user_id = ? AND article_url = ?")
                    .bind(user_id)
                    .bind(article_url)
                    .execute(&mut *tx)
                    .await?;
                None
            }
            Some(_) => {
                // created_at keeps the date of the first reaction
                sqlx::query(
                    "UPDATE reactions SET reaction_type = ? WHERE user_id = ? AND article_url = ?",
                )
                .bind(kind)
                .bind(user_id)
                .bind(article_url)
                .execute(&mut *tx)
                .await?;
                Some(kind)
            }
        };

        tx.commit().await?;
        Ok(result)
    }

    pub async fn get_reaction(
        &self,
        user_id: i64,
        article_url: &str,
    ) -> anyhow::Result<Option<ReactionKind>> {
        let kind: Option<ReactionKind> = sqlx::query_scalar(
            "SELECT reaction_type FROM reactions WHERE user_id = ? AND article_url = ?",
        )
        .bind(user_id)
        .bind(article_url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(kind)
    }

    /// Aggregate counts per reaction type for an article, zero-filled so
    /// every type is present in the result.
    pub async fn reaction_counts(
        &self,
        article_url: &str,
    ) -> anyhow::Result<BTreeMap<ReactionKind, i64>> {
        let rows: Vec<(ReactionKind, i64)> = sqlx::query_as(
            r#"
            SELECT reaction_type, COUNT(*) FROM reactions
            WHERE article_url = ?
            GROUP BY reaction_type
            "#,
        )
        .bind(article_url)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: BTreeMap<ReactionKind, i64> =
            ReactionKind::ALL.iter().map(|k| (*k, 0)).collect();
        for (kind, n) in rows {
            counts.insert(kind, n);
        }
        Ok(counts)
    }

    // --- Comments ---

    pub async fn add_comment(
        &self,
        article_id: i64,
        user_id: i64,
        text: &str,
    ) -> anyhow::Result<Comment> {
        let created_at = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO comments (article_id, user_id, text, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(article_id)
        .bind(user_id)
        .bind(text)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            article_id,
            user_id,
            text: text.to_string(),
            created_at,
        })
    }

    pub async fn get_comments_for_article(
        &self,
        article_id: i64,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE article_id = ? AND user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    /// Unpaginated variant used when favorites are listed with their
    /// comments embedded.
    pub async fn get_all_comments_for_article(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE article_id = ? AND user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(article_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    pub async fn count_comments_for_article(
        &self,
        article_id: i64,
        user_id: i64,
    ) -> anyhow::Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM comments WHERE article_id = ? AND user_id = ?")
                .bind(article_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    pub async fn get_comment(&self, comment_id: i64) -> anyhow::Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// Replaces the text only; created_at stays at the original posting time.
    pub async fn update_comment_text(&self, comment_id: i64, text: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE comments SET text = ? WHERE id = ?")
            .bind(text)
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_comment(&self, comment_id: i64) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Health ---

    pub async fn total_favorites(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorite_articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn total_comments(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
