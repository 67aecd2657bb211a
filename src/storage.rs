//! SQLite storage layer.
//!
//! Holds the user record store (`users`), per-user activity counters
//! (`user_activities`) and the per-user unlocked reward set
//! (`user_rewards`, keyed by `(user_id, reward_id)`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use uuid::Uuid;

use crate::model::{NewUser, User};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn user_from_row(row: &SqliteRow) -> User {
    let level: i64 = row.get("level");
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        points: row.get("points"),
        level: u32::try_from(level).unwrap_or(1),
        created_at: from_ts(row.get("created_at")),
    }
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:geoplan.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let mut options = SqlitePoolOptions::new().max_connections(5);

        // Each connection to `:memory:` is its own database; keep exactly one alive.
        if database_url.contains(":memory:") {
            options = options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(database_url).await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                points INTEGER NOT NULL DEFAULT 0,
                level INTEGER NOT NULL DEFAULT 1,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_activities (
                user_id TEXT NOT NULL,
                activity_id TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (user_id, activity_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_rewards (
                user_id TEXT NOT NULL,
                reward_id TEXT NOT NULL,
                unlocked_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, reward_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Leaderboard ordering
        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_users_points
            ON users(points DESC, created_at)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a new user with zero points at level 1.
    ///
    /// Fails if the email is already registered.
    pub async fn create_user(&self, new_user: &NewUser, now: DateTime<Utc>) -> anyhow::Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            points: 0,
            level: 1,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, points, level, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.points)
        .bind(i64::from(user.level))
        .bind(user.created_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, points, level, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    pub async fn get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, points, level, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Overwrite a user's point total and level (last write wins).
    ///
    /// # Returns
    ///
    /// `false` if no such user exists.
    pub async fn update_user_points(&self, id: &str, points: i64, level: u32) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET points = ?, level = ? WHERE id = ?
            "#,
        )
        .bind(points)
        .bind(i64::from(level))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Persist a user's new total together with the activity that earned it.
    ///
    /// Both writes share one transaction; `false` (and nothing written)
    /// when the user does not exist.
    pub async fn record_activity_points(
        &self,
        user_id: &str,
        activity_id: &str,
        points: i64,
        level: u32,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE users SET points = ?, level = ? WHERE id = ?
            "#,
        )
        .bind(points)
        .bind(i64::from(level))
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO user_activities (user_id, activity_id, count)
            VALUES (?, ?, 1)
            ON CONFLICT(user_id, activity_id) DO UPDATE SET count = count + 1
            "#,
        )
        .bind(user_id)
        .bind(activity_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Activity counters for a user, keyed by activity id.
    pub async fn activity_counts(&self, user_id: &str) -> anyhow::Result<HashMap<String, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT activity_id, count FROM user_activities WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("activity_id"), r.get("count")))
            .collect())
    }

    /// 1-based leaderboard position of a user, or `None` if unknown.
    pub async fn user_rank(&self, user_id: &str) -> anyhow::Result<Option<u32>> {
        let Some(user) = self.get_user_by_id(user_id).await? else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as ahead
            FROM users
            WHERE points > ?
               OR (points = ? AND created_at < ?)
               OR (points = ? AND created_at = ? AND id < ?)
            "#,
        )
        .bind(user.points)
        .bind(user.points)
        .bind(user.created_at.timestamp())
        .bind(user.points)
        .bind(user.created_at.timestamp())
        .bind(&user.id)
        .fetch_one(&self.pool)
        .await?;

        let ahead: i64 = row.get("ahead");
        Ok(Some(u32::try_from(ahead).unwrap_or(u32::MAX - 1) + 1))
    }

    /// Users ordered by points (desc), oldest first on ties.
    pub async fn leaderboard(&self, limit: u32) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, points, level, created_at
            FROM users
            ORDER BY points DESC, created_at ASC, id ASC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(user_from_row).collect())
    }

    /// Record a reward as unlocked for one user.
    ///
    /// # Returns
    ///
    /// `false` if the user had already unlocked it.
    pub async fn insert_user_reward(
        &self,
        user_id: &str,
        reward_id: &str,
        unlocked_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO user_rewards (user_id, reward_id, unlocked_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(reward_id)
        .bind(unlocked_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Rewards unlocked by a user, keyed by reward id.
    pub async fn user_rewards(
        &self,
        user_id: &str,
    ) -> anyhow::Result<HashMap<String, DateTime<Utc>>> {
        let rows = sqlx::query(
            r#"
            SELECT reward_id, unlocked_at FROM user_rewards WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("reward_id"), from_ts(r.get("unlocked_at"))))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    async fn setup() -> Storage {
        Storage::new("sqlite::memory:").await.unwrap()
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let storage = setup().await;
        let now = Utc::now();

        let created = storage
            .create_user(&new_user("Ana", "ana@example.com"), now)
            .await
            .unwrap();
        assert_eq!(created.points, 0);
        assert_eq!(created.level, 1);

        let by_id = storage.get_user_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");

        let by_email = storage
            .get_user_by_email("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(storage.get_user_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let storage = setup().await;
        let now = Utc::now();
        assert_ok!(storage.create_user(&new_user("Ana", "ana@example.com"), now).await);
        assert!(
            storage
                .create_user(&new_user("Otra Ana", "ana@example.com"), now)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_update_points() {
        let storage = setup().await;
        let user = storage
            .create_user(&new_user("Luis", "luis@example.com"), Utc::now())
            .await
            .unwrap();

        assert!(storage.update_user_points(&user.id, 150, 2).await.unwrap());
        let reloaded = storage.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.points, 150);
        assert_eq!(reloaded.level, 2);

        assert!(!storage.update_user_points("missing", 1, 1).await.unwrap());
    }

    #[tokio::test]
    async fn test_activity_counters() {
        let storage = setup().await;
        let now = Utc::now();
        let u1 = storage.create_user(&new_user("Uno", "uno@example.com"), now).await.unwrap();
        let u2 = storage.create_user(&new_user("Dos", "dos@example.com"), now).await.unwrap();

        for (user, activity) in [(&u1, "submit_idea"), (&u1, "submit_idea"), (&u1, "daily_login"), (&u2, "submit_idea")] {
            assert!(storage.record_activity_points(&user.id, activity, 10, 1).await.unwrap());
        }

        let counts = storage.activity_counts(&u1.id).await.unwrap();
        assert_eq!(counts.get("submit_idea"), Some(&2));
        assert_eq!(counts.get("daily_login"), Some(&1));
        assert_eq!(storage.activity_counts(&u2.id).await.unwrap().get("submit_idea"), Some(&1));
        assert!(storage.activity_counts("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_and_rank() {
        let storage = setup().await;
        let now = Utc::now();
        let a = storage.create_user(&new_user("A", "a@example.com"), now).await.unwrap();
        let b = storage
            .create_user(&new_user("B", "b@example.com"), now + chrono::Duration::seconds(1))
            .await
            .unwrap();
        let c = storage
            .create_user(&new_user("C", "c@example.com"), now + chrono::Duration::seconds(2))
            .await
            .unwrap();

        storage.update_user_points(&a.id, 50, 1).await.unwrap();
        storage.update_user_points(&b.id, 200, 2).await.unwrap();
        storage.update_user_points(&c.id, 50, 1).await.unwrap();

        let board = storage.leaderboard(10).await.unwrap();
        let ids: Vec<_> = board.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec![b.id.as_str(), a.id.as_str(), c.id.as_str()]);

        assert_eq!(storage.user_rank(&b.id).await.unwrap(), Some(1));
        assert_eq!(storage.user_rank(&a.id).await.unwrap(), Some(2));
        assert_eq!(storage.user_rank(&c.id).await.unwrap(), Some(3));
        assert_eq!(storage.user_rank("missing").await.unwrap(), None);

        assert_eq!(storage.leaderboard(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_activity_points() {
        let storage = setup().await;
        let user = storage.create_user(&new_user("Ana", "ana@example.com"), Utc::now()).await.unwrap();

        assert!(storage.record_activity_points(&user.id, "daily_login", 5, 1).await.unwrap());
        assert!(!storage.record_activity_points("missing", "daily_login", 5, 1).await.unwrap());

        let stored = storage.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.points, 5);
        let counts = storage.activity_counts(&user.id).await.unwrap();
        assert_eq!(counts.get("daily_login"), Some(&1));
        assert!(storage.activity_counts("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_activity_points_rolls_back_on_counter_failure() {
        let storage = setup().await;
        let user = storage.create_user(&new_user("Ana", "ana@example.com"), Utc::now()).await.unwrap();
        sqlx::query("DROP TABLE user_activities")
            .execute(&storage.pool)
            .await
            .unwrap();

        assert!(storage.record_activity_points(&user.id, "daily_login", 5, 1).await.is_err());

        let stored = storage.get_user_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(stored.points, 0);
    }

    #[tokio::test]
    async fn test_rank_matches_leaderboard_for_same_second_ties() {
        let storage = setup().await;
        let now = Utc::now();
        for (name, email) in [("A", "a@example.com"), ("B", "b@example.com"), ("C", "c@example.com")] {
            let user = storage.create_user(&new_user(name, email), now).await.unwrap();
            storage.update_user_points(&user.id, 100, 2).await.unwrap();
        }

        let board = storage.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 3);
        for (position, user) in board.iter().enumerate() {
            let rank = storage.user_rank(&user.id).await.unwrap();
            assert_eq!(rank, Some(position as u32 + 1));
        }
    }

    #[tokio::test]
    async fn test_user_rewards_are_per_user() {
        let storage = setup().await;
        let now = Utc::now();

        assert!(storage.insert_user_reward("u1", "eco_starter", now).await.unwrap());
        assert!(!storage.insert_user_reward("u1", "eco_starter", now).await.unwrap());
        assert!(storage.insert_user_reward("u2", "eco_starter", now).await.unwrap());

        let u1 = storage.user_rewards("u1").await.unwrap();
        assert!(u1.contains_key("eco_starter"));
        assert!(storage.user_rewards("u3").await.unwrap().is_empty());
    }
}
