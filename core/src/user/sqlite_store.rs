//! SQLite-backed user directory.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::{debug, info};

use super::directory::UserDirectory;
use super::model::User;
use crate::db::{from_millis, now_utc, to_millis, Database};
use crate::{Error, Result};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, active, created_at";

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        password_hash: row.get("password_hash")?,
        full_name: row.get("full_name")?,
        active: row.get("active")?,
        created_at: from_millis(row.get("created_at")?),
    })
}

#[derive(Clone)]
pub struct SqliteUserDirectory {
    db: Database,
}

impl SqliteUserDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create(&self, email: &str, password_hash: &str, full_name: &str) -> Result<User> {
        let email = email.to_string();
        let password_hash = password_hash.to_string();
        let full_name = full_name.to_string();

        self.db
            .run(move |conn| {
                let taken: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                    params![email],
                    |row| row.get(0),
                )?;
                if taken {
                    return Err(Error::Conflict("Email already registered".to_string()));
                }

                conn.execute(
                    "INSERT INTO users (email, password_hash, full_name, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![email, password_hash, full_name, to_millis(now_utc())],
                )?;
                let id = conn.last_insert_rowid();
                let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
                let user = conn
                    .query_row(&sql, params![id], parse_user_row)
                    .optional()?
                    .ok_or_else(|| Error::Storage("Failed to retrieve created user".to_string()))?;

                info!(user_id = user.id, "User registered");
                Ok(user)
            })
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
                Ok(conn.query_row(&sql, params![email], parse_user_row).optional()?)
            })
            .await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        self.db
            .run(move |conn| {
                let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
                Ok(conn.query_row(&sql, params![id], parse_user_row).optional()?)
            })
            .await
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();

        self.db
            .run(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let sql = format!(
                    "SELECT {} FROM users WHERE id IN ({}) ORDER BY id",
                    USER_COLUMNS, placeholders
                );
                let mut stmt = conn.prepare(&sql)?;
                let users = stmt
                    .query_map(params_from_iter(ids.iter()), parse_user_row)?
                    .collect::<rusqlite::Result<Vec<User>>>()?;
                debug!(requested = ids.len(), found = users.len(), "Resolved users");
                Ok(users)
            })
            .await
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<()> {
        self.db
            .run(move |conn| {
                let affected = conn.execute(
                    "UPDATE users SET active = ?1 WHERE id = ?2",
                    params![active, id],
                )?;
                if affected == 0 {
                    return Err(Error::NotFound(format!("User {} not found", id)));
                }
                info!(user_id = id, active, "User activity changed");
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::ensure_assignable;

    async fn directory() -> SqliteUserDirectory {
        SqliteUserDirectory::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let users = directory().await;
        let created = users
            .create("grace@example.com", "v1$salt$digest", "Grace Hopper")
            .await
            .unwrap();

        assert!(created.active);
        assert_eq!(
            users.find_by_email("grace@example.com").await.unwrap(),
            Some(created.clone())
        );
        assert_eq!(users.find_by_id(created.id).await.unwrap(), Some(created));
        assert_eq!(users.find_by_id(999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let users = directory().await;
        users.create("dup@example.com", "h", "First").await.unwrap();

        let err = users.create("dup@example.com", "h", "Second").await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }

    #[tokio::test]
    async fn find_by_ids_skips_unknown() {
        let users = directory().await;
        let a = users.create("a@example.com", "h", "A").await.unwrap();
        let b = users.create("b@example.com", "h", "B").await.unwrap();

        let found = users.find_by_ids(&[b.id, 42, a.id]).await.unwrap();
        assert_eq!(found.iter().map(|u| u.id).collect::<Vec<_>>(), vec![a.id, b.id]);
        assert!(users.find_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn assignment_requires_active_users() {
        let users = directory().await;
        let active = users.create("on@example.com", "h", "On").await.unwrap();
        let dormant = users.create("off@example.com", "h", "Off").await.unwrap();
        users.set_active(dormant.id, false).await.unwrap();

        ensure_assignable(&users, &[active.id, active.id]).await.unwrap();
        ensure_assignable(&users, &[]).await.unwrap();

        let err = ensure_assignable(&users, &[active.id, dormant.id])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Reference(ref msg) if msg.contains(&dormant.id.to_string())));

        let err = ensure_assignable(&users, &[77]).await.unwrap_err();
        assert!(matches!(err, Error::Reference(ref msg) if msg.contains("77")));
    }

    #[tokio::test]
    async fn set_active_on_unknown_user_fails() {
        let users = directory().await;
        assert!(matches!(
            users.set_active(5, false).await,
            Err(Error::NotFound(_))
        ));
    }
}
