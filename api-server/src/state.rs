//! Application state

use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;
use taskdesk_core::analytics::{AnalyticsRepository, SqliteAnalytics};
use taskdesk_core::comment::{CommentRepository, SqliteCommentStore};
use taskdesk_core::file::{FileRepository, LocalObjectStore, SqliteFileStore};
use taskdesk_core::task::{SqliteTaskStore, TaskRepository};
use taskdesk_core::user::{SqliteUserDirectory, User, UserDirectory};
use taskdesk_core::Database;

use crate::auth::TokenIssuer;
use crate::cache::TtlCache;
use crate::config::ServerConfig;
use crate::rate_limit::RateLimiter;

/// Public view of a user, as returned by login and `/api/auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub full_name: String,
    pub created_at: String,
    pub active: bool,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            created_at: user
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            active: user.active,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    tasks: Arc<dyn TaskRepository>,
    users: Arc<dyn UserDirectory>,
    comments: Arc<dyn CommentRepository>,
    files: Arc<dyn FileRepository>,
    objects: LocalObjectStore,
    analytics: Arc<dyn AnalyticsRepository>,
    tokens: TokenIssuer,
    profiles: TtlCache<i64, UserProfile>,
    limiter: RateLimiter,
}

impl AppState {
    /// Open the database under the configured data directory.
    pub fn open(config: &ServerConfig) -> taskdesk_core::Result<Self> {
        let db = Database::open(config.database_path())?;
        Ok(Self::with_database(db, config))
    }

    /// State backed by SQLite stores sharing one database handle.
    pub fn with_database(db: Database, config: &ServerConfig) -> Self {
        Self::with_stores(
            Arc::new(SqliteTaskStore::new(db.clone())),
            Arc::new(SqliteUserDirectory::new(db.clone())),
            Arc::new(SqliteCommentStore::new(db.clone())),
            Arc::new(SqliteFileStore::new(db.clone())),
            Arc::new(SqliteAnalytics::new(db)),
            config,
        )
    }

    pub fn with_stores(
        tasks: Arc<dyn TaskRepository>,
        users: Arc<dyn UserDirectory>,
        comments: Arc<dyn CommentRepository>,
        files: Arc<dyn FileRepository>,
        analytics: Arc<dyn AnalyticsRepository>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                tasks,
                users,
                comments,
                files,
                objects: LocalObjectStore::new(config.uploads_dir()),
                analytics,
                tokens: TokenIssuer::new(&config.jwt_secret, config.jwt_ttl),
                profiles: TtlCache::new(config.cache_ttl),
                limiter: RateLimiter::new(config.rate_limit, config.trust_proxy),
            }),
        }
    }

    pub fn tasks(&self) -> &dyn TaskRepository {
        self.inner.tasks.as_ref()
    }

    pub fn users(&self) -> &dyn UserDirectory {
        self.inner.users.as_ref()
    }

    pub fn comments(&self) -> &dyn CommentRepository {
        self.inner.comments.as_ref()
    }

    pub fn files(&self) -> &dyn FileRepository {
        self.inner.files.as_ref()
    }

    /// Where uploaded bytes are kept.
    pub fn objects(&self) -> &LocalObjectStore {
        &self.inner.objects
    }

    pub fn analytics(&self) -> &dyn AnalyticsRepository {
        self.inner.analytics.as_ref()
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.inner.tokens
    }

    pub fn profiles(&self) -> &TtlCache<i64, UserProfile> {
        &self.inner.profiles
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }
}
