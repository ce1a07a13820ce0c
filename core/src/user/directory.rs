//! User directory trait and assignment checks.

use std::collections::BTreeSet;

use async_trait::async_trait;

use super::model::User;
use crate::{Error, Result};

/// Lookup and registration of users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Register a user. A taken email fails with `Conflict`.
    async fn create(&self, email: &str, password_hash: &str, full_name: &str) -> Result<User>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Every user whose id is listed. Unknown ids are simply absent from the result.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;

    async fn set_active(&self, id: i64, active: bool) -> Result<()>;
}

/// Fails with [`Error::Reference`] unless every id names an existing, active user.
pub async fn ensure_assignable(directory: &dyn UserDirectory, ids: &[i64]) -> Result<()> {
    let unique: BTreeSet<i64> = ids.iter().copied().collect();
    if unique.is_empty() {
        return Ok(());
    }

    let wanted: Vec<i64> = unique.iter().copied().collect();
    let found = directory.find_by_ids(&wanted).await?;

    let missing: Vec<i64> = unique
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|user| user.id == *id))
        .collect();
    if !missing.is_empty() {
        return Err(Error::Reference(format!(
            "Assigned user(s) not found: {}",
            join_ids(&missing)
        )));
    }

    let inactive: Vec<i64> = found
        .iter()
        .filter(|user| !user.active)
        .map(|user| user.id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !inactive.is_empty() {
        return Err(Error::Reference(format!(
            "Assigned user(s) inactive: {}",
            join_ids(&inactive)
        )));
    }

    Ok(())
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
