//! Comment model and input validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, ValidationErrors};

pub const MAX_COMMENT_LEN: usize = 5_000;

/// A comment on a task. Shares the soft-delete shape of [`crate::task::Task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Body of a create or update comment request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentInput {
    #[serde(default)]
    pub content: Option<String>,
}

impl CommentInput {
    /// Trimmed content, 1 to 5000 characters.
    pub fn validate(self) -> Result<String> {
        let content = self.content.as_deref().unwrap_or("").trim().to_string();
        let len = content.chars().count();
        if len == 0 || len > MAX_COMMENT_LEN {
            let mut errors = ValidationErrors::new();
            errors.push(
                "content",
                format!(
                    "Content is required and must be less than {} characters",
                    MAX_COMMENT_LEN
                ),
            );
            return Err(Error::Validation(errors));
        }
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed_and_bounded() {
        let ok = CommentInput {
            content: Some("  looks good  ".to_string()),
        };
        assert_eq!(ok.validate().unwrap(), "looks good");

        for content in [None, Some("   ".to_string()), Some("x".repeat(MAX_COMMENT_LEN + 1))] {
            assert!(matches!(
                CommentInput { content }.validate(),
                Err(Error::Validation(_))
            ));
        }
    }
}
