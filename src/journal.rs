use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::ValidationError;

pub const EDIT_WINDOW_DAYS: i64 = 3;

/// One weekly strength/weakness reflection, kept only in the local store.
#[derive(Debug, Clone, PartialEq)]
pub struct StrengthWeakness {
    pub id: Uuid,
    pub user_id: String,
    pub strength: String,
    pub weakness: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JournalError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("entries can only be edited within 3 days of creation")]
    EditWindowClosed,
}

fn check_text(strength: &str, weakness: &str) -> Result<(), ValidationError> {
    if strength.trim().is_empty() {
        return Err(ValidationError::Required("strength"));
    }
    if weakness.trim().is_empty() {
        return Err(ValidationError::Required("weakness"));
    }
    Ok(())
}

impl StrengthWeakness {
    pub fn new(
        user_id: &str,
        strength: &str,
        weakness: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        check_text(strength, weakness)?;
        Ok(Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            strength: strength.trim().to_string(),
            weakness: weakness.trim().to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn can_edit(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at < Duration::days(EDIT_WINDOW_DAYS)
    }

    pub fn edit(
        &mut self,
        strength: Option<&str>,
        weakness: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), JournalError> {
        if !self.can_edit(now) {
            return Err(JournalError::EditWindowClosed);
        }

        let strength = strength.unwrap_or(&self.strength).trim().to_string();
        let weakness = weakness.unwrap_or(&self.weakness).trim().to_string();
        check_text(&strength, &weakness)?;

        self.strength = strength;
        self.weakness = weakness;
        self.updated_at = now;
        Ok(())
    }
}

/// Newest entry's weakness text, if any entry exists.
pub fn latest_weakness(entries: &[StrengthWeakness]) -> Option<&str> {
    entries
        .iter()
        .max_by_key(|entry| entry.created_at)
        .map(|entry| entry.weakness.as_str())
}
