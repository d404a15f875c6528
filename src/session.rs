use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::access::{home_for, Route};
use crate::client::ApiClient;
use crate::db;
use crate::models::{LoginResponse, Role, User};

pub const SESSION_TTL_HOURS: i64 = 24;

/// The signed-in account as kept in the local store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub access_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn from_login(response: &LoginResponse, now: DateTime<Utc>) -> Self {
        Self {
            user_id: response.user.id.clone(),
            email: response.user.email.clone(),
            name: response.user.display_name().to_string(),
            role: response.user.role,
            access_token: response.access_token.clone(),
            created_at: now,
            expires_at: now + Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn home(&self) -> Route {
        home_for(self.role)
    }
}

pub struct ActiveSession {
    pub client: ApiClient,
    pub user: User,
}

pub async fn sign_in(
    pool: &SqlitePool,
    response: &LoginResponse,
    now: DateTime<Utc>,
) -> anyhow::Result<StoredSession> {
    let session = StoredSession::from_login(response, now);
    db::save_session(pool, &session)
        .await
        .context("failed to store session")?;
    log::info!("signed in as {} ({})", session.email, session.role);
    Ok(session)
}

/// Loads the stored token and confirms it with `/auth/me`. A missing,
/// expired or rejected token clears the stored session.
pub async fn restore(
    pool: &SqlitePool,
    client: ApiClient,
    now: DateTime<Utc>,
) -> anyhow::Result<ActiveSession> {
    let Some(session) = db::load_session(pool).await? else {
        anyhow::bail!("not logged in; run `skill-tracker login` ({})", Route::Login);
    };

    if session.is_expired(now) {
        db::clear_session(pool).await?;
        anyhow::bail!("session expired; log in again ({})", Route::Login);
    }

    let client = client.with_token(session.access_token);
    match client.current_user().await {
        Ok(user) => Ok(ActiveSession { client, user }),
        Err(err) if err.is_unauthorized() => {
            log::warn!("stored token rejected: {err}");
            db::clear_session(pool).await?;
            Err(anyhow::Error::new(err).context(format!(
                "session is no longer valid; log in again ({})",
                Route::Login
            )))
        }
        Err(err) => Err(err.into()),
    }
}
