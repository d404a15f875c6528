use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use crate::humility::KnownHumility;
use crate::journal::StrengthWeakness;
use crate::models::{HumilityScore, Role};
use crate::projects::{Project, Resource, ResourceKind, StoredResource, TeamMember};
use crate::session::StoredSession;
use crate::talent::{
    AdditionalAnswers, QuizProgress, TalentAnswers, DRAFT_ADDITIONAL, DRAFT_ANSWERS,
    DRAFT_FIRST_PICK, DRAFT_SECOND_PICK,
};

pub async fn init_db(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn schema_version(pool: &SqlitePool) -> anyhow::Result<Option<i64>> {
    let version: Option<i64> = sqlx::query("SELECT MAX(version) AS version FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?
        .get("version");
    Ok(version)
}

pub async fn save_session(pool: &SqlitePool, session: &StoredSession) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, email, name, role, access_token, created_at, expires_at)
        VALUES (1, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE
        SET user_id = excluded.user_id,
            email = excluded.email,
            name = excluded.name,
            role = excluded.role,
            access_token = excluded.access_token,
            created_at = excluded.created_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&session.user_id)
    .bind(&session.email)
    .bind(&session.name)
    .bind(i64::from(u8::from(session.role)))
    .bind(&session.access_token)
    .bind(session.created_at)
    .bind(session.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_session(pool: &SqlitePool) -> anyhow::Result<Option<StoredSession>> {
    let row = sqlx::query(
        "SELECT user_id, email, name, role, access_token, created_at, expires_at \
         FROM sessions WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let code: i64 = row.get("role");
    let role = u8::try_from(code)
        .map_err(anyhow::Error::from)
        .and_then(|code| Role::try_from(code).map_err(anyhow::Error::msg))
        .context("stored session has an invalid role")?;

    Ok(Some(StoredSession {
        user_id: row.get("user_id"),
        email: row.get("email"),
        name: row.get("name"),
        role,
        access_token: row.get("access_token"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
    }))
}

pub async fn clear_session(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM sessions").execute(pool).await?;
    Ok(())
}

pub async fn insert_entry(pool: &SqlitePool, entry: &StrengthWeakness) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO strength_weaknesses (id, user_id, strength, weakness, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(entry.id)
    .bind(&entry.user_id)
    .bind(&entry.strength)
    .bind(&entry.weakness)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

fn entry_from_row(row: &SqliteRow) -> StrengthWeakness {
    StrengthWeakness {
        id: row.get("id"),
        user_id: row.get("user_id"),
        strength: row.get("strength"),
        weakness: row.get("weakness"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Newest first.
pub async fn list_entries(pool: &SqlitePool, user_id: &str) -> anyhow::Result<Vec<StrengthWeakness>> {
    let rows = sqlx::query(
        "SELECT id, user_id, strength, weakness, created_at, updated_at \
         FROM strength_weaknesses WHERE user_id = ? ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(entry_from_row).collect())
}

pub async fn get_entry(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
) -> anyhow::Result<Option<StrengthWeakness>> {
    let row = sqlx::query(
        "SELECT id, user_id, strength, weakness, created_at, updated_at \
         FROM strength_weaknesses WHERE user_id = ? AND id = ?",
    )
    .bind(user_id)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(entry_from_row))
}

pub async fn update_entry(pool: &SqlitePool, entry: &StrengthWeakness) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE strength_weaknesses
        SET strength = ?, weakness = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&entry.strength)
    .bind(&entry.weakness)
    .bind(entry.updated_at)
    .bind(entry.id)
    .bind(&entry.user_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn encode_resource(resource: &Resource) -> serde_json::Result<String> {
    match resource {
        Resource::Web(web) => serde_json::to_string(web),
        Resource::Literature(literature) => serde_json::to_string(literature),
        Resource::Survey(survey) => serde_json::to_string(survey),
    }
}

fn decode_resource(kind: &str, payload: &str) -> anyhow::Result<Resource> {
    let kind = ResourceKind::parse(kind).with_context(|| format!("unknown resource kind '{kind}'"))?;
    let resource = match kind {
        ResourceKind::Web => Resource::Web(serde_json::from_str(payload)?),
        ResourceKind::Literature => Resource::Literature(serde_json::from_str(payload)?),
        ResourceKind::Survey => Resource::Survey(serde_json::from_str(payload)?),
    };
    Ok(resource)
}

/// Writes the project row and replaces its members and resources in one
/// transaction.
pub async fn save_project(pool: &SqlitePool, project: &Project) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO projects
        (id, user_id, name, theme, background, hypothesis, presentation_url, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE
        SET name = excluded.name,
            theme = excluded.theme,
            background = excluded.background,
            hypothesis = excluded.hypothesis,
            presentation_url = excluded.presentation_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(project.id)
    .bind(&project.user_id)
    .bind(&project.name)
    .bind(&project.theme)
    .bind(&project.background)
    .bind(&project.hypothesis)
    .bind(&project.presentation_url)
    .bind(project.created_at)
    .bind(project.updated_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(project.id)
        .execute(&mut *tx)
        .await?;
    for (position, member) in project.team_members.iter().enumerate() {
        sqlx::query(
            "INSERT INTO project_members (project_id, member_id, name, position) VALUES (?, ?, ?, ?)",
        )
        .bind(project.id)
        .bind(&member.id)
        .bind(&member.name)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM project_resources WHERE project_id = ?")
        .bind(project.id)
        .execute(&mut *tx)
        .await?;
    for (position, stored) in project.resources.iter().enumerate() {
        let payload = encode_resource(&stored.resource)?;
        sqlx::query(
            "INSERT INTO project_resources (id, project_id, kind, payload, position) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(stored.id)
        .bind(project.id)
        .bind(stored.resource.kind().as_str())
        .bind(payload)
        .bind(position as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn hydrate_project(pool: &SqlitePool, row: &SqliteRow) -> anyhow::Result<Project> {
    let id: Uuid = row.get("id");

    let team_members = sqlx::query(
        "SELECT member_id, name FROM project_members WHERE project_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?
    .iter()
    .map(|member| TeamMember {
        id: member.get("member_id"),
        name: member.get("name"),
    })
    .collect();

    let resource_rows = sqlx::query(
        "SELECT id, kind, payload FROM project_resources WHERE project_id = ? ORDER BY position",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let mut resources = Vec::with_capacity(resource_rows.len());
    for resource in resource_rows {
        let kind: String = resource.get("kind");
        let payload: String = resource.get("payload");
        resources.push(StoredResource {
            id: resource.get("id"),
            resource: decode_resource(&kind, &payload)
                .with_context(|| format!("corrupt resource in project {id}"))?,
        });
    }

    Ok(Project {
        id,
        user_id: row.get("user_id"),
        name: row.get("name"),
        theme: row.get("theme"),
        background: row.get("background"),
        hypothesis: row.get("hypothesis"),
        presentation_url: row.get("presentation_url"),
        team_members,
        resources,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub async fn load_projects(pool: &SqlitePool, user_id: &str) -> anyhow::Result<Vec<Project>> {
    let rows = sqlx::query("SELECT * FROM projects WHERE user_id = ? ORDER BY created_at")
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let mut projects = Vec::with_capacity(rows.len());
    for row in rows {
        projects.push(hydrate_project(pool, &row).await?);
    }
    Ok(projects)
}

pub async fn load_project(
    pool: &SqlitePool,
    user_id: &str,
    id: Uuid,
) -> anyhow::Result<Option<Project>> {
    let row = sqlx::query("SELECT * FROM projects WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(hydrate_project(pool, &row).await?)),
        None => Ok(None),
    }
}

pub async fn delete_project(pool: &SqlitePool, user_id: &str, id: Uuid) -> anyhow::Result<bool> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("DELETE FROM projects WHERE user_id = ? AND id = ?")
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if result.rows_affected() == 0 {
        return Ok(false);
    }

    sqlx::query("DELETE FROM project_members WHERE project_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM project_resources WHERE project_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(true)
}

pub async fn save_draft<T: Serialize>(
    pool: &SqlitePool,
    user_id: &str,
    step: &str,
    value: &T,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let payload = serde_json::to_string(value)?;
    sqlx::query(
        r#"
        INSERT INTO talent_drafts (user_id, step, payload, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (user_id, step) DO UPDATE
        SET payload = excluded.payload, updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(step)
    .bind(payload)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_draft<T: DeserializeOwned>(
    pool: &SqlitePool,
    user_id: &str,
    step: &str,
) -> anyhow::Result<Option<T>> {
    let row = sqlx::query("SELECT payload FROM talent_drafts WHERE user_id = ? AND step = ?")
        .bind(user_id)
        .bind(step)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => {
            let payload: String = row.get("payload");
            let value = serde_json::from_str(&payload)
                .with_context(|| format!("corrupt talent draft '{step}'"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

pub async fn clear_drafts(pool: &SqlitePool, user_id: &str) -> anyhow::Result<u64> {
    let result = sqlx::query("DELETE FROM talent_drafts WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn load_quiz_progress(pool: &SqlitePool, user_id: &str) -> anyhow::Result<QuizProgress> {
    Ok(QuizProgress {
        answers: load_draft::<TalentAnswers>(pool, user_id, DRAFT_ANSWERS).await?,
        first_pick: load_draft::<String>(pool, user_id, DRAFT_FIRST_PICK).await?,
        additional: load_draft::<AdditionalAnswers>(pool, user_id, DRAFT_ADDITIONAL).await?,
        second_pick: load_draft::<String>(pool, user_id, DRAFT_SECOND_PICK).await?,
    })
}

pub async fn save_humility(
    pool: &SqlitePool,
    user_id: &str,
    score: &HumilityScore,
    evaluated_at: DateTime<Utc>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO humility_scores (user_id, score, gratitude, self_reflection, openness, evaluated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id) DO UPDATE
        SET score = excluded.score,
            gratitude = excluded.gratitude,
            self_reflection = excluded.self_reflection,
            openness = excluded.openness,
            evaluated_at = excluded.evaluated_at
        "#,
    )
    .bind(user_id)
    .bind(i64::from(score.score))
    .bind(i64::from(score.gratitude))
    .bind(i64::from(score.self_reflection))
    .bind(i64::from(score.openness))
    .bind(evaluated_at)
    .execute(pool)
    .await?;
    Ok(())
}

fn score_column(row: &SqliteRow, column: &str) -> anyhow::Result<u32> {
    let value: i64 = row.get(column);
    u32::try_from(value).with_context(|| format!("stored {column} is out of range: {value}"))
}

pub async fn load_humility(pool: &SqlitePool, user_id: &str) -> anyhow::Result<Option<KnownHumility>> {
    let row = sqlx::query(
        "SELECT score, gratitude, self_reflection, openness, evaluated_at \
         FROM humility_scores WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(KnownHumility {
        score: HumilityScore {
            score: score_column(&row, "score")?,
            gratitude: score_column(&row, "gratitude")?,
            self_reflection: score_column(&row, "self_reflection")?,
            openness: score_column(&row, "openness")?,
        },
        evaluated_at: row.get("evaluated_at"),
    }))
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_db(&pool).await.expect("migrations");
    pool
}
