use thiserror::Error;

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{MonthlyResult, SkillScores};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MonthState<'a> {
    Unfinalized,
    Finalized(&'a MonthlyResult),
}

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("{year}-{month:02} is already finalized")]
    AlreadyFinalized { year: i32, month: u32 },
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
    #[error(transparent)]
    Api(#[from] ApiError),
}

pub fn month_state(results: &[MonthlyResult], year: i32, month: u32) -> MonthState<'_> {
    results
        .iter()
        .find(|result| result.year == year && result.month == month)
        .map_or(MonthState::Unfinalized, MonthState::Finalized)
}

/// A finalized month always shows its snapshot, whatever the live scores say.
pub fn displayed_skills(state: MonthState<'_>, live: SkillScores) -> SkillScores {
    match state {
        MonthState::Finalized(result) => result.skills,
        MonthState::Unfinalized => live,
    }
}

/// Freezes (year, month). `results` is the list already fetched from the
/// backend; a month present there is rejected without a request.
pub async fn finalize(
    client: &ApiClient,
    results: &[MonthlyResult],
    year: i32,
    month: u32,
    humility_score: u32,
) -> Result<MonthlyResult, FinalizeError> {
    if !(1..=12).contains(&month) {
        return Err(FinalizeError::InvalidMonth(month));
    }
    if let MonthState::Finalized(_) = month_state(results, year, month) {
        return Err(FinalizeError::AlreadyFinalized { year, month });
    }

    let result = client.finalize_month(year, month, humility_score).await?;
    log::info!("finalized {year}-{month:02} at level {}", result.level);
    Ok(result)
}
