use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::client::ApiClient;
use crate::db;
use crate::journal::{self, StrengthWeakness};
use crate::models::{HumilityRequest, HumilityScore, Questionnaire};

/// A previously fetched score and when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownHumility {
    pub score: HumilityScore,
    pub evaluated_at: DateTime<Utc>,
}

/// Returned when a fresh score could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stale {
    pub last_known: Option<KnownHumility>,
    pub reason: String,
}

pub type HumilityOutcome = Result<HumilityScore, Stale>;

/// The newest journal weakness, else the newest non-empty `q5` answer.
pub fn latest_weakness(entries: &[StrengthWeakness], questionnaires: &[&Questionnaire]) -> Option<String> {
    if let Some(weakness) = journal::latest_weakness(entries) {
        return Some(weakness.to_string());
    }

    questionnaires
        .iter()
        .filter_map(|q| {
            let answers = q.answers.as_ref()?;
            let q5 = answers.reflection.q5.trim();
            if q5.is_empty() {
                None
            } else {
                Some((q.submitted_at.unwrap_or(q.deadline), q5))
            }
        })
        .max_by_key(|(when, _)| *when)
        .map(|(_, q5)| q5.to_string())
}

pub fn build_request(questionnaires: &[&Questionnaire], weakness: Option<String>) -> HumilityRequest {
    let gratitude_messages = questionnaires
        .iter()
        .filter_map(|q| q.answers.as_ref())
        .flat_map(|answers| answers.gratitude_messages())
        .map(str::to_string)
        .collect();

    HumilityRequest {
        gratitude_messages,
        weakness: weakness.unwrap_or_default(),
    }
}

async fn stale(pool: &SqlitePool, user_id: &str, reason: String) -> Stale {
    let last_known = match db::load_humility(pool, user_id).await {
        Ok(known) => known,
        Err(err) => {
            log::warn!("could not read cached humility score: {err:#}");
            None
        }
    };
    Stale { last_known, reason }
}

/// Asks the backend for a humility score. Never fails outright: on any
/// error the last cached score is handed back instead.
pub async fn evaluate(
    client: &ApiClient,
    pool: &SqlitePool,
    user_id: &str,
    request: &HumilityRequest,
    now: DateTime<Utc>,
) -> HumilityOutcome {
    if request.is_empty() {
        let reason = "no gratitude messages or weakness to evaluate".to_string();
        return Err(stale(pool, user_id, reason).await);
    }

    match client.evaluate_humility(request).await {
        Ok(score) => {
            if let Err(err) = db::save_humility(pool, user_id, &score, now).await {
                log::warn!("could not cache humility score: {err:#}");
            }
            Ok(score)
        }
        Err(err) => {
            log::warn!("humility evaluation failed: {err}");
            Err(stale(pool, user_id, err.to_string()).await)
        }
    }
}

pub fn displayed_score(outcome: &HumilityOutcome) -> u32 {
    match outcome {
        Ok(score) => score.score,
        Err(stale) => stale.last_known.map(|known| known.score.score).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::{GratitudeTarget, Reflection, WeeklyAnswers};
    use crate::client::test_client;
    use crate::db::memory_pool;
    use crate::models::QuestionnaireStatus;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, day, 12, 0, 0).unwrap()
    }

    fn answered(day: u32, q5: &str, messages: &[&str]) -> Questionnaire {
        Questionnaire {
            id: format!("q-{day}"),
            user_id: "u-1".to_string(),
            week: day,
            title: String::new(),
            deadline: at(day),
            status: QuestionnaireStatus::Completed,
            answers: Some(WeeklyAnswers {
                reflection: Reflection {
                    q5: q5.to_string(),
                    ..Reflection::default()
                },
                gratitude_targets: messages
                    .iter()
                    .map(|message| GratitudeTarget {
                        name: "Sato".to_string(),
                        message: message.to_string(),
                    })
                    .collect(),
            }),
            submitted_at: Some(at(day)),
        }
    }

    #[test]
    fn request_collects_every_gratitude_message() {
        let set = [
            answered(2, "late", &["thanks for the notes", "great slides"]),
            answered(9, "", &["helped me practise"]),
        ];
        let refs: Vec<&Questionnaire> = set.iter().collect();
        let request = build_request(&refs, latest_weakness(&[], &refs));
        assert_eq!(request.gratitude_messages.len(), 3);
        assert_eq!(request.weakness, "late");
    }

    #[test]
    fn journal_weakness_wins_over_questionnaires() {
        let set = [answered(9, "rushed the ending", &[])];
        let refs: Vec<&Questionnaire> = set.iter().collect();
        let entry = StrengthWeakness::new("u-1", "focus", "too quiet", at(1)).unwrap();
        assert_eq!(latest_weakness(&[entry], &refs).as_deref(), Some("too quiet"));
        assert_eq!(latest_weakness(&[], &refs).as_deref(), Some("rushed the ending"));
    }

    #[tokio::test]
    async fn success_is_cached_and_failure_falls_back() {
        let server = MockServer::start().await;
        let pool = memory_pool().await;
        let request = HumilityRequest {
            gratitude_messages: vec!["thanks".to_string()],
            weakness: "late".to_string(),
        };

        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .and(body_json(json!({"gratitude_messages": ["thanks"], "weakness": "late"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "score": 64, "gratitude": 70, "self_reflection": 60, "openness": 62
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "model offline"})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let fresh = evaluate(&client, &pool, "u-1", &request, at(10)).await;
        assert_eq!(displayed_score(&fresh), 64);

        let stale = evaluate(&client, &pool, "u-1", &request, at(11)).await.unwrap_err();
        assert_eq!(stale.last_known.map(|known| known.evaluated_at), Some(at(10)));
        assert!(stale.reason.contains("model offline"));
        assert_eq!(displayed_score(&Err(stale)), 64);
    }

    #[tokio::test]
    async fn failure_without_history_shows_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let pool = memory_pool().await;
        let request = HumilityRequest {
            gratitude_messages: vec!["thanks".to_string()],
            weakness: String::new(),
        };
        let outcome = evaluate(&test_client(&server.uri()), &pool, "u-1", &request, at(10)).await;
        assert_eq!(outcome.as_ref().unwrap_err().last_known, None);
        assert_eq!(displayed_score(&outcome), 0);
    }

    #[tokio::test]
    async fn empty_request_is_not_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let pool = memory_pool().await;
        let request = HumilityRequest {
            gratitude_messages: Vec::new(),
            weakness: " ".to_string(),
        };
        let outcome = evaluate(&test_client(&server.uri()), &pool, "u-1", &request, at(10)).await;
        assert!(outcome.is_err());
    }
}
