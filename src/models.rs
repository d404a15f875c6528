use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::answers::WeeklyAnswers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Student => "生徒",
            Role::Teacher => "教師",
            Role::Admin => "管理者",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Student),
            1 => Ok(Role::Teacher),
            2 => Ok(Role::Admin),
            other => Err(format!("unknown role code {other}")),
        }
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => 0,
            Role::Teacher => 1,
            Role::Admin => 2,
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" | "0" => Ok(Role::Student),
            "teacher" | "1" => Ok(Role::Teacher),
            "admin" | "2" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}' (expected student, teacher or admin)")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub hobbies: Option<String>,
    #[serde(default)]
    pub current_focus: Option<Vec<String>>,
    #[serde(default)]
    pub class_name: Option<String>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoogleLoginRequest {
    pub credential: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionnaireStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: String,
    pub user_id: String,
    pub week: u32,
    #[serde(default)]
    pub title: String,
    #[serde(with = "timestamp")]
    pub deadline: DateTime<Utc>,
    pub status: QuestionnaireStatus,
    #[serde(default)]
    pub answers: Option<WeeklyAnswers>,
    #[serde(default, with = "timestamp::option")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Questionnaire {
    pub fn is_completed(&self) -> bool {
        self.status == QuestionnaireStatus::Completed
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        now < self.deadline
    }

    /// Completed questionnaires stay editable until their deadline.
    pub fn can_edit(&self, now: DateTime<Utc>) -> bool {
        self.is_completed() && self.is_open(now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswersPayload<'a> {
    pub answers: &'a WeeklyAnswers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    StrategicPlanning,
    ProblemSetting,
    Involvement,
    Dialogue,
    Execution,
    Completion,
    Humility,
}

impl Skill {
    pub const ALL: [Skill; 7] = [
        Skill::StrategicPlanning,
        Skill::ProblemSetting,
        Skill::Involvement,
        Skill::Dialogue,
        Skill::Execution,
        Skill::Completion,
        Skill::Humility,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Skill::StrategicPlanning => "戦略的計画力",
            Skill::ProblemSetting => "課題設定・構想力",
            Skill::Involvement => "巻き込む力",
            Skill::Dialogue => "対話する力",
            Skill::Execution => "実行する力",
            Skill::Completion => "完遂する力",
            Skill::Humility => "謙虚である力",
        }
    }
}

/// The seven competency scores, keyed by their Japanese names on the wire.
/// A missing key reads as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillScores {
    #[serde(rename = "戦略的計画力", default, deserialize_with = "wire_score")]
    pub strategic_planning: u32,
    #[serde(rename = "課題設定・構想力", default, deserialize_with = "wire_score")]
    pub problem_setting: u32,
    #[serde(rename = "巻き込む力", default, deserialize_with = "wire_score")]
    pub involvement: u32,
    #[serde(rename = "対話する力", default, deserialize_with = "wire_score")]
    pub dialogue: u32,
    #[serde(rename = "実行する力", default, deserialize_with = "wire_score")]
    pub execution: u32,
    #[serde(rename = "完遂する力", default, deserialize_with = "wire_score")]
    pub completion: u32,
    #[serde(rename = "謙虚である力", default, deserialize_with = "wire_score")]
    pub humility: u32,
}

/// Backend scores may arrive fractional; they are rounded half-up and
/// clamped to 0..=100.
fn wire_score<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = f64::deserialize(deserializer)?;
    Ok(crate::skills::round_half_up(raw).min(100))
}

impl SkillScores {
    pub fn get(&self, skill: Skill) -> u32 {
        match skill {
            Skill::StrategicPlanning => self.strategic_planning,
            Skill::ProblemSetting => self.problem_setting,
            Skill::Involvement => self.involvement,
            Skill::Dialogue => self.dialogue,
            Skill::Execution => self.execution,
            Skill::Completion => self.completion,
            Skill::Humility => self.humility,
        }
    }

    pub fn entries(&self) -> Vec<(Skill, u32)> {
        Skill::ALL.iter().map(|skill| (*skill, self.get(*skill))).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyResult {
    pub id: String,
    pub user_id: String,
    pub year: i32,
    pub month: u32,
    pub level: u32,
    pub skills: SkillScores,
    #[serde(default)]
    pub ai_comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TalentResult {
    #[serde(default)]
    pub id: Option<String>,
    pub talent_type: String,
    pub talent_name: String,
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TalentResultCreate {
    pub talent_type: String,
    pub talent_name: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub strengths: Vec<String>,
    pub next_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HumilityRequest {
    pub gratitude_messages: Vec<String>,
    pub weakness: String,
}

impl HumilityRequest {
    pub fn is_empty(&self) -> bool {
        self.gratitude_messages.is_empty() && self.weakness.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HumilityScore {
    pub score: u32,
    pub gratitude: u32,
    pub self_reflection: u32,
    pub openness: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkillAdviceRequest<'a> {
    pub skills: &'a SkillScores,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkillAdvice {
    pub advice: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobbies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_focus: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewEmailUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGoogleUser {
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.role.is_none()
            && self.class_name.is_none()
            && self.is_active.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Backend timestamps arrive either as RFC 3339 or as naive ISO strings in UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|value| value.with_timezone(&Utc))
            .ok()
            .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|value| value.and_utc()))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'"))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn role_uses_numeric_codes_on_the_wire() {
        assert_eq!(serde_json::to_string(&Role::Teacher).unwrap(), "1");
        let role: Role = serde_json::from_str("2").unwrap();
        assert_eq!(role, Role::Admin);
        assert!(serde_json::from_str::<Role>("7").is_err());
    }

    #[test]
    fn questionnaire_accepts_naive_deadlines() {
        let raw = r#"{
            "id": "q-1",
            "user_id": "u-1",
            "week": 3,
            "title": "Week 3",
            "deadline": "2025-05-09T23:59:00",
            "status": "pending",
            "answers": null,
            "created_at": "2025-05-01T00:00:00"
        }"#;
        let questionnaire: Questionnaire = serde_json::from_str(raw).unwrap();
        assert_eq!(
            questionnaire.deadline,
            Utc.with_ymd_and_hms(2025, 5, 9, 23, 59, 0).unwrap()
        );
        assert!(questionnaire.answers.is_none());
        assert!(questionnaire.submitted_at.is_none());
    }

    #[test]
    fn completed_questionnaire_is_editable_only_before_deadline() {
        let raw = r#"{
            "id": "q-1", "user_id": "u-1", "week": 1,
            "deadline": "2025-05-09T12:00:00Z", "status": "completed"
        }"#;
        let questionnaire: Questionnaire = serde_json::from_str(raw).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 5, 9, 11, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2025, 5, 9, 13, 0, 0).unwrap();
        assert!(questionnaire.can_edit(before));
        assert!(!questionnaire.can_edit(after));
    }

    #[test]
    fn skill_scores_use_japanese_keys() {
        let scores = SkillScores {
            strategic_planning: 58,
            humility: 55,
            ..SkillScores::default()
        };
        let value = serde_json::to_value(scores).unwrap();
        assert_eq!(value["戦略的計画力"], 58);
        assert_eq!(value["謙虚である力"], 55);
    }

    #[test]
    fn monthly_result_tolerates_fractional_and_missing_scores() {
        let raw = r#"{
            "id": "m-1", "user_id": "u-1", "year": 2025, "month": 5, "level": 3,
            "skills": { "戦略的計画力": 62.5, "巻き込む力": 100, "謙虚である力": 140.2 }
        }"#;
        let result: MonthlyResult = serde_json::from_str(raw).unwrap();
        assert_eq!(result.skills.strategic_planning, 63);
        assert_eq!(result.skills.involvement, 100);
        assert_eq!(result.skills.humility, 100);
        assert_eq!(result.skills.dialogue, 0);
    }
}
