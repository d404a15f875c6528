//! Weekly questionnaire answers.
//!
//! Two wire shapes exist: the legacy one names a single gratitude target with
//! `gratitudeTarget`/`gratitudeMessage`, the current one carries a
//! `gratitudeTargets` list. Both decode into [`WeeklyAnswers`], which always
//! serializes in the current shape.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reflection {
    /// Planned-vs-actual self rating, 1 to 5.
    #[serde(default)]
    pub q1: Option<u8>,
    #[serde(default)]
    pub q2: String,
    #[serde(rename = "q3_didConduct", default)]
    pub did_conduct_interview: Option<bool>,
    #[serde(rename = "q3_couldExtract", default)]
    pub could_extract_issue: Option<bool>,
    #[serde(default)]
    pub q3_detail: String,
    #[serde(rename = "q4_wasInterviewed", default)]
    pub was_interviewed: Option<bool>,
    #[serde(rename = "q4_didSpeak", default)]
    pub did_speak_up: Option<bool>,
    #[serde(rename = "q4_couldSpeak", default)]
    pub could_convey: Option<bool>,
    #[serde(default)]
    pub q4_detail: String,
    /// What did not go well this week; the self-reported weakness.
    #[serde(default)]
    pub q5: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GratitudeTarget {
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "AnswerRecord")]
pub struct WeeklyAnswers {
    #[serde(flatten)]
    pub reflection: Reflection,
    #[serde(rename = "gratitudeTargets")]
    pub gratitude_targets: Vec<GratitudeTarget>,
}

/// Either wire shape. `gratitudeTargets` wins whenever the key is present,
/// so a target with a missing field is kept for validation to reject.
#[derive(Deserialize)]
struct AnswerRecord {
    #[serde(flatten)]
    reflection: Reflection,
    #[serde(rename = "gratitudeTargets", default)]
    gratitude_targets: Option<Vec<RawTarget>>,
    #[serde(rename = "gratitudeTarget", default)]
    gratitude_target: Option<String>,
    #[serde(rename = "gratitudeMessage", default)]
    gratitude_message: Option<String>,
}

#[derive(Deserialize)]
struct RawTarget {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
}

impl From<AnswerRecord> for WeeklyAnswers {
    fn from(record: AnswerRecord) -> Self {
        let gratitude_targets = match record.gratitude_targets {
            Some(targets) => targets
                .into_iter()
                .map(|target| GratitudeTarget {
                    name: target.name,
                    message: target.message,
                })
                .collect(),
            None => {
                let name = record.gratitude_target.unwrap_or_default();
                let message = record.gratitude_message.unwrap_or_default();
                if name.trim().is_empty() && message.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![GratitudeTarget { name, message }]
                }
            }
        };
        WeeklyAnswers {
            reflection: record.reflection,
            gratitude_targets,
        }
    }
}

impl WeeklyAnswers {
    pub fn gratitude_messages(&self) -> impl Iterator<Item = &str> {
        self.gratitude_targets
            .iter()
            .map(|target| target.message.trim())
            .filter(|message| !message.is_empty())
    }

    /// Checks every wizard step; nothing is sent when this fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let reflection = &self.reflection;

        match reflection.q1 {
            None => return Err(ValidationError::Required("q1")),
            Some(value) if !(1..=5).contains(&value) => {
                return Err(ValidationError::Rule("q1 must be between 1 and 5".to_string()))
            }
            Some(_) => {}
        }

        if reflection.q2.trim().is_empty() {
            return Err(ValidationError::Required("q2"));
        }

        match reflection.did_conduct_interview {
            None => return Err(ValidationError::Required("q3_didConduct")),
            Some(true) => {
                if reflection.could_extract_issue.is_none() {
                    return Err(ValidationError::Required("q3_couldExtract"));
                }
                if reflection.q3_detail.trim().is_empty() {
                    return Err(ValidationError::Required("q3_detail"));
                }
            }
            Some(false) => {}
        }

        if reflection.was_interviewed.is_none() {
            return Err(ValidationError::Required("q4_wasInterviewed"));
        }

        match reflection.did_speak_up {
            None => return Err(ValidationError::Required("q4_didSpeak")),
            Some(true) if reflection.could_convey.is_none() => {
                return Err(ValidationError::Required("q4_couldSpeak"))
            }
            Some(_) => {}
        }

        for target in &self.gratitude_targets {
            if target.name.trim().is_empty() {
                return Err(ValidationError::Required("gratitude target name"));
            }
            if target.message.trim().is_empty() {
                return Err(ValidationError::Required("gratitude message"));
            }
        }

        if reflection.q5.trim().is_empty() {
            return Err(ValidationError::Required("q5"));
        }

        Ok(())
    }

    /// Drops follow-up answers whose gating question was answered "no".
    pub fn normalized(mut self) -> Self {
        if self.reflection.did_conduct_interview == Some(false) {
            self.reflection.could_extract_issue = None;
            self.reflection.q3_detail.clear();
        }
        if self.reflection.did_speak_up == Some(false) {
            self.reflection.could_convey = None;
        }
        self
    }
}

#[cfg(test)]
pub(crate) fn sample_answers() -> WeeklyAnswers {
    WeeklyAnswers {
        reflection: Reflection {
            q1: Some(4),
            q2: "Shared the survey draft with the team".to_string(),
            did_conduct_interview: Some(true),
            could_extract_issue: Some(true),
            q3_detail: "Interviewed the library staff about opening hours".to_string(),
            was_interviewed: Some(false),
            did_speak_up: Some(true),
            could_convey: Some(false),
            q4_detail: String::new(),
            q5: "Ran out of time before the deadline".to_string(),
        },
        gratitude_targets: vec![GratitudeTarget {
            name: "Sato".to_string(),
            message: "Thanks for checking my slides".to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_single_target_is_upgraded() {
        let raw = r#"{
            "q1": 3,
            "q2": "Drafted the plan",
            "q3_didConduct": false,
            "q5": "Procrastinated",
            "gratitudeTarget": "Tanaka",
            "gratitudeMessage": "Helped me with the data"
        }"#;
        let answers: WeeklyAnswers = serde_json::from_str(raw).unwrap();
        assert_eq!(answers.reflection.q1, Some(3));
        assert_eq!(
            answers.gratitude_targets,
            vec![GratitudeTarget {
                name: "Tanaka".to_string(),
                message: "Helped me with the data".to_string(),
            }]
        );
    }

    #[test]
    fn legacy_without_gratitude_has_no_targets() {
        let raw = r#"{ "q1": 2, "q2": "x", "q5": "y" }"#;
        let answers: WeeklyAnswers = serde_json::from_str(raw).unwrap();
        assert!(answers.gratitude_targets.is_empty());
    }

    #[test]
    fn current_multi_target_is_kept() {
        let raw = r#"{
            "q1": 5,
            "q3_didConduct": true,
            "q3_couldExtract": true,
            "gratitudeTargets": [
                { "name": "Sato", "message": "Thanks" },
                { "name": "Ito", "message": "  " }
            ]
        }"#;
        let answers: WeeklyAnswers = serde_json::from_str(raw).unwrap();
        assert_eq!(answers.gratitude_targets.len(), 2);
        assert_eq!(answers.gratitude_messages().collect::<Vec<_>>(), vec!["Thanks"]);
        assert_eq!(answers.reflection.did_conduct_interview, Some(true));
    }

    #[test]
    fn target_with_missing_message_is_kept_and_rejected() {
        let raw = r#"{
            "q1": 4,
            "q2": "x",
            "q3_didConduct": false,
            "q4_wasInterviewed": false,
            "q4_didSpeak": false,
            "q5": "y",
            "gratitudeTargets": [{ "name": "Sato" }]
        }"#;
        let answers: WeeklyAnswers = serde_json::from_str(raw).unwrap();
        assert_eq!(answers.gratitude_targets.len(), 1);
        assert_eq!(answers.gratitude_targets[0].name, "Sato");
        assert_eq!(
            answers.validate(),
            Err(ValidationError::Required("gratitude message"))
        );
    }

    #[test]
    fn null_target_is_an_error_not_a_legacy_record() {
        let raw = r#"{ "q1": 4, "q5": "y", "gratitudeTargets": [null] }"#;
        assert!(serde_json::from_str::<WeeklyAnswers>(raw).is_err());
    }

    #[test]
    fn wrong_field_type_names_the_problem() {
        let raw = r#"{ "q1": "4", "q5": "y" }"#;
        let err = serde_json::from_str::<WeeklyAnswers>(raw).unwrap_err().to_string();
        assert!(!err.contains("untagged"), "{err}");
        assert!(err.contains("invalid type"), "{err}");
    }

    #[test]
    fn serializes_in_current_shape() {
        let value = serde_json::to_value(sample_answers()).unwrap();
        assert!(value.get("gratitudeTargets").is_some());
        assert!(value.get("gratitudeTarget").is_none());
        assert_eq!(value["q3_didConduct"], true);
    }

    #[test]
    fn validation_requires_detail_when_interview_conducted() {
        let mut answers = sample_answers();
        answers.reflection.q3_detail = "  ".to_string();
        assert_eq!(answers.validate(), Err(ValidationError::Required("q3_detail")));
    }

    #[test]
    fn validation_rejects_out_of_range_likert() {
        let mut answers = sample_answers();
        answers.reflection.q1 = Some(6);
        assert!(answers.validate().is_err());
        answers.reflection.q1 = Some(1);
        assert!(answers.validate().is_ok());
    }

    #[test]
    fn normalizing_clears_unreachable_follow_ups() {
        let mut answers = sample_answers();
        answers.reflection.did_conduct_interview = Some(false);
        let answers = answers.normalized();
        assert_eq!(answers.reflection.could_extract_issue, None);
        assert!(answers.reflection.q3_detail.is_empty());
    }
}
