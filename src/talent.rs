//! Talent discovery quiz: a linear wizard whose intermediate answers live in
//! the local store until the final profile is saved to the backend.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::TalentResultCreate;

pub const STRENGTH_OPTIONS: [&str; 4] = ["論理的思考力", "コミュニケーション能力", "創造性", "リーダーシップ"];
pub const COMPANION_OPTIONS: [&str; 4] = ["ポジティブな人", "知的好奇心が旺盛な人", "誠実な人", "その他"];
pub const ABSORPTION_OPTIONS: [&str; 4] = ["仕事", "学習", "趣味", "人との対話"];

pub const DRAFT_ANSWERS: &str = "answers";
pub const DRAFT_FIRST_PICK: &str = "selected";
pub const DRAFT_ADDITIONAL: &str = "additional";
pub const DRAFT_SECOND_PICK: &str = "reselected";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalentAnswers {
    #[serde(default)]
    pub q1: String,
    #[serde(default)]
    pub q2: String,
    #[serde(default)]
    pub q3: String,
    #[serde(default)]
    pub q4: String,
    #[serde(default)]
    pub q5: Vec<String>,
    #[serde(default)]
    pub q5_other: String,
}

impl TalentAnswers {
    pub fn filled_count(&self) -> usize {
        [
            !self.q1.trim().is_empty(),
            !self.q2.trim().is_empty(),
            !self.q3.is_empty(),
            !self.q4.trim().is_empty(),
            !self.q5.is_empty() || !self.q5_other.trim().is_empty(),
        ]
        .iter()
        .filter(|filled| **filled)
        .count()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.q3.is_empty() && !STRENGTH_OPTIONS.contains(&self.q3.as_str()) {
            return Err(ValidationError::not_allowed("q3", &STRENGTH_OPTIONS));
        }
        if let Some(other) = self
            .q5
            .iter()
            .find(|choice| !COMPANION_OPTIONS.contains(&choice.as_str()))
        {
            return Err(ValidationError::Rule(format!("unknown q5 choice '{other}'")));
        }
        if self.filled_count() < 5 {
            return Err(ValidationError::Rule(format!(
                "all 5 questions must be answered ({} of 5 filled)",
                self.filled_count()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalAnswers {
    #[serde(default)]
    pub q9: Vec<String>,
    #[serde(default)]
    pub q9_other: String,
    #[serde(default)]
    pub q12: String,
}

impl AdditionalAnswers {
    pub fn filled_count(&self) -> usize {
        let absorbed = !self.q9.is_empty() || !self.q9_other.trim().is_empty();
        let thanked = !self.q12.trim().is_empty();
        usize::from(absorbed) + usize::from(thanked)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(other) = self
            .q9
            .iter()
            .find(|choice| !ABSORPTION_OPTIONS.contains(&choice.as_str()))
        {
            return Err(ValidationError::Rule(format!("unknown q9 choice '{other}'")));
        }
        if self.filled_count() < 2 {
            return Err(ValidationError::Rule(format!(
                "both questions must be answered ({} of 2 filled)",
                self.filled_count()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TalentOption {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub const FIRST_PASS: [TalentOption; 3] = [
    TalentOption {
        id: "communicator",
        title: "人を繋ぐコミュニケーションの達人",
        description: "多様な価値観を持つ人々と対話し、新しい関係性を築きたい。",
    },
    TalentOption {
        id: "analyst",
        title: "論理的思考で問題を解決するアナリスト",
        description: "複雑な情報を整理し、データに基づいた最適な解決策を導き出したい。",
    },
    TalentOption {
        id: "artist",
        title: "創造性で世界を彩るアーティスト",
        description: "既成概念にとらわれず、独自のアイデアや表現で新しい価値を生み出したい。",
    },
];

pub const SECOND_PASS: [TalentOption; 3] = [
    TalentOption {
        id: "order",
        title: "秩序の創造者",
        description: "複雑な状況や情報を整理し、明確な構造やシステムを構築することに情熱を注ぐ。",
    },
    TalentOption {
        id: "empathy",
        title: "共感の架け橋",
        description: "他者の感情や視点を深く理解し、人々の間にある隔たりを埋めることに喜びを感じる。",
    },
    TalentOption {
        id: "explorer",
        title: "未知への探求者",
        description: "まだ誰も足を踏み入れたことのない領域や、新しい知識、アイデアを探求したい。",
    },
];

pub const DEFAULT_FIRST_PICK: &str = "communicator";
pub const DEFAULT_SECOND_PICK: &str = "empathy";

pub fn find_option(options: &[TalentOption], id: &str) -> Result<TalentOption, ValidationError> {
    options
        .iter()
        .copied()
        .find(|option| option.id == id)
        .ok_or_else(|| {
            let ids: Vec<&str> = options.iter().map(|option| option.id).collect();
            ValidationError::not_allowed("talent", &ids)
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Step {
    Questionnaire,
    Analysis,
    Additional,
    Reanalysis,
    Result,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::Questionnaire => "questionnaire",
            Step::Analysis => "analysis",
            Step::Additional => "additional questions",
            Step::Reanalysis => "reanalysis",
            Step::Result => "result",
        }
    }
}

/// Quiz state restored from drafts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuizProgress {
    pub answers: Option<TalentAnswers>,
    pub first_pick: Option<String>,
    pub additional: Option<AdditionalAnswers>,
    pub second_pick: Option<String>,
}

impl QuizProgress {
    pub fn first_pick(&self) -> &str {
        self.first_pick.as_deref().unwrap_or(DEFAULT_FIRST_PICK)
    }

    pub fn second_pick(&self) -> &str {
        self.second_pick.as_deref().unwrap_or(DEFAULT_SECOND_PICK)
    }

    /// The first step whose requirements are not yet met.
    pub fn next_step(&self) -> Step {
        match (&self.answers, &self.first_pick, &self.additional, &self.second_pick) {
            (None, _, _, _) => Step::Questionnaire,
            (Some(answers), _, _, _) if answers.validate().is_err() => Step::Questionnaire,
            (Some(_), None, _, _) => Step::Analysis,
            (Some(_), Some(_), None, _) => Step::Additional,
            (Some(_), Some(_), Some(additional), _) if additional.validate().is_err() => {
                Step::Additional
            }
            (Some(_), Some(_), Some(_), None) => Step::Reanalysis,
            (Some(_), Some(_), Some(_), Some(_)) => Step::Result,
        }
    }

    /// Builds the profile to save; every earlier step must be complete.
    pub fn result(&self) -> Result<TalentResultCreate, ValidationError> {
        let step = self.next_step();
        if step != Step::Result {
            return Err(ValidationError::Rule(format!(
                "the quiz is not finished; next step is {}",
                step.label()
            )));
        }
        profile_for(self.second_pick())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn profile_for(talent_id: &str) -> Result<TalentResultCreate, ValidationError> {
    let option = find_option(&SECOND_PASS, talent_id)?;
    let result = match option.id {
        "order" => TalentResultCreate {
            talent_type: option.title.to_string(),
            talent_name: "構造化力".to_string(),
            description: "複雑な状況や情報の中にパターンを見出し、誰もが動きやすい仕組みへと整える力です。".to_string(),
            keywords: strings(&["整理", "仕組み化", "計画", "再現性"]),
            strengths: strings(&[
                "散らばった情報を体系立てて整理する能力",
                "手順やルールを設計して周囲の迷いを減らす力",
                "長期的な計画を着実に運用する粘り強さ",
            ]),
            next_steps: strings(&[
                "身近な活動の手順書やチェックリストを作る",
                "プロジェクトの進行管理役を引き受ける",
                "情報設計やシステム思考に関する本を読む",
            ]),
        },
        "empathy" => TalentResultCreate {
            talent_type: option.title.to_string(),
            talent_name: "共感力".to_string(),
            description: "相手の感情や視点を深く理解し、異なる背景を持つ人々の間に相互理解を生み出す力です。".to_string(),
            keywords: strings(&["傾聴", "対話", "信頼", "協働"]),
            strengths: strings(&[
                "相手の立場に立って話を聴く力",
                "意見の違う人同士をつなぐ調整力",
                "安心して話せる場をつくる雰囲気づくり",
            ]),
            next_steps: strings(&[
                "クラスや部活動で聞き役・まとめ役を担う",
                "異なる世代の人へのヒアリングを企画する",
                "コミュニケーションや心理学に関する本を読む",
            ]),
        },
        _ => TalentResultCreate {
            talent_type: option.title.to_string(),
            talent_name: "探究力".to_string(),
            description: "未知の領域に自ら踏み出し、学び続けることで新しい発見を周囲にもたらす力です。".to_string(),
            keywords: strings(&["好奇心", "挑戦", "発見", "学び"]),
            strengths: strings(&[
                "わからないことを自分で調べ抜く行動力",
                "新しい分野にも臆せず飛び込む挑戦心",
                "得た知識を組み合わせて仮説を立てる力",
            ]),
            next_steps: strings(&[
                "気になるテーマで小さな探究プロジェクトを始める",
                "専門家や大学の公開講座に参加する",
                "探究の記録を継続的に発信する",
            ]),
        },
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_answers() -> TalentAnswers {
        TalentAnswers {
            q1: "新しい技術を学ぶこと".to_string(),
            q2: "プログラミング".to_string(),
            q3: "創造性".to_string(),
            q4: "文化祭の企画をやり遂げた".to_string(),
            q5: vec!["誠実な人".to_string()],
            q5_other: String::new(),
        }
    }

    fn complete_additional() -> AdditionalAnswers {
        AdditionalAnswers {
            q9: vec![],
            q9_other: "模型づくり".to_string(),
            q12: "友人のPCトラブルを解決した".to_string(),
        }
    }

    #[test]
    fn all_five_answers_are_required() {
        let mut answers = complete_answers();
        assert_eq!(answers.filled_count(), 5);
        assert!(answers.validate().is_ok());

        answers.q5.clear();
        assert_eq!(answers.filled_count(), 4);
        assert!(answers.validate().is_err());

        answers.q5_other = "面白い人".to_string();
        assert!(answers.validate().is_ok());
    }

    #[test]
    fn strength_choice_must_be_listed() {
        let mut answers = complete_answers();
        answers.q3 = "体力".to_string();
        assert!(matches!(
            answers.validate(),
            Err(ValidationError::NotAllowed { field: "q3", .. })
        ));
    }

    #[test]
    fn progress_walks_the_steps_in_order() {
        let mut progress = QuizProgress::default();
        assert_eq!(progress.next_step(), Step::Questionnaire);

        progress.answers = Some(complete_answers());
        assert_eq!(progress.next_step(), Step::Analysis);
        assert_eq!(progress.first_pick(), "communicator");

        progress.first_pick = Some("analyst".to_string());
        assert_eq!(progress.next_step(), Step::Additional);

        progress.additional = Some(AdditionalAnswers::default());
        assert_eq!(progress.next_step(), Step::Additional);

        progress.additional = Some(complete_additional());
        assert_eq!(progress.next_step(), Step::Reanalysis);
        assert!(progress.result().is_err());

        progress.second_pick = Some("explorer".to_string());
        assert_eq!(progress.next_step(), Step::Result);
        let result = progress.result().unwrap();
        assert_eq!(result.talent_type, "未知への探求者");
        assert_eq!(result.next_steps.len(), 3);
    }

    #[test]
    fn unknown_talent_ids_are_rejected() {
        assert!(find_option(&FIRST_PASS, "analyst").is_ok());
        assert!(find_option(&FIRST_PASS, "order").is_err());
        assert!(profile_for("wizard").is_err());
    }
}
