use std::collections::BTreeMap;
use std::fmt::Write;

use crate::admin::UserSummary;
use crate::finalize::MonthState;
use crate::humility::HumilityOutcome;
use crate::models::{MonthlyResult, Skill, SkillScores, Student, User};
use crate::skills;

pub struct Dashboard<'a> {
    pub user: &'a User,
    pub year: i32,
    pub month: u32,
    pub state: MonthState<'a>,
    pub skills: SkillScores,
    pub humility: Option<&'a HumilityOutcome>,
    pub fell_back: bool,
    pub advice: Option<&'a str>,
}

pub fn humility_indicator(outcome: Option<&HumilityOutcome>) -> String {
    match outcome {
        None => "from snapshot".to_string(),
        Some(Ok(_)) => "fresh".to_string(),
        Some(Err(stale)) => match &stale.last_known {
            Some(known) => format!(
                "last known, evaluated {}",
                known.evaluated_at.format("%Y-%m-%d %H:%M")
            ),
            None => "unavailable".to_string(),
        },
    }
}

pub fn build_dashboard(view: &Dashboard<'_>) -> String {
    let mut output = String::new();
    let level = match view.state {
        MonthState::Finalized(result) => result.level,
        MonthState::Unfinalized => skills::overall_level(&view.skills),
    };

    let _ = writeln!(output, "# Skill Dashboard");
    let _ = writeln!(
        output,
        "{} ({}-{:02})",
        view.user.display_name(),
        view.year,
        view.month
    );
    let _ = writeln!(output);

    match view.state {
        MonthState::Finalized(_) => {
            let _ = writeln!(output, "Status: finalized (Lv.{level})");
        }
        MonthState::Unfinalized => {
            let _ = writeln!(output, "Status: live scores, not finalized (Lv.{level})");
            if view.fell_back {
                let _ = writeln!(
                    output,
                    "No questionnaires were due this month; showing all completed questionnaires."
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Skills");
    let _ = writeln!(output, "| Skill | Score | Level |");
    let _ = writeln!(output, "|---|---|---|");
    for (skill, score) in view.skills.entries() {
        let marker = if skill == Skill::Humility {
            format!(" ({})", humility_indicator(view.humility))
        } else {
            String::new()
        };
        let _ = writeln!(
            output,
            "| {}{} | {} | Lv.{} |",
            skill.label(),
            marker,
            score,
            skills::skill_level(score)
        );
    }

    let (top, top_score) = skills::highest(&view.skills);
    let (bottom, bottom_score) = skills::lowest(&view.skills);
    let _ = writeln!(output);
    let _ = writeln!(output, "- Strongest: {} ({})", top.label(), top_score);
    let _ = writeln!(output, "- Needs work: {} ({})", bottom.label(), bottom_score);

    if let Some(advice) = view.advice {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Advice");
        let _ = writeln!(output, "{}", advice.trim());
    }

    if let MonthState::Finalized(MonthlyResult {
        ai_comment: Some(comment),
        ..
    }) = view.state
    {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Comment");
        let _ = writeln!(output, "{}", comment.trim());
    }

    output
}

/// Newest first, each paired with its change against the previous month on record.
pub fn level_changes(results: &[MonthlyResult]) -> Vec<(&MonthlyResult, i64)> {
    let mut sorted: Vec<&MonthlyResult> = results.iter().collect();
    sorted.sort_by(|a, b| (b.year, b.month).cmp(&(a.year, a.month)));

    sorted
        .iter()
        .enumerate()
        .map(|(index, result)| {
            let change = sorted
                .get(index + 1)
                .map(|previous| i64::from(result.level) - i64::from(previous.level))
                .unwrap_or(0);
            (*result, change)
        })
        .collect()
}

pub fn build_history(results: &[MonthlyResult]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Monthly History");

    if results.is_empty() {
        let _ = writeln!(output, "No finalized months yet.");
        return output;
    }

    for (result, change) in level_changes(results) {
        let change = match change {
            0 => "±0".to_string(),
            positive if positive > 0 => format!("+{positive}"),
            negative => negative.to_string(),
        };
        let (top, top_score) = skills::highest(&result.skills);
        let _ = writeln!(
            output,
            "- {}-{:02}: Lv.{} ({}) strongest {} ({})",
            result.year,
            result.month,
            result.level,
            change,
            top.label(),
            top_score
        );
    }

    output
}

pub fn group_by_class(students: &[Student]) -> BTreeMap<String, Vec<&Student>> {
    let mut groups: BTreeMap<String, Vec<&Student>> = BTreeMap::new();
    for student in students {
        let class_name = student
            .class_name
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "unassigned".to_string());
        groups.entry(class_name).or_default().push(student);
    }
    for members in groups.values_mut() {
        members.sort_by(|a, b| a.name.cmp(&b.name));
    }
    groups
}

pub fn build_class_report(students: &[Student]) -> String {
    let groups = group_by_class(students);
    let mut output = String::new();

    let _ = writeln!(output, "# Class Dashboard");
    let _ = writeln!(output, "{} students in {} classes", students.len(), groups.len());

    for (class_name, members) in &groups {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} ({})", class_name, members.len());
        for student in members {
            let _ = writeln!(output, "- {} <{}>", student.name, student.email);
        }
    }

    output
}

pub fn build_admin_summary(summary: &UserSummary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Accounts");
    let _ = writeln!(output, "- Total: {}", summary.total);
    let _ = writeln!(output, "- 生徒: {}", summary.students);
    let _ = writeln!(output, "- 教師: {}", summary.teachers);
    let _ = writeln!(output, "- 管理者: {}", summary.admins);
    let _ = writeln!(output, "- Active: {} / Inactive: {}", summary.active, summary.inactive);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humility::{KnownHumility, Stale};
    use crate::models::{HumilityScore, Role};
    use chrono::{TimeZone, Utc};

    fn result(year: i32, month: u32, level: u32) -> MonthlyResult {
        MonthlyResult {
            id: format!("m-{year}-{month}"),
            user_id: "u-1".to_string(),
            year,
            month,
            level,
            skills: SkillScores {
                completion: 80,
                ..SkillScores::default()
            },
            ai_comment: None,
        }
    }

    fn student(name: &str, class_name: Option<&str>) -> Student {
        Student {
            id: name.to_lowercase(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            class_name: class_name.map(str::to_string),
        }
    }

    #[test]
    fn level_change_compares_with_previous_month() {
        let results = vec![result(2025, 4, 2), result(2025, 6, 3), result(2025, 5, 4)];
        let changes: Vec<(u32, i64)> = level_changes(&results)
            .into_iter()
            .map(|(result, change)| (result.month, change))
            .collect();
        assert_eq!(changes, vec![(6, -1), (5, 2), (4, 0)]);

        let history = build_history(&results);
        assert!(history.contains("2025-05: Lv.4 (+2)"));
        assert!(history.contains("2025-06: Lv.3 (-1)"));
    }

    #[test]
    fn humility_indicator_distinguishes_staleness() {
        let fresh: HumilityOutcome = Ok(HumilityScore {
            score: 60,
            gratitude: 60,
            self_reflection: 60,
            openness: 60,
        });
        assert_eq!(humility_indicator(Some(&fresh)), "fresh");

        let known: HumilityOutcome = Err(Stale {
            last_known: Some(KnownHumility {
                score: HumilityScore {
                    score: 55,
                    gratitude: 50,
                    self_reflection: 50,
                    openness: 50,
                },
                evaluated_at: Utc.with_ymd_and_hms(2025, 5, 3, 8, 30, 0).unwrap(),
            }),
            reason: "timeout".to_string(),
        });
        assert_eq!(
            humility_indicator(Some(&known)),
            "last known, evaluated 2025-05-03 08:30"
        );

        let missing: HumilityOutcome = Err(Stale {
            last_known: None,
            reason: "timeout".to_string(),
        });
        assert_eq!(humility_indicator(Some(&missing)), "unavailable");
    }

    #[test]
    fn dashboard_reports_finalized_snapshot() {
        let user = User {
            id: "u-1".to_string(),
            email: "kiara@example.com".to_string(),
            name: "Kiara".to_string(),
            role: Role::Student,
            is_active: true,
            profile_image: None,
            hobbies: None,
            current_focus: None,
            class_name: Some("1-A".to_string()),
        };
        let snapshot = result(2025, 5, 4);
        let report = build_dashboard(&Dashboard {
            user: &user,
            year: 2025,
            month: 5,
            state: MonthState::Finalized(&snapshot),
            skills: snapshot.skills,
            humility: None,
            fell_back: false,
            advice: Some("Keep interviewing people."),
        });
        assert!(report.contains("Status: finalized (Lv.4)"));
        assert!(report.contains("| 完遂する力 | 80 | Lv.5 |"));
        assert!(report.contains("Strongest: 完遂する力 (80)"));
        assert!(report.contains("## Advice"));
    }

    #[test]
    fn students_are_grouped_by_class() {
        let students = vec![
            student("Rin", Some("1-B")),
            student("Aoi", Some("1-B")),
            student("Sora", None),
            student("Mei", Some("1-A")),
        ];
        let groups = group_by_class(&students);
        let keys: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["1-A", "1-B", "unassigned"]);
        assert_eq!(groups["1-B"][0].name, "Aoi");

        let report = build_class_report(&students);
        assert!(report.contains("4 students in 3 classes"));
        assert!(report.contains("## 1-B (2)"));
    }
}
