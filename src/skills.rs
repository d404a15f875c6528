use chrono::Datelike;

use crate::models::{Questionnaire, Skill, SkillScores};

pub const MAX_LEVEL: u32 = 5;

/// Questionnaires feeding one month's live scores.
#[derive(Debug)]
pub struct MonthSelection<'a> {
    pub questionnaires: Vec<&'a Questionnaire>,
    /// True when nothing was due in the month and every completed
    /// questionnaire was used instead.
    pub fell_back: bool,
}

pub fn select_month(questionnaires: &[Questionnaire], year: i32, month: u32) -> MonthSelection<'_> {
    let in_month: Vec<&Questionnaire> = questionnaires
        .iter()
        .filter(|q| q.deadline.year() == year && q.deadline.month() == month)
        .collect();

    if !in_month.is_empty() {
        return MonthSelection {
            questionnaires: in_month,
            fell_back: false,
        };
    }

    MonthSelection {
        questionnaires: questionnaires.iter().filter(|q| q.is_completed()).collect(),
        fell_back: true,
    }
}

/// Half-up rounding, clamped at zero.
pub fn round_half_up(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    (value + 0.5).floor() as u32
}

fn percent(numerator: usize, denominator: usize) -> u32 {
    if denominator == 0 {
        return 0;
    }
    round_half_up(numerator as f64 / denominator as f64 * 100.0)
}

fn rate(successes: usize, attempts: usize) -> f64 {
    if attempts == 0 {
        0.0
    } else {
        successes as f64 / attempts as f64
    }
}

/// Computes the six questionnaire-derived scores; humility is left at zero.
pub fn aggregate(questionnaires: &[&Questionnaire]) -> SkillScores {
    let total = questionnaires.len();
    let reflections: Vec<_> = questionnaires
        .iter()
        .filter_map(|q| q.answers.as_ref())
        .map(|answers| &answers.reflection)
        .collect();

    let ratings: Vec<f64> = reflections
        .iter()
        .filter_map(|r| r.q1)
        .map(f64::from)
        .collect();
    let planning = if ratings.is_empty() {
        0
    } else {
        let average = ratings.iter().sum::<f64>() / ratings.len() as f64;
        round_half_up((average - 1.0) / 4.0 * 100.0).min(100)
    };

    let conducted = reflections
        .iter()
        .filter(|r| r.did_conduct_interview == Some(true))
        .count();
    let extracted = reflections
        .iter()
        .filter(|r| r.did_conduct_interview == Some(true) && r.could_extract_issue == Some(true))
        .count();
    let interviewed = reflections
        .iter()
        .filter(|r| r.was_interviewed == Some(true))
        .count();
    let spoke = reflections
        .iter()
        .filter(|r| r.did_speak_up == Some(true))
        .count();
    let conveyed = reflections
        .iter()
        .filter(|r| r.did_speak_up == Some(true) && r.could_convey == Some(true))
        .count();

    // The ratio is rounded to 0 or 1 before scaling, so this score is all or nothing.
    let involvement = if total == 0 {
        0
    } else {
        round_half_up((conducted + interviewed) as f64 / (2 * total) as f64) * 100
    };

    let dialogue_rate = (rate(extracted, conducted) + rate(conveyed, spoke)) / 2.0;
    let completed = questionnaires.iter().filter(|q| q.is_completed()).count();

    SkillScores {
        strategic_planning: planning,
        problem_setting: percent(extracted, conducted),
        involvement,
        dialogue: round_half_up(dialogue_rate * 100.0),
        execution: planning,
        completion: percent(completed, total),
        humility: 0,
    }
}

pub fn with_humility(scores: SkillScores, humility: u32) -> SkillScores {
    SkillScores {
        humility: humility.min(100),
        ..scores
    }
}

pub fn skill_level(score: u32) -> u32 {
    (score / 20 + 1).min(MAX_LEVEL)
}

/// Rounded mean of the per-skill levels.
pub fn overall_level(scores: &SkillScores) -> u32 {
    let levels: Vec<u32> = scores.entries().iter().map(|(_, score)| skill_level(*score)).collect();
    let sum: u32 = levels.iter().sum();
    round_half_up(f64::from(sum) / levels.len() as f64)
}

fn ranked(scores: &SkillScores) -> Vec<(Skill, u32)> {
    let mut entries = scores.entries();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

pub fn highest(scores: &SkillScores) -> (Skill, u32) {
    ranked(scores)[0]
}

pub fn lowest(scores: &SkillScores) -> (Skill, u32) {
    let entries = ranked(scores);
    entries[entries.len() - 1]
}
