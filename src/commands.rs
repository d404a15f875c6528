use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Datelike, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::access::{self, Area};
use crate::admin::{self, NewUser};
use crate::answers::WeeklyAnswers;
use crate::client::ApiClient;
use crate::db;
use crate::finalize::{self, MonthState};
use crate::humility::{self, HumilityOutcome};
use crate::journal::StrengthWeakness;
use crate::models::{Questionnaire, Role, SkillScores, User};
use crate::profile;
use crate::projects::{
    self, LiteratureResource, Project, ProjectDetails, Resource, ResourceKind, SurveyKind,
    SurveyResource, WebResource,
};
use crate::report::{self, Dashboard};
use crate::session::{self, ActiveSession};
use crate::skills;
use crate::talent::{
    self, AdditionalAnswers, Step, TalentAnswers, DRAFT_ADDITIONAL, DRAFT_ANSWERS,
    DRAFT_FIRST_PICK, DRAFT_SECOND_PICK,
};

pub struct App {
    pub pool: SqlitePool,
    pub client: ApiClient,
}

impl App {
    async fn signed_in(&self, area: Option<Area>) -> anyhow::Result<ActiveSession> {
        let active = session::restore(&self.pool, self.client.clone(), Utc::now()).await?;
        if let Some(area) = area {
            access::require(area, active.user.role)?;
        }
        Ok(active)
    }
}

fn parse_id(raw: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("'{raw}' is not a valid id"))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

pub async fn init_store(app: &App) -> anyhow::Result<()> {
    db::init_db(&app.pool).await?;
    let version = db::schema_version(&app.pool).await?;
    match version {
        Some(version) => println!("Store ready (schema version {version})."),
        None => println!("Store ready."),
    }
    Ok(())
}

pub async fn login(app: &App, email: &str, password: &str) -> anyhow::Result<()> {
    let response = app.client.login(email, password).await?;
    let stored = session::sign_in(&app.pool, &response, Utc::now()).await?;
    println!(
        "Logged in as {} ({}). Home: {}",
        stored.name,
        stored.role.label(),
        stored.home()
    );
    Ok(())
}

pub async fn login_google(app: &App, credential: &str) -> anyhow::Result<()> {
    let response = app.client.google_login(credential).await?;
    let stored = session::sign_in(&app.pool, &response, Utc::now()).await?;
    println!(
        "Logged in with Google as {} ({}). Home: {}",
        stored.name,
        stored.role.label(),
        stored.home()
    );
    Ok(())
}

pub async fn logout(app: &App) -> anyhow::Result<()> {
    if let Some(stored) = db::load_session(&app.pool).await? {
        let client = app.client.clone().with_token(stored.access_token);
        if let Err(err) = client.logout().await {
            log::warn!("backend logout failed: {err}");
        }
    }
    db::clear_session(&app.pool).await?;
    println!("Logged out.");
    Ok(())
}

pub async fn whoami(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(None).await?;
    print_user(&active.user);
    println!("Home: {}", access::home_for(active.user.role));
    Ok(())
}

fn print_user(user: &User) {
    println!("{} <{}>", user.display_name(), user.email);
    println!("  id: {}", user.id);
    println!("  role: {}", user.role.label());
    println!("  active: {}", if user.is_active { "yes" } else { "no" });
    if let Some(class_name) = &user.class_name {
        println!("  class: {class_name}");
    }
    if let Some(hobbies) = &user.hobbies {
        println!("  hobbies: {hobbies}");
    }
    if let Some(focus) = user.current_focus.as_ref().filter(|focus| !focus.is_empty()) {
        println!("  focus: {}", focus.join(", "));
    }
}

fn target_month(year: Option<i32>, month: Option<u32>, now: DateTime<Utc>) -> (i32, u32) {
    (year.unwrap_or(now.year()), month.unwrap_or(now.month()))
}

struct LiveMonth {
    skills: SkillScores,
    humility: HumilityOutcome,
    fell_back: bool,
}

async fn live_month(
    app: &App,
    active: &ActiveSession,
    questionnaires: &[Questionnaire],
    year: i32,
    month: u32,
    now: DateTime<Utc>,
) -> anyhow::Result<LiveMonth> {
    let selection = skills::select_month(questionnaires, year, month);
    let scores = skills::aggregate(&selection.questionnaires);

    let entries = db::list_entries(&app.pool, &active.user.id).await?;
    let weakness = humility::latest_weakness(&entries, &selection.questionnaires);
    let request = humility::build_request(&selection.questionnaires, weakness);
    let outcome =
        humility::evaluate(&active.client, &app.pool, &active.user.id, &request, now).await;

    Ok(LiveMonth {
        skills: skills::with_humility(scores, humility::displayed_score(&outcome)),
        humility: outcome,
        fell_back: selection.fell_back,
    })
}

pub async fn dashboard(
    app: &App,
    year: Option<i32>,
    month: Option<u32>,
    with_advice: bool,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let (year, month) = target_month(year, month, now);

    let results = active.client.monthly_results().await?;
    let state = finalize::month_state(&results, year, month);

    let live = match state {
        MonthState::Finalized(_) => None,
        MonthState::Unfinalized => {
            let questionnaires = active.client.questionnaires().await?;
            Some(live_month(app, &active, &questionnaires, year, month, now).await?)
        }
    };
    let skills = finalize::displayed_skills(
        state,
        live.as_ref().map(|live| live.skills).unwrap_or_default(),
    );

    let advice = if with_advice {
        match active.client.skill_advice(&skills).await {
            Ok(advice) => Some(advice),
            Err(err) => {
                log::warn!("skill advice unavailable: {err}");
                None
            }
        }
    } else {
        None
    };

    let output = report::build_dashboard(&Dashboard {
        user: &active.user,
        year,
        month,
        state,
        skills,
        humility: live.as_ref().map(|live| &live.humility),
        fell_back: live.as_ref().is_some_and(|live| live.fell_back),
        advice: advice.as_deref(),
    });

    match out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Dashboard written to {}.", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}

pub async fn history(app: &App, id: Option<&str>) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let results = match id {
        Some(id) => vec![active.client.monthly_result(id).await?],
        None => active.client.monthly_results().await?,
    };
    print!("{}", report::build_history(&results));
    Ok(())
}

pub async fn finalize_month(app: &App, year: i32, month: u32) -> anyhow::Result<()> {
    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let results = active.client.monthly_results().await?;

    // Rejected before any scoring work when the month already has a snapshot.
    if let MonthState::Finalized(_) = finalize::month_state(&results, year, month) {
        return Err(finalize::FinalizeError::AlreadyFinalized { year, month }.into());
    }

    let questionnaires = active.client.questionnaires().await?;
    let live = live_month(app, &active, &questionnaires, year, month, now).await?;
    if let Err(stale) = &live.humility {
        println!(
            "Humility score is not fresh ({}); finalizing with {}.",
            stale.reason, live.skills.humility
        );
    }

    let result =
        finalize::finalize(&active.client, &results, year, month, live.skills.humility).await?;
    println!(
        "Finalized {}-{:02}: Lv.{}.",
        result.year, result.month, result.level
    );
    Ok(())
}

pub async fn list_questionnaires(app: &App) -> anyhow::Result<()> {
    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut questionnaires = active.client.questionnaires().await?;
    questionnaires.sort_by(|a, b| b.deadline.cmp(&a.deadline));

    if questionnaires.is_empty() {
        println!("No questionnaires assigned.");
        return Ok(());
    }

    for questionnaire in &questionnaires {
        let status = if questionnaire.is_completed() {
            "回答済み"
        } else {
            "未回答"
        };
        let editable = if questionnaire.can_edit(now) {
            " (editable)"
        } else {
            ""
        };
        println!(
            "- [{}] week {} {} due {} {}{}",
            questionnaire.id,
            questionnaire.week,
            questionnaire.title,
            questionnaire.deadline.format("%Y-%m-%d %H:%M"),
            status,
            editable
        );
    }
    Ok(())
}

pub async fn show_questionnaire(app: &App, id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let questionnaire = active.client.questionnaire(id).await?;
    println!(
        "Week {} {} (due {})",
        questionnaire.week,
        questionnaire.title,
        questionnaire.deadline.format("%Y-%m-%d %H:%M")
    );
    match &questionnaire.answers {
        Some(answers) => println!("{}", serde_json::to_string_pretty(answers)?),
        None => println!("Not answered yet."),
    }
    Ok(())
}

pub async fn submit_questionnaire(app: &App, id: &str, answers_path: &Path) -> anyhow::Result<()> {
    let answers: WeeklyAnswers = read_json(answers_path)?;
    let answers = answers.normalized();
    answers.validate()?;

    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let questionnaire = active.client.questionnaire(id).await?;
    if !questionnaire.is_open(now) {
        anyhow::bail!(
            "the deadline for week {} passed on {}",
            questionnaire.week,
            questionnaire.deadline.format("%Y-%m-%d %H:%M")
        );
    }

    let saved = if questionnaire.is_completed() {
        active.client.update_questionnaire(id, &answers).await?
    } else {
        active.client.submit_questionnaire(id, &answers).await?
    };
    println!("Saved answers for week {}.", saved.week);
    Ok(())
}

pub async fn add_journal_entry(app: &App, strength: &str, weakness: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let entry = StrengthWeakness::new(&active.user.id, strength, weakness, Utc::now())?;
    db::insert_entry(&app.pool, &entry).await?;
    println!("Saved entry {}.", entry.id);
    Ok(())
}

pub async fn list_journal(app: &App) -> anyhow::Result<()> {
    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let entries = db::list_entries(&app.pool, &active.user.id).await?;

    if entries.is_empty() {
        println!("No entries yet.");
        return Ok(());
    }

    for entry in entries {
        let editable = if entry.can_edit(now) { " (editable)" } else { "" };
        println!("- [{}] {}{}", entry.id, entry.created_at.format("%Y-%m-%d"), editable);
        println!("  strength: {}", entry.strength);
        println!("  weakness: {}", entry.weakness);
    }
    Ok(())
}

pub async fn edit_journal_entry(
    app: &App,
    id: &str,
    strength: Option<&str>,
    weakness: Option<&str>,
) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut entry = db::get_entry(&app.pool, &active.user.id, id)
        .await?
        .with_context(|| format!("no journal entry {id}"))?;
    entry.edit(strength, weakness, Utc::now())?;
    db::update_entry(&app.pool, &entry).await?;
    println!("Updated entry {id}.");
    Ok(())
}

async fn owned_project(app: &App, active: &ActiveSession, id: &str) -> anyhow::Result<Project> {
    let id = parse_id(id)?;
    db::load_project(&app.pool, &active.user.id, id)
        .await?
        .with_context(|| format!("no project {id}"))
}

fn print_project(project: &Project) {
    println!("{} [{}]", project.name, project.id);
    for (label, value) in [
        ("theme", &project.theme),
        ("background", &project.background),
        ("hypothesis", &project.hypothesis),
        ("presentation", &project.presentation_url),
    ] {
        if !value.is_empty() {
            println!("  {label}: {value}");
        }
    }
    if !project.team_members.is_empty() {
        let names: Vec<&str> = project.team_members.iter().map(|m| m.name.as_str()).collect();
        println!("  team: {}", names.join(", "));
    }
    for kind in [ResourceKind::Web, ResourceKind::Literature, ResourceKind::Survey] {
        for stored in project.resources_of(kind) {
            println!("  {} [{}] {}", kind.as_str(), stored.id, stored.resource.title());
        }
    }
    println!("  updated: {}", project.updated_at.format("%Y-%m-%d %H:%M"));
}

pub async fn list_projects(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let projects = db::load_projects(&app.pool, &active.user.id).await?;
    if projects.is_empty() {
        println!("No projects yet.");
    }
    for project in &projects {
        print_project(project);
    }
    Ok(())
}

pub async fn show_project(app: &App, id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let project = owned_project(app, &active, id).await?;
    print_project(&project);
    Ok(())
}

pub async fn create_project(app: &App, name: &str, details: ProjectDetails) -> anyhow::Result<()> {
    let now = Utc::now();
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = Project::new(&active.user.id, name, now)?;
    project.apply(details, now)?;
    db::save_project(&app.pool, &project).await?;
    println!("Created project {} [{}].", project.name, project.id);
    Ok(())
}

pub async fn update_project(app: &App, id: &str, details: ProjectDetails) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = owned_project(app, &active, id).await?;
    project.apply(details, Utc::now())?;
    db::save_project(&app.pool, &project).await?;
    println!("Updated project {}.", project.name);
    Ok(())
}

pub async fn delete_project(app: &App, id: &str) -> anyhow::Result<()> {
    let id = parse_id(id)?;
    let active = app.signed_in(Some(Area::Student)).await?;
    if !db::delete_project(&app.pool, &active.user.id, id).await? {
        anyhow::bail!("no project {id}");
    }
    println!("Deleted project {id}.");
    Ok(())
}

pub async fn find_students(app: &App, query: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let students = active.client.students().await?;
    for student in projects::filter_students(&students, query) {
        println!(
            "- [{}] {} <{}> {}",
            student.id,
            student.name,
            student.email,
            student.class_name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub async fn add_member(app: &App, project_id: &str, student_id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = owned_project(app, &active, project_id).await?;
    let students = active.client.students().await?;
    let student = students
        .iter()
        .find(|student| student.id == student_id)
        .with_context(|| format!("no student {student_id}"))?;
    project.add_member(student, Utc::now())?;
    db::save_project(&app.pool, &project).await?;
    println!("Added {} to {}.", student.name, project.name);
    Ok(())
}

pub async fn remove_member(app: &App, project_id: &str, student_id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = owned_project(app, &active, project_id).await?;
    if !project.remove_member(student_id, Utc::now()) {
        anyhow::bail!("{student_id} is not on this team");
    }
    db::save_project(&app.pool, &project).await?;
    println!("Removed {student_id} from {}.", project.name);
    Ok(())
}

pub async fn add_resource(app: &App, project_id: &str, resource: Resource) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = owned_project(app, &active, project_id).await?;
    let id = project.add_resource(resource, Utc::now())?;
    db::save_project(&app.pool, &project).await?;
    println!("Added resource {id}.");
    Ok(())
}

pub async fn remove_resource(app: &App, project_id: &str, resource_id: &str) -> anyhow::Result<()> {
    let resource_id = parse_id(resource_id)?;
    let active = app.signed_in(Some(Area::Student)).await?;
    let mut project = owned_project(app, &active, project_id).await?;
    if !project.remove_resource(resource_id, Utc::now()) {
        anyhow::bail!("no resource {resource_id} in {}", project.name);
    }
    db::save_project(&app.pool, &project).await?;
    println!("Removed resource {resource_id}.");
    Ok(())
}

pub fn web_resource(url: String, title: String, date: Option<String>, summary: Option<String>) -> Resource {
    Resource::Web(WebResource {
        url,
        title,
        date: date.unwrap_or_default(),
        summary: summary.unwrap_or_default(),
    })
}

pub fn literature_resource(
    title: String,
    author: Option<String>,
    publisher: Option<String>,
    publish_date: Option<String>,
    summary: Option<String>,
) -> Resource {
    Resource::Literature(LiteratureResource {
        title,
        author: author.unwrap_or_default(),
        publisher: publisher.unwrap_or_default(),
        publish_date: publish_date.unwrap_or_default(),
        summary: summary.unwrap_or_default(),
    })
}

pub struct SurveyFields {
    pub hearing: bool,
    pub title: String,
    pub link: Option<String>,
    pub period: Option<String>,
    pub target: Option<String>,
    pub summary: Option<String>,
}

pub fn survey_resource(fields: SurveyFields) -> Resource {
    Resource::Survey(SurveyResource {
        kind: if fields.hearing {
            SurveyKind::Hearing
        } else {
            SurveyKind::Survey
        },
        title: fields.title,
        link: fields.link.unwrap_or_default(),
        period: fields.period.unwrap_or_default(),
        target: fields.target.unwrap_or_default(),
        summary: fields.summary.unwrap_or_default(),
    })
}

async fn require_step(app: &App, user_id: &str, needed: Step) -> anyhow::Result<()> {
    let progress = db::load_quiz_progress(&app.pool, user_id).await?;
    let next = progress.next_step();
    if next < needed {
        anyhow::bail!("finish the {} step first", next.label());
    }
    Ok(())
}

pub async fn talent_status(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let progress = db::load_quiz_progress(&app.pool, &active.user.id).await?;
    let next = progress.next_step();
    println!("Next step: {}", next.label());

    match next {
        Step::Questionnaire => {
            let filled = progress.answers.as_ref().map_or(0, TalentAnswers::filled_count);
            println!("{filled} of 5 questions answered.");
        }
        Step::Analysis => {
            for option in talent::FIRST_PASS {
                println!("- {}: {} ({})", option.id, option.title, option.description);
            }
        }
        Step::Additional => {
            let filled = progress.additional.as_ref().map_or(0, AdditionalAnswers::filled_count);
            println!("Direction so far: {}", progress.first_pick());
            println!("{filled} of 2 questions answered.");
        }
        Step::Reanalysis => {
            for option in talent::SECOND_PASS {
                println!("- {}: {} ({})", option.id, option.title, option.description);
            }
        }
        Step::Result => println!("Ready to save: {}", progress.second_pick()),
    }
    Ok(())
}

pub async fn talent_answer(app: &App, path: &Path) -> anyhow::Result<()> {
    let answers: TalentAnswers = read_json(path)?;
    answers.validate()?;
    let active = app.signed_in(Some(Area::Student)).await?;
    db::save_draft(&app.pool, &active.user.id, DRAFT_ANSWERS, &answers, Utc::now()).await?;
    println!("Answers saved; next pick a direction with `talent pick`.");
    Ok(())
}

pub async fn talent_pick(app: &App, talent_id: &str) -> anyhow::Result<()> {
    let option = talent::find_option(&talent::FIRST_PASS, talent_id)?;
    let active = app.signed_in(Some(Area::Student)).await?;
    require_step(app, &active.user.id, Step::Analysis).await?;
    db::save_draft(&app.pool, &active.user.id, DRAFT_FIRST_PICK, &option.id, Utc::now()).await?;
    println!("Selected {}.", option.title);
    Ok(())
}

pub async fn talent_additional(app: &App, path: &Path) -> anyhow::Result<()> {
    let answers: AdditionalAnswers = read_json(path)?;
    answers.validate()?;
    let active = app.signed_in(Some(Area::Student)).await?;
    require_step(app, &active.user.id, Step::Additional).await?;
    db::save_draft(&app.pool, &active.user.id, DRAFT_ADDITIONAL, &answers, Utc::now()).await?;
    println!("Additional answers saved; next run `talent repick`.");
    Ok(())
}

pub async fn talent_repick(app: &App, talent_id: &str) -> anyhow::Result<()> {
    let option = talent::find_option(&talent::SECOND_PASS, talent_id)?;
    let active = app.signed_in(Some(Area::Student)).await?;
    require_step(app, &active.user.id, Step::Reanalysis).await?;
    db::save_draft(&app.pool, &active.user.id, DRAFT_SECOND_PICK, &option.id, Utc::now()).await?;
    println!("Selected {}.", option.title);
    Ok(())
}

pub async fn talent_save(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let progress = db::load_quiz_progress(&app.pool, &active.user.id).await?;
    let result = progress.result()?;
    let saved = active.client.save_talent_result(&result).await?;
    db::clear_drafts(&app.pool, &active.user.id).await?;
    println!("Saved talent profile: {} / {}", saved.talent_type, saved.talent_name);
    Ok(())
}

pub async fn talent_reset(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let cleared = db::clear_drafts(&app.pool, &active.user.id).await?;
    println!("Cleared {cleared} draft steps.");
    Ok(())
}

pub async fn talent_show(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Student)).await?;
    let Some(result) = active.client.talent_result().await? else {
        println!("No talent profile yet; start with `talent answer`.");
        return Ok(());
    };

    println!("{} ({})", result.talent_type, result.talent_name);
    println!("{}", result.description);
    if !result.keywords.is_empty() {
        println!("Keywords: {}", result.keywords.join(", "));
    }
    for strength in &result.strengths {
        println!("- {strength}");
    }
    if !result.next_steps.is_empty() {
        println!("Next steps:");
        for step in &result.next_steps {
            println!("- {step}");
        }
    }
    Ok(())
}

pub async fn class_dashboard(app: &App, class_name: Option<&str>) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Teacher)).await?;
    let mut students = active.client.students().await?;
    if let Some(class_name) = class_name {
        students.retain(|student| student.class_name.as_deref() == Some(class_name));
    }
    print!("{}", report::build_class_report(&students));
    Ok(())
}

pub async fn admin_summary(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Admin)).await?;
    let users = active.client.users().await?;
    print!("{}", report::build_admin_summary(&admin::summarize(&users)));
    Ok(())
}

pub async fn admin_list(app: &App, role: Option<Role>) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Admin)).await?;
    let users = active.client.users().await?;
    for user in users.iter().filter(|user| role.map_or(true, |role| user.role == role)) {
        println!(
            "- [{}] {} <{}> {}{}{}",
            user.id,
            user.display_name(),
            user.email,
            user.role.label(),
            user.class_name
                .as_deref()
                .map(|class_name| format!(" {class_name}"))
                .unwrap_or_default(),
            if user.is_active { "" } else { " (inactive)" }
        );
    }
    Ok(())
}

pub async fn admin_show(app: &App, id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Admin)).await?;
    let user = active.client.user(id).await?;
    print_user(&user);
    Ok(())
}

pub async fn admin_create(app: &App, form: NewUser) -> anyhow::Result<()> {
    let account = form.into_account()?;
    let active = app.signed_in(Some(Area::Admin)).await?;
    let user = admin::create_account(&active.client, &account).await?;
    println!("ユーザー \"{}\" を作成しました ({})", user.email, user.id);
    Ok(())
}

pub async fn admin_update(
    app: &App,
    id: &str,
    name: Option<String>,
    role: Option<Role>,
    class_name: Option<String>,
    is_active: Option<bool>,
) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Admin)).await?;
    let current = active.client.user(id).await?;
    let update = admin::build_user_update(&current, name, role, class_name, is_active)?;
    let user = active.client.update_user(id, &update).await?;
    println!("Updated {}.", user.email);
    Ok(())
}

pub async fn admin_delete(app: &App, id: &str) -> anyhow::Result<()> {
    let active = app.signed_in(Some(Area::Admin)).await?;
    if active.user.id == id {
        anyhow::bail!("you cannot delete your own account");
    }
    let message = active.client.delete_user(id).await?;
    if message.is_empty() {
        println!("Deleted {id}.");
    } else {
        println!("{message}");
    }
    Ok(())
}

pub async fn admin_import(app: &App, csv_path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let users = admin::read_import(file)?;
    let active = app.signed_in(Some(Area::Admin)).await?;

    let outcome = admin::import_users(&active.client, users).await;
    println!(
        "Created {} accounts from {}.",
        outcome.created.len(),
        csv_path.display()
    );
    for (email, reason) in &outcome.failed {
        println!("- {email}: {reason}");
    }
    if !outcome.failed.is_empty() {
        anyhow::bail!("{} rows failed", outcome.failed.len());
    }
    Ok(())
}

pub async fn show_profile(app: &App) -> anyhow::Result<()> {
    let active = app.signed_in(None).await?;
    print_user(&active.user);
    if active.user.profile_image.is_some() {
        println!("  image: set");
    }
    Ok(())
}

pub async fn update_profile(
    app: &App,
    hobbies: Option<String>,
    focus: Option<Vec<String>>,
    image: Option<&Path>,
) -> anyhow::Result<()> {
    let image = image.map(profile::read_image).transpose()?;
    let update = profile::build_update(hobbies, focus, image)?;
    let active = app.signed_in(None).await?;
    let user = active.client.update_profile(&update).await?;
    println!("Profile updated for {}.", user.display_name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::sample_answers;
    use crate::client::test_client;
    use crate::db::memory_pool;
    use crate::models::{HumilityScore, LoginResponse, MonthlyResult, QuestionnaireStatus};
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use std::path::PathBuf;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn student_app(server: &MockServer) -> App {
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-1", "email": "kiara@example.com", "name": "Kiara", "role": 0
            })))
            .mount(server)
            .await;

        let pool = memory_pool().await;
        let login = LoginResponse {
            access_token: "token-abc".to_string(),
            user: User {
                id: "u-1".to_string(),
                email: "kiara@example.com".to_string(),
                name: "Kiara".to_string(),
                role: Role::Student,
                is_active: true,
                profile_image: None,
                hobbies: None,
                current_focus: None,
                class_name: Some("1-A".to_string()),
            },
        };
        session::sign_in(&pool, &login, Utc::now()).await.unwrap();
        App {
            pool,
            client: test_client(&server.uri()),
        }
    }

    fn questionnaire(status: QuestionnaireStatus, deadline: DateTime<Utc>) -> Questionnaire {
        let completed = status == QuestionnaireStatus::Completed;
        Questionnaire {
            id: "q-1".to_string(),
            user_id: "u-1".to_string(),
            week: 2,
            title: "Week 2".to_string(),
            deadline,
            status,
            answers: completed.then(sample_answers),
            submitted_at: completed.then_some(deadline - Duration::days(1)),
        }
    }

    fn snapshot(year: i32, month: u32, humility: u32) -> MonthlyResult {
        MonthlyResult {
            id: format!("m-{year}-{month}"),
            user_id: "u-1".to_string(),
            year,
            month,
            level: 3,
            skills: SkillScores {
                strategic_planning: 75,
                humility,
                ..SkillScores::default()
            },
            ai_comment: None,
        }
    }

    fn scratch_file(extension: &str) -> PathBuf {
        std::env::temp_dir().join(format!("skill-tracker-{}.{extension}", Uuid::new_v4()))
    }

    fn answers_file() -> PathBuf {
        let file = scratch_file("json");
        std::fs::write(&file, serde_json::to_string(&sample_answers()).unwrap()).unwrap();
        file
    }

    async fn mount_questionnaire(server: &MockServer, current: &Questionnaire) {
        Mock::given(method("GET"))
            .and(path("/questionnaires/q-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(current)))
            .mount(server)
            .await;
    }

    async fn expect_writes(server: &MockServer, current: &Questionnaire, posts: u64, puts: u64) {
        Mock::given(method("POST"))
            .and(path("/questionnaires/q-1/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(current)))
            .expect(posts)
            .mount(server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/questionnaires/q-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(current)))
            .expect(puts)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn pending_questionnaire_is_submitted() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        let current = questionnaire(QuestionnaireStatus::Pending, Utc::now() + Duration::days(2));
        mount_questionnaire(&server, &current).await;
        expect_writes(&server, &current, 1, 0).await;

        let file = answers_file();
        submit_questionnaire(&app, "q-1", &file).await.unwrap();
        let _ = std::fs::remove_file(file);
    }

    #[tokio::test]
    async fn completed_questionnaire_is_edited_in_place() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        let current = questionnaire(QuestionnaireStatus::Completed, Utc::now() + Duration::days(2));
        mount_questionnaire(&server, &current).await;
        expect_writes(&server, &current, 0, 1).await;

        let file = answers_file();
        submit_questionnaire(&app, "q-1", &file).await.unwrap();
        let _ = std::fs::remove_file(file);
    }

    #[tokio::test]
    async fn closed_questionnaire_is_not_written() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        let current = questionnaire(QuestionnaireStatus::Completed, Utc::now() - Duration::days(1));
        mount_questionnaire(&server, &current).await;
        expect_writes(&server, &current, 0, 0).await;

        let file = answers_file();
        let err = submit_questionnaire(&app, "q-1", &file).await.unwrap_err();
        assert!(err.to_string().contains("deadline"));
        let _ = std::fs::remove_file(file);
    }

    #[tokio::test]
    async fn finalized_month_skips_live_scoring() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        Mock::given(method("GET"))
            .and(path("/monthly-results"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([snapshot(2025, 5, 58)])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questionnaires"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let out = scratch_file("md");
        dashboard(&app, Some(2025), Some(5), false, Some(&out)).await.unwrap();
        let report = std::fs::read_to_string(&out).unwrap();
        let _ = std::fs::remove_file(out);
        assert!(report.contains("Status: finalized (Lv.3)"));
        assert!(report.contains("| 戦略的計画力 | 75 |"));
    }

    #[tokio::test]
    async fn finalize_uses_last_known_humility_when_evaluation_fails() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        let evaluated_at = Utc.with_ymd_and_hms(2025, 5, 20, 9, 0, 0).unwrap();
        db::save_humility(
            &app.pool,
            "u-1",
            &HumilityScore {
                score: 58,
                gratitude: 60,
                self_reflection: 55,
                openness: 59,
            },
            evaluated_at,
        )
        .await
        .unwrap();

        let answered = questionnaire(
            QuestionnaireStatus::Completed,
            Utc.with_ymd_and_hms(2025, 5, 16, 23, 59, 0).unwrap(),
        );
        Mock::given(method("GET"))
            .and(path("/monthly-results"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([snapshot(2025, 4, 40)])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questionnaires"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([answered])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/evaluate-humility"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({"detail": "model offline"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/monthly-results/finalize"))
            .and(query_param("year", "2025"))
            .and(query_param("month", "5"))
            .and(query_param("humility_score", "58"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(snapshot(2025, 5, 58))))
            .expect(1)
            .mount(&server)
            .await;

        finalize_month(&app, 2025, 5).await.unwrap();
    }

    #[tokio::test]
    async fn finalize_rejects_a_month_on_record() {
        let server = MockServer::start().await;
        let app = student_app(&server).await;
        Mock::given(method("GET"))
            .and(path("/monthly-results"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([snapshot(2025, 5, 58)])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questionnaires"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/monthly-results/finalize"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = finalize_month(&app, 2025, 5).await.unwrap_err();
        assert!(err.downcast_ref::<finalize::FinalizeError>().is_some());
    }
}
