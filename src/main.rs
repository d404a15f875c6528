use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;

mod access;
mod admin;
mod answers;
mod client;
mod commands;
mod config;
mod db;
mod error;
mod finalize;
mod humility;
mod journal;
mod models;
mod profile;
mod projects;
mod report;
mod session;
mod skills;
mod talent;

use access::Route;
use client::ApiClient;
use commands::{App, SurveyFields};
use config::Settings;
use error::ApiError;
use models::Role;
use projects::ProjectDetails;

#[derive(Parser)]
#[command(name = "skill-tracker")]
#[command(about = "Weekly reflections and non-cognitive skill tracking for students", long_about = None)]
struct Cli {
    /// Backend base URL (overrides SKILL_TRACKER_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the local store
    InitStore,
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with a Google ID token
    LoginGoogle {
        #[arg(long)]
        credential: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in account
    Whoami,
    /// Render the monthly skill dashboard
    Dashboard {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,
        /// Skip the AI advice request
        #[arg(long)]
        no_advice: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List finalized months with level changes
    History {
        #[arg(long)]
        id: Option<String>,
    },
    /// Freeze a month's scores into a snapshot
    Finalize {
        #[arg(long)]
        year: i32,
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: u32,
    },
    /// Weekly questionnaires
    Questionnaire {
        #[command(subcommand)]
        command: QuestionnaireCommand,
    },
    /// Strength/weakness journal
    Journal {
        #[command(subcommand)]
        command: JournalCommand,
    },
    /// Inquiry projects and their resources
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    /// Talent discovery quiz
    Talent {
        #[command(subcommand)]
        command: TalentCommand,
    },
    /// Students grouped by class
    ClassDashboard {
        #[arg(long)]
        class: Option<String>,
    },
    /// Account administration
    Admin {
        #[command(subcommand)]
        command: AdminCommand,
    },
    /// View or update your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
}

#[derive(Subcommand)]
enum QuestionnaireCommand {
    List,
    Show {
        #[arg(long)]
        id: String,
    },
    /// Submit or edit answers from a JSON file
    Submit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        answers: PathBuf,
    },
}

#[derive(Subcommand)]
enum JournalCommand {
    Add {
        #[arg(long)]
        strength: String,
        #[arg(long)]
        weakness: String,
    },
    List,
    #[command(group(
        ArgGroup::new("change")
            .args(["strength", "weakness"])
            .required(true)
            .multiple(true)
    ))]
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        strength: Option<String>,
        #[arg(long)]
        weakness: Option<String>,
    },
}

#[derive(clap::Args)]
struct DetailArgs {
    #[arg(long)]
    theme: Option<String>,
    #[arg(long)]
    background: Option<String>,
    #[arg(long)]
    hypothesis: Option<String>,
    #[arg(long)]
    presentation_url: Option<String>,
}

impl DetailArgs {
    fn into_details(self, name: Option<String>) -> ProjectDetails {
        ProjectDetails {
            name,
            theme: self.theme,
            background: self.background,
            hypothesis: self.hypothesis,
            presentation_url: self.presentation_url,
        }
    }
}

#[derive(Subcommand)]
enum ProjectCommand {
    List,
    Show {
        #[arg(long)]
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        #[command(flatten)]
        details: DetailArgs,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        details: DetailArgs,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Search students by name or email
    Students {
        #[arg(long, default_value = "")]
        query: String,
    },
    AddMember {
        #[arg(long)]
        id: String,
        #[arg(long)]
        student: String,
    },
    RemoveMember {
        #[arg(long)]
        id: String,
        #[arg(long)]
        student: String,
    },
    AddWeb {
        #[arg(long)]
        id: String,
        #[arg(long)]
        url: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    AddLiterature {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        publisher: Option<String>,
        #[arg(long)]
        publish_date: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    AddSurvey {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        /// Record an interview instead of a survey
        #[arg(long)]
        hearing: bool,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        summary: Option<String>,
    },
    RemoveResource {
        #[arg(long)]
        id: String,
        #[arg(long)]
        resource: String,
    },
}

#[derive(Subcommand)]
enum TalentCommand {
    /// Show the next step of the quiz
    Status,
    /// Save the first five answers from a JSON file
    Answer {
        #[arg(long)]
        file: PathBuf,
    },
    Pick {
        #[arg(long, default_value = talent::DEFAULT_FIRST_PICK)]
        talent: String,
    },
    /// Save the additional answers from a JSON file
    Additional {
        #[arg(long)]
        file: PathBuf,
    },
    Repick {
        #[arg(long, default_value = talent::DEFAULT_SECOND_PICK)]
        talent: String,
    },
    /// Save the result and clear drafts
    Save,
    Reset,
    Show,
}

#[derive(Subcommand)]
enum AdminCommand {
    Summary,
    List {
        #[arg(long)]
        role: Option<Role>,
    },
    Show {
        #[arg(long)]
        id: String,
    },
    #[command(group(
        ArgGroup::new("auth")
            .args(["password", "google"])
            .required(true)
            .multiple(false)
    ))]
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "student")]
        role: Role,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        google: bool,
    },
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        class: Option<String>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        #[arg(long)]
        id: String,
    },
    /// Create accounts from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    #[command(group(
        ArgGroup::new("change")
            .args(["hobbies", "focus", "image"])
            .required(true)
            .multiple(true)
    ))]
    Update {
        #[arg(long)]
        hobbies: Option<String>,
        #[arg(long, num_args = 1..)]
        focus: Option<Vec<String>>,
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

async fn run(app: &App, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::InitStore => commands::init_store(app).await?,
        Commands::Login { email, password } => commands::login(app, &email, &password).await?,
        Commands::LoginGoogle { credential } => commands::login_google(app, &credential).await?,
        Commands::Logout => commands::logout(app).await?,
        Commands::Whoami => commands::whoami(app).await?,
        Commands::Dashboard {
            year,
            month,
            no_advice,
            out,
        } => commands::dashboard(app, year, month, !no_advice, out.as_deref()).await?,
        Commands::History { id } => commands::history(app, id.as_deref()).await?,
        Commands::Finalize { year, month } => commands::finalize_month(app, year, month).await?,
        Commands::Questionnaire { command } => match command {
            QuestionnaireCommand::List => commands::list_questionnaires(app).await?,
            QuestionnaireCommand::Show { id } => commands::show_questionnaire(app, &id).await?,
            QuestionnaireCommand::Submit { id, answers } => {
                commands::submit_questionnaire(app, &id, &answers).await?
            }
        },
        Commands::Journal { command } => match command {
            JournalCommand::Add { strength, weakness } => {
                commands::add_journal_entry(app, &strength, &weakness).await?
            }
            JournalCommand::List => commands::list_journal(app).await?,
            JournalCommand::Edit {
                id,
                strength,
                weakness,
            } => {
                commands::edit_journal_entry(app, &id, strength.as_deref(), weakness.as_deref())
                    .await?
            }
        },
        Commands::Project { command } => run_project(app, command).await?,
        Commands::Talent { command } => match command {
            TalentCommand::Status => commands::talent_status(app).await?,
            TalentCommand::Answer { file } => commands::talent_answer(app, &file).await?,
            TalentCommand::Pick { talent } => commands::talent_pick(app, &talent).await?,
            TalentCommand::Additional { file } => commands::talent_additional(app, &file).await?,
            TalentCommand::Repick { talent } => commands::talent_repick(app, &talent).await?,
            TalentCommand::Save => commands::talent_save(app).await?,
            TalentCommand::Reset => commands::talent_reset(app).await?,
            TalentCommand::Show => commands::talent_show(app).await?,
        },
        Commands::ClassDashboard { class } => {
            commands::class_dashboard(app, class.as_deref()).await?
        }
        Commands::Admin { command } => match command {
            AdminCommand::Summary => commands::admin_summary(app).await?,
            AdminCommand::List { role } => commands::admin_list(app, role).await?,
            AdminCommand::Show { id } => commands::admin_show(app, &id).await?,
            AdminCommand::Create {
                email,
                name,
                role,
                class,
                password,
                google,
            } => {
                let form = admin::NewUser {
                    email,
                    name,
                    role,
                    class_name: class,
                    password,
                    google,
                };
                commands::admin_create(app, form).await?
            }
            AdminCommand::Update {
                id,
                name,
                role,
                class,
                active,
            } => commands::admin_update(app, &id, name, role, class, active).await?,
            AdminCommand::Delete { id } => commands::admin_delete(app, &id).await?,
            AdminCommand::Import { csv } => commands::admin_import(app, &csv).await?,
        },
        Commands::Profile { command } => match command {
            ProfileCommand::Show => commands::show_profile(app).await?,
            ProfileCommand::Update {
                hobbies,
                focus,
                image,
            } => commands::update_profile(app, hobbies, focus, image.as_deref()).await?,
        },
    }

    Ok(())
}

async fn run_project(app: &App, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => commands::list_projects(app).await,
        ProjectCommand::Show { id } => commands::show_project(app, &id).await,
        ProjectCommand::Create { name, details } => {
            commands::create_project(app, &name, details.into_details(None)).await
        }
        ProjectCommand::Update { id, name, details } => {
            commands::update_project(app, &id, details.into_details(name)).await
        }
        ProjectCommand::Delete { id } => commands::delete_project(app, &id).await,
        ProjectCommand::Students { query } => commands::find_students(app, &query).await,
        ProjectCommand::AddMember { id, student } => {
            commands::add_member(app, &id, &student).await
        }
        ProjectCommand::RemoveMember { id, student } => {
            commands::remove_member(app, &id, &student).await
        }
        ProjectCommand::AddWeb {
            id,
            url,
            title,
            date,
            summary,
        } => {
            let resource = commands::web_resource(url, title, date, summary);
            commands::add_resource(app, &id, resource).await
        }
        ProjectCommand::AddLiterature {
            id,
            title,
            author,
            publisher,
            publish_date,
            summary,
        } => {
            let resource =
                commands::literature_resource(title, author, publisher, publish_date, summary);
            commands::add_resource(app, &id, resource).await
        }
        ProjectCommand::AddSurvey {
            id,
            title,
            hearing,
            link,
            period,
            target,
            summary,
        } => {
            let resource = commands::survey_resource(SurveyFields {
                hearing,
                title,
                link,
                period,
                target,
                summary,
            });
            commands::add_resource(app, &id, resource).await
        }
        ProjectCommand::RemoveResource { id, resource } => {
            commands::remove_resource(app, &id, &resource).await
        }
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(ApiError::is_unauthorized)
}

fn is_network(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<ApiError>())
        .any(|cause| matches!(cause, ApiError::Network(_)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let settings = Settings::from_env()?.with_api_url(cli.api_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&settings.database_url)
        .await
        .with_context(|| format!("failed to open local store {}", settings.database_url))?;
    db::init_db(&pool).await.context("failed to migrate local store")?;

    let client = ApiClient::new(&settings).context("failed to build HTTP client")?;
    let app = App { pool, client };

    let result = run(&app, cli.command).await;
    if let Err(err) = &result {
        if is_unauthorized(err) {
            db::clear_session(&app.pool).await?;
            log::warn!("session cleared after authentication failure");
            anyhow::bail!("{err:#}\nplease log in again ({})", Route::Login);
        }
        if is_network(err) {
            log::error!("{err:#}");
            anyhow::bail!("could not reach the backend at {}", settings.api_url);
        }
    }
    result
}
