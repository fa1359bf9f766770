//! Command-line front end for campus core.
//!
//! # Responsibility
//! - Parse student emails and print the decoded identity.
//! - Enroll students, list their groups, and repair cohort membership
//!   against a local SQLite file.
//! - Print machine-readable JSON on stdout.

use anyhow::{Context, Result};
use campus_core::{
    default_log_level, init_logging, load_config, AssignmentReport, CampusConfig, CohortAssigner,
    CohortGroup, CohortStatus, EnrollmentService, GroupService, IdentityParser,
    SqliteCohortRepository, SqliteStore, SqliteStudentRepository,
};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "campus")]
#[command(version)]
#[command(about = "Student identity parsing and cohort group assignment", long_about = None)]
struct Cli {
    /// Configuration file path (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a student email into academic attributes
    Parse {
        email: String,

        /// Calendar year used for the academic year (defaults to now)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Create a student record and assign cohort groups
    Enroll {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,
    },
    /// List the groups a user belongs to
    Groups {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        user: Uuid,
    },
    /// Re-run cohort assignment for an enrolled student
    Repair {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,

        #[arg(long)]
        user: Uuid,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match cli.config.as_ref() {
        Some(path) => load_config(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CampusConfig::default(),
    };

    if let Some(log_dir) = cli.log_dir.as_ref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        let log_dir = log_dir
            .to_str()
            .context("log directory must be valid UTF-8")?;
        init_logging(level, log_dir)?;
    }

    let output = run(cli.command, config)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(command: Commands, config: CampusConfig) -> Result<Value> {
    let parser = IdentityParser::new(config.parser.clone());
    match command {
        Commands::Parse { email, year } => {
            let identity = match year {
                Some(year) => parser.parse_at(&email, year)?,
                None => parser.parse(&email)?,
            };
            Ok(serde_json::to_value(identity)?)
        }
        Commands::Enroll { db, email, name } => {
            let store = SqliteStore::open(&db)?;
            let conn = store.checkout()?;
            let service = EnrollmentService::new(
                parser,
                SqliteStudentRepository::try_new(&conn)?,
                CohortAssigner::new(&store, &config.assigner),
            );
            let outcome = service.enroll(&email, &name)?;
            let cohorts = match &outcome.cohorts {
                CohortStatus::Assigned(report) => report_json(report),
                CohortStatus::Partial(failure) => {
                    eprintln!("warning: {failure}");
                    json!({
                        "complete": false,
                        "assigned": failure
                            .succeeded
                            .iter()
                            .map(|assignment| group_json(&assignment.group))
                            .collect::<Vec<_>>(),
                        "failed": failure
                            .failed
                            .iter()
                            .map(|item| json!({
                                "level": item.level.as_str(),
                                "error": item.error.to_string(),
                            }))
                            .collect::<Vec<_>>(),
                    })
                }
            };
            Ok(json!({
                "student": serde_json::to_value(&outcome.student)?,
                "cohorts": cohorts,
            }))
        }
        Commands::Groups { db, user } => {
            let store = SqliteStore::open(&db)?;
            let conn = store.checkout()?;
            let service = GroupService::new(SqliteCohortRepository::try_new(&conn)?);
            let groups = service.list_groups_for_user(user)?;
            Ok(Value::Array(groups.iter().map(group_json).collect()))
        }
        Commands::Repair { db, user } => {
            let store = SqliteStore::open(&db)?;
            let conn = store.checkout()?;
            let service = EnrollmentService::new(
                parser,
                SqliteStudentRepository::try_new(&conn)?,
                CohortAssigner::new(&store, &config.assigner),
            );
            let report = service.repair_cohorts(user)?;
            Ok(report_json(&report))
        }
    }
}

fn report_json(report: &AssignmentReport) -> Value {
    json!({
        "complete": true,
        "userId": report.user_id,
        "groupsCreated": report.groups_created(),
        "membershipsCreated": report.memberships_created(),
        "groups": report
            .assignments
            .iter()
            .map(|assignment| group_json(&assignment.group))
            .collect::<Vec<_>>(),
    })
}

fn group_json(group: &CohortGroup) -> Value {
    json!({
        "id": group.id,
        "kind": group.kind.as_str(),
        "level": group.level().map(|level| level.as_str()),
        "name": group.name,
        "description": group.description,
        "autoAssigned": group.auto_assigned,
    })
}
