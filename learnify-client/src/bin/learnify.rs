//! Learnify command-line client.
//!
//! ```text
//! learnify [--config <path>] <command> [args]
//!
//!   courses [category_id]   list courses, optionally in one category
//!   course <id>             course details
//!   lessons <course_id>     lessons of a course
//!   lesson <id>             lesson with its blocks
//!   categories              list categories
//!   achievements            list achievements
//!   progress                current user's progress
//!   breakers                circuit breaker states
//!   clear-cache             drop every cached response
//! ```

use learnify_client::{build_service, open_store, telemetry, ClientConfig, ConfigError};
use learnify_core::{system_clock, ApiError, LearnifyError};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] telemetry::TelemetryError),
    #[error(transparent)]
    Learnify(#[from] LearnifyError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("{0}")]
    Usage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Courses(Option<String>),
    Course(String),
    Lessons(String),
    Lesson(String),
    Categories,
    Achievements,
    Progress,
    Breakers,
    ClearCache,
}

const USAGE: &str = "usage: learnify [--config <path>] <courses [category_id] | course <id> | \
lessons <course_id> | lesson <id> | categories | achievements | progress | breakers | clear-cache>";

fn parse_command(args: &[String]) -> Result<Command, CliError> {
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            iter.next();
        } else {
            positional.push(arg.as_str());
        }
    }

    let required = |value: Option<&&str>, what: &str| {
        value
            .map(|v| v.to_string())
            .ok_or_else(|| CliError::Usage(format!("missing {what}\n{USAGE}")))
    };

    match positional.first().copied() {
        Some("courses") => Ok(Command::Courses(positional.get(1).map(|v| v.to_string()))),
        Some("course") => Ok(Command::Course(required(positional.get(1), "course id")?)),
        Some("lessons") => Ok(Command::Lessons(required(positional.get(1), "course id")?)),
        Some("lesson") => Ok(Command::Lesson(required(positional.get(1), "lesson id")?)),
        Some("categories") => Ok(Command::Categories),
        Some("achievements") => Ok(Command::Achievements),
        Some("progress") => Ok(Command::Progress),
        Some("breakers") => Ok(Command::Breakers),
        Some("clear-cache") => Ok(Command::ClearCache),
        Some(other) => Err(CliError::Usage(format!("unknown command '{other}'\n{USAGE}"))),
        None => Err(CliError::Usage(USAGE.to_string())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = ClientConfig::load()?;
    telemetry::init_tracing()?;

    let store = open_store(&config)?;
    let service = build_service(&config, store, system_clock())?;
    tracing::debug!(?command, base_url = %config.api_base_url, "Running command");

    match command {
        Command::Courses(category) => print_json(&service.courses(category.as_deref()).await?),
        Command::Course(id) => print_json(&service.course(&id).await?),
        Command::Lessons(course_id) => print_json(&service.course_lessons(&course_id).await?),
        Command::Lesson(id) => print_json(&service.lesson(&id).await?),
        Command::Categories => print_json(&service.categories().await?),
        Command::Achievements => print_json(&service.achievements().await?),
        Command::Progress => print_json(&service.progress().await?),
        Command::Breakers => {
            let states: serde_json::Map<String, serde_json::Value> = service
                .executor()
                .breakers()
                .snapshots()
                .into_iter()
                .map(|(class, snapshot)| Ok((class.to_string(), serde_json::to_value(snapshot)?)))
                .collect::<Result<_, serde_json::Error>>()?;
            print_json(&states)
        }
        Command::ClearCache => {
            let removed = service.cache().clear();
            print_json(&json!({ "removed": removed }))
        }
    }
}
