use std::fmt;
use std::str::FromStr;

use lms_core::model::{CourseId, UserId};
use serde::Serialize;
use services::{AppServices, Clock};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    MissingUser { command: &'static str },
    MissingCourse,
    InvalidId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingUser { command } => {
                write!(f, "{command} needs a user (--user or LMS_USER_ID)")
            }
            ArgsError::MissingCourse => write!(f, "course needs --course <id>"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id<T: FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse::<T>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Overview,
    Dashboard,
    Profile,
    Grades,
    Course,
    Risk,
    Trend,
    Completion,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "overview" => Some(Self::Overview),
            "dashboard" => Some(Self::Dashboard),
            "profile" => Some(Self::Profile),
            "grades" => Some(Self::Grades),
            "course" => Some(Self::Course),
            "risk" => Some(Self::Risk),
            "trend" => Some(Self::Trend),
            "completion" => Some(Self::Completion),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Overview => "overview",
            Self::Dashboard => "dashboard",
            Self::Profile => "profile",
            Self::Grades => "grades",
            Self::Course => "course",
            Self::Risk => "risk",
            Self::Trend => "trend",
            Self::Completion => "completion",
        }
    }

    fn needs_user(self) -> bool {
        matches!(
            self,
            Self::Dashboard | Self::Profile | Self::Grades | Self::Course
        )
    }
}

struct Args {
    command: Command,
    db_url: String,
    user: Option<UserId>,
    course: Option<CourseId>,
    now: Option<String>,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- <command> [--db <sqlite_url>] [--now <rfc3339>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  overview                      instructor analytics overview");
    eprintln!("  risk | trend | completion     individual instructor reports");
    eprintln!("  dashboard --user <id>         student dashboard");
    eprintln!("  profile   --user <id>         profile summary");
    eprintln!("  grades    --user <id>         grade book across enrolled courses");
    eprintln!("  course    --user <id> --course <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:lms.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LMS_DB_URL, LMS_USER_ID, LMS_NOW");
}

impl Args {
    fn parse(command: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        Self::parse_with_env(command, |key| std::env::var(key).ok(), args)
    }

    fn parse_with_env(
        command: Command,
        env: impl Fn(&str) -> Option<String>,
        args: &mut impl Iterator<Item = String>,
    ) -> Result<Self, ArgsError> {
        let mut db_url = env("LMS_DB_URL").map_or_else(
            || normalize_sqlite_url("sqlite:lms.sqlite3".into()),
            normalize_sqlite_url,
        );
        let mut user: Option<UserId> = env("LMS_USER_ID")
            .map(|value| parse_id("LMS_USER_ID", value))
            .transpose()?;
        let mut course = None;
        let mut now = env("LMS_NOW");

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = Some(parse_id("--user", value)?);
                }
                "--course" => {
                    let value = require_value(args, "--course")?;
                    course = Some(parse_id("--course", value)?);
                }
                "--now" => now = Some(require_value(args, "--now")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        if command.needs_user() && user.is_none() {
            return Err(ArgsError::MissingUser {
                command: command.name(),
            });
        }
        if command == Command::Course && course.is_none() {
            return Err(ArgsError::MissingCourse);
        }

        Ok(Self {
            command,
            db_url,
            user,
            course,
            now,
        })
    }

    fn clock(&self) -> Result<Clock, ArgsError> {
        Clock::from_rfc3339(self.now.as_deref()).map_err(|_| ArgsError::InvalidNow {
            raw: self.now.clone().unwrap_or_default(),
        })
    }

    fn user(&self) -> Result<UserId, ArgsError> {
        self.user.ok_or(ArgsError::MissingUser {
            command: self.command.name(),
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let command = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            print_usage();
            ArgsError::UnknownCommand(first)
        })?,
    };

    // main prints the error itself.
    let parsed = Args::parse(command, &mut argv).inspect_err(|_| print_usage())?;
    let clock = parsed.clock()?;

    // Open + migrate SQLite here; services never see the URL handling.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, clock).await?;
    log::debug!("running {} against {}", command.name(), parsed.db_url);

    match command {
        Command::Overview => print_json(&app.analytics().overview().await?),
        Command::Risk => print_json(&app.risk().at_risk_students().await?),
        Command::Trend => print_json(&app.trend().monthly_trend().await?),
        Command::Completion => print_json(&app.completion().course_details().await?),
        Command::Dashboard => print_json(&app.dashboard().dashboard(parsed.user()?).await?),
        Command::Profile => print_json(&app.dashboard().profile(parsed.user()?).await?),
        Command::Grades => print_json(&app.grades().grade_book(parsed.user()?).await?),
        Command::Course => {
            let course = parsed.course.ok_or(ArgsError::MissingCourse)?;
            let overview = app
                .dashboard()
                .course_overview(parsed.user()?, course)
                .await?;
            print_json(&overview)
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(
        command: Command,
        env: &[(&str, &str)],
        args: &[&str],
    ) -> Result<Args, ArgsError> {
        let lookup = |key: &str| {
            env.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        };
        let mut iter = args.iter().map(|a| (*a).to_owned());
        Args::parse_with_env(command, lookup, &mut iter)
    }

    #[test]
    fn malformed_user_env_is_reported_not_dropped() {
        let err = parse(Command::Dashboard, &[("LMS_USER_ID", "mina")], &[])
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ArgsError::InvalidId { flag: "LMS_USER_ID", ref raw } if raw == "mina"
        ));
    }

    #[test]
    fn user_and_course_come_from_env_or_flags() {
        let args = parse(
            Command::Course,
            &[("LMS_USER_ID", " 7 ")],
            &["--course", "3", "--db", "sqlite::memory:"],
        )
        .unwrap();
        assert_eq!(args.user, Some(UserId::new(7)));
        assert_eq!(args.course, Some(CourseId::new(3)));
        assert_eq!(args.db_url, "sqlite::memory:");

        let err = parse(Command::Grades, &[], &["--user", "x"]).err().unwrap();
        assert!(matches!(err, ArgsError::InvalidId { flag: "--user", .. }));
    }

    #[test]
    fn user_scoped_commands_need_a_user() {
        let err = parse(Command::Profile, &[], &[]).err().unwrap();
        assert!(matches!(err, ArgsError::MissingUser { command: "profile" }));
        assert!(parse(Command::Overview, &[], &[]).is_ok());
    }
}

