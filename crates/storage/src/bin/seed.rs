use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lms_core::model::{
    Assignment, AssignmentId, Course, CourseId, Enrollment, Role, Submission, User, UserId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    students: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidStudents { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidStudents { raw } => write!(f, "invalid --students value: {raw}"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LMS_DB_URL").unwrap_or_else(|_| "sqlite:lms.sqlite3?mode=rwc".into());
        let mut students = std::env::var("LMS_SEED_STUDENTS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--students" => {
                    let value = require_value(&mut args, "--students")?;
                    students = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidStudents { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            students,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:lms.sqlite3?mode=rwc)");
    eprintln!("  --students <n>            Number of demo students (default: 5)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LMS_DB_URL, LMS_SEED_STUDENTS");
}

const COURSES: [(u64, &str); 3] = [
    (1, "Web Development Basics"),
    (2, "Intro to Algorithms"),
    (3, "Data Visualization"),
];

// (assignment id, course id, due in days from now, total score)
const ASSIGNMENTS: [(u64, u64, i64, Option<u32>); 7] = [
    (1, 1, -60, None),
    (2, 1, -30, Some(20)),
    (3, 1, -5, None),
    (4, 1, 14, Some(50)),
    (5, 2, -45, None),
    (6, 2, -10, Some(10)),
    (7, 3, 7, None),
];

const STUDENT_NAMES: [&str; 8] = [
    "Mina", "Arash", "Sara", "Kian", "Leila", "Omid", "Nazanin", "Reza",
];

type Catalog = (User, Vec<Course>, Vec<Assignment>);

/// Instructor, courses and assignments, built before anything is written.
fn catalog(now: DateTime<Utc>) -> Result<Catalog, lms_core::Error> {
    let instructor = User::new(
        UserId::new(1),
        "Dr. Rahimi",
        "instructor@example.com",
        Role::Instructor,
    )?;
    let courses = COURSES
        .iter()
        .map(|(id, title)| Course::new(CourseId::new(*id), *title))
        .collect::<Result<Vec<_>, _>>()?;
    let assignments = ASSIGNMENTS
        .iter()
        .map(|(id, course, due_days, total)| {
            Assignment::new(
                AssignmentId::new(*id),
                CourseId::new(*course),
                format!("Assignment {id}"),
                Some(now + Duration::days(*due_days)),
                *total,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((instructor, courses, assignments))
}

fn student(i: u32) -> Result<User, lms_core::Error> {
    let name = STUDENT_NAMES[(i as usize) % STUDENT_NAMES.len()];
    Ok(User::new(
        UserId::new(u64::from(i) + 2),
        format!("{name} {}", i + 1),
        format!("student{}@example.com", i + 1),
        Role::Student,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().inspect_err(|_| print_usage())?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let (instructor, courses, assignments) = catalog(now)?;
    storage.users.upsert_user(&instructor).await?;
    for course in &courses {
        storage.courses.upsert_course(course).await?;
    }
    for assignment in &assignments {
        storage.assignments.upsert_assignment(assignment).await?;
    }

    let mut submissions = 0_u32;
    for i in 0..args.students {
        let student = student(i)?;
        let user_id = student.id();
        storage.users.upsert_user(&student).await?;

        // Every student takes course 1; every other one also takes course 2.
        let mut courses = vec![CourseId::new(1)];
        if i % 2 == 0 {
            courses.push(CourseId::new(2));
        }
        for course in &courses {
            storage
                .enrollments
                .enroll(Enrollment::new(user_id, *course))
                .await?;
        }

        // Later students hand in less and score lower, so the risk list is non-empty.
        for (n, (id, course, due_days, total)) in ASSIGNMENTS.iter().enumerate() {
            if !courses.contains(&CourseId::new(*course)) || *due_days > 0 {
                continue;
            }
            if (n as u32) % (i + 2) == i % 3 && i > 1 {
                continue;
            }
            let submitted_at = now + Duration::days(*due_days) + Duration::hours(i64::from(i) - 2);
            let max = i64::from(total.unwrap_or(100));
            let score = (max * (95 - 9 * i64::from(i % 6)) / 100).max(0);
            let submission = Submission::submitted(AssignmentId::new(*id), user_id, submitted_at)
                .with_score(u32::try_from(score)?, submitted_at + Duration::days(2));
            storage.submissions.upsert_submission(&submission).await?;
            submissions += 1;
        }
    }

    println!(
        "Seeded {} courses, {} students and {} submissions into {}",
        COURSES.len(),
        args.students,
        submissions,
        args.db_url
    );

    Ok(())
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
    use lms_core::time::fixed_now;

    #[test]
    fn catalog_builds_every_course_and_assignment() {
        let (instructor, courses, assignments) = catalog(fixed_now()).unwrap();
        assert_eq!(instructor.role(), Role::Instructor);
        assert_eq!(courses.len(), COURSES.len());
        assert_eq!(assignments.len(), ASSIGNMENTS.len());
        assert_eq!(student(0).unwrap().id(), UserId::new(2));
    }

    #[test]
    fn model_errors_surface_as_core_errors() {
        let err: lms_core::Error = Course::new(CourseId::new(9), "   ").unwrap_err().into();
        assert!(matches!(err, lms_core::Error::Course(_)));
    }
}
