//! Operate the progress engine against PostgreSQL from the command line.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use lms_backend::config::LmsSettings;
use lms_backend::domain::badges::AwardOutcome;
use lms_backend::domain::ports::EnginePorts;
use lms_backend::domain::{
    BadgeEngine, BadgeId, CourseId, InstructorAward, InstructorId, LessonId, ProfileAggregator,
    ProgressDispatcher, StudentId,
};
use lms_backend::outbound::persistence::{DbPool, engine_ports, run_migrations};
use mockable::DefaultClock;
use tokio::runtime::Builder;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// `lms-progress` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "lms-progress",
    about = "Track course progress and award badges",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Create any missing canonical badges.
    SeedBadges,
    /// Enroll a student in a course.
    Enroll {
        #[arg(long, value_name = "uuid")]
        student: StudentId,
        #[arg(long, value_name = "uuid")]
        course: CourseId,
    },
    /// Mark a lesson complete and run the progress pipeline.
    CompleteLesson {
        #[arg(long, value_name = "uuid")]
        student: StudentId,
        #[arg(long, value_name = "uuid")]
        lesson: LessonId,
    },
    /// Recompute a student's course state and fill in missed badges.
    Sweep {
        #[arg(long, value_name = "uuid")]
        student: StudentId,
        #[arg(long, value_name = "uuid")]
        course: CourseId,
    },
    /// Recompute a student or instructor profile.
    #[command(group(ArgGroup::new("subject").required(true).args(["student", "instructor"])))]
    RefreshProfile {
        #[arg(long, value_name = "uuid")]
        student: Option<StudentId>,
        #[arg(long, value_name = "uuid")]
        instructor: Option<InstructorId>,
    },
    /// Award a badge by hand on behalf of the course instructor.
    AwardBadge {
        #[arg(long, value_name = "uuid")]
        instructor: InstructorId,
        #[arg(long, value_name = "uuid")]
        student: StudentId,
        #[arg(long, value_name = "uuid")]
        course: CourseId,
        #[arg(long, value_name = "uuid")]
        badge: BadgeId,
        /// Free-text note stored with the award.
        #[arg(long)]
        note: Option<String>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let settings = LmsSettings::from_environment()?;
    init_tracing(settings.log_json);
    let args = CliArgs::parse();

    if let Command::Migrate = args.command {
        let pool_config = settings.pool_config()?;
        let applied = run_migrations(pool_config.database_url())?;
        println!("applied={}", applied.len());
        for version in applied {
            println!("version={version}");
        }
        return Ok(());
    }

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(run(settings, args.command))
}

fn init_tracing(json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(error) = result {
        eprintln!("tracing init failed: {error}");
    }
}

async fn run(settings: LmsSettings, command: Command) -> Result<()> {
    let pool = DbPool::new(settings.pool_config()?)
        .await
        .wrap_err("create database pool")?;
    let ports = engine_ports(pool);
    let clock = Arc::new(DefaultClock);

    match command {
        Command::Migrate => {}
        Command::SeedBadges => {
            let seeded = BadgeEngine::new(&ports, clock).seed_catalog().await?;
            println!("seeded={seeded}");
        }
        Command::Enroll { student, course } => {
            let outcome = dispatcher(&ports, clock)
                .enroll(student, course)
                .await?;
            println!("created={}", outcome.created);
            println!("progress={}", outcome.enrollment.progress.value());
        }
        Command::CompleteLesson { student, lesson } => {
            let outcome = dispatcher(&ports, clock)
                .on_lesson_marked_complete(student, lesson)
                .await?;
            println!("module_id={}", outcome.module.module_id);
            println!("module_progress={}", outcome.module.percentage.value());
            println!("course_progress={}", outcome.course_progress.value());
            print_awards(&outcome.awards);
        }
        Command::Sweep { student, course } => {
            let report = dispatcher(&ports, clock).sweep(student, course).await?;
            for module in &report.modules {
                println!(
                    "module={} progress={} completed={}",
                    module.module_id,
                    module.percentage.value(),
                    module.is_completed
                );
            }
            println!("course_progress={}", report.course_progress.value());
            println!("awards_granted={}", report.awards_granted);
            println!("badges_earned={}", report.profile.badges_earned);
        }
        Command::RefreshProfile {
            student,
            instructor,
        } => {
            let profiles = ProfileAggregator::new(&ports, clock);
            if let Some(student) = student {
                let profile = profiles.refresh_student_profile(student).await?;
                println!("courses_enrolled={}", profile.courses_enrolled);
                println!("courses_completed={}", profile.courses_completed);
                println!("modules_completed={}", profile.modules_completed);
                println!("badges_earned={}", profile.badges_earned);
            }
            if let Some(instructor) = instructor {
                let profile = profiles.refresh_instructor_profile(instructor).await?;
                println!("courses_created={}", profile.courses_created);
                println!("students={}", profile.students);
                println!("badges_awarded={}", profile.badges_awarded);
            }
        }
        Command::AwardBadge {
            instructor,
            student,
            course,
            badge,
            note,
        } => {
            let outcome = BadgeEngine::new(&ports, clock)
                .award_by_instructor(InstructorAward {
                    instructor_id: instructor,
                    student_id: student,
                    course_id: course,
                    badge_id: badge,
                    note,
                })
                .await?;
            print_awards(std::slice::from_ref(&outcome));
        }
    }

    info!("command finished");
    Ok(())
}

fn dispatcher(ports: &EnginePorts, clock: Arc<DefaultClock>) -> ProgressDispatcher {
    ProgressDispatcher::new(ports, clock)
}

fn print_awards(awards: &[AwardOutcome]) {
    for outcome in awards {
        let award = outcome.award();
        let state = if outcome.is_granted() {
            "granted"
        } else {
            "already_held"
        };
        println!("award={} badge={} state={state}", award.id, award.badge_id);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for argument parsing.

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn sweep_parses_typed_ids() {
        let student = StudentId::random();
        let course = CourseId::random();

        let args = CliArgs::try_parse_from([
            "lms-progress",
            "sweep",
            "--student",
            &student.to_string(),
            "--course",
            &course.to_string(),
        ])
        .expect("arguments parse");

        assert!(matches!(
            args.command,
            Command::Sweep { student: s, course: c } if s == student && c == course
        ));
    }

    #[rstest]
    fn malformed_ids_are_rejected() {
        let result =
            CliArgs::try_parse_from(["lms-progress", "enroll", "--student", "x", "--course", "y"]);

        assert!(result.is_err());
    }

    #[rstest]
    #[case(&["lms-progress", "refresh-profile"])]
    fn refresh_profile_needs_a_subject(#[case] argv: &[&str]) {
        assert!(CliArgs::try_parse_from(argv).is_err());
    }

    #[rstest]
    fn award_note_is_optional() {
        let id = StudentId::random().to_string();

        let args = CliArgs::try_parse_from([
            "lms-progress",
            "award-badge",
            "--instructor",
            &id,
            "--student",
            &id,
            "--course",
            &id,
            "--badge",
            &id,
        ])
        .expect("arguments parse");

        assert!(matches!(args.command, Command::AwardBadge { note: None, .. }));
    }
}
