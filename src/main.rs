//! rutina - weekly workout planner and session tracker

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rutina::catalog::{ExerciseCatalog, RoutineCatalog};
use rutina::codec;
use rutina::config::{Config, DEFAULT_DB_PATH, DEFAULT_DEBOUNCE_MS};
use rutina::db::SqliteRepository;
use rutina::plan::{DetailField, MuscleGroup, Mutation, Plan, Weekday};
use rutina::repository::{NewRoutine, RoutineId};
use rutina::session::{self, DuplicatePolicy, SaveOutcome, SessionEntries, WorkoutTracker};
use rutina::sync::PlanController;
use rutina::template::{self, TemplateRequest};
use rutina::tui::{App, Exit};

const DEFAULT_SHARE_BASE: &str = "http://localhost:3000/mi-plan";

type Controller = PlanController<SqliteRepository>;

#[derive(Parser)]
#[command(name = "rutina")]
#[command(author, version, about = "Weekly workout planner and session tracker")]
struct Cli {
    /// SQLite database with routines and history
    #[arg(long, env = "RUTINA_DB", default_value = DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    /// Signed-in user; without it the plan lives only in the share link
    #[arg(long, env = "RUTINA_OWNER", global = true)]
    owner: Option<String>,

    /// Start from a shared plan (link or bare snapshot)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Quiet period before routine changes are written
    #[arg(long, env = "RUTINA_DEBOUNCE_MS", default_value_t = DEFAULT_DEBOUNCE_MS, global = true)]
    debounce_ms: u64,

    /// Exercise catalog JSON replacing the built-in one
    #[arg(long, env = "RUTINA_EXERCISE_CATALOG", global = true)]
    exercise_catalog: Option<PathBuf>,

    /// Predefined routines JSON replacing the built-in one
    #[arg(long, env = "RUTINA_ROUTINE_CATALOG", global = true)]
    routine_catalog: Option<PathBuf>,

    /// Base address for share links
    #[arg(long, env = "RUTINA_SHARE_BASE", default_value = DEFAULT_SHARE_BASE, global = true)]
    share_base: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open workout mode for today
    Tui {
        /// Train another day's plan
        #[arg(long)]
        day: Option<Weekday>,

        /// Save even if a session was already saved today
        #[arg(long)]
        force: bool,
    },

    /// Show the weekly plan
    Plan,

    /// List today's exercises
    Today {
        #[arg(long)]
        day: Option<Weekday>,
    },

    /// Print the share link for the active plan
    Share,

    /// Read a shared plan; signed in, it is stored as a new routine
    Import {
        /// Share link or bare snapshot
        link: String,

        /// Name of the new routine
        #[arg(long)]
        name: Option<String>,
    },

    /// Replace the plan with a generated split
    Generate {
        /// Training days, in the order the split should rotate
        #[arg(required = true)]
        days: Vec<Weekday>,

        /// Days per week (defaults to the number of days given)
        #[arg(long)]
        per_week: Option<usize>,
    },

    /// Add or remove a training day for a group
    ToggleDay { group: MuscleGroup, day: Weekday },

    /// Add or remove a routine type tag
    ToggleType { kind: String },

    /// Select or unselect an exercise
    ToggleExercise { group: MuscleGroup, name: String },

    /// Unselect every exercise of a group
    ClearGroup { group: MuscleGroup },

    /// Override series, reps or weight of an exercise
    SetDetail {
        group: MuscleGroup,
        name: String,
        field: FieldArg,
        /// Leave out to clear the override
        value: Option<f64>,
    },

    /// Manage stored routines
    Routines {
        #[command(subcommand)]
        action: RoutineCommand,
    },

    /// List saved sessions
    History {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum RoutineCommand {
    List,
    Create {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Rename {
        id: RoutineId,
        name: String,
    },
    Describe {
        id: RoutineId,
        description: String,
    },
    Delete {
        id: RoutineId,
    },
    /// Mark as the routine loaded on sign-in
    Activate {
        id: RoutineId,
    },
    /// Show a routine's plan
    Select {
        id: RoutineId,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FieldArg {
    Series,
    Reps,
    Peso,
}

impl From<FieldArg> for DetailField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Series => DetailField::Series,
            FieldArg::Reps => DetailField::Reps,
            FieldArg::Peso => DetailField::Peso,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config {
        db_path: cli.db.clone(),
        exercise_catalog: cli.exercise_catalog.clone(),
        routine_catalog: cli.routine_catalog.clone(),
        ..Config::default()
    }
    .with_owner(cli.owner.clone())
    .with_debounce_ms(cli.debounce_ms);

    let repo = match &config.owner {
        Some(_) => SqliteRepository::open(&config.db_path)?,
        None => SqliteRepository::in_memory()?,
    };
    let initial = cli
        .config
        .as_deref()
        .map(|link| codec::decode(&codec::snapshot_from_link(link)))
        .unwrap_or_default();

    let mut ctl = PlanController::new(Arc::new(repo), &config.sync).with_ephemeral(initial);
    if let Some(owner) = &config.owner {
        ctl.sign_in(owner.as_str()).await?;
    }

    let command = cli.command.unwrap_or(Commands::Tui { day: None, force: false });
    match command {
        Commands::Tui { day, force } => {
            let catalog = ExerciseCatalog::load(config.exercise_catalog.as_deref())?;
            let day = day.unwrap_or_else(Weekday::today);
            let tracker = WorkoutTracker::new(ctl.active_plan(), day, &catalog);
            if tracker.total_exercises() == 0 {
                println!("Nada programado para {}. Día de descanso.", day);
                return Ok(());
            }

            let mut app = App::new(tracker);
            let exit = app.run()?;
            let record = app.tracker().finalize(Utc::now());
            println!(
                "{}: {}/{} ejercicios ({}%)",
                record.day_name, record.completed_count, record.total_exercises, record.progress_percentage
            );

            if exit == Exit::Save {
                if !ctl.is_authenticated() {
                    println!("Sin sesión iniciada: el entrenamiento no se guarda.");
                } else {
                    let policy = if force {
                        DuplicatePolicy::Allow
                    } else {
                        DuplicatePolicy::RejectSameDay
                    };
                    match ctl.save_session(&record, policy).await? {
                        SaveOutcome::Saved => println!("Entrenamiento guardado."),
                        SaveOutcome::AlreadySavedToday => {
                            println!("Ya hay un entrenamiento guardado hoy (usa --force para guardar otro).")
                        }
                    }
                }
            }
        }

        Commands::Plan => {
            if let Some(routine) = ctl.current_routine() {
                println!("Rutina: {} (id: {})", routine.name, routine.id);
            }
            print_plan(ctl.active_plan());
        }

        Commands::Today { day } => {
            let catalog = ExerciseCatalog::load(config.exercise_catalog.as_deref())?;
            print_today(ctl.active_plan(), day.unwrap_or_else(Weekday::today), &catalog);
        }

        Commands::Share => {
            println!("{}", codec::share_url(&cli.share_base, ctl.active_plan())?);
        }

        Commands::Import { link, name } => {
            let plan = codec::try_decode(&codec::snapshot_from_link(&link)).context("invalid shared plan")?;
            if ctl.is_authenticated() {
                let created = ctl
                    .create_routine(NewRoutine {
                        name,
                        plan,
                        ..NewRoutine::default()
                    })
                    .await?;
                println!("Imported as routine {} (id: {})", created.name, created.id);
            } else {
                print_plan(&plan);
            }
        }

        Commands::Generate { days, per_week } => {
            let request = TemplateRequest::new(per_week.unwrap_or(days.len()), days)?;
            let catalog = RoutineCatalog::load(config.routine_catalog.as_deref())?;
            let plan = template::generate(&request, &catalog);
            println!("Plantilla: {}", request.template());
            apply(&mut ctl, Mutation::ApplyTemplate(plan), &cli.share_base).await?;
        }

        Commands::ToggleDay { group, day } => {
            apply(&mut ctl, Mutation::ToggleScheduleDay { group, day }, &cli.share_base).await?;
        }

        Commands::ToggleType { kind } => {
            apply(&mut ctl, Mutation::ToggleRoutineType(kind), &cli.share_base).await?;
        }

        Commands::ToggleExercise { group, name } => {
            let catalog = ExerciseCatalog::load(config.exercise_catalog.as_deref())?;
            if catalog.find(group, &name).is_none() {
                bail!("{} is not a {} exercise in the catalog", name, group.display_name());
            }
            apply(&mut ctl, Mutation::ToggleExercise { group, name }, &cli.share_base).await?;
        }

        Commands::ClearGroup { group } => {
            apply(&mut ctl, Mutation::ClearGroup(group), &cli.share_base).await?;
        }

        Commands::SetDetail {
            group,
            name,
            field,
            value,
        } => {
            let mutation = Mutation::SetExerciseDetail {
                group,
                name,
                field: field.into(),
                value,
            };
            apply(&mut ctl, mutation, &cli.share_base).await?;
        }

        Commands::Routines { action } => routines(&mut ctl, action).await?,

        Commands::History { limit } => {
            let history = ctl.history().await?;
            println!("Historial:");
            println!("{:-<60}", "");
            for s in history.iter().take(limit) {
                println!(
                    "{} | {:9} | {:>2}/{:<2} | {:>3}% | {}",
                    s.date.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    s.day_name.name(),
                    s.completed_count,
                    s.total_exercises,
                    s.progress_percentage,
                    s.status.as_str()
                );
            }
        }
    }

    ctl.flush().await?;
    Ok(())
}

/// Apply one change and report where it went
async fn apply(ctl: &mut Controller, mutation: Mutation, share_base: &str) -> Result<()> {
    ctl.mutate(mutation)?;
    if ctl.is_remote_active() {
        ctl.flush().await?;
        if let Some(routine) = ctl.current_routine() {
            println!("Rutina {} actualizada.", routine.name);
        }
    } else {
        println!("{}", codec::share_url(share_base, ctl.active_plan())?);
    }
    Ok(())
}

async fn routines(ctl: &mut Controller, action: RoutineCommand) -> Result<()> {
    match action {
        RoutineCommand::List => {
            let current = ctl.current_routine().map(|r| r.id);
            for r in ctl.routines() {
                println!(
                    "{} {:>4} | {:20} | {} | actualizada {}",
                    if Some(r.id) == current { "*" } else { " " },
                    r.id,
                    r.name,
                    if r.is_active { "activa" } else { "      " },
                    r.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
                );
            }
        }
        RoutineCommand::Create { name, description } => {
            let created = ctl
                .create_routine(NewRoutine {
                    name,
                    description,
                    ..NewRoutine::default()
                })
                .await?;
            println!("Created: {} (id: {})", created.name, created.id);
        }
        RoutineCommand::Rename { id, name } => {
            ctl.rename_routine(id, name).await?;
        }
        RoutineCommand::Describe { id, description } => {
            ctl.describe_routine(id, description).await?;
        }
        RoutineCommand::Delete { id } => {
            ctl.delete_routine(id).await?;
            println!("Deleted routine {}", id);
        }
        RoutineCommand::Activate { id } => {
            ctl.set_active_routine(id).await?;
        }
        RoutineCommand::Select { id } => {
            let routine = ctl.load_routine(id).await?;
            println!("Rutina: {} (id: {})", routine.name, routine.id);
            let plan = routine.plan.clone();
            print_plan(&plan);
        }
    }
    Ok(())
}

fn print_plan(plan: &Plan) {
    if !plan.schedule.types.is_empty() {
        println!("Tipos: {}", plan.schedule.types.join(", "));
    }
    println!("Resumen semanal:");
    for (day, groups) in session::weekly_summary(plan) {
        if groups.is_empty() {
            println!("  {:10} descanso", day.name());
        } else {
            println!("  {:10} {}", day.name(), groups.join(", "));
        }
    }
    for group in MuscleGroup::all() {
        let exercises = plan.exercises_for(*group);
        if exercises.is_empty() {
            continue;
        }
        println!("{}:", group.display_name());
        for name in exercises {
            match plan.detail_for(*group, name) {
                Some(detail) if detail.has_override() => println!(
                    "  - {} ({})",
                    name,
                    session::DisplayDetail::Custom(*detail)
                ),
                _ => println!("  - {}", name),
            }
        }
    }
}

fn print_today(plan: &Plan, day: Weekday, catalog: &ExerciseCatalog) {
    let groups = session::today(plan, day, catalog);
    if groups.is_empty() {
        println!("{}: día de descanso", day);
        return;
    }
    println!("Entrenamiento de {}:", day);
    for group in &groups {
        println!("{}", group.display_name());
        match &group.entries {
            SessionEntries::Flat(list) => {
                for e in list {
                    println!("  - {}: {}", e.name, e.detail);
                }
            }
            SessionEntries::Nested(subs) => {
                for sub in subs {
                    println!("  {}", sub.name);
                    for e in &sub.exercises {
                        println!("    - {}: {}", e.name, e.detail);
                    }
                }
            }
        }
    }
}
