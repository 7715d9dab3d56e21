use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use timetable_solver::config::{AppConfig, SolverBackend};
use timetable_solver::data::Week;
use timetable_solver::engine::{Engine, SolveRequest};
use timetable_solver::extract::report_for_error;
use timetable_solver::fixtures::{Defect, FixtureGenerator};
use timetable_solver::import::{CsvTables, import_document};
use timetable_solver::render::{class_grid, grid_to_csv, render_report, timetable_json};
use timetable_solver::server;
use timetable_solver::solver::CancelToken;
use timetable_solver::{Result, TimetableError};

#[derive(Debug, Parser)]
#[command(name = "timetable_solver", version, about = "School timetable solver")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        /// Overrides `server.addr`.
        #[arg(long)]
        addr: Option<String>,
    },
    /// Solve a JSON document and print the timetable.
    Solve {
        document: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        periods_per_day: u32,
        #[arg(short, long)]
        days: Option<u32>,
        #[arg(long, value_enum)]
        backend: Option<SolverBackend>,
        /// Print the report as JSON instead of grids.
        #[arg(long)]
        json: bool,
        /// Write one CSV grid per class into this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Validate a JSON document and list every problem found.
    Validate {
        document: PathBuf,
        #[arg(short, long, default_value_t = 8)]
        periods_per_day: u32,
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Build a JSON document from classes, subjects and teachers CSV files.
    Import {
        classes: PathBuf,
        subjects: PathBuf,
        teachers: PathBuf,
    },
    /// Generate a sample document.
    Generate {
        #[arg(short = 'n', long, default_value_t = 3)]
        classes: usize,
        #[arg(short, long, default_value_t = 1234)]
        seed: u64,
        #[arg(long, value_enum)]
        defect: Option<Defect>,
        #[arg(short, long, default_value_t = 8)]
        periods_per_day: u32,
    },
}

fn read_document(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn request_for(path: &Path, periods_per_day: u32, days: Option<u32>) -> Result<SolveRequest> {
    let request = SolveRequest::new(read_document(path)?, periods_per_day);
    Ok(match days {
        Some(days) => request.with_days(days),
        None => request,
    })
}

async fn run(cli: Cli, mut config: AppConfig) -> Result<ExitCode> {
    match cli.command {
        Command::Serve { addr } => {
            if let Some(addr) = addr {
                config.server.addr = addr;
            }
            server::run_server(config).await?;
        }
        Command::Solve {
            document,
            periods_per_day,
            days,
            backend,
            json,
            csv_dir,
        } => {
            if let Some(backend) = backend {
                config.solver.backend = backend;
            }
            let request = request_for(&document, periods_per_day, days)?;
            let engine = std::sync::Arc::new(Engine::new(config));

            let cancel = CancelToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, stopping the search...");
                    on_interrupt.cancel();
                }
            });

            let report = match engine.solve(request, cancel).await {
                Ok(report) => report,
                Err(e @ (TimetableError::Join(_) | TimetableError::Io(_))) => return Err(e),
                Err(e) => report_for_error(&e),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_report(&report));
            }
            if let Some(dir) = csv_dir {
                std::fs::create_dir_all(&dir)?;
                for class in report.class_names.iter().flatten() {
                    if let Some(grid) = class_grid(&report, class) {
                        let path = dir.join(format!("{}.csv", class.replace(' ', "_")));
                        std::fs::write(&path, grid_to_csv(&grid)?)?;
                        info!("Wrote {}", path.display());
                    }
                }
                std::fs::write(dir.join("timetable.json"), timetable_json(&report)?)?;
            }
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Validate {
            document,
            periods_per_day,
            days,
        } => {
            let request = request_for(&document, periods_per_day, days)?;
            let errors = Engine::new(config).validate(&request);
            if errors.is_empty() {
                println!("Document is valid.");
            } else {
                for error in &errors {
                    println!("{error}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Import {
            classes,
            subjects,
            teachers,
        } => {
            let tables = CsvTables::from_files(classes, subjects, teachers)?;
            println!("{}", serde_json::to_string_pretty(&import_document(&tables)?)?);
        }
        Command::Generate {
            classes,
            seed,
            defect,
            periods_per_day,
        } => {
            let mut generator = FixtureGenerator::new(seed);
            let doc = match defect {
                Some(defect) => generator.document_with_defect(
                    classes,
                    defect,
                    Week::new(config.week.days, periods_per_day),
                ),
                None => generator.document(classes),
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match AppConfig::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
