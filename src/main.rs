use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::process::ExitCode;
use tree::NullSink;
use tree_test_support::scenario::Scenario;

mod replay;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "datatree")]
#[command(about = "Replays tree scenarios against the incremental flattening engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a scenario through the runtime thread and print every snapshot
    Replay {
        scenario: PathBuf,

        /// Print the view mutation batches as they arrive
        #[arg(long, short)]
        verbose: bool,
    },
    /// Run scenarios in-process, checking invariants after every step
    Check {
        #[arg(required = true)]
        scenarios: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { scenario, verbose } => {
            let scenario = match Scenario::load(&scenario) {
                Ok(scenario) => scenario,
                Err(err) => {
                    eprintln!("Error: {err}");
                    return ExitCode::from(2);
                }
            };
            let report = replay::run(&scenario, verbose);
            log::info!(
                "{} steps, {} view batches, {} mismatches, {} errors",
                scenario.steps.len(),
                report.view_batches,
                report.mismatches,
                report.errors
            );
            if report.errors > 0 {
                ExitCode::from(2)
            } else if report.mismatches > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Commands::Check { scenarios } => {
            let mut failed = 0;
            for path in &scenarios {
                let outcome = Scenario::load(path).and_then(|scenario| scenario.run(&mut NullSink));
                match outcome {
                    Ok(tree) => println!("ok    {} ({} rows visible)", path.display(), tree.view().len()),
                    Err(err) => {
                        failed += 1;
                        println!("FAIL  {}\n{err}", path.display());
                    }
                }
            }
            if failed == 0 {
                ExitCode::SUCCESS
            } else {
                eprintln!("{failed} of {} scenarios failed", scenarios.len());
                ExitCode::FAILURE
            }
        }
    }
}
