mod commands;
mod report;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use verdict_common::config::{HarnessConfig, StderrPolicy, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "verdict")]
#[command(about = "Verdict - Judge a solution against local ip/op test fixtures", long_about = None)]
struct Cli {
    /// Harness config file (built-in defaults when absent)
    #[arg(long, global = true, env = "VERDICT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true, env = "VERDICT_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile (if needed) and run a solution against every fixture
    Run(RunArgs),

    /// List the fixtures found in a directory
    Fixtures {
        /// Directory holding ip<N>.txt / op<N>.txt pairs
        dir: PathBuf,
    },

    /// List configured languages
    Languages,
}

#[derive(Args)]
struct RunArgs {
    /// Solution source file
    solution: PathBuf,

    /// Fixture directory (defaults to the solution's directory)
    #[arg(short, long, conflicts_with = "problem")]
    fixtures: Option<PathBuf>,

    /// Problem name, resolved to TestData/<slug>
    #[arg(short, long)]
    problem: Option<String>,

    /// Language name (detected from the file extension when omitted)
    #[arg(short, long)]
    language: Option<String>,

    /// Per-case time limit in milliseconds
    #[arg(long, env = "VERDICT_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// How stderr output affects the verdict: fail or ignore
    #[arg(long, env = "VERDICT_STDERR_POLICY")]
    stderr_policy: Option<StderrPolicy>,

    /// Fail cases whose process exits with a non-zero code
    #[arg(long, env = "VERDICT_FAIL_ON_EXIT_CODE")]
    fail_on_exit_code: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut HarnessConfig) -> Result<()> {
        if let Some(timeout_ms) = self.timeout_ms {
            config.case_timeout_ms = timeout_ms;
        }
        if let Some(policy) = self.stderr_policy {
            config.stderr_policy = policy;
        }
        if self.fail_on_exit_code {
            config.fail_on_nonzero_exit = true;
        }
        config.validate()
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match dispatch(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let mut config = HarnessConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            args.apply(&mut config)?;
            let fixture_dir = commands::resolve_fixture_dir(
                &args.solution,
                args.fixtures.as_deref(),
                args.problem.as_deref(),
            )?;
            commands::run_solution(
                config,
                &args.solution,
                &fixture_dir,
                args.language.as_deref(),
                args.json,
            )
            .await
        }
        Commands::Fixtures { dir } => {
            commands::list_fixtures(&dir, &mut io::stdout().lock())?;
            Ok(commands::EXIT_ALL_PASSED)
        }
        Commands::Languages => {
            commands::list_languages(&config, &mut io::stdout().lock())?;
            Ok(commands::EXIT_ALL_PASSED)
        }
    }
}
