use anyhow::Result;
use clap::Parser;
use foodflow::cli::{self, Command};
use foodflow::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "foodflow",
    about = "Surplus food donations from restaurants to NGOs"
)]
pub struct Args {
    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "FOODFLOW_DATA_DIR", help = "Directory holding the store")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, help = "Verbose output on stderr")]
    pub verbose: bool,

    #[arg(long, help = "Do not load sample data into an empty store")]
    pub no_seed: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        Config::load_from(config_path)?
    } else {
        Config::load()?
    };

    // CLI flags override config files
    if let Some(dir) = &args.data_dir {
        cfg.store.data_dir = Some(dir.clone());
    }
    if args.no_seed {
        cfg.store.seed_sample_data = Some(false);
    }

    if let Err(errors) = cfg.validate() {
        for e in &errors {
            eprintln!("Config error {}", e);
        }
        return Err(anyhow::anyhow!(
            "Invalid configuration ({} errors)",
            errors.len()
        ));
    }

    let verbose = args.verbose || cfg.verbose();
    if verbose {
        eprintln!("[VERBOSE] Data dir: {}", cfg.data_dir().display());
        eprintln!(
            "[VERBOSE] Tracking: {}% every {} ms",
            cfg.tracking.step_percent(),
            cfg.tracking.interval_ms()
        );
    }

    let session_id = uuid::Uuid::new_v4().to_string();
    let ctx = cli::Context::new(cfg, &session_id, verbose)?;
    ctx.seed_on_first_run()?;

    match args.command {
        None | Some(Command::Shell) => cli::run_repl(&ctx),
        Some(command) => cli::run(&ctx, command),
    }
}
