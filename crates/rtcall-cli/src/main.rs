//! rtcall command-line driver
//!
//! Lists the registered runtime entries, generates and disassembles call
//! stubs for them and runs them through the harness.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rtcall_engine::{HarnessConfig, IsolateConfig, JitConfig, OptLevel};

mod commands;

#[derive(Parser)]
#[command(name = "rtcall")]
#[command(about = "Runtime entry call stubs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    options: EngineOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EngineOptions {
    /// Cranelift optimization level
    #[arg(long, global = true, value_enum, default_value_t = Opt::Speed)]
    opt_level: Opt,
    /// Skip the Cranelift IR verifier
    #[arg(long, global = true)]
    no_verify: bool,
    /// Allocations between automatic collections
    #[arg(long, global = true, default_value_t = IsolateConfig::default().gc_threshold)]
    gc_threshold: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum Opt {
    None,
    Speed,
    SpeedAndSize,
}

impl EngineOptions {
    fn harness_config(&self) -> HarnessConfig {
        let opt_level = match self.opt_level {
            Opt::None => OptLevel::None,
            Opt::Speed => OptLevel::Speed,
            Opt::SpeedAndSize => OptLevel::SpeedAndSize,
        };
        HarnessConfig {
            jit: JitConfig {
                opt_level,
                enable_verifier: !self.no_verify,
            },
            isolate: IsolateConfig {
                gc_threshold: self.gc_threshold,
            },
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List registered runtime entries
    List,

    /// Call a runtime entry through a generated stub
    Run {
        /// Entry name
        entry: String,
        /// Integer arguments
        #[arg(allow_hyphen_values = true)]
        args: Vec<i64>,
    },

    /// Show the stub generated for a runtime entry
    Disasm {
        /// Entry name
        entry: String,
        /// Also print the Cranelift IR
        #[arg(long)]
        ir: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = cli.options.harness_config();

    match cli.command {
        Commands::List => commands::list::execute(),
        Commands::Run { entry, args } => commands::run::execute(config, &entry, &args),
        Commands::Disasm { entry, ir } => commands::disasm::execute(config, &entry, ir),
    }
}
