//! sqlpy: SQL IR to async Python
//!
//! # Usage
//!
//! ```bash
//! # Generate modules into ./generated
//! sqlpy generate queries/get_user_by_id.json -d postgres
//!
//! # Print to stdout instead of writing files
//! sqlpy generate queries/*.json -d sqlite --stdout
//!
//! # Run the pipeline without writing anything
//! sqlpy check queries/*.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sqlpy::codegen::types::TYPE_TABLE;
use sqlpy::config::GeneratorConfigBuilder;
use sqlpy::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlpy")]
#[command(version)]
#[command(about = "Generate async Python query functions from SQL IR", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlpy generate queries/get_user.json -d postgres
    sqlpy generate queries/*.json -d mysql -o app/queries
    sqlpy check queries/*.json --config sqlpy.toml")]
struct Cli {
    /// Configuration file (defaults to ./sqlpy.toml, then the user config dir)
    #[arg(long, global = true, env = "SQLPY_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one Python module per IR file
    Generate {
        /// IR JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target dialect (postgres, mysql, sqlite)
        #[arg(short, long)]
        dialect: Option<String>,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print generated code instead of writing files
        #[arg(long)]
        stdout: bool,
    },
    /// Run the whole pipeline and print a summary, writing nothing
    Check {
        /// IR JSON files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Target dialect (postgres, mysql, sqlite)
        #[arg(short, long)]
        dialect: Option<String>,
    },
    /// Show the supported type tags
    Types,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Generate {
            inputs,
            dialect,
            output,
            stdout,
        } => load_config(&cli, dialect.as_deref(), output.as_deref())
            .and_then(|config| generate(&config, inputs, *stdout)),
        Commands::Check { inputs, dialect } => {
            load_config(&cli, dialect.as_deref(), None).and_then(|config| check(&config, inputs))
        }
        Commands::Types => {
            show_types();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "sqlpy=debug" } else { "sqlpy=warn" };
    let filter =
        EnvFilter::try_from_env("SQLPY_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file and apply command-line overrides.
fn load_config(
    cli: &Cli,
    dialect: Option<&str>,
    output: Option<&Path>,
) -> Result<GeneratorConfig> {
    let config = GeneratorConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    let mut builder = GeneratorConfigBuilder::from_config(config);
    if let Some(dialect) = dialect {
        builder = builder.dialect(dialect);
    }
    if let Some(output) = output {
        builder = builder.output_dir(output);
    }
    let config = builder.build();
    config.validate()?;
    Ok(config)
}

fn read_ir(path: &Path) -> Result<QueryIr> {
    QueryIr::from_path(path).with_context(|| format!("failed to read IR from {}", path.display()))
}

fn generate(config: &GeneratorConfig, inputs: &[PathBuf], to_stdout: bool) -> Result<()> {
    if !to_stdout {
        std::fs::create_dir_all(&config.output_dir).with_context(|| {
            format!("failed to create {}", config.output_dir.display())
        })?;
    }

    for input in inputs {
        let ir = read_ir(input)?;
        let module = Generator::new(&ir, config)
            .generate()
            .with_context(|| format!("failed to generate {}", input.display()))?;

        if to_stdout {
            print!("{}", module.render());
            continue;
        }

        let target = config.output_dir.join(&module.file_name);
        std::fs::write(&target, module.render())
            .with_context(|| format!("failed to write {}", target.display()))?;
        println!(
            "{} {} {} {}",
            "✓".green(),
            input.display().to_string().dimmed(),
            "→".dimmed(),
            target.display().to_string().cyan()
        );
    }
    Ok(())
}

fn check(config: &GeneratorConfig, inputs: &[PathBuf]) -> Result<()> {
    println!(
        "{:40} {:8} {:9} {:8} {}",
        "File".white().bold(),
        "SQL".white().bold(),
        "Affinity".white().bold(),
        "Schemas".white().bold(),
        "Guards".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());

    for input in inputs {
        let ir = read_ir(input)?;
        let output = Generator::new(&ir, config)
            .generate_output()
            .with_context(|| format!("failed to generate {}", input.display()))?;

        let mode = if output.sql.is_static() { "static" } else { "dynamic" };
        println!(
            "{:40} {:8} {:9} {:8} {}",
            input.display().to_string().cyan(),
            mode.yellow(),
            output.affinity.to_string(),
            output.schema_count(),
            output.guard_count()
        );
    }
    Ok(())
}

fn show_types() {
    println!("{}", "sqlpy type reference".cyan().bold());
    println!();
    println!("{:36} {}", "IR type".white().bold(), "Python".white().bold());
    println!("{}", "─".repeat(60).dimmed());
    for (tags, python) in TYPE_TABLE {
        println!("{:36} {}", tags.yellow(), python.cyan());
    }
}
