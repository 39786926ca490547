//! Modhost - Dynamic Module Host
//!
//! Command-line front end: load modules and inspect what resolves.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use modhost::config::{HostConfig, CONFIG_FILE_NAME};
use modhost::{logging, Binding, ModuleHost};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "modhost")]
#[command(version)]
#[command(about = "Dynamic module host with hot reload", long_about = None)]
struct Cli {
    /// Configuration file (default: MODHOST_CONFIG, then modhost.toml search)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load modules and resolve functions in them
    Resolve {
        /// Module files to load, in order
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Function to resolve, as Module:Type:Method[:Signature]
        #[arg(short, long = "target", value_name = "TARGET")]
        targets: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write a default configuration file instead
        #[arg(long, value_name = "FILE")]
        init: Option<PathBuf>,
    },
}

/// One `--target` argument
struct Target {
    module: String,
    type_name: String,
    method: String,
    signature: Option<String>,
}

impl Target {
    fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(':').collect();
        match parts.as_slice() {
            [module, type_name, method] => Ok(Self {
                module: module.to_string(),
                type_name: type_name.to_string(),
                method: method.to_string(),
                signature: None,
            }),
            [module, type_name, method, signature] => Ok(Self {
                module: module.to_string(),
                type_name: type_name.to_string(),
                method: method.to_string(),
                signature: Some(signature.to_string()),
            }),
            _ => bail!(
                "invalid target '{}': expected Module:Type:Method[:Signature]",
                text
            ),
        }
    }
}

#[derive(Serialize)]
struct ResolveReport {
    modules: Vec<String>,
    functions: Vec<FunctionReport>,
}

#[derive(Serialize)]
struct FunctionReport {
    target: String,
    address: String,
    binding: String,
    context_token: u64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HostConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HostConfig::from_env().context("Failed to load configuration")?,
    };

    match cli.command {
        Commands::Resolve {
            paths,
            targets,
            json,
        } => {
            logging::init(&config.logging);
            cmd_resolve(config, &paths, &targets, json)
        }
        Commands::Config { init } => cmd_config(&config, init),
    }
}

fn cmd_resolve(config: HostConfig, paths: &[PathBuf], targets: &[String], json: bool) -> Result<()> {
    let targets = targets
        .iter()
        .map(|t| Target::parse(t))
        .collect::<Result<Vec<_>>>()?;

    let host = ModuleHost::new(config);
    let mut modules = Vec::new();
    for path in paths {
        let name = host
            .load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        modules.push(name);
    }

    let mut functions = Vec::new();
    for target in &targets {
        let label = match &target.signature {
            Some(sig) => format!("{}:{}:{}:{}", target.module, target.type_name, target.method, sig),
            None => format!("{}:{}:{}", target.module, target.type_name, target.method),
        };
        let resolved = host
            .resolve(
                &target.module,
                &target.type_name,
                &target.method,
                target.signature.as_deref(),
            )
            .with_context(|| format!("Failed to resolve {}", label))?;

        let binding = match resolved.binding() {
            Binding::Direct => "direct".to_string(),
            Binding::Trampoline { signature } => format!("trampoline({})", signature),
        };
        functions.push(FunctionReport {
            target: label,
            address: format!("{:p}", resolved.as_ptr()),
            binding,
            context_token: resolved.context_token(),
        });
    }

    let report = ResolveReport { modules, functions };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for module in &report.modules {
            println!("loaded  {}", module);
        }
        for f in &report.functions {
            println!("{}  {}  [{}]", f.address, f.target, f.binding);
        }
    }

    host.shutdown();
    Ok(())
}

fn cmd_config(config: &HostConfig, init: Option<PathBuf>) -> Result<()> {
    match init {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(CONFIG_FILE_NAME)
            } else {
                path
            };
            if path.exists() {
                bail!("{} already exists", path.display());
            }
            HostConfig::default()
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => {
            let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
            print!("{}", rendered);
        }
    }
    Ok(())
}
