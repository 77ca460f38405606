// ABOUTME: Entry point for gatectl — operator CLI over the callgate access gate.
// ABOUTME: Parses CLI args, loads config, and runs one check or admin action.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use callgate::admin::{AdminAdapter, AdminPrincipals, CLASS_PARAM_PREFIX, CallerContext};
use callgate::config::Config;
use callgate::gate::{AdminGate, CallContext};

#[derive(Debug, Parser)]
#[command(name = "gatectl", about = "Inspect and administer the callable/file access gate")]
struct Cli {
    /// Config file (default: ~/.callgate/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Principal to act as for admin commands (default: $USER).
    #[arg(long = "as", global = true)]
    principal: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decide a file operation against the configured rules.
    CheckFile { op: String, path: PathBuf },
    /// Decide whether a callable type may run, recording a rejection if not.
    CheckCallable {
        name: String,
        #[arg(long, default_value = "gatectl")]
        peer: String,
    },
    /// Replace the whitelist with a file (or stdin) plus any --class selections.
    Submit {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long = "class")]
        classes: Vec<String>,
    },
    /// Approve every pending rejection.
    ApproveAll,
    /// Approve one callable type by name.
    Approve { name: String },
    /// List pending rejections.
    Pending {
        #[arg(long)]
        json: bool,
    },
    /// Print the current whitelist.
    Whitelist,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    }
    .with_durable_rejections();
    let gate = Arc::new(AdminGate::from_config(&config)?);
    let admin = AdminAdapter::new(Arc::clone(&gate), AdminPrincipals::from(&config.admin));
    let caller = CallerContext::new(
        cli.principal
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_default(),
    );

    match cli.command {
        Command::CheckFile { op, path } => {
            let allowed = gate.check_file_access(&op, &path);
            println!("{}", if allowed { "allow" } else { "deny" });
            return Ok(exit_for(allowed));
        }
        Command::CheckCallable { name, peer } => {
            let allowed = gate.is_name_whitelisted(&name, &CallContext::new(peer));
            println!("{}", if allowed { "allowed" } else { "rejected" });
            return Ok(exit_for(allowed));
        }
        Command::Submit { file, classes } => {
            let text = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let params = classes
                .iter()
                .map(|name| format!("{CLASS_PARAM_PREFIX}{name}"));
            admin.submit_whitelist(&caller, Some(&text), params)?;
            println!("whitelist replaced");
        }
        Command::ApproveAll => {
            let approved = admin.approve_all(&caller)?;
            println!("approved {} callable(s)", approved.len());
            for name in approved {
                println!("  {name}");
            }
        }
        Command::Approve { name } => {
            admin.approve(&caller, &name)?;
            println!("approved {name}");
        }
        Command::Pending { json } => {
            let pending = admin.pending(&caller)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&pending)?);
            } else {
                for rejection in pending {
                    println!(
                        "{}\t{}\t{}",
                        rejection.name,
                        rejection.attempts,
                        rejection.first_seen.to_rfc3339()
                    );
                }
            }
        }
        Command::Whitelist => {
            for name in gate.whitelist().entries() {
                println!("{name}");
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn exit_for(allowed: bool) -> ExitCode {
    if allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
