//! certweave command line tool

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use error::CliResult;

#[derive(Parser)]
#[command(name = "certweave")]
#[command(about = "Build X.509 certificates from JSON templates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the certificate a request and template would produce
    Render {
        /// Certificate signing request (PEM)
        #[arg(long)]
        csr: PathBuf,

        /// JSON certificate template
        #[arg(short, long)]
        template: Option<PathBuf>,
    },

    /// Issue a signed certificate
    Issue {
        /// Certificate signing request (PEM)
        #[arg(long)]
        csr: PathBuf,

        /// Ed25519 signing key (PKCS#8 PEM)
        #[arg(short, long)]
        key: PathBuf,

        /// JSON certificate template
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Issuing CA certificate (PEM); self-signed when omitted
        #[arg(long)]
        ca: Option<PathBuf>,

        /// Issuance settings (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file for the certificate; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { csr, template } => {
            commands::render::handle(csr, template)?;
        }
        Commands::Issue {
            csr,
            key,
            template,
            ca,
            config,
            out,
        } => {
            commands::issue::handle(commands::issue::IssueArgs {
                csr,
                key,
                template,
                ca,
                config,
                out,
            })?;
        }
    }

    Ok(())
}
