use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use svcdef_dump::{Format, dump_definition, render, write_output};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "svcdef-dump", version)]
#[command(about = "Build a service definition from generated Go stubs and proto IDL")]
struct Cli {
    /// Generated Go stub files (`*.pb.go`, `*_grpc.pb.go`)
    #[arg(long = "stub", required = true, num_args = 1..)]
    stubs: Vec<PathBuf>,

    /// Proto files carrying `google.api.http` annotations
    #[arg(long = "idl", num_args = 1..)]
    idl: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // stdout carries the rendered definition
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let definition =
        dump_definition(&cli.stubs, &cli.idl).context("cannot build service definition")?;
    let text = render(&definition, cli.format)?;
    write_output(&text, cli.output.as_deref())?;
    if let Some(path) = &cli.output {
        info!(path = %path.display(), "wrote service definition");
    }
    Ok(())
}
