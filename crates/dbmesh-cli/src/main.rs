//! dbmesh CLI - run one lifecycle verb against a database topology.
//!
//! This is the entry point for the `dbmesh` binary. Results are printed to
//! stdout as JSON; logs go to stderr.

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dbmesh_aws::Sessions;
use dbmesh_rds::{RdsConfig, RdsService};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cli::Args;

const DEFAULT_FILTER: &str = "info,dbmesh=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let session = args.session().context("invalid credentials")?;
    let sessions = Sessions::builder().session(session).build().await;
    let control_plane = sessions
        .control_plane(&args.region)
        .with_context(|| format!("no session for region {}", args.region))?;

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight calls");
            cancel.cancel();
        }
    });

    let config = RdsConfig {
        call_timeout_seconds: args.call_timeout,
    };
    let service = RdsService::new(Arc::new(control_plane), &config).with_cancellation(token);

    let report = commands::run(&service, &args.command).await?;
    println!("{}", serde_json::to_string_pretty(&report.output)?);

    match report.aborted {
        Some(aborted) => Err(aborted.into()),
        None => Ok(()),
    }
}
