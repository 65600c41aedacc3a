//! Attendance pipeline binary: one process per deployment. Mirrors
//! `braid-run`'s CLI-parse → config-load → runtime-build → serve shape.

mod cli;
mod container;
mod face_model;
mod frame;
mod gallery_client;
mod pipeline;
mod routes;
mod runtime;

use std::sync::Arc;

use clap::Parser;

use crate::cli::ServerCliArgs;
use crate::container::ServiceContainer;

fn main() -> anyhow::Result<()> {
    let args = ServerCliArgs::parse();
    let _logging_guard = env_tracing_logger::init();

    let cfg = attendance_config::parse_config_file(&args.config_file)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run(args, cfg))
}

async fn run(args: ServerCliArgs, cfg: attendance_config::Config) -> anyhow::Result<()> {
    let now = monotonic_now();
    let container = Arc::new(ServiceContainer::build(&cfg, now)?);

    let listener = tokio::net::TcpListener::bind(args.bind_addr).await?;
    let router = routes::router(container.clone());

    tracing::info!(target: "server::main", addr = %args.bind_addr, "attendance server listening");

    let serve_result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!(target: "server::main", "shutting down");
    match Arc::try_unwrap(container) {
        Ok(container) => container.shutdown(),
        Err(_) => tracing::warn!(
            target: "server::main",
            "container still referenced by an in-flight request, skipping orderly shutdown"
        ),
    }

    serve_result.map_err(anyhow::Error::from)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Seconds since an arbitrary fixed epoch, monotonic for this process's
/// lifetime. The pipeline never reads a clock itself; every caller
/// (this binary, or a test harness) supplies `now` explicitly.
fn monotonic_now() -> f64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(std::time::Instant::now);
    start.elapsed().as_secs_f64()
}
