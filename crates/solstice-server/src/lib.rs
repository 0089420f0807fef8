//! Solstice server crate.
//!
//! Wires the render worker to an axum HTTP front end: command-line
//! configuration, job dispatch with result correlation, PNG encoding, and
//! the process lifecycle.

pub mod config;
pub mod dispatch;
pub mod encode;
pub mod http;

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use solstice_engine::{RenderWorker, WorkerMessage};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;

pub use config::Args;
pub use dispatch::{DispatchError, Dispatcher, Readiness, ResultCorrelator, Ticket};

/// Starts the render worker and serves HTTP until something fatal happens.
///
/// Returns an error when the worker fails to initialize or exits, or when
/// the listener fails. It never returns `Ok` on its own.
pub async fn run(args: Args) -> anyhow::Result<()> {
    let settings = args.render_settings();
    log::info!(
        "output {}x{}, day map {}, night map {}",
        settings.width,
        settings.width / 2,
        settings.day_texture.display(),
        settings.night_texture.display()
    );

    let (worker, events) =
        RenderWorker::spawn_context(settings).context("failed to spawn the render worker thread")?;
    let dispatcher = Arc::new(Dispatcher::new(worker.sender(), args.max_pending));

    let addr = args.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    log::info!("listening on http://{addr}");

    serve(listener, dispatcher, events).await
}

/// Serves `listener` while pumping worker messages into `dispatcher`.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    events: UnboundedReceiver<WorkerMessage>,
) -> anyhow::Result<()> {
    let app = http::router(Arc::clone(&dispatcher));

    tokio::select! {
        served = axum::serve(listener, app).into_future() => {
            served.context("http server failed")?;
            Err(anyhow!("http server stopped"))
        }
        fatal = pump_worker_messages(dispatcher, events) => Err(fatal),
    }
}

/// Feeds worker messages to `dispatcher` until the worker fails or its
/// channel closes, and returns the reason.
pub async fn pump_worker_messages(
    dispatcher: Arc<Dispatcher>,
    mut events: UnboundedReceiver<WorkerMessage>,
) -> anyhow::Error {
    while let Some(message) = events.recv().await {
        if let Err(error) = dispatcher.handle(message) {
            return anyhow::Error::new(error).context("render worker failed to initialize");
        }
    }

    dispatcher.worker_exited();
    anyhow!("render worker exited unexpectedly")
}
