//! HTTP surface of the court rotation: a JSON command endpoint in front of a single engine.

pub mod app;
pub mod command;
pub mod error;
pub mod routes;

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::pin_mut;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpListener;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub use crate::app::{persist_snapshots, App};
pub use crate::command::{Command, CommandResponse, Effect, Report};
pub use crate::error::AppError;

/// Commands are applied one at a time, in arrival order.
pub type SharedApp = Arc<Mutex<App>>;

/// Serves `app` on `listener` until `shutdown` resolves, then lets open connections finish.
#[allow(clippy::cognitive_complexity)]
pub async fn run_server(
    listener: TcpListener,
    app: SharedApp,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AppError> {
    // tell the connections to shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);

    // wait for the connections to finish shutdown
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = ?listener.local_addr().ok(), "started up server...");
    pin_mut!(shutdown);

    #[allow(clippy::redundant_pub_crate)]
    loop {
        select! {
            accept = listener.accept() => {
                let (socket, remote_addr) = match accept {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("failed to accept connection: {err:#}");
                        continue;
                    }
                };
                debug!(%remote_addr, "accepted connection");

                let app = Arc::clone(&app);
                let shutdown_tx = Arc::clone(&shutdown_tx);
                let closed_rx = closed_rx.clone();

                tokio::spawn(async move {
                    let socket = TokioIo::new(socket);
                    let hyper_service =
                        hyper::service::service_fn(move |request: Request<Incoming>| {
                            routes::handle(Arc::clone(&app), request)
                        });

                    let builder =
                        hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
                    let connection = builder.serve_connection(socket, hyper_service);
                    pin_mut!(connection);

                    let connection_result = select! {
                        connection_result = connection.as_mut() => connection_result,
                        () = shutdown_tx.closed() => {
                            connection.as_mut().graceful_shutdown();
                            connection.as_mut().await
                        }
                    };
                    if let Err(err) = connection_result {
                        error!("failed to serve connection: {err:#}");
                    }

                    debug!(%remote_addr, "closed connection");
                    drop(closed_rx);
                });
            }
            () = shutdown.as_mut() => {
                info!("shutting down server...");
                drop(shutdown_rx); // initiate shutdown
                drop(closed_rx);
                closed_tx.closed().await;
                break;
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
#[allow(clippy::redundant_pub_crate)]
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
