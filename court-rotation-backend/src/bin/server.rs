use std::sync::{Arc, Mutex};

use court_rotation_backend::{persist_snapshots, run_server, shutdown_signal, App, AppError};
use court_rotation_config::get_config;
use court_rotation_engine::Engine;
use court_rotation_store::{JsonDirectory, SnapshotStore};
use court_rotation_telemetry::setup_telemetry;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = get_config()?;
    setup_telemetry(&config.log);

    let store: Arc<dyn SnapshotStore> = Arc::new(JsonDirectory::new(&config.data_dir));
    let restored = store.load();
    let engine = match config.seed {
        Some(seed) => Engine::seeded(restored, seed),
        None => Engine::new(restored),
    };
    let (mut app, snapshots) = App::new(engine);
    app.ensure_stations(config.initial_stations);
    info!(
        participants = app.state().participants().len(),
        stations = app.state().stations().len(),
        data_dir = %config.data_dir.display(),
        "restored state"
    );

    let app = Arc::new(Mutex::new(app));
    let (stop_persister, persister_stopped) = oneshot::channel::<()>();
    let persister = tokio::spawn(persist_snapshots(Arc::clone(&store), snapshots, async move {
        // a dropped sender stops the persister just the same
        let _ = persister_stopped.await;
    }));

    let listener = TcpListener::bind(config.listen_address).await?;
    info!(address = %config.listen_address, "listening");
    run_server(listener, Arc::clone(&app), shutdown_signal()).await?;

    // no more commands can arrive, flush whatever is still unsaved
    let _ = stop_persister.send(());
    persister.await?;
    info!("stopped");
    Ok(())
}
