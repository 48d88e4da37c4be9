use std::future::Future;
use std::sync::Arc;

use court_rotation_engine::{Engine, EntityStore, Outcome};
use court_rotation_store::SnapshotStore;
use futures_util::pin_mut;
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::command::{Command, Effect, Report};

/// The running application: one engine, one writer.
///
/// Every applied command publishes the resulting state to the snapshot channel. Saving happens
/// elsewhere, see [`persist_snapshots`].
#[derive(Debug)]
pub struct App {
    engine: Engine,
    snapshots: watch::Sender<EntityStore>,
}

impl App {
    /// A repaired restore is published right away so the next save writes the repaired state.
    #[must_use]
    pub fn new(engine: Engine) -> (Self, watch::Receiver<EntityStore>) {
        let (snapshots, receiver) = watch::channel(engine.state().clone());
        let app = Self { engine, snapshots };
        if app.engine.was_repaired() {
            info!("restored state needed repairs");
            app.publish();
        }
        (app, receiver)
    }

    #[must_use]
    pub const fn state(&self) -> &EntityStore {
        self.engine.state()
    }

    /// Creates `count` stations unless some already exist. Returns how many were created.
    pub fn ensure_stations(&mut self, count: usize) -> usize {
        if !self.engine.state().stations().is_empty() {
            return 0;
        }
        for _ in 0..count {
            self.engine.create_station();
        }
        if count > 0 {
            info!(count, "created initial stations");
            self.publish();
        }
        count
    }

    pub fn execute(&mut self, command: Command) -> Report {
        let name = command.name();
        match self.apply(command) {
            Ok(effect) => {
                debug!(command = name, ?effect, "applied command");
                self.publish();
                Report::Applied { effect }
            }
            Err(declined) => {
                debug!(command = name, %declined, "declined command");
                Report::Declined {
                    reason: declined.to_string(),
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> Outcome<Option<Effect>> {
        let engine = &mut self.engine;
        let effect = match command {
            Command::CreateParticipant {
                name,
                category,
                tier,
            } => Some(Effect::Participant(
                engine.create_participant(&name, category, tier)?,
            )),
            Command::EditParticipant { id, changes } => {
                engine.edit_participant(&id, changes)?;
                None
            }
            Command::DeleteParticipant { id } => {
                engine.delete_participant(&id)?;
                None
            }
            Command::Promote { id } => Some(Effect::Group(engine.promote(&id)?)),
            Command::FillAll => Some(Effect::Staged(engine.fill_all()?)),
            Command::CreateGroup => Some(Effect::Group(engine.create_group())),
            Command::RemoveGroup { index } => {
                engine.remove_group(index)?;
                None
            }
            Command::SwapMember {
                group_index,
                slot_index,
                pool_id,
            } => {
                engine.swap_group_member(group_index, slot_index, &pool_id)?;
                None
            }
            Command::CreateStation => Some(Effect::Station(engine.create_station())),
            Command::RemoveStation { id } => {
                engine.remove_station(&id)?;
                None
            }
            Command::AssignGroupToStation {
                group_index,
                station_id,
            } => {
                engine.assign_group_to_station(group_index, &station_id)?;
                None
            }
            Command::EndStationSession { station_id } => {
                engine.end_station_session(&station_id)?;
                None
            }
        };
        Ok(effect)
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.engine.state().clone());
    }
}

/// Saves every published state until `stop` resolves or the [`App`] is dropped.
///
/// Only the latest state is kept while a save is running, so a burst of commands results in a
/// single write. Failures are logged and otherwise ignored, the next command retries. On `stop`
/// a state that was published but not yet saved is written before returning.
pub async fn persist_snapshots(
    store: Arc<dyn SnapshotStore>,
    mut snapshots: watch::Receiver<EntityStore>,
    stop: impl Future<Output = ()>,
) {
    pin_mut!(stop);
    loop {
        #[allow(clippy::redundant_pub_crate)]
        let stopping = select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return;
                }
                false
            }
            () = stop.as_mut() => true,
        };
        if stopping && !snapshots.has_changed().unwrap_or(false) {
            return;
        }
        let state = snapshots.borrow_and_update().clone();
        save(Arc::clone(&store), state).await;
        if stopping {
            return;
        }
    }
}

async fn save(store: Arc<dyn SnapshotStore>, state: EntityStore) {
    match tokio::task::spawn_blocking(move || store.save(&state)).await {
        Ok(Ok(())) => debug!("saved snapshot"),
        Ok(Err(error)) => warn!(%error, "failed to save snapshot"),
        Err(error) => warn!(%error, "snapshot task failed"),
    }
}
