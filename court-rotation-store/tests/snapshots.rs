use std::fs;

use court_rotation_engine::{Category, Engine, EntityStore, Group, SkillTier, Status};
use court_rotation_store::{JsonDirectory, MemorySnapshots, SnapshotStore, StoreError};

fn busy_state() -> EntityStore {
    let mut engine = Engine::seeded(EntityStore::default(), 11);
    for name in ["ann", "ben", "cat", "dov", "eve", "fay"] {
        engine
            .create_participant(name, Category::Unspecified, SkillTier::Tier1)
            .unwrap();
    }
    let court = engine.create_station();
    engine.create_station();
    engine.create_group();
    engine.fill_all().unwrap();
    engine.assign_group_to_station(0, &court).unwrap();
    engine.into_state()
}

#[test]
fn missing_directory_loads_defaults() {
    let directory = tempfile::tempdir().unwrap();
    let store = JsonDirectory::new(directory.path().join("nothing-here"));
    assert_eq!(store.load(), EntityStore::default());
}

#[test]
fn saved_state_survives_a_restart() {
    let directory = tempfile::tempdir().unwrap();
    let store = JsonDirectory::new(directory.path().join("data"));
    let state = busy_state();

    store.save(&state).unwrap();

    for name in ["participants", "stations", "groups", "has_assigned"] {
        assert!(store.root().join(format!("{name}.json")).is_file());
    }
    assert_eq!(store.load(), state);
    let restored = Engine::seeded(store.load(), 0);
    assert_eq!(restored.state(), &state);
}

#[test]
fn pieces_fall_back_independently() {
    let directory = tempfile::tempdir().unwrap();
    let store = JsonDirectory::new(directory.path());
    let state = busy_state();
    store.save(&state).unwrap();

    fs::write(directory.path().join("stations.json"), "{ not json").unwrap();
    fs::remove_file(directory.path().join("has_assigned.json")).unwrap();

    let loaded = store.load();
    assert_eq!(loaded.participants(), state.participants());
    assert_eq!(loaded.groups(), state.groups());
    assert!(loaded.stations().is_empty());
    assert!(!loaded.has_assigned());

    // the four players of the lost station are back in the pool once the engine repairs it
    let engine = Engine::seeded(loaded, 0);
    let waiting = engine
        .state()
        .participants()
        .iter()
        .filter(|participant| participant.status == Status::Pool)
        .count();
    assert_eq!(waiting, 4);
    assert_eq!(engine.state().groups()[0].len(), 2);
}

#[test]
fn empty_group_sequence_gets_a_filler() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(directory.path().join("groups.json"), "[]").unwrap();
    let engine = Engine::seeded(JsonDirectory::new(directory.path()).load(), 0);
    assert_eq!(engine.state().groups(), [Group::default()]);
}

#[test]
fn unwritable_directory_is_reported() {
    let directory = tempfile::tempdir().unwrap();
    let blocker = directory.path().join("file");
    fs::write(&blocker, "").unwrap();
    let store = JsonDirectory::new(&blocker);
    assert!(matches!(
        store.save(&EntityStore::default()),
        Err(StoreError::CreateDirectory { .. })
    ));
}

#[test]
fn memory_snapshots_keep_the_last_save() {
    let store = MemorySnapshots::default();
    assert_eq!(store.load(), EntityStore::default());
    let state = busy_state();
    store.save(&state).unwrap();
    assert_eq!(store.saved(), Some(state.clone()));
    assert_eq!(store.load(), state);
}
