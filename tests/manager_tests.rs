//! Avatar Manager Integration Tests
//!
//! Tests for:
//! - Entity creation, destruction and shutdown order
//! - Load admission with a concurrency cap
//! - Slot handoff when a loading entity is destroyed
//! - Routing of runtime load request notifications through context handles

use std::sync::Arc;

use glam::Vec3;
use parking_lot::Mutex;

use avatar_sync::callbacks::ContextHandle;
use avatar_sync::config::SyncSettings;
use avatar_sync::context::EntityKey;
use avatar_sync::errors::SyncError;
use avatar_sync::manager::{AvatarManager, TickSummary};
use avatar_sync::runtime::ids::{EntityId, HierarchyVersion, NodeId, RenderStateVersion};
use avatar_sync::runtime::pose::{JointTransform, Pose, RenderState};
use avatar_sync::runtime::{
    EntityAssetType, LoadRequestInfo, LoadRequestState, MemoryRuntime,
};
use avatar_sync::sync::events::EntityEvent;
use avatar_sync::sync::state::{AvatarState, LoadingState};

const DT: f32 = 1.0 / 60.0;

type EventLog = Arc<Mutex<Vec<(EntityId, EntityEvent)>>>;

// ============================================================================
// Helpers
// ============================================================================

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn manager(max_concurrent_loads: usize) -> (AvatarManager<MemoryRuntime>, EventLog) {
    init_logger();
    let settings = SyncSettings {
        max_concurrent_loads,
        ..Default::default()
    };
    let mut manager = AvatarManager::new(MemoryRuntime::new(), settings);
    let log: EventLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    manager.subscribe(move |id, event| sink.lock().push((id, event.clone())));
    (manager, log)
}

/// Creates an entity whose runtime already reports a one-joint avatar.
fn spawn_ready(manager: &mut AvatarManager<MemoryRuntime>, name: &str) -> (EntityKey, EntityId, ContextHandle) {
    let (key, handle) = manager.create_entity(name).unwrap();
    let id = manager.entity(key).unwrap().id();
    let rt = manager.context_mut().runtime.entity_mut(id).unwrap();
    rt.pose = Some(Pose {
        hierarchy_version: HierarchyVersion(1),
        local_transforms: vec![JointTransform::from_position(Vec3::Y)],
        object_transforms: Some(vec![JointTransform::from_position(Vec3::Y)]),
        parents: vec![-1],
        node_ids: vec![NodeId(1)],
    });
    rt.render_state = Some(RenderState {
        primitive_count: 0,
        all_mesh_nodes: Vec::new(),
        visible_mesh_nodes: Vec::new(),
        all_nodes_version: RenderStateVersion(1),
        visible_nodes_version: RenderStateVersion(1),
    });
    rt.loaded_assets = vec![EntityAssetType::Other];
    (key, id, handle)
}

fn request(id: EntityId, state: LoadRequestState, failure: Option<&str>) -> LoadRequestInfo {
    LoadRequestInfo {
        id: 42,
        entity: id,
        state,
        failure: failure.map(str::to_string),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn create_registers_entity_and_handle() -> anyhow::Result<()> {
    let (mut manager, log) = manager(4);
    let (key, handle) = manager.create_entity("first")?;

    assert_eq!(manager.entity_count(), 1);
    assert_eq!(manager.handle(key), Some(handle));
    assert_eq!(manager.callbacks().get(handle), Some(key));
    assert_eq!(manager.entity(key).map(|e| e.name()), Some("first"));
    assert_eq!(manager.context().runtime.live_count(), 1);

    let id = manager.entity(key).unwrap().id();
    assert_eq!(log.lock().as_slice(), &[(id, EntityEvent::Created)]);
    Ok(())
}

#[test]
fn entities_iterate_in_creation_order() {
    let (mut manager, _) = manager(4);
    for name in ["a", "b", "c"] {
        manager.create_entity(name).unwrap();
    }
    let names: Vec<&str> = manager.entities().map(|e| e.name()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn destroy_releases_entity_handle_and_scene() {
    let (mut manager, _) = manager(4);
    let (key, id, handle) = spawn_ready(&mut manager, "doomed");
    manager.update(DT);
    assert!(manager.context().scene.node_count() > 0);

    assert!(manager.destroy_entity(key));
    assert!(!manager.destroy_entity(key));
    assert_eq!(manager.entity_count(), 0);
    assert!(manager.handle(key).is_none());
    assert!(!manager.callbacks().contains(handle));
    assert_eq!(manager.context().runtime.destroyed(), &[id]);
    assert_eq!(manager.context().scene.node_count(), 0);
}

#[test]
fn shutdown_tears_down_in_reverse_creation_order() {
    let (mut manager, log) = manager(4);
    let (_, first, _) = spawn_ready(&mut manager, "first");
    let (_, second, _) = spawn_ready(&mut manager, "second");
    manager.update(DT);

    manager.shutdown();

    let teardowns: Vec<EntityId> = log
        .lock()
        .iter()
        .filter(|(_, e)| *e == EntityEvent::PreTeardown)
        .map(|(id, _)| *id)
        .collect();
    assert_eq!(teardowns, vec![second, first]);
    assert_eq!(manager.entity_count(), 0);
    assert!(manager.callbacks().is_empty());
    assert_eq!(manager.context().runtime.live_count(), 0);
    assert_eq!(manager.context().scene.node_count(), 0);
}

// ============================================================================
// Tick and Load Admission
// ============================================================================

#[test]
fn tick_loads_every_entity_without_a_cap() {
    let (mut manager, _) = manager(8);
    let keys: Vec<EntityKey> = (0..3).map(|i| spawn_ready(&mut manager, &format!("e{i}")).0).collect();

    let summary = manager.update(DT);
    assert_eq!(
        summary,
        TickSummary {
            frozen: 3,
            loads_finished: 3,
            ..Default::default()
        }
    );
    for key in keys {
        let entity = manager.entity(key).unwrap();
        assert_eq!(entity.state(), AvatarState::UserAvatar);
        assert_eq!(entity.load_state(), LoadingState::Success);
    }

    let summary = manager.update(DT);
    assert_eq!(summary.synced, 3);
    assert_eq!(summary.loads_finished, 0);
}

#[test]
fn load_cap_serializes_loads_in_creation_order() {
    let (mut manager, _) = manager(1);
    let (a, _, _) = spawn_ready(&mut manager, "a");
    let (b, _, _) = spawn_ready(&mut manager, "b");

    let summary = manager.update(DT);
    assert_eq!(summary.frozen, 2);
    assert_eq!(summary.loads_finished, 1);
    assert_eq!(summary.loads_started, 1);
    assert_eq!(manager.entity(a).unwrap().state(), AvatarState::UserAvatar);
    assert_eq!(manager.entity(b).unwrap().state(), AvatarState::Created);
    assert!(manager.entity(b).unwrap().is_load_running());
    assert_eq!(manager.context().load_queue.active_count(), 1);

    let summary = manager.update(DT);
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.frozen, 1);
    assert_eq!(summary.loads_finished, 1);
    assert_eq!(manager.entity(b).unwrap().state(), AvatarState::UserAvatar);
    assert_eq!(manager.context().load_queue.active_count(), 0);

    assert_eq!(manager.update(DT).synced, 2);
}

#[test]
fn destroying_a_loading_entity_hands_its_slot_on() {
    let (mut manager, _) = manager(1);
    spawn_ready(&mut manager, "a");
    let (b, _, _) = spawn_ready(&mut manager, "b");
    let (c, _, _) = spawn_ready(&mut manager, "c");

    manager.update(DT);
    assert!(manager.entity(b).unwrap().is_load_running());
    assert!(manager.entity(c).unwrap().is_load_pending());
    assert!(manager.context().load_queue.is_queued(c));

    assert!(manager.destroy_entity(b));

    let summary = manager.update(DT);
    assert_eq!(summary.loads_started, 1);
    assert!(manager.entity(c).unwrap().is_load_running());

    let summary = manager.update(DT);
    assert_eq!(summary.loads_finished, 1);
    assert_eq!(manager.entity(c).unwrap().state(), AvatarState::UserAvatar);
    assert_eq!(manager.context().load_queue.active_count(), 0);
    assert_eq!(manager.context().load_queue.queued_count(), 0);
}

#[test]
fn destroying_a_queued_entity_leaves_the_queue_empty() {
    let (mut manager, _) = manager(1);
    spawn_ready(&mut manager, "a");
    let (b, _, _) = spawn_ready(&mut manager, "b");
    let (c, _, _) = spawn_ready(&mut manager, "c");
    manager.update(DT);

    assert!(manager.destroy_entity(c));
    assert_eq!(manager.context().load_queue.queued_count(), 0);

    manager.update(DT);
    assert_eq!(manager.entity(b).unwrap().state(), AvatarState::UserAvatar);
    assert_eq!(manager.context().load_queue.active_count(), 0);
}

// ============================================================================
// Load Request Notifications
// ============================================================================

#[test]
fn failed_load_request_emits_state_change_then_failure() -> anyhow::Result<()> {
    let (mut manager, log) = manager(4);
    let (_, id, handle) = spawn_ready(&mut manager, "requester");
    log.lock().clear();

    let info = request(id, LoadRequestState::Failed, Some("404"));
    manager.dispatch_load_request(handle, &info)?;

    assert_eq!(
        log.lock().as_slice(),
        &[
            (id, EntityEvent::LoadRequestStateChanged(info.clone())),
            (id, EntityEvent::LoadFailed(info)),
        ]
    );
    Ok(())
}

#[test]
fn successful_load_request_only_reports_state_change() -> anyhow::Result<()> {
    let (mut manager, log) = manager(4);
    let (_, id, handle) = spawn_ready(&mut manager, "requester");
    log.lock().clear();

    manager.dispatch_load_request(handle, &request(id, LoadRequestState::Success, None))?;

    let events = log.lock();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0].1, EntityEvent::LoadRequestStateChanged(_)));
    Ok(())
}

#[test]
fn stale_or_unknown_handles_are_rejected() {
    let (mut manager, log) = manager(4);
    let (key, id, handle) = spawn_ready(&mut manager, "gone");
    manager.destroy_entity(key);
    log.lock().clear();

    let info = request(id, LoadRequestState::Failed, None);
    let err = manager.dispatch_load_request(handle, &info).unwrap_err();
    assert!(matches!(err, SyncError::UnknownHandle(h) if h == handle));

    let err = manager
        .dispatch_load_request(ContextHandle::from_raw(999), &info)
        .unwrap_err();
    assert!(matches!(err, SyncError::UnknownHandle(_)));
    assert!(log.lock().is_empty());
}
