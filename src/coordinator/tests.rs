//! Tests for the claim coordinator.

use super::*;
use crate::resource::{FileResourceRepository, MemoryResourceRepository};
use crate::store::{FileLockStore, MemoryLockStore};
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use tempfile::TempDir;

fn alice() -> OperatorContext {
    OperatorContext::new("alice").with_id("u-a")
}

fn bob() -> OperatorContext {
    OperatorContext::new("bob").with_id("u-b")
}

fn carol() -> OperatorContext {
    OperatorContext::new("carol").with_id("u-c").privileged()
}

fn key(id: &str) -> ResourceKey {
    ResourceKey::new(ResourceType::Topup, id).unwrap()
}

fn memory_coordinator() -> ClaimCoordinator {
    let coordinator = ClaimCoordinator::new(
        Arc::new(MemoryLockStore::new()),
        Arc::new(MemoryResourceRepository::new()),
    );
    seed(&coordinator);
    coordinator
}

fn file_coordinator(temp_dir: &TempDir) -> ClaimCoordinator {
    let coordinator = ClaimCoordinator::new(
        Arc::new(FileLockStore::new(temp_dir.path().join("locks"))),
        Arc::new(FileResourceRepository::new(temp_dir.path().join("resources"))),
    )
    .with_events(EventLog::new(temp_dir.path().join("events.ndjson")));
    seed(&coordinator);
    coordinator
}

fn seed(coordinator: &ClaimCoordinator) {
    let admin = OperatorContext::new("seed");
    for (id, status) in [
        ("R1", ResourceStatus::Pending),
        ("R2", ResourceStatus::ProofUploaded),
        ("DONE", ResourceStatus::Verified),
    ] {
        coordinator
            .add_resource(ResourceRecord::new(key(id), status), &admin)
            .unwrap();
    }
}

fn holder_of(coordinator: &ClaimCoordinator, id: &str) -> Option<String> {
    coordinator.get(&key(id)).unwrap().claimed_by_username
}

#[test]
fn test_claim_unclaimed_resource() {
    let coordinator = memory_coordinator();

    let outcome = coordinator.claim(&key("R1"), &alice()).unwrap();
    let ClaimOutcome::Claimed(record) = outcome else {
        panic!("expected claim to succeed");
    };
    assert_eq!(record.operator_id, "u-a");

    let resource = coordinator.get(&key("R1")).unwrap();
    assert_eq!(resource.claimed_by.as_deref(), Some("u-a"));
    assert_eq!(resource.claimed_by_username.as_deref(), Some("alice"));
    assert!(resource.claimed_at.is_some());
}

#[test]
fn test_claim_conflict_does_not_alter_holder() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();
    let before = coordinator.get(&key("R1")).unwrap();

    let outcome = coordinator.claim(&key("R1"), &bob()).unwrap();
    match outcome {
        ClaimOutcome::Conflict { holder, detail } => {
            assert_eq!(holder.username, "alice");
            assert!(detail.contains("alice"));
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    let after = coordinator.get(&key("R1")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_reclaim_by_holder_is_conflict() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    match coordinator.claim(&key("R1"), &alice()).unwrap() {
        ClaimOutcome::Conflict { detail, .. } => assert!(detail.contains("already claimed")),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test]
fn test_claim_terminal_resource_is_refused() {
    let coordinator = memory_coordinator();

    let err = coordinator.claim(&key("DONE"), &alice()).unwrap_err();
    assert!(matches!(err, DeskError::Terminal(_)));
    assert!(holder_of(&coordinator, "DONE").is_none());
}

#[test]
fn test_claim_unknown_resource_is_not_found() {
    let coordinator = memory_coordinator();

    let err = coordinator.claim(&key("missing"), &alice()).unwrap_err();
    assert!(matches!(err, DeskError::NotFound(_)));
}

#[test]
fn test_release_by_holder() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    coordinator.release(&key("R1"), &alice()).unwrap();
    assert!(holder_of(&coordinator, "R1").is_none());
}

#[test]
fn test_release_by_non_holder_is_unauthorized() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    let err = coordinator.release(&key("R1"), &bob()).unwrap_err();
    assert!(matches!(err, DeskError::Unauthorized(_)));
    assert!(err.to_string().contains("not your claim"));
    assert_eq!(holder_of(&coordinator, "R1").as_deref(), Some("alice"));
}

#[test]
fn test_release_unclaimed_is_unauthorized() {
    let coordinator = memory_coordinator();

    let err = coordinator.release(&key("R1"), &alice()).unwrap_err();
    assert!(matches!(err, DeskError::Unauthorized(_)));
}

#[test]
fn test_force_release_requires_privilege() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    let err = coordinator.force_release(&key("R1"), &bob()).unwrap_err();
    assert!(matches!(err, DeskError::Unauthorized(_)));
    assert!(err.to_string().contains("requires elevated role"));
    assert_eq!(holder_of(&coordinator, "R1").as_deref(), Some("alice"));
}

#[test]
fn test_force_release_returns_previous_holder() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    let previous = coordinator.force_release(&key("R1"), &carol()).unwrap();
    assert_eq!(previous.unwrap().username, "alice");
    assert!(holder_of(&coordinator, "R1").is_none());
}

#[test]
fn test_force_release_is_idempotent() {
    let coordinator = memory_coordinator();
    let before = coordinator.get(&key("R1")).unwrap();

    assert!(coordinator.force_release(&key("R1"), &carol()).unwrap().is_none());
    assert!(coordinator.force_release(&key("R1"), &carol()).unwrap().is_none());

    assert_eq!(coordinator.get(&key("R1")).unwrap(), before);
}

#[test]
fn test_privileged_operator_can_force_release_own_claim() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &carol()).unwrap();

    let previous = coordinator.force_release(&key("R1"), &carol()).unwrap();
    assert_eq!(previous.unwrap().username, "carol");
}

#[test]
fn test_apply_status_requires_claim() {
    let coordinator = memory_coordinator();

    let err = coordinator
        .apply_status(&key("R1"), &alice(), ResourceStatus::Verified)
        .unwrap_err();
    assert!(matches!(err, DeskError::Unauthorized(_)));
    assert!(err.to_string().contains("claim first"));
}

#[test]
fn test_apply_status_by_other_operator_is_refused() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    let err = coordinator
        .apply_status(&key("R1"), &bob(), ResourceStatus::Rejected)
        .unwrap_err();
    assert!(err.to_string().contains("not your claim"));

    let resource = coordinator.get(&key("R1")).unwrap();
    assert_eq!(resource.status, ResourceStatus::Pending);
}

#[test]
fn test_non_terminal_status_keeps_claim() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    coordinator
        .apply_status(&key("R1"), &alice(), ResourceStatus::Processing)
        .unwrap();

    let resource = coordinator.get(&key("R1")).unwrap();
    assert_eq!(resource.status, ResourceStatus::Processing);
    assert_eq!(resource.claimed_by_username.as_deref(), Some("alice"));
}

#[test]
fn test_terminal_status_clears_claim_and_blocks_reclaim() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R1"), &alice()).unwrap();

    coordinator
        .apply_status(&key("R1"), &alice(), ResourceStatus::Verified)
        .unwrap();

    let resource = coordinator.get(&key("R1")).unwrap();
    assert_eq!(resource.status, ResourceStatus::Verified);
    assert!(resource.claimed_by.is_none());
    assert!(coordinator.claims(None).unwrap().is_empty());

    for op in [alice(), bob(), carol()] {
        let err = coordinator.claim(&key("R1"), &op).unwrap_err();
        assert!(matches!(err, DeskError::Terminal(_)));
    }
}

#[test]
fn test_snapshot_embeds_claims() {
    let coordinator = memory_coordinator();
    coordinator.claim(&key("R2"), &bob()).unwrap();

    let snapshot = coordinator.snapshot(ResourceType::Topup, None).unwrap();
    let ids: Vec<_> = snapshot.iter().map(|r| r.resource_id.as_str()).collect();
    assert_eq!(ids, vec!["DONE", "R1", "R2"]);

    let r2 = snapshot.iter().find(|r| r.resource_id == "R2").unwrap();
    assert_eq!(r2.claimed_by_username.as_deref(), Some("bob"));
    let r1 = snapshot.iter().find(|r| r.resource_id == "R1").unwrap();
    assert!(r1.claimed_by.is_none());

    assert!(coordinator.snapshot(ResourceType::Share, None).unwrap().is_empty());
}

#[test]
fn test_scenario_claim_conflict_force_release_reclaim() {
    let check = |coordinator: &ClaimCoordinator| {
        // A claims R1.
        let outcome = coordinator.claim(&key("R1"), &alice()).unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
        assert_eq!(holder_of(coordinator, "R1").as_deref(), Some("alice"));

        // B loses the race; nothing changes.
        let outcome = coordinator.claim(&key("R1"), &bob()).unwrap();
        assert!(matches!(outcome, ClaimOutcome::Conflict { .. }));
        assert_eq!(holder_of(coordinator, "R1").as_deref(), Some("alice"));

        // C force-releases.
        coordinator.force_release(&key("R1"), &carol()).unwrap();
        assert!(holder_of(coordinator, "R1").is_none());

        // B can now claim.
        let outcome = coordinator.claim(&key("R1"), &bob()).unwrap();
        assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
        assert_eq!(holder_of(coordinator, "R1").as_deref(), Some("bob"));
    };

    check(&memory_coordinator());

    let temp_dir = TempDir::new().unwrap();
    check(&file_coordinator(&temp_dir));
}

#[test]
fn test_force_release_event_names_previous_holder() {
    let temp_dir = TempDir::new().unwrap();
    let coordinator = file_coordinator(&temp_dir);
    coordinator.claim(&key("R1"), &alice()).unwrap();
    coordinator.force_release(&key("R1"), &carol()).unwrap();

    let log = EventLog::new(temp_dir.path().join("events.ndjson"));
    let notices = log.revocations_for("alice", 10).unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].actor, "carol");
    assert_eq!(notices[0].resource.as_deref(), Some("topup/R1"));
}

#[test]
fn test_audit_log_records_transitions() {
    let temp_dir = TempDir::new().unwrap();
    let coordinator = file_coordinator(&temp_dir);
    coordinator.claim(&key("R1"), &alice()).unwrap();
    coordinator.claim(&key("R1"), &bob()).unwrap();
    coordinator.release(&key("R1"), &alice()).unwrap();

    let log = EventLog::new(temp_dir.path().join("events.ndjson"));
    let actions: Vec<_> = log
        .read_all()
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .filter(|a| *a != EventAction::Add)
        .collect();
    // The lost race is not an event.
    assert_eq!(actions, vec![EventAction::Claim, EventAction::Release]);
}

fn leased_coordinator() -> (Arc<MemoryLockStore>, ClaimCoordinator) {
    let store = Arc::new(MemoryLockStore::new());
    let coordinator = ClaimCoordinator::new(
        Arc::clone(&store) as Arc<dyn LockStore>,
        Arc::new(MemoryResourceRepository::new()),
    )
    .with_lease(LeaseConfig {
        enabled: true,
        heartbeat_seconds: 10,
        missed_heartbeats: 3,
    });
    seed(&coordinator);
    (store, coordinator)
}

#[test]
fn test_sweep_expires_abandoned_claims() {
    let (store, coordinator) = leased_coordinator();
    let stale = Utc::now() - Duration::minutes(5);
    store
        .try_claim(&key("R1"), ClaimRecord::new("u-a", "alice", stale))
        .unwrap();
    coordinator.claim(&key("R2"), &bob()).unwrap();

    let expired = coordinator.sweep_expired(Utc::now()).unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].0, key("R1"));
    assert!(holder_of(&coordinator, "R1").is_none());
    assert_eq!(holder_of(&coordinator, "R2").as_deref(), Some("bob"));
}

#[test]
fn test_listing_counts_as_heartbeat() {
    let (store, coordinator) = leased_coordinator();
    let stale = Utc::now() - Duration::minutes(5);
    store
        .try_claim(&key("R1"), ClaimRecord::new("u-a", "alice", stale))
        .unwrap();

    coordinator
        .snapshot(ResourceType::Topup, Some(&alice()))
        .unwrap();

    assert!(coordinator.sweep_expired(Utc::now()).unwrap().is_empty());
    assert_eq!(holder_of(&coordinator, "R1").as_deref(), Some("alice"));
}

#[test]
fn test_sweep_is_noop_without_lease() {
    let store = Arc::new(MemoryLockStore::new());
    let coordinator = ClaimCoordinator::new(
        Arc::clone(&store) as Arc<dyn LockStore>,
        Arc::new(MemoryResourceRepository::new()),
    );
    seed(&coordinator);
    store
        .try_claim(
            &key("R1"),
            ClaimRecord::new("u-a", "alice", Utc::now() - Duration::days(3)),
        )
        .unwrap();

    assert!(coordinator.sweep_expired(Utc::now()).unwrap().is_empty());
    assert_eq!(holder_of(&coordinator, "R1").as_deref(), Some("alice"));
}

/// Repository that starts a force-release from a second store handle while a
/// status write is in flight.
struct RevokingRepository {
    inner: FileResourceRepository,
    locks_dir: PathBuf,
    revoker: Mutex<Option<thread::JoinHandle<Result<Option<ClaimRecord>>>>>,
}

impl ResourceRepository for RevokingRepository {
    fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        self.inner.list(resource_type)
    }

    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceRecord>> {
        self.inner.get(key)
    }

    fn insert(&self, record: ResourceRecord) -> Result<()> {
        self.inner.insert(record)
    }

    fn set_status(
        &self,
        key: &ResourceKey,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> Result<ResourceRecord> {
        let store = FileLockStore::new(&self.locks_dir);
        let target = key.clone();
        let handle = thread::spawn(move || store.force_release(&target));
        thread::sleep(std::time::Duration::from_millis(100));
        assert!(!handle.is_finished());
        *self.revoker.lock().unwrap() = Some(handle);
        self.inner.set_status(key, status, now)
    }
}

#[test]
fn test_force_release_during_status_write_lands_after_it() {
    let temp_dir = TempDir::new().unwrap();
    let locks_dir = temp_dir.path().join("locks");
    let repository = Arc::new(RevokingRepository {
        inner: FileResourceRepository::new(temp_dir.path().join("resources")),
        locks_dir: locks_dir.clone(),
        revoker: Mutex::new(None),
    });
    let resources: Arc<dyn ResourceRepository> = Arc::clone(&repository) as _;
    let coordinator = ClaimCoordinator::new(Arc::new(FileLockStore::new(&locks_dir)), resources);
    seed(&coordinator);
    coordinator.claim(&key("R1"), &alice()).unwrap();

    coordinator
        .apply_status(&key("R1"), &alice(), ResourceStatus::Verified)
        .unwrap();

    // The claim went away with the terminal write, so the late force-release
    // finds nothing and no lock is left on disk.
    let revoker = repository.revoker.lock().unwrap().take().unwrap();
    assert!(revoker.join().unwrap().unwrap().is_none());
    assert!(coordinator.claims(None).unwrap().is_empty());
    assert_eq!(
        coordinator.get(&key("R1")).unwrap().status,
        ResourceStatus::Verified
    );
}

#[test]
fn test_own_force_release_is_not_reported_as_revocation() {
    let temp_dir = TempDir::new().unwrap();
    let coordinator = file_coordinator(&temp_dir);
    coordinator.claim(&key("R1"), &carol()).unwrap();
    coordinator.claim(&key("R2"), &alice()).unwrap();

    coordinator.force_release(&key("R1"), &carol()).unwrap();
    coordinator.force_release(&key("R2"), &carol()).unwrap();

    let events = EventLog::new(temp_dir.path().join("events.ndjson"));
    assert!(events.revocations_for("carol", 10).unwrap().is_empty());
    assert_eq!(events.revocations_for("alice", 10).unwrap().len(), 1);
}
