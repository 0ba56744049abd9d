//! Contract tests run against both lock store implementations.

use super::*;
use crate::resource::{ResourceKey, ResourceType};
use chrono::{Duration, Utc};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn key(id: &str) -> ResourceKey {
    ResourceKey::new(ResourceType::Topup, id).unwrap()
}

fn claim(operator: &str) -> ClaimRecord {
    ClaimRecord::new(operator, operator, Utc::now())
}

/// Run a contract check against a fresh memory store and a fresh file store.
fn for_each_store(check: impl Fn(&dyn LockStore)) {
    let memory = MemoryLockStore::new();
    check(&memory);

    let temp_dir = TempDir::new().unwrap();
    let file = FileLockStore::new(temp_dir.path().join("locks"));
    check(&file);
}

#[test]
fn test_claim_on_unclaimed_is_acquired() {
    for_each_store(|store| {
        let outcome = store.try_claim(&key("R1"), claim("alice")).unwrap();
        assert!(matches!(outcome, TryClaim::Acquired(ref r) if r.operator_id == "alice"));

        let held = store.read(&key("R1")).unwrap().unwrap();
        assert_eq!(held.username, "alice");
    });
}

#[test]
fn test_second_claim_conflicts_and_keeps_holder() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let outcome = store.try_claim(&key("R1"), claim("bob")).unwrap();
        match outcome {
            TryClaim::Conflict(holder) => assert_eq!(holder.operator_id, "alice"),
            other => panic!("expected conflict, got {:?}", other),
        }

        // The loser never overwrites.
        let held = store.read(&key("R1")).unwrap().unwrap();
        assert_eq!(held.operator_id, "alice");
    });
}

#[test]
fn test_reclaim_by_holder_is_a_conflict() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();
        let outcome = store.try_claim(&key("R1"), claim("alice")).unwrap();
        assert!(matches!(outcome, TryClaim::Conflict(_)));
    });
}

#[test]
fn test_distinct_types_share_no_locks() {
    for_each_store(|store| {
        let topup = ResourceKey::new(ResourceType::Topup, "X1").unwrap();
        let transfer = ResourceKey::new(ResourceType::Transfer, "X1").unwrap();

        store.try_claim(&topup, claim("alice")).unwrap();
        let outcome = store.try_claim(&transfer, claim("bob")).unwrap();
        assert!(matches!(outcome, TryClaim::Acquired(_)));
    });
}

#[test]
fn test_release_by_holder() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let outcome = store.release(&key("R1"), "alice").unwrap();
        assert!(matches!(outcome, Release::Released(_)));
        assert!(store.read(&key("R1")).unwrap().is_none());
    });
}

#[test]
fn test_release_by_non_holder_is_refused() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let outcome = store.release(&key("R1"), "bob").unwrap();
        match outcome {
            Release::NotHolder(Some(holder)) => assert_eq!(holder.operator_id, "alice"),
            other => panic!("expected NotHolder, got {:?}", other),
        }
        assert!(store.read(&key("R1")).unwrap().is_some());
    });
}

#[test]
fn test_release_of_unclaimed_is_refused() {
    for_each_store(|store| {
        let outcome = store.release(&key("R1"), "alice").unwrap();
        assert_eq!(outcome, Release::NotHolder(None));
    });
}

#[test]
fn test_force_release_returns_previous_holder() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let previous = store.force_release(&key("R1")).unwrap().unwrap();
        assert_eq!(previous.operator_id, "alice");
        assert!(store.read(&key("R1")).unwrap().is_none());
    });
}

#[test]
fn test_force_release_is_idempotent() {
    for_each_store(|store| {
        assert!(store.force_release(&key("R1")).unwrap().is_none());
        assert!(store.force_release(&key("R1")).unwrap().is_none());
        assert!(store.read(&key("R1")).unwrap().is_none());
    });
}

#[test]
fn test_list_filters_by_type_and_orders_by_key() {
    for_each_store(|store| {
        store.try_claim(&key("R2"), claim("bob")).unwrap();
        store.try_claim(&key("R1"), claim("alice")).unwrap();
        store
            .try_claim(
                &ResourceKey::new(ResourceType::Share, "S1").unwrap(),
                claim("carol"),
            )
            .unwrap();

        let topups = store.list(Some(ResourceType::Topup)).unwrap();
        let ids: Vec<_> = topups.iter().map(|(k, _)| k.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2"]);

        assert_eq!(store.list(None).unwrap().len(), 3);
    });
}

#[test]
fn test_heartbeat_renews_only_own_claims() {
    for_each_store(|store| {
        let old = Utc::now() - Duration::minutes(10);
        store
            .try_claim(&key("R1"), ClaimRecord::new("alice", "alice", old))
            .unwrap();
        store
            .try_claim(&key("R2"), ClaimRecord::new("bob", "bob", old))
            .unwrap();

        let now = Utc::now();
        assert_eq!(store.heartbeat("alice", now).unwrap(), 1);

        let alice = store.read(&key("R1")).unwrap().unwrap();
        assert_eq!(alice.heartbeat_at, now);
        assert_eq!(alice.claimed_at, old);

        let bob = store.read(&key("R2")).unwrap().unwrap();
        assert_eq!(bob.heartbeat_at, old);
    });
}

#[test]
fn test_expire_only_removes_stale_claims() {
    for_each_store(|store| {
        let now = Utc::now();
        store
            .try_claim(
                &key("R1"),
                ClaimRecord::new("alice", "alice", now - Duration::minutes(5)),
            )
            .unwrap();
        store
            .try_claim(&key("R2"), ClaimRecord::new("bob", "bob", now))
            .unwrap();

        let cutoff = now - Duration::minutes(1);
        let expired = store.expire(&key("R1"), cutoff).unwrap();
        assert_eq!(expired.unwrap().operator_id, "alice");
        assert!(store.expire(&key("R2"), cutoff).unwrap().is_none());
        assert!(store.read(&key("R2")).unwrap().is_some());
    });
}

#[test]
fn test_file_store_lock_layout() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileLockStore::new(temp_dir.path());

    store.try_claim(&key("R1"), claim("alice")).unwrap();

    let path = store.lock_path(&key("R1"));
    assert!(path.ends_with("topup/R1.lock"));
    assert!(path.exists());

    let json = std::fs::read_to_string(&path).unwrap();
    assert!(json.contains("\"operator_id\": \"alice\""));
    assert!(json.contains("claimed_at"));

    // The mutation lock is not left behind.
    store.release(&key("R1"), "alice").unwrap();
    assert!(!temp_dir.path().join("store.lock").exists());
    assert!(!path.exists());
}

#[test]
fn test_file_store_is_shared_between_instances() {
    let temp_dir = TempDir::new().unwrap();
    let first = FileLockStore::new(temp_dir.path());
    let second = FileLockStore::new(temp_dir.path());

    first.try_claim(&key("R1"), claim("alice")).unwrap();
    let outcome = second.try_claim(&key("R1"), claim("bob")).unwrap();
    assert!(matches!(outcome, TryClaim::Conflict(_)));
}

#[test]
fn test_file_store_force_release_clears_corrupt_lock() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileLockStore::new(temp_dir.path());

    let path = store.lock_path(&key("R1"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "not json").unwrap();

    assert!(store.force_release(&key("R1")).unwrap().is_none());
    assert!(!path.exists());
}

#[test]
fn test_concurrent_claims_have_exactly_one_winner() {
    let temp_dir = TempDir::new().unwrap();
    let store: Arc<dyn LockStore> = Arc::new(FileLockStore::new(temp_dir.path()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                store
                    .try_claim(&key("R1"), claim(&format!("op-{}", i)))
                    .map(|outcome| matches!(outcome, TryClaim::Acquired(_)))
                    .unwrap_or(false)
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn test_while_held_runs_only_for_holder() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let mut runs = 0;
        let outcome = store
            .while_held(&key("R1"), "bob", false, &mut || {
                runs += 1;
                Ok(())
            })
            .unwrap();
        assert!(matches!(outcome, Held::NotHolder(Some(ref r)) if r.operator_id == "alice"));

        let outcome = store
            .while_held(&key("R2"), "alice", false, &mut || {
                runs += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(outcome, Held::NotHolder(None));
        assert_eq!(runs, 0);

        let outcome = store
            .while_held(&key("R1"), "alice", false, &mut || {
                runs += 1;
                Ok(())
            })
            .unwrap();
        assert!(matches!(outcome, Held::Ran(_)));
        assert_eq!(runs, 1);
        assert!(store.read(&key("R1")).unwrap().is_some());
    });
}

#[test]
fn test_while_held_release_after_only_on_success() {
    for_each_store(|store| {
        store.try_claim(&key("R1"), claim("alice")).unwrap();

        let failed = store.while_held(&key("R1"), "alice", true, &mut || {
            Err(crate::error::DeskError::StoreError("disk full".to_string()))
        });
        assert!(failed.is_err());
        assert!(store.read(&key("R1")).unwrap().is_some());

        let outcome = store
            .while_held(&key("R1"), "alice", true, &mut || Ok(()))
            .unwrap();
        assert!(matches!(outcome, Held::Ran(_)));
        assert!(store.read(&key("R1")).unwrap().is_none());
    });
}

#[test]
fn test_file_store_force_release_waits_for_held_action() {
    let temp_dir = TempDir::new().unwrap();
    let store = FileLockStore::new(temp_dir.path());
    let other_process = FileLockStore::new(temp_dir.path());
    store.try_claim(&key("R1"), claim("alice")).unwrap();

    let mut revoker = None;
    let outcome = store
        .while_held(&key("R1"), "alice", false, &mut || {
            let other = other_process.clone();
            let handle = thread::spawn(move || other.force_release(&key("R1")));
            thread::sleep(std::time::Duration::from_millis(100));
            assert!(!handle.is_finished());
            revoker = Some(handle);
            Ok(())
        })
        .unwrap();
    assert!(matches!(outcome, Held::Ran(_)));

    // The force-release lands after the action, still seeing alice's claim.
    let previous = revoker.unwrap().join().unwrap().unwrap();
    assert_eq!(previous.unwrap().operator_id, "alice");
    assert!(store.read(&key("R1")).unwrap().is_none());
}
