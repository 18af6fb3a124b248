// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

fn handle() -> (Arc<MemoryBackend>, StoreHandle) {
    let backend = Arc::new(MemoryBackend::new());
    let handle = StoreHandle::new(backend.clone());
    (backend, handle)
}

#[test]
fn scalar_set_get() {
    let (_, h) = handle();
    h.run(|b| b.set("k", "v")).unwrap();
    assert_eq!(h.run(|b| b.get("k")).unwrap(), Some("v".to_string()));
    assert_eq!(h.run(|b| b.get("absent")).unwrap(), None);
}

#[test]
fn incr_initializes_and_counts() {
    let (_, h) = handle();
    assert_eq!(h.run(|b| b.incr("n")).unwrap(), 1);
    assert_eq!(h.run(|b| b.incr("n")).unwrap(), 2);
    assert_eq!(h.run(|b| b.incr("n")).unwrap(), 3);
}

#[test]
fn incr_on_seeded_counter() {
    let (_, h) = handle();
    h.run(|b| b.set("n", "100")).unwrap();
    assert_eq!(h.run(|b| b.incr("n")).unwrap(), 101);
}

#[test]
fn hash_ops() {
    let (_, h) = handle();
    h.run(|b| b.hset("row", "f1", "a")).unwrap();
    h.run(|b| b.hset("row", "f2", "b")).unwrap();
    assert_eq!(h.run(|b| b.hget("row", "f1")).unwrap(), Some("a".into()));
    assert_eq!(h.run(|b| b.hkeys("row")).unwrap().len(), 2);

    let all = h.run(|b| b.hgetall("row")).unwrap().unwrap();
    assert_eq!(all.len(), 2);

    h.run(|b| b.hdel("row", "f1")).unwrap();
    assert_eq!(h.run(|b| b.hget("row", "f1")).unwrap(), None);
    assert_eq!(h.run(|b| b.hgetall("missing")).unwrap(), None);
}

#[test]
fn list_ops() {
    let (_, h) = handle();
    h.run(|b| b.rpush("l", "a")).unwrap();
    h.run(|b| b.rpush("l", "b")).unwrap();
    h.run(|b| b.lpush("l", "front")).unwrap();

    assert_eq!(h.run(|b| b.llen("l")).unwrap(), 3);
    assert_eq!(h.run(|b| b.lindex("l", 0)).unwrap(), Some("front".into()));
    assert_eq!(
        h.run(|b| b.lrange("l")).unwrap(),
        vec!["front".to_string(), "a".to_string(), "b".to_string()]
    );
    assert_eq!(h.run(|b| b.lpop("l")).unwrap(), Some("front".into()));
    assert_eq!(h.run(|b| b.llen("l")).unwrap(), 2);
}

#[test]
fn wrong_type_is_refused() {
    let (_, h) = handle();
    h.run(|b| b.set("k", "v")).unwrap();
    let err = h.run(|b| b.hset("k", "f", "v")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Backend(BackendError::WrongType { .. })
    ));
}

#[test]
fn unreachable_store_surfaces_after_three_attempts() {
    let (backend, h) = handle();
    backend.set_reachable(false);
    let err = h.run(|b| b.set("k", "v")).unwrap_err();
    assert!(matches!(err, StoreError::Unavailable { attempts: 3 }));

    backend.set_reachable(true);
    assert!(h.run(|b| b.set("k", "v")).is_ok());
}

#[test]
fn dirty_flag_tracks_mutations() {
    let (backend, h) = handle();
    assert!(!backend.is_dirty());
    h.run(|b| b.set("k", "v")).unwrap();
    assert!(backend.is_dirty());

    let cells = backend.export_cells();
    assert!(!backend.is_dirty());
    assert_eq!(cells.len(), 1);
}

#[test]
fn export_import_round_trip() {
    let (backend, h) = handle();
    h.run(|b| b.set("s", "1")).unwrap();
    h.run(|b| b.hset("h", "f", "2")).unwrap();
    h.run(|b| b.rpush("l", "3")).unwrap();

    let restored = MemoryBackend::from_cells(backend.export_cells());
    let h2 = StoreHandle::new(Arc::new(restored));
    assert_eq!(h2.run(|b| b.get("s")).unwrap(), Some("1".into()));
    assert_eq!(h2.run(|b| b.hget("h", "f")).unwrap(), Some("2".into()));
    assert_eq!(h2.run(|b| b.lrange("l")).unwrap(), vec!["3".to_string()]);
}
