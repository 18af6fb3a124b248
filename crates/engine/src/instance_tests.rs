// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::EngineError;

#[test]
fn duplicate_kind_is_refused_until_dropped() {
    let guard = InstanceGuard::acquire("instance-test-kind").unwrap();
    assert!(matches!(
        InstanceGuard::acquire("instance-test-kind"),
        Err(EngineError::DuplicateOrchestrator(_))
    ));

    drop(guard);
    assert!(InstanceGuard::acquire("instance-test-kind").is_ok());
}

#[test]
fn distinct_kinds_coexist() {
    let _a = InstanceGuard::acquire("instance-test-a").unwrap();
    let _b = InstanceGuard::acquire("instance-test-b").unwrap();
}
