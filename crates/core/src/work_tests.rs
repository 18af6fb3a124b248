// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn rafts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("raft{i:02}")).collect()
}

fn ccds(n: usize) -> Vec<Vec<String>> {
    (0..n)
        .map(|i| vec![format!("ccd{i:02}a"), format!("ccd{i:02}b")])
        .collect()
}

fn fwdrs(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("f{i}")).collect()
}

#[test]
fn single_forwarder_owns_all_rafts() {
    let out = divide_work(&fwdrs(1), &rafts(5), &ccds(5));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].raft_list, rafts(5));
    assert_eq!(out[0].raft_ccd_list, ccds(5));
}

#[test]
fn fewer_rafts_than_forwarders_one_each() {
    let out = divide_work(&fwdrs(4), &rafts(2), &ccds(2));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].raft_list, &rafts(2)[0..1]);
    assert_eq!(out[1].raft_list, &rafts(2)[1..2]);
}

#[test]
fn remainder_goes_to_first_forwarder() {
    // 7 rafts over 3 forwarders: 2 each, first takes the extra raft
    let out = divide_work(&fwdrs(3), &rafts(7), &ccds(7));
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].raft_list.len(), 3);
    assert_eq!(out[1].raft_list.len(), 2);
    assert_eq!(out[2].raft_list.len(), 2);
}

#[test]
fn assignments_are_contiguous_and_cover_everything() {
    let all = rafts(11);
    let out = divide_work(&fwdrs(4), &all, &ccds(11));
    let joined: Vec<String> = out.iter().flat_map(|a| a.raft_list.clone()).collect();
    assert_eq!(joined, all, "union of assignments equals the declared set");
}

#[test]
fn ccd_sublists_track_raft_positions() {
    let out = divide_work(&fwdrs(2), &rafts(4), &ccds(4));
    for assignment in &out {
        assert_eq!(assignment.raft_list.len(), assignment.raft_ccd_list.len());
    }
    assert_eq!(out[0].raft_ccd_list[0], ccds(4)[0]);
    assert_eq!(out[1].raft_ccd_list[0], ccds(4)[2]);
}

#[test]
fn empty_inputs_yield_no_assignments() {
    assert!(divide_work(&[], &rafts(3), &ccds(3)).is_empty());
    assert!(divide_work(&fwdrs(3), &[], &[]).is_empty());
}
