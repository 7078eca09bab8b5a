use portall_common::error::AuthorityError;
use portall_common::model::port::{PortKey, PortState};

use crate::support::{Harness, discovered, id, tcp_host};

#[tokio::test]
async fn new_ports_are_appended_and_committed() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80])]);

    let report = h
        .engine
        .merge_discovered(vec![discovered("10.0.0.5", 8096), discovered("10.0.0.5", 9000)])
        .await;

    assert_eq!(report.added, 2);
    assert!(report.is_clean());
    assert_eq!(h.numbers("10.0.0.5"), vec![80, 8096, 9000]);
    assert_eq!(h.group("10.0.0.5").ports[1].description, "container-8096");
    h.assert_at_rest();
    assert_eq!(
        h.notes.successes(),
        vec!["Discovered ports merged: 2 added".to_string()]
    );
}

#[tokio::test]
async fn duplicates_are_skipped_without_a_request() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443])]);

    let report = h
        .engine
        .merge_discovered(vec![
            discovered("10.0.0.5", 443),
            discovered("10.0.0.5", 8080),
            discovered("10.0.0.5", 8080),
        ])
        .await;

    assert_eq!(report.added, 1);
    assert_eq!(report.skipped_duplicates, 2);
    assert_eq!(h.authority.adds().len(), 1);
    assert_eq!(h.numbers("10.0.0.5"), vec![80, 443, 8080]);
    h.assert_at_rest();
}

#[tokio::test]
async fn unknown_host_is_created() {
    let h = Harness::new(vec![]);

    let report = h
        .engine
        .merge_discovered(vec![discovered("192.168.1.20", 53)])
        .await;

    assert_eq!(report.created_hosts, vec![id("192.168.1.20")]);
    assert_eq!(h.numbers("192.168.1.20"), vec![53]);
    assert!(h.notes.changed().contains(&id("192.168.1.20")));
    h.assert_at_rest();
}

#[tokio::test]
async fn failed_ports_are_pruned_and_siblings_kept() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80])]);
    h.authority
        .reject_add("10.0.0.5", PortKey::tcp(9000), "Port already exists in database");

    let report = h
        .engine
        .merge_discovered(vec![
            discovered("10.0.0.5", 8096),
            discovered("10.0.0.5", 9000),
            discovered("10.0.0.5", 9443),
        ])
        .await;

    assert_eq!(report.added, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].port.key(), PortKey::tcp(9000));
    assert_eq!(report.failed[0].message, "Port already exists in database");

    assert_eq!(h.numbers("10.0.0.5"), vec![80, 8096, 9443]);
    assert!(h
        .group("10.0.0.5")
        .ports
        .iter()
        .all(|p| p.state == PortState::Committed));
    h.assert_at_rest();

    assert_eq!(
        h.notes.errors(),
        vec!["Discovered ports merged with errors: 2 added, 1 failed".to_string()]
    );
}

#[tokio::test]
async fn created_host_with_only_failures_is_removed_again() {
    let h = Harness::new(vec![]);
    h.authority.reject_add("10.0.0.77", PortKey::tcp(80), "nope");

    let report = h.engine.merge_discovered(vec![discovered("10.0.0.77", 80)]).await;

    assert_eq!(report.failed.len(), 1);
    assert!(report.created_hosts.is_empty());
    assert!(h.engine.host(&id("10.0.0.77")).is_none());
}

#[tokio::test]
async fn batch_is_split_per_host() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[]), tcp_host("10.0.0.9", &[22])]);

    let report = h
        .engine
        .merge_discovered(vec![
            discovered("10.0.0.9", 8080),
            discovered("10.0.0.5", 3000),
            discovered("10.0.0.9", 22),
        ])
        .await;

    assert_eq!(report.added, 2);
    assert_eq!(report.skipped_duplicates, 1);
    assert_eq!(h.numbers("10.0.0.5"), vec![3000]);
    assert_eq!(h.numbers("10.0.0.9"), vec![22, 8080]);
    // one summary for the whole batch
    assert_eq!(h.notes.messages().len(), 1);
}

#[tokio::test]
async fn pending_adds_are_visible_while_in_flight() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80])]);
    let gate = h.authority.gate_add();

    let merge = h.engine.merge_discovered(vec![discovered("10.0.0.5", 8096)]);
    let observe = async {
        tokio::task::yield_now().await;
        let group = h.group("10.0.0.5");
        assert_eq!(group.ports[1].state, PortState::PendingAdd);
        assert!(h.engine.is_locked(&id("10.0.0.5")));
        gate.send(Err(AuthorityError::Transport("timeout".into()))).unwrap();
    };

    let (report, ()) = tokio::join!(merge, observe);

    assert_eq!(report.failed.len(), 1);
    assert_eq!(h.numbers("10.0.0.5"), vec![80]);
    h.assert_at_rest();
}
