use std::time::Duration;

use portall_common::config::EngineConfig;
use portall_common::error::{AuthorityError, EngineError};
use portall_common::model::discovery::CanonicalPort;
use portall_common::model::port::{PortKey, PortState, Protocol};
use portall_common::notify::NoHooks;
use portall_core::{PendingRelocation, RelocateOutcome, RelocateRequest, Relocation};

use crate::support::{Call, Harness, discovered, id, tcp_host};

fn begin(h: &Harness, port: u16, source: &str, target: &str) -> PendingRelocation {
    match h
        .engine
        .begin_relocate(RelocateRequest::new(PortKey::tcp(port), source, target), &NoHooks)
    {
        Ok(Relocation::Pending(pending)) => pending,
        Ok(Relocation::Unchanged) => panic!("relocation of {port} was a no-op"),
        Err(e) => panic!("relocation of {port} failed to start: {e}"),
    }
}

/*************************************************************
                       Single flight
**************************************************************/

#[tokio::test]
async fn overlapping_relocation_is_busy_and_mutates_nothing() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);

    let first = begin(&h, 80, "10.0.0.5", "10.0.0.9");
    assert!(h.engine.is_locked(&id("10.0.0.5")));
    assert!(h.engine.is_locked(&id("10.0.0.9")));
    assert_eq!(h.group("10.0.0.9").ports[0].state, PortState::PendingRelocate);

    let in_flight = h.engine.hosts();
    let second = h.engine.begin_relocate(
        RelocateRequest::new(PortKey::tcp(443), "10.0.0.5", "10.0.0.9"),
        &NoHooks,
    );

    assert!(matches!(second, Err(EngineError::Busy)));
    assert_eq!(h.engine.hosts(), in_flight);
    assert_eq!(
        h.notes.errors(),
        vec!["Operation in progress, try again shortly".to_string()]
    );

    first.settle(&NoHooks).await.unwrap();
    assert_eq!(h.numbers("10.0.0.5"), vec![443]);
    assert_eq!(h.numbers("10.0.0.9"), vec![80]);
    h.assert_at_rest();
}

#[tokio::test]
async fn reorder_waits_for_nobody() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);
    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");

    let err = h
        .engine
        .reorder(&id("10.0.0.5"), &[PortKey::tcp(443)])
        .await
        .unwrap_err();

    assert_eq!(err, EngineError::Busy);
    assert!(!h
        .authority
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Reorder { .. })));

    pending.settle(&NoHooks).await.unwrap();
    h.assert_at_rest();
}

#[tokio::test]
async fn disjoint_operations_settle_independently() {
    let h = Harness::new(vec![
        tcp_host("10.0.0.5", &[80]),
        tcp_host("10.0.0.9", &[]),
        tcp_host("10.0.0.7", &[443]),
        tcp_host("10.0.0.8", &[]),
    ]);
    let first_gate = h.authority.gate_relocate();
    let second_gate = h.authority.gate_relocate();

    let a = begin(&h, 80, "10.0.0.5", "10.0.0.9");
    let b = begin(&h, 443, "10.0.0.7", "10.0.0.8");
    assert_eq!(h.engine.pending_count(), 2);

    let answers = async {
        tokio::task::yield_now().await;
        second_gate
            .send(Ok(CanonicalPort {
                id: Some(3),
                host: id("10.0.0.8"),
                number: 443,
                protocol: Protocol::Tcp,
                description: "https".into(),
            }))
            .unwrap();
        tokio::task::yield_now().await;
        first_gate
            .send(Err(AuthorityError::Rejected("boom".into())))
            .unwrap();
    };

    let (ra, rb, ()) = tokio::join!(a.settle(&NoHooks), b.settle(&NoHooks), answers);

    assert_eq!(ra, Err(EngineError::RemoteRejected("boom".into())));
    assert!(matches!(rb, Ok(RelocateOutcome::Committed(_))));
    assert_eq!(h.numbers("10.0.0.5"), vec![80]);
    assert!(h.numbers("10.0.0.9").is_empty());
    assert!(h.numbers("10.0.0.7").is_empty());
    assert_eq!(h.numbers("10.0.0.8"), vec![443]);
    h.assert_at_rest();
}

#[tokio::test]
async fn relocation_is_refused_while_reorder_is_in_flight() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);
    let gate = h.authority.gate_reorder();

    let host = id("10.0.0.5");
    let order = [PortKey::tcp(443), PortKey::tcp(80)];
    let reorder = h.engine.reorder(&host, &order);
    let contender = async {
        tokio::task::yield_now().await;
        assert_eq!(
            h.group("10.0.0.5").ports[0].state,
            PortState::PendingReorder
        );
        let attempt = h.engine.begin_relocate(
            RelocateRequest::new(PortKey::tcp(80), "10.0.0.5", "10.0.0.9"),
            &NoHooks,
        );
        assert!(matches!(attempt, Err(EngineError::Busy)));
        gate.send(Ok(())).unwrap();
    };

    let (result, ()) = tokio::join!(reorder, contender);

    assert_eq!(result, Ok(()));
    assert_eq!(h.numbers("10.0.0.5"), vec![443, 80]);
    assert!(h.numbers("10.0.0.9").is_empty());
    h.assert_at_rest();
}

/*************************************************************
                 Cancellation and stale tickets
**************************************************************/

#[tokio::test]
async fn cancelled_relocation_drops_late_response() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);
    let before = h.engine.hosts();

    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");
    let ticket = pending.ticket();

    assert!(h.engine.cancel(ticket).await);
    assert!(!h.engine.cancel(ticket).await, "second release must be a no-op");
    assert_eq!(h.engine.hosts(), before);

    let outcome = pending.settle(&NoHooks).await.unwrap();
    assert_eq!(outcome, RelocateOutcome::Discarded);
    assert_eq!(h.engine.hosts(), before);
    assert!(h.notes.successes().is_empty());
    h.assert_at_rest();
}

#[tokio::test]
async fn stale_response_does_not_disturb_newer_operation() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);

    let old = begin(&h, 80, "10.0.0.5", "10.0.0.9");
    assert!(h.engine.cancel(old.ticket()).await);

    let new = begin(&h, 443, "10.0.0.5", "10.0.0.9");
    assert!(matches!(new.settle(&NoHooks).await, Ok(RelocateOutcome::Committed(_))));
    assert_eq!(old.settle(&NoHooks).await, Ok(RelocateOutcome::Discarded));

    assert_eq!(h.numbers("10.0.0.5"), vec![80]);
    assert_eq!(h.numbers("10.0.0.9"), vec![443]);
    h.assert_at_rest();
}

#[tokio::test]
async fn reload_makes_in_flight_relocation_stale() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);
    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");

    h.authority
        .set_collection(vec![tcp_host("10.0.0.5", &[443]), tcp_host("10.0.0.9", &[80])]);
    assert_eq!(h.engine.reload().await, Ok(2));
    assert_eq!(h.engine.pending_count(), 0);

    assert_eq!(pending.settle(&NoHooks).await, Ok(RelocateOutcome::Discarded));
    assert_eq!(h.numbers("10.0.0.5"), vec![443]);
    assert_eq!(h.numbers("10.0.0.9"), vec![80]);
    h.assert_at_rest();
}

/*************************************************************
                  Discovery behind a lock
**************************************************************/

#[tokio::test]
async fn discovery_waits_for_relocation_then_applies() {
    let h = Harness::new(vec![
        tcp_host("10.0.0.5", &[80, 443]),
        tcp_host("10.0.0.9", &[22]),
        tcp_host("10.0.0.7", &[]),
    ]);
    let pending = begin(&h, 22, "10.0.0.9", "10.0.0.5");

    let report = h
        .engine
        .merge_discovered(vec![discovered("10.0.0.5", 8080), discovered("10.0.0.7", 3000)])
        .await;

    assert_eq!(report.deferred, 1);
    assert_eq!(report.added, 1);
    assert_eq!(h.engine.deferred_ports(), 1);
    assert_eq!(h.numbers("10.0.0.5"), vec![80, 443, 22]);
    assert_eq!(h.numbers("10.0.0.7"), vec![3000]);

    pending.settle(&NoHooks).await.unwrap();

    assert_eq!(h.engine.deferred_ports(), 0);
    assert_eq!(h.numbers("10.0.0.5"), vec![80, 443, 22, 8080]);
    assert!(h.numbers("10.0.0.9").is_empty());
    h.assert_at_rest();
}

#[tokio::test]
async fn deferred_copy_of_relocated_port_is_not_duplicated() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80]), tcp_host("10.0.0.9", &[22])]);
    let pending = begin(&h, 22, "10.0.0.9", "10.0.0.5");

    let report = h
        .engine
        .merge_discovered(vec![discovered("10.0.0.5", 22)])
        .await;
    assert_eq!(report.deferred, 1);

    pending.settle(&NoHooks).await.unwrap();

    assert_eq!(h.numbers("10.0.0.5"), vec![80, 22]);
    assert!(h.authority.adds().is_empty());
    h.assert_at_rest();
}

#[tokio::test]
async fn deferred_merge_runs_after_rollback_too() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80]), tcp_host("10.0.0.9", &[])]);
    h.authority
        .fail_relocate(AuthorityError::Transport("timeout".into()));
    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");

    h.engine
        .merge_discovered(vec![discovered("10.0.0.9", 9000)])
        .await;
    assert!(pending.settle(&NoHooks).await.is_err());

    assert_eq!(h.numbers("10.0.0.5"), vec![80]);
    assert_eq!(h.numbers("10.0.0.9"), vec![9000]);
    h.assert_at_rest();
}

#[tokio::test]
async fn every_batch_deferred_behind_one_relocation_is_applied() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80]), tcp_host("10.0.0.9", &[])]);
    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");

    for number in 8080..8084 {
        let report = h
            .engine
            .merge_discovered(vec![discovered("10.0.0.9", number)])
            .await;
        assert_eq!(report.deferred, 1, "batch for {number}");
        assert_eq!(report.dropped, 0, "batch for {number}");
    }
    assert_eq!(h.engine.deferred_ports(), 4);

    pending.settle(&NoHooks).await.unwrap();

    assert_eq!(h.engine.deferred_ports(), 0);
    assert_eq!(h.numbers("10.0.0.9"), vec![80, 8080, 8081, 8082, 8083]);
    assert_eq!(h.authority.adds().len(), 4);
    h.assert_at_rest();
}

#[tokio::test]
async fn batch_retried_onto_a_locked_host_past_the_cap_is_dropped() {
    let h = Harness::with_config(
        vec![
            tcp_host("10.0.0.5", &[80]),
            tcp_host("10.0.0.9", &[]),
            tcp_host("10.0.0.7", &[]),
        ],
        EngineConfig {
            max_merge_deferrals: 1,
        },
    );
    let first = begin(&h, 80, "10.0.0.5", "10.0.0.9");

    let report = h
        .engine
        .merge_discovered(vec![discovered("10.0.0.5", 8080), discovered("10.0.0.9", 9000)])
        .await;
    assert_eq!(report.deferred, 2);

    // The retry on 10.0.0.5 waits on its add while a second relocation takes
    // 10.0.0.9, so the retry of the 10.0.0.9 batch finds it locked again.
    let gate = h.authority.gate_add();
    let interfere = async {
        tokio::task::yield_now().await;
        let second = begin(&h, 80, "10.0.0.9", "10.0.0.7");
        gate.send(Ok(())).unwrap();
        second
    };
    let (settled, second) = tokio::join!(first.settle(&NoHooks), interfere);
    assert!(matches!(settled, Ok(RelocateOutcome::Committed(_))));

    assert_eq!(h.engine.deferred_ports(), 0);
    assert!(h
        .notes
        .errors()
        .contains(&"Discovered ports merged with errors: 0 added, 1 dropped".to_string()));

    second.settle(&NoHooks).await.unwrap();
    assert_eq!(h.numbers("10.0.0.5"), vec![8080]);
    assert!(h.numbers("10.0.0.9").is_empty());
    assert_eq!(h.numbers("10.0.0.7"), vec![80]);
    assert_eq!(h.authority.adds().len(), 1);
    h.assert_at_rest();
}

/*************************************************************
                Futures dropped before settling
**************************************************************/

#[tokio::test]
async fn dropped_pending_relocation_rolls_back_and_unlocks() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443]), tcp_host("10.0.0.9", &[])]);
    let before = h.engine.hosts();

    let pending = begin(&h, 80, "10.0.0.5", "10.0.0.9");
    drop(pending);

    assert!(!h.engine.is_locked(&id("10.0.0.5")));
    assert!(!h.engine.is_locked(&id("10.0.0.9")));
    assert_eq!(h.engine.hosts(), before);
    h.assert_at_rest();

    let outcome = h
        .engine
        .relocate(RelocateRequest::new(PortKey::tcp(80), "10.0.0.5", "10.0.0.9"), &NoHooks)
        .await;
    assert!(matches!(outcome, Ok(RelocateOutcome::Committed(_))));
}

#[tokio::test]
async fn timed_out_reorder_releases_its_host() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80, 443])]);
    let _gate = h.authority.gate_reorder();
    let host = id("10.0.0.5");
    let order = [PortKey::tcp(443), PortKey::tcp(80)];

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        h.engine.reorder(&host, &order),
    )
    .await;

    assert!(result.is_err());
    assert!(!h.engine.is_locked(&host));
    assert_eq!(h.numbers("10.0.0.5"), vec![80, 443]);
    h.assert_at_rest();
}

#[tokio::test]
async fn timed_out_merge_prunes_unsettled_adds() {
    let h = Harness::new(vec![tcp_host("10.0.0.5", &[80])]);

    let _created_gate = h.authority.gate_add();
    let created = tokio::time::timeout(
        Duration::from_millis(20),
        h.engine.merge_discovered(vec![discovered("10.0.0.77", 3000)]),
    )
    .await;
    assert!(created.is_err());
    assert!(h.engine.host(&id("10.0.0.77")).is_none());

    let _existing_gate = h.authority.gate_add();
    let existing = tokio::time::timeout(
        Duration::from_millis(20),
        h.engine.merge_discovered(vec![discovered("10.0.0.5", 8096)]),
    )
    .await;
    assert!(existing.is_err());
    assert!(!h.engine.is_locked(&id("10.0.0.5")));
    assert_eq!(h.numbers("10.0.0.5"), vec![80]);
    h.assert_at_rest();
}
