//! Integration tests for the engine against a fake Consul server.

use kvsync_engine::{
    spawn_watcher, ConsulClient, KvStore, SyncConfig, SyncEngine, SyncError,
};
use kvsync_protocol::{BatchLimits, DeletePolicy, LocalDataset};
use kvsync_source::{DirectorySource, SourceConfig};
use kvsync_testkit::{ConfigTree, FakeConsul};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn local(pairs: &[(&str, &str)]) -> LocalDataset {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn engine_for(
    consul: &FakeConsul,
    config: SyncConfig,
    data: LocalDataset,
) -> SyncEngine<ConsulClient, LocalDataset> {
    let config = SyncConfig {
        consul_url: consul.url(),
        ..config
    };
    let client = ConsulClient::new(&config).unwrap();
    SyncEngine::new(config, client, data)
}

#[test]
fn fresh_store_end_to_end() {
    let consul = FakeConsul::start();
    let engine = engine_for(
        &consul,
        SyncConfig::new(""),
        local(&[("svc/a", "x"), ("svc/b", "")]),
    );

    let ops = engine.plan().unwrap();
    assert_eq!(ops.total(), 1);
    assert_eq!(ops.inserts(), 1);

    let summary = engine.apply().unwrap();
    assert_eq!(summary.inserts, 1);
    assert_eq!(consul.get("svc/a").as_deref(), Some("x"));
    assert!(consul.get("svc/b").is_none());

    let reads = consul.read_requests();
    assert_eq!(reads[0].path, "/v1/kv/");
    assert_eq!(reads[0].query.as_deref(), Some("recurse=true"));
}

#[test]
fn idempotent_second_run() {
    let consul = FakeConsul::start();
    consul.seed_all([("app/a", "1"), ("app/b", "2")]);
    let engine = engine_for(
        &consul,
        SyncConfig::new("").with_base_path("app"),
        local(&[("app/a", "1"), ("app/b", "changed"), ("app/c", "3")]),
    );

    let first = engine.apply().unwrap();
    assert_eq!((first.inserts, first.updates), (1, 1));

    let second = engine.apply().unwrap();
    assert!(second.is_noop());
    assert_eq!(consul.txn_requests().len(), 1);
    assert_eq!(consul.read_requests()[0].path, "/v1/kv/app/");
}

#[test]
fn delete_policies_against_the_store() {
    for (policy, expect_b, expect_err) in [
        (DeletePolicy::Deny, true, true),
        (DeletePolicy::Allow, false, false),
        (DeletePolicy::Skip, true, false),
    ] {
        let consul = FakeConsul::start();
        consul.seed_all([("a", "1"), ("b", "2")]);
        let engine = engine_for(
            &consul,
            SyncConfig::new("").with_delete_policy(policy),
            local(&[("a", "1")]),
        );

        let result = engine.apply();
        assert_eq!(result.is_err(), expect_err, "policy {policy}");
        assert_eq!(consul.get("b").is_some(), expect_b, "policy {policy}");
        if policy == DeletePolicy::Deny {
            assert!(consul.txn_requests().is_empty());
            let err = result.unwrap_err();
            assert_eq!(err.exit_code(), 10);
            assert_eq!(err.blocked_paths(), Some(&["b".to_string()][..]));
        }
    }
}

#[test]
fn dry_run_only_reads() {
    let consul = FakeConsul::start();
    consul.seed("old", "1");
    let engine = engine_for(
        &consul,
        SyncConfig::new("").with_delete_policy(DeletePolicy::Allow),
        local(&[("new", "1")]),
    );

    let summary = engine.dry_run().unwrap();
    assert_eq!((summary.inserts, summary.deletes), (1, 1));
    assert!(consul.txn_requests().is_empty());
    assert_eq!(consul.requests().len(), 1);
    assert!(consul.get("old").is_some());
}

#[test]
fn batches_stay_within_consul_limits() {
    let consul = FakeConsul::start();
    let data: LocalDataset = (0..200)
        .map(|i| (format!("bulk/{:03}", i), "x".repeat(4_000)))
        .collect();
    let engine = engine_for(&consul, SyncConfig::new(""), data);

    let summary = engine.apply().unwrap();
    assert_eq!(summary.inserts, 200);

    let txns = consul.txn_requests();
    assert_eq!(txns.len(), summary.batches);
    assert!(txns.len() >= 4);
    for txn in &txns {
        assert!(txn.operations <= 64);
        assert!(txn.body_bytes <= 500_000);
    }
    assert_eq!(consul.decoded().len(), 200);
}

#[test]
fn payload_limit_splits_batches() {
    let consul = FakeConsul::start();
    // Each record is about 1.4 KiB, so a 4 KiB limit fits two.
    let data: LocalDataset = (0..10)
        .map(|i| (format!("k/{}", i), "v".repeat(1_000)))
        .collect();
    let engine = engine_for(
        &consul,
        SyncConfig::new("").with_batch_limits(BatchLimits::new(64, 4_096)),
        data,
    );

    engine.apply().unwrap();
    let txns = consul.txn_requests();
    assert_eq!(txns.len(), 5);
    assert!(txns.iter().all(|t| t.operations == 2 && t.body_bytes <= 4_096));
}

#[test]
fn token_is_sent_on_every_request() {
    let consul = FakeConsul::start();
    consul.require_token("s3cret");

    let engine = engine_for(
        &consul,
        SyncConfig::new("").with_token("s3cret"),
        local(&[("a", "1")]),
    );
    engine.apply().unwrap();
    assert!(consul
        .requests()
        .iter()
        .all(|r| r.token.as_deref() == Some("s3cret")));

    let anonymous = engine_for(&consul, SyncConfig::new(""), local(&[("a", "2")]));
    let err = anonymous.apply().unwrap_err();
    assert!(matches!(err, SyncError::ConnectionFailure(_)));
}

#[test]
fn read_failure_is_fatal() {
    let consul = FakeConsul::start();
    consul.fail_reads(500);
    let engine = engine_for(&consul, SyncConfig::new(""), local(&[("a", "1")]));

    let err = engine.apply().unwrap_err();
    assert_eq!(err.exit_code(), 30);
    assert!(consul.txn_requests().is_empty());
}

#[test]
fn rejected_transaction_surfaces_body_and_keeps_prior_batches() {
    let consul = FakeConsul::start();
    consul.fail_transactions_from(1, 409, "rpc error: txn conflict");
    let data: LocalDataset = (0..6).map(|i| (format!("k/{}", i), "v".to_string())).collect();
    let engine = engine_for(
        &consul,
        SyncConfig::new("").with_batch_limits(BatchLimits::new(2, 500_000)),
        data,
    );

    match engine.apply().unwrap_err() {
        SyncError::TransactionFailure { status, body } => {
            assert_eq!(status, 409);
            assert_eq!(body, "rpc error: txn conflict");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(consul.decoded().len(), 2);
    assert_eq!(consul.txn_requests().len(), 2);
}

#[test]
fn malformed_read_response_is_a_decode_failure() {
    let consul = FakeConsul::start();
    consul.serve_read_body("<html>not consul</html>");
    let client = ConsulClient::new(&SyncConfig::new(consul.url())).unwrap();

    let err = client.fetch("").unwrap_err();
    assert!(matches!(err, SyncError::DecodeFailure(_)));
    assert_eq!(err.exit_code(), 51);
}

#[test]
fn directory_source_to_store() {
    let consul = FakeConsul::start();
    let tree = ConfigTree::new()
        .file("web/motd.txt", "hello")
        .file("web/app.json", r#"{"db": {"host": "db.local"}, "replicas": 2}"#)
        .file("web/README.md", "ignored");

    let source = DirectorySource::new(
        SourceConfig::new(tree.path())
            .with_kv_base_path("cfg")
            .with_expand_json(true),
    );
    let config = SyncConfig::new(consul.url()).with_base_path("cfg");
    let engine = SyncEngine::new(config.clone(), ConsulClient::new(&config).unwrap(), source);

    engine.apply().unwrap();
    assert_eq!(consul.get("cfg/web/motd").as_deref(), Some("hello"));
    assert_eq!(consul.get("cfg/web/app/db/host").as_deref(), Some("db.local"));
    assert_eq!(consul.get("cfg/web/app/replicas").as_deref(), Some("2"));
    assert!(consul.get("cfg/web/README").is_none());

    tree.write("web/motd.txt", "bye");
    let summary = engine.apply().unwrap();
    assert_eq!(summary.updates, 1);
    assert_eq!(consul.get("cfg/web/motd").as_deref(), Some("bye"));
}

#[test]
fn interrupt_waits_for_in_flight_transaction() {
    let consul = FakeConsul::start();
    consul.set_txn_latency(Duration::from_millis(300));
    let engine = Arc::new(engine_for(
        &consul,
        SyncConfig::new("").with_timeout(Duration::from_secs(5)),
        local(&[("a", "1"), ("b", "2")]),
    ));

    let quit = Arc::new(AtomicBool::new(false));
    let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();
    let watcher = {
        let quit = Arc::clone(&quit);
        spawn_watcher(
            Arc::clone(engine.busy_signal()),
            async move {
                let _ = signal_rx.await;
            },
            move || quit.store(true, Ordering::SeqCst),
        )
        .unwrap()
    };

    let run = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.apply())
    };

    assert!(consul.wait_for_txn_in_flight(Duration::from_secs(5)));
    signal_tx.send(()).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(!quit.load(Ordering::SeqCst), "quit while a transaction was in flight");

    let summary = run.join().unwrap().unwrap();
    watcher.join().unwrap();
    assert!(quit.load(Ordering::SeqCst));
    assert_eq!(summary.inserts, 2);
    assert_eq!(consul.get("b").as_deref(), Some("2"));

    // Once shut down, no new write section may begin.
    assert!(matches!(
        engine.busy_signal().enter(),
        Err(SyncError::Interrupted)
    ));
}
