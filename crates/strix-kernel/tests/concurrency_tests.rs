use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strix_kernel::{
    allowed_transitions, validate_transition, ExecutionRecord, ExecutionStatus, FindingStore, Ledger,
    TaskRecord, TaskStatus,
};
use strix_model::prelude::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_finalization_fires_exactly_once() {
    for _ in 0..20 {
        let ledger = Arc::new(Ledger::new());
        let task = TaskId::new();
        ledger.insert_task(TaskRecord::new(task, "process recon", "10.0.0.1"));
        let ids: Vec<ExecutionId> = (0..16).map(|_| ExecutionId::new()).collect();
        for id in &ids {
            ledger
                .insert_execution(ExecutionRecord::new(*id, task, None, "nmap/tcp", 0))
                .unwrap();
            ledger.transition(*id, ExecutionStatus::Running).unwrap();
        }

        let finalized = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let (ledger, finalized, id) = (Arc::clone(&ledger), Arc::clone(&finalized), *id);
                tokio::spawn(async move {
                    let status = if i % 5 == 0 {
                        ExecutionStatus::Skipped
                    } else {
                        ExecutionStatus::Completed
                    };
                    ledger.transition(id, status).unwrap();
                    if ledger.finalize_if_drained(task).unwrap().is_some() {
                        finalized.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        let record = ledger.task(task).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.end.is_some());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_cancels_finalize_once() {
    for _ in 0..20 {
        let ledger = Arc::new(Ledger::new());
        let task = TaskId::new();
        ledger.insert_task(TaskRecord::new(task, "process recon", "10.0.0.1"));
        let ids: Vec<ExecutionId> = (0..8).map(|_| ExecutionId::new()).collect();
        for id in &ids {
            ledger
                .insert_execution(ExecutionRecord::new(*id, task, None, "nmap/tcp", 0))
                .unwrap();
        }

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                tokio::spawn(async move { ledger.cancel_task(task).unwrap() })
            })
            .collect();
        let mut finalized = 0;
        let mut cancelled = Vec::new();
        for handle in handles {
            let outcome = handle.await.unwrap();
            finalized += usize::from(outcome.finalized);
            cancelled.extend(outcome.executions);
        }

        assert_eq!(finalized, 1);
        cancelled.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(cancelled, expected);
        assert_eq!(ledger.task(task).unwrap().status, TaskStatus::Cancelled);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_upserts_converge() {
    let store = Arc::new(FindingStore::new());
    let scope = EntityId::new();
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let host: Entity = if i % 2 == 0 {
                    Host::new("10.0.0.1").into()
                } else {
                    Host::new("10.0.0.1").with_os("Debian", HostOs::Linux).into()
                };
                store.upsert(scope, &host, ExecutionId::new()).map(|e| e.id())
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();

    assert_eq!(ids.len(), 1);
    assert_eq!(store.len(), 1);
    let record = store.record(ids[0]).unwrap();
    assert_eq!(record.executions.len(), 32);
    let Entity::Host(host) = record.entity else { panic!("not a host") };
    assert_eq!(host.os.as_deref(), Some("Debian"));
}

fn any_status() -> impl Strategy<Value = ExecutionStatus> {
    prop::sample::select(ExecutionStatus::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_transitions_match_allowed_set(from in any_status(), to in any_status()) {
        let res = validate_transition(from, to);
        prop_assert_eq!(res.is_ok(), allowed_transitions(from).contains(&to));
    }

    #[test]
    fn prop_aggregate_errors_iff_any_error(statuses in prop::collection::vec(
        prop::sample::select(vec![ExecutionStatus::Completed, ExecutionStatus::Skipped, ExecutionStatus::Error]),
        0..10,
    )) {
        let expected = if statuses.contains(&ExecutionStatus::Error) {
            TaskStatus::Error
        } else {
            TaskStatus::Completed
        };
        prop_assert_eq!(TaskStatus::aggregate(statuses), expected);
    }
}
