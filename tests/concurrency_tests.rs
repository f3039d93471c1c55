use ontomatch::{
    IndexConfig, IndexError, LshIndex, MatchConfig, MatchTask, NGramShingler, PoolError,
    ShardedMatcher, Shingler, TaskPool,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, mpsc};
use std::thread;

fn shingler() -> Arc<dyn Shingler> {
    Arc::new(NGramShingler::default())
}

fn term(i: usize) -> String {
    format!("ingredient number {i:04}")
}

#[test]
fn pool_completes_jobs_submitted_from_many_threads() {
    let pool = Arc::new(TaskPool::new(4).unwrap());
    let counter = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..8)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let handles: Vec<_> = (0..50)
                    .map(|_| {
                        let counter = Arc::clone(&counter);
                        pool.submit(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap()
                    })
                    .collect();
                for handle in handles {
                    handle.join().unwrap();
                }
            })
        })
        .collect();

    for submitter in submitters {
        submitter.join().unwrap();
    }
    assert_eq!(counter.load(Ordering::SeqCst), 400);
    pool.shutdown();
    assert!(matches!(pool.submit(|| ()), Err(PoolError::PoolStopped)));
}

#[test]
fn concurrent_inserts_are_all_visible() {
    let index = Arc::new(LshIndex::new(IndexConfig::default()).unwrap());
    let shingler = shingler();

    let writers: Vec<_> = (0..8)
        .map(|worker| {
            let index = Arc::clone(&index);
            let shingler = Arc::clone(&shingler);
            thread::spawn(move || {
                for i in (worker * 50)..((worker + 1) * 50) {
                    let name = term(i);
                    index.insert(&shingler.shingles(&name), &name).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(index.len().unwrap(), 400);
    for i in [0, 57, 199, 399] {
        let name = term(i);
        let hits = index.query(&shingler.shingles(&name), 0.99).unwrap();
        assert!(hits.contains(&name), "{name} not found after concurrent insert");
    }
}

#[test]
fn racing_inserts_of_one_id_admit_exactly_one() {
    let index = Arc::new(LshIndex::new(IndexConfig::default()).unwrap());
    let barrier = Arc::new(Barrier::new(16));

    let racers: Vec<_> = (0..16)
        .map(|i| {
            let index = Arc::clone(&index);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let shingles = vec![format!("variant-{i}"), "shared".to_string()];
                barrier.wait();
                index.insert(&shingles, "contested")
            })
        })
        .collect();

    let results: Vec<_> = racers.into_iter().map(|r| r.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results.iter().filter(|r| r.is_err()).all(|r| matches!(
        r,
        Err(IndexError::DuplicateDocument { doc_id }) if doc_id == "contested"
    )));
    assert_eq!(index.len().unwrap(), 1);
}

#[test]
fn queries_run_while_inserts_continue() {
    let index = Arc::new(LshIndex::new(IndexConfig::default()).unwrap());
    let shingler = shingler();
    for i in 0..100 {
        let name = term(i);
        index.insert(&shingler.shingles(&name), &name).unwrap();
    }

    let (tx, rx) = mpsc::channel();
    let writer = {
        let index = Arc::clone(&index);
        let shingler = Arc::clone(&shingler);
        thread::spawn(move || {
            for i in 100..300 {
                let name = term(i);
                index.insert(&shingler.shingles(&name), &name).unwrap();
            }
            tx.send(()).unwrap();
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|r| {
            let index = Arc::clone(&index);
            let shingler = Arc::clone(&shingler);
            thread::spawn(move || {
                for i in (r..100).step_by(4) {
                    let name = term(i);
                    let hits = index.query(&shingler.shingles(&name), 0.99).unwrap();
                    assert!(hits.contains(&name));
                }
            })
        })
        .collect();

    for reader in readers {
        reader.join().unwrap();
    }
    rx.recv().unwrap();
    writer.join().unwrap();
    assert_eq!(index.len().unwrap(), 300);
}

#[test]
fn one_pool_serves_several_match_runs() {
    let index = LshIndex::new(IndexConfig::default()).unwrap();
    let shingler = shingler();
    for i in 0..50 {
        let name = term(i);
        index.insert(&shingler.shingles(&name), &name).unwrap();
    }
    let matcher = ShardedMatcher::new(
        Arc::new(index),
        MatchConfig::default().with_shards(6),
        Arc::clone(&shingler),
    )
    .unwrap();

    let pool = Arc::new(TaskPool::new(3).unwrap());
    let runs: Vec<_> = (0..4)
        .map(|run| {
            let pool = Arc::clone(&pool);
            let matcher = matcher.clone();
            thread::spawn(move || {
                let tasks: Vec<MatchTask> = (run * 10..run * 10 + 10)
                    .map(|i| MatchTask::new(term(i)))
                    .collect();
                matcher.run_on(&pool, tasks).unwrap().into_result().unwrap()
            })
        })
        .collect();

    for (run, handle) in runs.into_iter().enumerate() {
        let matches = handle.join().unwrap();
        assert_eq!(matches.len(), 10);
        for i in run * 10..run * 10 + 10 {
            let name = term(i);
            assert!(matches[&name].contains(&name));
        }
    }
}
