//! Concurrent runs sharing one scheduler queue
//!
//! Two runs on one cluster must never count, fill or merge each other's
//! work: each has its own run id, workspace and job-name prefix.

#![cfg(unix)]

mod fixtures;

use std::collections::HashSet;
use std::thread;

use fixtures::{records, Fixture};
use nanopolish_slurm::scheduler::{MockConfig, MockScheduler};
use nanopolish_slurm::workspace::generate_run_id;

#[test]
fn test_run_ids_unique_across_threads() {
    let handles: Vec<_> = (0..8)
        .map(|_| thread::spawn(|| (0..100).map(|_| generate_run_id()).collect::<Vec<_>>()))
        .collect();

    let mut all_ids = HashSet::new();
    for handle in handles {
        for id in handle.join().expect("Thread panicked") {
            assert!(all_ids.insert(id.clone()), "Duplicate run_id generated: {}", id);
        }
    }
    assert_eq!(all_ids.len(), 800);
}

#[test]
fn test_two_runs_share_queue() {
    let scheduler = MockScheduler::with_config(MockConfig {
        polls_until_done: 3,
        ..MockConfig::default()
    });
    // Same region names in both runs; only the prefix tells them apart.
    scheduler.fail_region("c1:100-200");

    let first = Fixture::with_assembly("first.fasta", &["c1:0-100", "c1:100-200"]);
    let second = Fixture::with_assembly("second.fasta", &["c1:0-100", "c1:100-200", "c2:0-50"]);

    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|fixture| {
            let scheduler = scheduler.clone();
            thread::spawn(move || {
                let outcome = fixture.pipeline(&scheduler).run(&fixture.inputs()).unwrap();
                (fixture, outcome)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().expect("run panicked")).collect();

    let (first, first_outcome) = &results[0];
    let (second, second_outcome) = &results[1];
    assert_ne!(first_outcome.run_id, second_outcome.run_id);

    let first_records = records(&first_outcome.final_assembly);
    let second_records = records(&second_outcome.final_assembly);
    assert_eq!(first_records.len(), 2);
    assert_eq!(second_records.len(), 3);
    assert_eq!(first_records[1].1, "N".repeat(100));
    assert_eq!(second_records[2], ("c2:0-50".to_string(), "A".repeat(50)));

    let names = scheduler.submitted_names();
    assert_eq!(names.len(), 5);
    let first_prefix = format!("Nanopolish_{}_", first_outcome.run_id);
    let second_prefix = format!("Nanopolish_{}_", second_outcome.run_id);
    assert_eq!(names.iter().filter(|n| n.starts_with(&first_prefix)).count(), 2);
    assert_eq!(names.iter().filter(|n| n.starts_with(&second_prefix)).count(), 3);

    assert!(first.workspaces().is_empty());
    assert!(second.workspaces().is_empty());
}
