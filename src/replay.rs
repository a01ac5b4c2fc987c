//! Scenario replay over the command bus.
//!
//! Non-`expect` steps are sent without waiting; an `expect` step asks for a
//! snapshot and drains the events queued up to the answer.

use bus::{Bus, RowFields, TreeCommand, TreeEvent};
use runtime_tree::start_tree_runtime;
use std::sync::Arc;
use std::time::Duration;
use tree::{Schema, Value, ViewSnapshot, ViewSnapshotOptions};
use tree_test_support::diff_lines;
use tree_test_support::scenario::{Row, Scenario, Step};

const SESSION: u64 = 1;
const ANSWER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub view_batches: usize,
    pub mismatches: usize,
    pub errors: usize,
}

pub fn run(scenario: &Scenario, verbose: bool) -> ReplayReport {
    let (bus, cmd_rx) = Bus::connect();
    let handle = start_tree_runtime(cmd_rx, bus.evt_tx.clone());
    let mut report = ReplayReport::default();

    send(
        &bus,
        TreeCommand::Open {
            session_id: SESSION,
            config: scenario.config.tree.clone(),
            partial_data: scenario.config.partial_data,
            rows: row_fields(&scenario.rows),
        },
    );

    for (index, step) in scenario.steps.iter().enumerate() {
        let command = match step {
            Step::Expect { view, counts, .. } => {
                send(&bus, TreeCommand::Snapshot { session_id: SESSION });
                let Some(rows) = drain_until_rows(&bus, verbose, &mut report) else {
                    report.errors += 1;
                    break;
                };
                let actual = ViewSnapshot::new(&rows, ViewSnapshotOptions { counts: *counts });
                println!("-- step {index}\n{actual}");
                if actual.as_lines() != view.as_slice() {
                    report.mismatches += 1;
                    println!("{}", diff_lines(view, actual.as_lines()));
                }
                continue;
            }
            Step::Splice { index, delete, rows } => TreeCommand::Splice {
                session_id: SESSION,
                index: *index,
                delete_count: *delete,
                rows: row_fields(rows),
            },
            Step::Replace { rows } => TreeCommand::Load {
                session_id: SESSION,
                rows: row_fields(rows),
            },
            Step::Set { row, field, value } => TreeCommand::SetField {
                session_id: SESSION,
                row: *row,
                field: Arc::from(field.as_str()),
                value: value.clone(),
            },
            Step::SetView { row, field, value } => TreeCommand::SetViewField {
                session_id: SESSION,
                row: *row,
                field: Arc::from(field.as_str()),
                value: value.clone(),
            },
            Step::Open { row } => opened(*row, true),
            Step::Close { row } => opened(*row, false),
        };
        send(&bus, command);
    }

    send(&bus, TreeCommand::Close { session_id: SESSION });
    let Bus { cmd_tx, evt_rx, .. } = bus;
    drop(cmd_tx);
    if handle.join().is_err() {
        log::error!(target: "tree.runtime", "runtime thread panicked");
        report.errors += 1;
    }
    for event in evt_rx.try_iter() {
        record(event, verbose, &mut report);
    }
    report
}

fn send(bus: &Bus, command: TreeCommand) {
    if bus.cmd_tx.send(command).is_err() {
        log::error!(target: "tree.runtime", "runtime stopped accepting commands");
    }
}

fn opened(row: usize, value: bool) -> TreeCommand {
    TreeCommand::SetField {
        session_id: SESSION,
        row,
        field: Arc::from(Schema::OPENED_NAME),
        value: Value::Bool(value),
    }
}

fn row_fields(rows: &[Row]) -> Vec<RowFields> {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|(name, value)| (Arc::from(name.as_str()), value.clone()))
                .collect()
        })
        .collect()
}

fn drain_until_rows(bus: &Bus, verbose: bool, report: &mut ReplayReport) -> Option<Vec<tree::ViewRow>> {
    loop {
        match bus.evt_rx.recv_timeout(ANSWER_TIMEOUT) {
            Ok(TreeEvent::ViewRows { rows, .. }) => return Some(rows),
            Ok(event) => record(event, verbose, report),
            Err(err) => {
                log::error!(target: "tree.runtime", "no snapshot answer: {err}");
                return None;
            }
        }
    }
}

fn record(event: TreeEvent, verbose: bool, report: &mut ReplayReport) {
    match event {
        TreeEvent::ViewMutations {
            revision,
            mutations,
            ..
        } => {
            report.view_batches += 1;
            if verbose {
                println!("view r{}: {} mutations", revision.0, mutations.len());
                for mutation in &mutations {
                    println!("  {mutation:?}");
                }
            }
        }
        TreeEvent::SourceMutations { mutations, .. } => {
            log::debug!(target: "tree.runtime", "{} engine-originated source edits", mutations.len());
        }
        TreeEvent::ViewRows { .. } => {}
        TreeEvent::Error { error, .. } => {
            report.errors += 1;
            eprintln!("Error: {error}");
        }
    }
}
