//! Cross-crate integration test helpers.
//!
//! Runs task plans through a real writer against a real store, and keeps
//! the state the store is expected to hold for later verification.

use crate::fixtures::{MemStore, TestStore};
use crate::generators::{TaskOutcome, TaskPlan};
use onewriter_core::{WriteError, WriteResult};
use onewriter_store::MemoryBackend;
use std::collections::BTreeMap;

/// Error a planned task fails with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedFailure(pub u32);

impl std::fmt::Display for PlannedFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "planned failure {}", self.0)
    }
}

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The store and writer under test.
    pub fixture: TestStore<MemoryBackend>,
    /// Expected committed state.
    expected: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Default for IntegrationHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl IntegrationHarness {
    /// Creates a harness over a fresh in-memory store.
    pub fn new() -> Self {
        Self {
            fixture: TestStore::memory(),
            expected: BTreeMap::new(),
        }
    }

    /// Returns the store under test.
    pub fn store(&self) -> &MemStore {
        &self.fixture.store
    }

    /// Submits `plan` as a scoped task and checks the result matches the
    /// plan's outcome.
    ///
    /// Panics if the writer reports anything other than the planned result.
    pub fn run(&mut self, plan: &TaskPlan) -> WriteResult<u32, PlannedFailure> {
        let key = plan.key.clone();
        let value = plan.value.clone();
        let outcome = plan.outcome;

        let result = self.fixture.writer.submit_scoped(&self.fixture.store, move |ctx| {
            let txn = ctx.txn().expect("scoped task without transaction");
            txn.put(key, value).expect("put failed");
            match outcome {
                TaskOutcome::Succeed(v) => Ok(v),
                TaskOutcome::Fail(code) => Err(PlannedFailure(code)),
                TaskOutcome::Panic => panic!("planned panic"),
            }
        });

        match (&plan.outcome, &result) {
            (TaskOutcome::Succeed(v), Ok(got)) => {
                assert_eq!(v, got, "result mismatch for {:?}", plan);
                self.expected
                    .insert(plan.key.clone().into_bytes(), plan.value.clone());
            }
            (TaskOutcome::Fail(code), Err(WriteError::Task(PlannedFailure(got)))) => {
                assert_eq!(code, got, "error mismatch for {:?}", plan);
            }
            (TaskOutcome::Panic, Err(WriteError::Panicked(_))) => {}
            _ => panic!("unexpected result {:?} for {:?}", result, plan),
        }

        result
    }

    /// Runs every plan in order.
    pub fn run_all(&mut self, plans: &[TaskPlan]) {
        for plan in plans {
            let _ = self.run(plan);
        }
    }

    /// Verifies the store holds exactly the expected committed state.
    pub fn verify_all(&self) {
        let store = self.store();
        assert_eq!(store.len(), self.expected.len(), "live key count mismatch");
        for (key, expected) in &self.expected {
            assert_eq!(
                store.get(key).as_ref(),
                Some(expected),
                "value mismatch for {:?}",
                String::from_utf8_lossy(key)
            );
        }
        assert!(!store.is_writer_open(), "a transaction was left open");
    }

    /// Returns the count of tracked keys.
    pub fn tracked_count(&self) -> usize {
        self.expected.len()
    }
}
