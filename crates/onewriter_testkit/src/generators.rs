//! Property-based test generators using proptest.
//!
//! Strategies produce *task plans*: what a submitted task writes and how it
//! ends. Running a plan through a writer and comparing the store against
//! [`expected_state`] checks commit, rollback and result delivery together.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// How a planned task ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Returns `Ok` with this value.
    Succeed(u32),
    /// Returns `Err` with this code.
    Fail(u32),
    /// Panics.
    Panic,
}

/// One planned task: a write to a key, then an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    /// Key the task writes.
    pub key: String,
    /// Value the task writes.
    pub value: Vec<u8>,
    /// How the task ends after writing.
    pub outcome: TaskOutcome,
}

/// Strategy for generating store keys from a small alphabet, so plans
/// overwrite each other's keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d]{1,3}").expect("Invalid regex")
}

/// Strategy for generating values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}

/// Strategy for generating task outcomes, mostly successes.
pub fn task_outcome_strategy() -> impl Strategy<Value = TaskOutcome> {
    prop_oneof![
        6 => any::<u32>().prop_map(TaskOutcome::Succeed),
        3 => any::<u32>().prop_map(TaskOutcome::Fail),
        1 => Just(TaskOutcome::Panic),
    ]
}

/// Strategy for generating a single task plan.
pub fn task_plan_strategy() -> impl Strategy<Value = TaskPlan> {
    (key_strategy(), value_strategy(), task_outcome_strategy())
        .prop_map(|(key, value, outcome)| TaskPlan { key, value, outcome })
}

/// Strategy for generating a sequence of task plans.
pub fn plan_sequence_strategy(
    min_tasks: usize,
    max_tasks: usize,
) -> impl Strategy<Value = Vec<TaskPlan>> {
    prop::collection::vec(task_plan_strategy(), min_tasks..max_tasks)
}

/// The key/value state a store should hold after running `plans` in order
/// as scoped tasks: only successful tasks commit.
pub fn expected_state(plans: &[TaskPlan]) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut state = BTreeMap::new();
    for plan in plans {
        if let TaskOutcome::Succeed(_) = plan.outcome {
            state.insert(plan.key.clone().into_bytes(), plan.value.clone());
        }
    }
    state
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn keys_stay_in_alphabet(key in key_strategy()) {
            prop_assert!(!key.is_empty() && key.len() <= 3);
            prop_assert!(key.chars().all(|c| ('a'..='d').contains(&c)));
        }

        #[test]
        fn expected_state_only_holds_successes(plans in plan_sequence_strategy(0, 20)) {
            let state = expected_state(&plans);
            for (key, value) in &state {
                let last = plans
                    .iter()
                    .rev()
                    .filter(|p| matches!(p.outcome, TaskOutcome::Succeed(_)))
                    .find(|p| p.key.as_bytes() == key.as_slice())
                    .unwrap();
                prop_assert_eq!(&last.value, value);
            }
        }
    }
}
