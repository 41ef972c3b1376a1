//! Set-valued sub-resource reconciliation.
//!
//! Converges an observed set (tags, attached policies) to a desired set with
//! the minimal number of add/remove calls. The plan is recomputed from fresh
//! backend state on every attempt and never persisted, so re-running a
//! partially applied reconciliation only issues what is still missing.

use std::collections::BTreeSet;
use std::fmt::Debug;

use async_trait::async_trait;
use tracing::debug;

use crate::ApiError;

/// Minimal changes to turn `observed` into `desired`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationPlan<T: Ord> {
    /// `desired − observed`
    pub to_add: BTreeSet<T>,

    /// `observed − desired`
    pub to_remove: BTreeSet<T>,
}

impl<T: Ord + Clone> ReconciliationPlan<T> {
    /// Computes the plan for one reconciliation attempt.
    pub fn compute(observed: &BTreeSet<T>, desired: &BTreeSet<T>) -> Self {
        Self {
            to_add: desired.difference(observed).cloned().collect(),
            to_remove: observed.difference(desired).cloned().collect(),
        }
    }

    /// Returns true if the sets already agree.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    /// Applies the plan to a set in memory: `(observed − to_remove) ∪ to_add`.
    pub fn applied_to(&self, observed: &BTreeSet<T>) -> BTreeSet<T> {
        observed
            .difference(&self.to_remove)
            .chain(self.to_add.iter())
            .cloned()
            .collect()
    }
}

/// A set-valued sub-resource on the backend.
#[async_trait]
pub trait ChildSet<T>: Send + Sync {
    /// Reads the current members.
    async fn members(&self) -> Result<BTreeSet<T>, ApiError>;

    /// Adds one member.
    async fn add(&self, item: &T) -> Result<(), ApiError>;

    /// Removes one member.
    async fn remove(&self, item: &T) -> Result<(), ApiError>;
}

/// Reads the observed set and issues the calls that converge it to `desired`.
///
/// Removals go first so a member replaced under the same key is never
/// present twice.
pub async fn reconcile_set<T, S>(
    set: &S,
    desired: &BTreeSet<T>,
) -> Result<ReconciliationPlan<T>, ApiError>
where
    T: Ord + Clone + Debug + Send + Sync,
    S: ChildSet<T> + ?Sized,
{
    let observed = set.members().await?;
    let plan = ReconciliationPlan::compute(&observed, desired);

    if plan.is_empty() {
        debug!(members = observed.len(), "Set already converged");
        return Ok(plan);
    }

    debug!(
        to_remove = plan.to_remove.len(),
        to_add = plan.to_add.len(),
        "Reconciling set"
    );

    for item in &plan.to_remove {
        set.remove(item).await?;
    }
    for item in &plan.to_add {
        set.add(item).await?;
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Add(u8),
        Remove(u8),
    }

    struct MemorySet {
        members: Mutex<BTreeSet<u8>>,
        calls: Mutex<Vec<Call>>,
    }

    impl MemorySet {
        fn new(members: &[u8]) -> Self {
            Self {
                members: Mutex::new(members.iter().copied().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChildSet<u8> for MemorySet {
        async fn members(&self) -> Result<BTreeSet<u8>, ApiError> {
            Ok(self.members.lock().unwrap().clone())
        }

        async fn add(&self, item: &u8) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(Call::Add(*item));
            self.members.lock().unwrap().insert(*item);
            Ok(())
        }

        async fn remove(&self, item: &u8) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(Call::Remove(*item));
            self.members.lock().unwrap().remove(item);
            Ok(())
        }
    }

    fn set(items: &[u8]) -> BTreeSet<u8> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_plan_difference() {
        let plan = ReconciliationPlan::compute(&set(&[1, 2, 3]), &set(&[3, 4]));
        assert_eq!(plan.to_remove, set(&[1, 2]));
        assert_eq!(plan.to_add, set(&[4]));
    }

    #[tokio::test]
    async fn test_removes_before_adds() {
        let backend = MemorySet::new(&[1, 2]);
        let plan = reconcile_set(&backend, &set(&[2, 3])).await.unwrap();
        assert_eq!(plan.to_remove, set(&[1]));
        assert_eq!(
            *backend.calls.lock().unwrap(),
            vec![Call::Remove(1), Call::Add(3)]
        );
        assert_eq!(*backend.members.lock().unwrap(), set(&[2, 3]));
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let backend = MemorySet::new(&[1]);
        reconcile_set(&backend, &set(&[5, 6])).await.unwrap();
        backend.calls.lock().unwrap().clear();

        let plan = reconcile_set(&backend, &set(&[5, 6])).await.unwrap();
        assert!(plan.is_empty());
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn plan_converges(
            observed in proptest::collection::btree_set(0u8..32, 0..16),
            desired in proptest::collection::btree_set(0u8..32, 0..16),
        ) {
            let plan = ReconciliationPlan::compute(&observed, &desired);
            prop_assert!(plan.to_add.is_disjoint(&plan.to_remove));
            prop_assert_eq!(plan.applied_to(&observed), desired.clone());

            let noop = ReconciliationPlan::compute(&desired, &desired);
            prop_assert!(noop.is_empty());
        }
    }
}
