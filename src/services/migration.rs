//! Copy balances between two backends.

use std::collections::HashMap;

use tracing::info;

use crate::dao::{balance_store::BalanceStore, storage::StorageResult};

/// Copy every balance held by `source` into `target`. Returns the number copied.
///
/// Entries already present in `target` are overwritten; others are left alone.
pub async fn copy_balances(source: &dyn BalanceStore, target: &dyn BalanceStore) -> StorageResult<usize> {
    let balances = source.load_all().await?;
    if balances.is_empty() {
        return Ok(0);
    }

    let batch: HashMap<_, _> = balances
        .into_iter()
        .map(|entity| (entity.id, entity.points))
        .collect();
    let count = batch.len();
    target.save_points(batch).await?;
    info!(count, "copied balances to target store");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::dao::balance_store::InMemoryBalanceStore;

    #[tokio::test]
    async fn copies_everything_and_keeps_unrelated_entries() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let source = InMemoryBalanceStore::with_balances([(a, 10), (b, 20)]);
        let target = InMemoryBalanceStore::with_balances([(a, 1), (c, 3)]);

        assert_eq!(copy_balances(&source, &target).await.unwrap(), 2);
        assert_eq!(target.get(a), Some(10));
        assert_eq!(target.get(b), Some(20));
        assert_eq!(target.get(c), Some(3));
    }

    #[tokio::test]
    async fn empty_source_is_a_no_op() {
        let target = InMemoryBalanceStore::new();
        assert_eq!(
            copy_balances(&InMemoryBalanceStore::new(), &target).await.unwrap(),
            0
        );
        assert!(target.is_empty());
    }
}
