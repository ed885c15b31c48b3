use std::sync::Arc;

use rankpoint_back::{
    config::AppConfig,
    dao::balance_store::{BalanceStore, InMemoryBalanceStore},
    state::cache::{BalanceCache, CacheError},
};
use uuid::Uuid;

fn cache_over(store: &InMemoryBalanceStore) -> BalanceCache {
    let table = Arc::new(AppConfig::default().threshold_table().unwrap());
    BalanceCache::new(Arc::new(store.clone()) as Arc<dyn BalanceStore>, table, None)
}

#[tokio::test]
async fn balances_survive_close_and_reopen() {
    let store = InMemoryBalanceStore::new();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

    let cache = cache_over(&store);
    cache
        .with_balance(alice, |balance| balance.add_points(650))
        .await
        .unwrap()
        .unwrap();
    cache
        .with_balance(bob, |balance| balance.add_points(40))
        .await
        .unwrap()
        .unwrap();
    cache.close().await.unwrap();

    assert!(cache.is_closed().await);
    assert!(matches!(
        cache.with_balance(alice, |balance| balance.points()).await,
        Err(CacheError::Closed)
    ));
    assert_eq!(store.get(alice), Some(650));
    assert_eq!(store.get(bob), Some(40));

    let reopened = cache_over(&store);
    let (points, tier) = reopened
        .with_balance(alice, |balance| {
            (balance.points(), balance.tier_name().to_string())
        })
        .await
        .unwrap();
    assert_eq!(points, 650);
    assert_eq!(tier, "Veteran");
    assert!(!reopened.is_loaded(bob).await);
}

#[tokio::test]
async fn closing_twice_is_harmless() {
    let store = InMemoryBalanceStore::new();
    let cache = cache_over(&store);
    cache
        .with_balance(Uuid::nil(), |balance| balance.set_points(5))
        .await
        .unwrap()
        .unwrap();

    cache.close().await.unwrap();
    cache.close().await.unwrap();
    assert_eq!(store.get(Uuid::nil()), Some(5));
}
