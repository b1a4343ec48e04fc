// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calsync_core::{
    CacheType, CachedCalendar, Config, DateRange, ItemFilter, NetworkStatus, OfflineFlag,
};

use crate::common::{CALENDAR_ID, ScriptedRemote, ScriptedResolver, TempState, item};

async fn open(
    remote: &Arc<ScriptedRemote>,
    network: &Arc<NetworkStatus>,
    config: Config,
) -> Arc<CachedCalendar> {
    CachedCalendar::open(
        remote.clone(),
        network.clone(),
        Arc::new(ScriptedResolver::new(true)),
        config,
    )
    .await
    .unwrap()
}

async fn ids(calendar: &CachedCalendar) -> Vec<String> {
    calendar
        .get_items(ItemFilter::All, &DateRange::all())
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect()
}

#[tokio::test]
async fn full_sync_through_sqlite_cache() {
    // Arrange
    let state = TempState::new();
    let remote = Arc::new(ScriptedRemote::new(CALENDAR_ID));
    remote.seed([item("e1", 100), item("e2", 100)]).await;
    let network = Arc::new(NetworkStatus::new(false));
    let calendar = open(&remote, &network, state.storage_config()).await;

    // Act
    calendar.synchronize().await.unwrap();

    // Assert
    assert_eq!(ids(&calendar).await, vec!["e1", "e2"]);
    assert!(state.path().join("state").join("cache.sqlite").exists());
}

#[tokio::test]
async fn offline_edits_survive_reopening() {
    // Arrange - journal an edit while offline, then drop the calendar
    let state = TempState::new();
    let remote = Arc::new(ScriptedRemote::new(CALENDAR_ID));
    let network = Arc::new(NetworkStatus::new(true));
    let created = item("e1", 100);
    {
        let calendar = open(&remote, &network, state.storage_config()).await;
        calendar.add_item(&created).await.unwrap();
        calendar.unregister().await.unwrap();
    }

    // Act
    let calendar = open(&remote, &network, state.storage_config()).await;

    // Assert - the edit is still pending and is pushed once online
    let flag = calendar
        .cache()
        .get_item_offline_flag(&created)
        .await
        .unwrap();
    assert_eq!(flag, OfflineFlag::Created);

    network.set_offline(false);
    calendar.on_offline_status_changed(false).await.unwrap();
    assert!(remote.get("e1").await.is_some());
    let flag = calendar
        .cache()
        .get_item_offline_flag(&created)
        .await
        .unwrap();
    assert_eq!(flag, OfflineFlag::None);
}

#[tokio::test]
async fn memory_cache_type_is_volatile() {
    let remote = Arc::new(ScriptedRemote::new(CALENDAR_ID));
    let network = Arc::new(NetworkStatus::new(true));
    let config = Config {
        cache_type: CacheType::Memory,
        ..Default::default()
    };

    let calendar = open(&remote, &network, config.clone()).await;
    calendar.add_item(&item("e1", 100)).await.unwrap();
    let reopened = open(&remote, &network, config).await;

    assert_eq!(ids(&calendar).await, vec!["e1"]);
    assert!(ids(&reopened).await.is_empty());
}
