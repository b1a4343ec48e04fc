// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calsync_core::{CacheType, CachedCalendar, Config, NetworkStatus, OfflineFlag, StoreError};

use crate::common::{
    CALENDAR_ID, Harness, ScriptedChangeLog, ScriptedRemote, ScriptedResolver, item,
};

fn change_log_remote(log: ScriptedChangeLog) -> ScriptedRemote {
    ScriptedRemote::new(CALENDAR_ID).with_change_log(log)
}

#[tokio::test]
async fn change_log_replaces_full_fetch() {
    // Arrange
    let h = Harness::build(
        change_log_remote(ScriptedChangeLog::new(vec![item("e1", 100)])),
        Config::default(),
    );
    assert!(h.calendar.supports_change_log());

    // Act
    h.calendar.synchronize().await.unwrap();

    // Assert
    assert_eq!(h.remote.log().replays(), 1);
    assert_eq!(h.remote.calls("get_items"), 0);
    assert_eq!(h.visible_ids().await, vec!["e1"]);
}

#[tokio::test]
async fn change_log_failure_is_reported() {
    let h = Harness::build(
        change_log_remote(ScriptedChangeLog::failing(StoreError::Unavailable(
            "gone".into(),
        ))),
        Config::default(),
    );

    let status = h.calendar.synchronize().await;

    assert_eq!(status, Err(StoreError::Unavailable("gone".into())));
    assert_eq!(h.remote.log().replays(), 1);
}

#[tokio::test]
async fn refresh_plays_back_before_replaying_changes() {
    // Arrange
    let h = Harness::build(
        change_log_remote(ScriptedChangeLog::default()),
        Config::default(),
    );
    let created = item("e1", 100);
    h.seed_created(&created).await;

    // Act
    h.calendar.refresh().await.unwrap();

    // Assert
    assert_eq!(h.remote.trace(), vec!["add:e1"]);
    assert_eq!(h.flag(&created).await, OfflineFlag::None);
    assert_eq!(h.remote.log().replays(), 1);
    assert_eq!(h.observer.count("load:cal"), 1);
}

#[tokio::test]
async fn reset_cache_resets_change_log() {
    let h = Harness::build(
        change_log_remote(ScriptedChangeLog::default()),
        Config::default(),
    );
    h.cache_only(&item("stale", 100)).await;

    h.calendar.reset_cache().await.unwrap();

    assert_eq!(h.remote.log().resets(), 1);
    assert_eq!(h.remote.log().replays(), 1);
    assert!(h.cached("stale").await.is_none());
}

#[tokio::test]
async fn opening_memory_cache_resets_change_log() {
    // Arrange
    let remote = Arc::new(change_log_remote(ScriptedChangeLog::default()));
    let config = Config {
        cache_type: CacheType::Memory,
        ..Default::default()
    };

    // Act
    let calendar = CachedCalendar::open(
        remote.clone(),
        Arc::new(NetworkStatus::new(false)),
        Arc::new(ScriptedResolver::new(true)),
        config,
    )
    .await
    .unwrap();

    // Assert
    assert_eq!(remote.log().resets(), 1);
    assert_eq!(calendar.id(), CALENDAR_ID);
}
