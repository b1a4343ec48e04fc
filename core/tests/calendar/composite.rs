// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use calsync_core::{CompositeCalendar, Config, DateRange, ItemFilter, StoreError};
use tokio::sync::oneshot;

use crate::common::{Harness, RecordingObserver, ScriptedRemote, item};

fn composite_of(members: &[&Harness]) -> (CompositeCalendar, Arc<RecordingObserver>) {
    let composite = CompositeCalendar::new("all");
    for member in members {
        assert!(composite.add_calendar(member.calendar.clone()));
    }
    let observer = Arc::new(RecordingObserver::default());
    composite.add_observer(observer.clone());
    (composite, observer)
}

#[tokio::test]
async fn duplicate_member_is_rejected() {
    let a = Harness::named("a");
    let (composite, _) = composite_of(&[&a]);

    assert!(!composite.add_calendar(a.calendar.clone()));
    assert_eq!(composite.calendars().len(), 1);
}

#[tokio::test]
async fn synchronize_covers_every_member() {
    // Arrange
    let a = Harness::named("a");
    let b = Harness::named("b");
    a.remote.seed([item("e1", 100)]).await;
    b.remote.seed([item("e2", 100)]).await;
    let (composite, _) = composite_of(&[&a, &b]);

    // Act
    composite.synchronize().await.unwrap();

    // Assert
    let items = composite
        .get_items(ItemFilter::All, &DateRange::all())
        .await
        .unwrap();
    let ids: Vec<_> = items.into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["e1", "e2"]);
}

#[tokio::test]
async fn synchronize_supersedes_member_sync_in_flight() {
    // Arrange
    let a = Harness::named("a");
    let b = Harness::named("b");
    let gate = a.remote.hold_fetches();
    let (tx, rx) = oneshot::channel();
    let superseded = a.calendar.synchronize_with(move |status| {
        let _ = tx.send(status);
    });
    a.remote.fetch_started().await;
    let (composite, _) = composite_of(&[&a, &b]);

    // Act
    gate.add_permits(1);
    composite.synchronize().await.unwrap();

    // Assert - the member's own request is cancelled and exactly one fetch ran
    assert_eq!(rx.await.unwrap(), Err(StoreError::Cancelled));
    assert!(superseded.is_cancelled());
    assert_eq!(a.remote.calls("get_items"), 1);
    assert_eq!(b.remote.calls("get_items"), 1);
}

#[tokio::test]
async fn synchronize_reports_first_member_failure() {
    let a = Harness::named("a");
    let b = Harness::named("b");
    b.remote
        .fail("get_items", StoreError::Unavailable("down".into()));
    let (composite, _) = composite_of(&[&a, &b]);

    let status = composite.synchronize().await;

    assert_eq!(status, Err(StoreError::Unavailable("down".into())));
    assert_eq!(a.remote.calls("get_items"), 1);
}

#[tokio::test]
async fn refresh_fires_one_composite_load() {
    // Arrange
    let a = Harness::named("a");
    let b = Harness::named("b");
    let (composite, observer) = composite_of(&[&a, &b]);

    // Act
    composite.refresh().await.unwrap();

    // Assert
    assert_eq!(observer.count("load:all"), 1);
    assert_eq!(observer.count("load:a"), 0);
    assert_eq!(a.observer.count("load:a"), 1);
    assert_eq!(b.observer.count("load:b"), 1);
}

#[tokio::test]
async fn refresh_skips_disabled_members() {
    let a = Harness::named("a");
    let b = Harness::build(
        ScriptedRemote::new("b"),
        Config {
            disabled: true,
            ..Default::default()
        },
    );
    let (composite, _) = composite_of(&[&a, &b]);

    composite.refresh().await.unwrap();

    assert_eq!(a.observer.count("load:a"), 1);
    assert_eq!(b.observer.count("load:b"), 0);
}

#[tokio::test]
async fn member_item_events_reach_composite_observers() {
    // Arrange
    let a = Harness::named("a");
    let (composite, observer) = composite_of(&[&a]);

    // Act
    a.calendar.add_item(&item("e1", 100)).await.unwrap();
    composite.remove_calendar("a").unwrap();
    a.calendar.add_item(&item("e2", 100)).await.unwrap();

    // Assert
    assert_eq!(observer.events(), vec!["add:e1"]);
    assert!(composite.calendars().is_empty());
}
