mod common;

use cohort_events::{ChangeEvent, ChannelKey, CollectionKind, EventBus};
use cohort_storage::Store;
use cohort_sync::{MessageLog, SessionUpdate, SyncEngine, TaskList};
use common::{alice, bob, user, Harness};
use futures::StreamExt;
use std::time::Duration;

#[tokio::test]
async fn member_sees_anothers_toggle_without_refetch() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;
    h.add_member(&cohort, &bob()).await;

    let mut a = h.live_session(Some(alice()), &cohort).await;
    let mut b = h.live_session(Some(bob()), &cohort).await;

    let task = a.add_task("Run 5k").await.unwrap();
    assert_eq!(b.next_update().await, Some(Ok(SessionUpdate::Checklist)));
    assert!(!b.tasks()[0].is_completed);

    assert_eq!(a.toggle_task(task.id).await, Ok(true));
    assert_eq!(b.next_update().await, Some(Ok(SessionUpdate::Checklist)));
    assert_eq!(b.tasks().len(), 1);
    assert_eq!(b.tasks()[0].id, task.id);
    assert!(b.tasks()[0].is_completed);

    // a sees its own writes through the same push path.
    while a.tasks().first().map(|t| t.is_completed) != Some(true) {
        a.next_update().await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn each_append_yields_one_sorted_snapshot() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;
    h.add_member(&cohort, &bob()).await;

    let a = h.live_session(Some(alice()), &cohort).await;
    let b = h.live_session(Some(bob()), &cohort).await;

    let engine = SyncEngine::new(h.store.clone(), h.bus.clone());
    let mut feed = engine.subscribe(cohort.id, MessageLog).await.unwrap();
    assert!(feed.next().await.unwrap().unwrap().is_empty());

    let sorted = |items: &[cohort_storage::Message]| {
        items
            .windows(2)
            .all(|pair| (pair[0].timestamp, pair[0].id) <= (pair[1].timestamp, pair[1].id))
    };

    a.send("one").await.unwrap();
    let snapshot = feed.next().await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 1);

    b.send("two").await.unwrap();
    let snapshot = feed.next().await.unwrap().unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(sorted(&snapshot.items));

    a.send("three").await.unwrap();
    let snapshot = feed.next().await.unwrap().unwrap();
    let texts: Vec<_> = snapshot.items.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert!(sorted(&snapshot.items));
    assert_eq!(snapshot.seq, 4);

    // Nothing further is pending.
    let idle = tokio::time::timeout(Duration::from_millis(50), feed.next()).await;
    assert!(idle.is_err());
}

#[tokio::test]
async fn cold_start_delivers_empty_snapshot() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;

    let engine = SyncEngine::new(h.store.clone(), h.bus.clone());
    let mut tasks = engine.subscribe(cohort.id, TaskList).await.unwrap();
    let first = tasks.next().await.unwrap().unwrap();
    assert_eq!(first.seq, 1);
    assert!(first.items.is_empty());
}

#[tokio::test]
async fn switching_cohorts_releases_previous_listeners() {
    let h = Harness::new();
    let first = h.cohort(&alice()).await;
    let second = h.cohort(&alice()).await;

    let mut session = h.session(Some(alice()));
    session.activate(first.id).await.unwrap();
    assert_eq!(h.listeners(first.id), 3);

    session.activate(second.id).await.unwrap();
    assert_eq!(h.listeners(first.id), 0);
    assert_eq!(h.listeners(second.id), 3);
    assert_eq!(session.cohort().unwrap().id, second.id);

    session.close();
    session.close();
    assert_eq!(h.listeners(second.id), 0);
    assert!(!session.is_active());
    assert_eq!(session.next_update().await, None);
}

#[tokio::test]
async fn dropping_session_releases_listeners() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;
    {
        let _session = h.live_session(Some(alice()), &cohort).await;
        assert_eq!(h.listeners(cohort.id), 3);
    }
    assert_eq!(h.listeners(cohort.id), 0);
}

#[tokio::test]
async fn snapshot_in_flight_is_dropped_after_cancel() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;
    let engine = SyncEngine::new(h.store.clone(), h.bus.clone());

    let mut feed = engine.subscribe(cohort.id, MessageLog).await.unwrap();
    feed.next().await.unwrap().unwrap();

    h.store
        .append_message(
            &cohort.id,
            &cohort_storage::NewMessage {
                text: "in flight".to_string(),
                sender_id: user("alice"),
                sender_name: "Alice".to_string(),
            },
        )
        .await
        .unwrap();

    feed.cancel();
    feed.cancel();
    assert!(feed.next().await.is_none());
    assert_eq!(
        h.bus
            .subscriber_count(&ChannelKey::new(cohort.id, CollectionKind::Messages)),
        0
    );
}

#[tokio::test]
async fn resync_after_lag_reloads_full_state() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;
    let engine = SyncEngine::new(h.store.clone(), h.bus.clone());
    let mut tasks = engine.subscribe(cohort.id, TaskList).await.unwrap();
    tasks.next().await.unwrap().unwrap();

    h.bus
        .publish(
            &ChannelKey::new(cohort.id, CollectionKind::Tasks),
            ChangeEvent::resync(CollectionKind::Tasks),
        )
        .await
        .unwrap();
    let reloaded = tasks.next().await.unwrap().unwrap();
    assert_eq!(reloaded.seq, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_lose_nobody() {
    let h = Harness::new();
    let cohort = h.cohort(&alice()).await;

    let mut joins = Vec::new();
    for n in 0..8 {
        let identity = cohort_sync::Identity::new(format!("user-{n}"), format!("User {n}"));
        let mut session = h.session(Some(identity));
        let id = cohort.id;
        joins.push(tokio::spawn(async move {
            session.activate(id).await.unwrap();
            session.join().await
        }));
    }
    for join in joins {
        assert_eq!(join.await.unwrap(), Ok(true));
    }

    let members = h.store.get_cohort(&cohort.id).await.unwrap().members;
    assert_eq!(members.len(), 9);
    assert!(members.contains(&user("alice")));
    for n in 0..8 {
        assert!(members.contains(&user(&format!("user-{n}"))));
    }
}
