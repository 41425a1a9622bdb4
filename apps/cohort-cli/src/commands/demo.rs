//! Two members sharing one in-memory store, printing what each one's
//! session receives as writes land.

use super::{print_message, print_task};
use chrono::Duration;
use cohort_config::SyncConfig;
use cohort_events_memory::MemoryEventBus;
use cohort_store_memory::MemoryStore;
use cohort_sync::{
    create_cohort, sign_in, watch_my_cohorts, Clock, CohortSession, Identity,
    MemoryIdentityProvider, NewCohort, SessionUpdate, SyncEngine, SystemClock,
};
use futures::StreamExt;
use std::sync::Arc;

const QUIET: std::time::Duration = std::time::Duration::from_millis(50);

pub async fn cmd_demo(config: &SyncConfig) -> Result<(), Box<dyn std::error::Error>> {
    let bus = Arc::new(MemoryEventBus::with_capacity(config.event_capacity));
    let store = Arc::new(MemoryStore::new(bus.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ana = Identity::new("ana", "Ana");
    let ben = Identity::new("ben", "Ben");
    for identity in [&ana, &ben] {
        sign_in(&MemoryIdentityProvider::with_account(identity.clone()), &*store).await?;
    }

    let cohort = create_cohort(
        &*store,
        Some(&ana),
        &*clock,
        NewCohort {
            name: "30-day writing streak".to_string(),
            goal: "Write 500 words every day".to_string(),
            ends_at: clock.now() + Duration::days(30),
        },
    )
    .await?;

    let session_for = |identity: &Identity| {
        CohortSession::new(
            SyncEngine::new(store.clone(), bus.clone()),
            Arc::new(MemoryIdentityProvider::signed_in(identity.clone())),
            clock.clone(),
            config.clone(),
        )
    };
    let mut a = session_for(&ana);
    let mut b = session_for(&ben);
    for session in [&mut a, &mut b] {
        session.activate(cohort.id).await?;
        session.await_initial_snapshots().await?;
    }

    println!("✓ {} created \"{}\"", ana.display_name, cohort.name);
    println!("  {}", a.share_text()?);
    println!("  {}", a.join_link()?);
    if let Some(left) = a.countdown()?.boxed().next().await {
        println!("  Time left: {}", left);
    }

    let directory = SyncEngine::new(store.clone(), bus.clone());
    let mut bens_cohorts = watch_my_cohorts(&directory, Some(&ben), clock.clone()).await?;
    if let Some(listing) = bens_cohorts.next().await {
        println!("  [{}] my cohorts: {}", ben.display_name, listing?.len());
    }

    println!("\n{} joins", ben.display_name);
    b.join().await?;
    drain(&mut a, &ana).await;
    if let Ok(Some(listing)) = tokio::time::timeout(QUIET, bens_cohorts.next()).await {
        for entry in listing?.items {
            println!(
                "  [{}] my cohorts: {} ({})",
                ben.display_name, entry.cohort.name, entry.gate
            );
        }
    }

    println!("\n{} posts", ana.display_name);
    a.send("Day 1 done: 612 words").await?;
    drain(&mut b, &ben).await;

    println!("\n{} adds a task", ben.display_name);
    let task = b.add_task("Pick a title").await?;
    drain(&mut a, &ana).await;

    println!("\n{} ticks it off", ana.display_name);
    a.toggle_task(task.id).await?;
    drain(&mut b, &ben).await;

    a.close();
    b.close();
    Ok(())
}

/// Print every snapshot `session` receives until it goes quiet.
async fn drain(session: &mut CohortSession, who: &Identity) {
    while let Ok(Some(update)) = tokio::time::timeout(QUIET, session.next_update()).await {
        match update {
            Ok(SessionUpdate::Cohort) => {
                if let Some(cohort) = session.cohort() {
                    println!("  [{}] cohort: {} members", who.display_name, cohort.member_count());
                }
            }
            Ok(SessionUpdate::Feed) => {
                println!("  [{}] feed:", who.display_name);
                for message in session.messages() {
                    print_message(message);
                }
            }
            Ok(SessionUpdate::Checklist) => {
                println!("  [{}] checklist:", who.display_name);
                for task in session.tasks() {
                    print_task(task);
                }
            }
            Err(e) => println!("  [{}] sync error: {}", who.display_name, e),
        }
    }
}
