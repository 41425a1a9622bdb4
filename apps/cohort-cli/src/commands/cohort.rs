use super::{print_message, print_task};
use crate::context::Context;
use chrono::{DateTime, Utc};
use cohort_sync::{create_cohort, join_url, list_my_cohorts, NewCohort, SyncError};

pub async fn cmd_create(
    ctx: &Context,
    name: &str,
    goal: &str,
    ends: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ends_at = DateTime::parse_from_rfc3339(ends)
        .map_err(|e| SyncError::Invalid(format!("end time '{}': {}", ends, e)))?
        .with_timezone(&Utc);

    let identity = ctx.current_user();
    let cohort = create_cohort(
        &*ctx.store,
        identity.as_ref(),
        &*ctx.clock,
        NewCohort {
            name: name.to_string(),
            goal: goal.to_string(),
            ends_at,
        },
    )
    .await?;

    println!("✓ Cohort created: {}", cohort.name);
    println!("  ID: {}", cohort.id);
    println!("  Ends: {}", cohort.ends_at.to_rfc3339());
    println!("  Invite: {}", join_url(&ctx.config.origin, &cohort.id));
    Ok(())
}

pub async fn cmd_list(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let identity = ctx.current_user();
    if identity.is_none() {
        println!("Not signed in. Run 'cohort login --name <name>' first.");
        return Ok(());
    }

    let cohorts = list_my_cohorts(&*ctx.store, identity.as_ref(), &*ctx.clock).await?;
    if cohorts.is_empty() {
        println!("No cohorts found.");
    } else {
        println!("Cohorts:");
        for listing in cohorts {
            let members = if listing.cohort.member_count() == 1 {
                "1 member".to_string()
            } else {
                format!("{} members", listing.cohort.member_count())
            };
            println!(
                "  {} ({}, {}) {}",
                listing.cohort.name, members, listing.gate, listing.cohort.id
            );
        }
    }
    Ok(())
}

pub async fn cmd_show(ctx: &Context, cohort_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.open_session(cohort_id).await?;
    let status = session.status()?;
    let Some(cohort) = session.cohort() else {
        return Err(SyncError::NotFound.into());
    };

    println!("{}", cohort.name);
    println!("  Goal: {}", cohort.goal);
    println!("  Time left: {}", status.remaining);
    println!("  Members: {}", status.member_count);
    if !status.signed_in {
        println!("  You are browsing as a guest.");
    } else if !status.is_member {
        println!("  You are not a member. Run 'cohort join {}'.", cohort.id);
    } else if !status.can_write {
        println!("  This cohort has ended and is read-only.");
    }

    println!("Messages:");
    if session.messages().is_empty() {
        println!("  (none)");
    }
    for message in session.messages() {
        print_message(message);
    }

    println!("Tasks:");
    if session.tasks().is_empty() {
        println!("  (none)");
    }
    for task in session.tasks() {
        print_task(task);
    }
    Ok(())
}

pub async fn cmd_join(ctx: &Context, cohort_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = ctx.open_session(cohort_id).await?;
    if session.join().await? {
        println!("✓ Joined cohort");
    } else {
        println!("Already a member.");
    }
    Ok(())
}

pub async fn cmd_send(
    ctx: &Context,
    cohort_id: &str,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.open_session(cohort_id).await?;
    let message = session.send(text).await?;
    println!("✓ Message sent");
    print_message(&message);
    Ok(())
}

pub async fn cmd_link(ctx: &Context, cohort_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.open_session(cohort_id).await?;
    println!("{}", session.join_link()?);
    println!("{}", session.share_text()?);
    Ok(())
}
