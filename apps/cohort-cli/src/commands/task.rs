use super::print_task;
use crate::context::{parse_task_id, Context};

pub async fn cmd_task_add(
    ctx: &Context,
    cohort_id: &str,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = ctx.open_session(cohort_id).await?;
    let task = session.add_task(text).await?;
    println!("✓ Task added");
    print_task(&task);
    Ok(())
}

pub async fn cmd_task_toggle(
    ctx: &Context,
    cohort_id: &str,
    task_id: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let task_id = parse_task_id(task_id)?;
    let session = ctx.open_session(cohort_id).await?;
    let done = session.toggle_task(task_id).await?;
    println!(
        "✓ Task marked {}",
        if done { "done" } else { "not done" }
    );
    Ok(())
}
