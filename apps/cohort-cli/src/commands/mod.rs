pub mod cohort;
pub mod demo;
pub mod identity;
pub mod task;

pub use cohort::{cmd_create, cmd_join, cmd_link, cmd_list, cmd_send, cmd_show};
pub use demo::cmd_demo;
pub use identity::{cmd_login, cmd_logout, cmd_whoami};
pub use task::{cmd_task_add, cmd_task_toggle};

use cohort_storage::{Message, Task};

pub(crate) fn print_message(message: &Message) {
    println!(
        "  [{}] {}: {}",
        message.timestamp.format("%Y-%m-%d %H:%M"),
        message.sender_name,
        message.text
    );
}

pub(crate) fn print_task(task: &Task) {
    let mark = if task.is_completed { "x" } else { " " };
    println!("  [{}] {} ({})", mark, task.text, task.id);
}
