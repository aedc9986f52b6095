use colored::*;
use events::{ConnectionError, ProjectChange, RoomPresence, TaskChange, TaskUpdate};
use realtime::ConnectionStatus;

pub fn print_step(message: &str) {
    println!("{} {}", "→".blue(), message);
}

pub fn print_ok(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_status(status: ConnectionStatus) {
    let label = match status {
        ConnectionStatus::Online => status.to_string().green().bold(),
        ConnectionStatus::Disconnected => status.to_string().red().bold(),
    };
    println!("{} {}", "●".bright_white(), label);
}

pub fn print_connection_error(error: &ConnectionError) {
    println!(
        "{} {}: {}",
        "✗".red(),
        error.kind.to_string().red(),
        error.message
    );
}

pub fn print_task_change(change: &TaskChange) {
    println!(
        "{} task {} {} by {}",
        format!("[{}]", change.timestamp.format("%H:%M:%S")).dimmed(),
        change.task_gid.cyan(),
        change.change_type.yellow(),
        change.changed_by.name
    );
}

pub fn print_task_update(update: &TaskUpdate) {
    println!(
        "{} task {} {} edited live by {}",
        format!("[{}]", update.timestamp.format("%H:%M:%S")).dimmed(),
        update.task_gid.cyan(),
        update.update_type.yellow(),
        update.updated_by.name
    );
}

pub fn print_project_change(change: &ProjectChange) {
    println!(
        "{} project {} {} by {}",
        format!("[{}]", change.timestamp.format("%H:%M:%S")).dimmed(),
        change.project_gid.magenta(),
        change.change_type.yellow(),
        change.changed_by.name
    );
}

pub fn print_presence(presence: &RoomPresence, joined: bool) {
    let verb = if joined { "joined".green() } else { "left".red() };
    println!(
        "{} {} {} project {}",
        "👤".normal(),
        presence.user_name.bold(),
        verb,
        presence.project_gid.magenta()
    );
}

pub fn print_typing(target_gid: &str, field: &str, summary: Option<&str>) {
    match summary {
        Some(summary) => println!(
            "{} {} ({} on {})",
            "✎".bright_blue(),
            summary.italic(),
            field,
            target_gid.cyan()
        ),
        None => println!(
            "{} {}",
            "✎".dimmed(),
            format!("nobody is typing in {} on {}", field, target_gid).dimmed()
        ),
    }
}
