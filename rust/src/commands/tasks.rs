use std::error::Error;

use chrono::{DateTime, NaiveDate, Utc};

use tasklock::tasks::{GeoLocation, Task, TaskPriority};

use super::Context;

pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub category: String,
    pub due: Option<String>,
    pub location: Option<(f64, f64)>,
}

pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub category: Option<String>,
    pub due: Option<String>,
    pub progress: Option<u8>,
}

/// Accepts RFC 3339, or a bare date meaning the end of that day in UTC.
fn parse_due(input: &str) -> Result<i64, String> {
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| format!("invalid due date `{input}` (expected RFC 3339 or YYYY-MM-DD)"))?;
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .ok_or_else(|| format!("invalid due date `{input}`"))?;
    Ok(end_of_day.and_utc().timestamp_millis())
}

fn format_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn summary_line(task: &Task, now: i64) -> String {
    let mark = if task.is_done() { "x" } else { " " };
    let mut line = format!("[{mark}] {}  {}  ({})", task.id, task.title, task.priority);
    if !task.category.is_empty() {
        line.push_str(&format!(" #{}", task.category));
    }
    if task.is_overdue(now) {
        line.push_str("  OVERDUE");
    }
    line
}

pub fn run_add(ctx: &Context, draft: TaskDraft) -> Result<(), Box<dyn Error>> {
    if draft.title.trim().is_empty() {
        return Err("title must not be empty".into());
    }
    let task = Task {
        priority: draft.priority,
        category: draft.category,
        due_date: draft.due.as_deref().map(parse_due).transpose()?,
        location: draft.location.map(|(latitude, longitude)| GeoLocation { latitude, longitude }),
        ..Task::new(draft.title, draft.description)
    };
    let id = ctx.repository()?.add_task(task)?;
    println!("{id}");
    Ok(())
}

pub fn run_list(ctx: &Context, open_only: bool) -> Result<(), Box<dyn Error>> {
    if ctx.credentials.principal()?.is_none() {
        return Err("not signed in. Run `tasklock login` first.".into());
    }
    let now = Utc::now().timestamp_millis();
    let tasks = ctx.repository()?.list_tasks()?;
    let shown: Vec<&Task> = tasks.iter().filter(|task| !(open_only && task.is_done())).collect();
    if shown.is_empty() {
        println!("No tasks.");
    }
    for task in shown {
        println!("{}", summary_line(task, now));
    }
    Ok(())
}

pub fn run_show(ctx: &Context, id: &str) -> Result<(), Box<dyn Error>> {
    let task = ctx
        .repository()?
        .get_task(id)?
        .ok_or_else(|| format!("task {id} not found"))?;
    let now = Utc::now().timestamp_millis();

    println!("{}", summary_line(&task, now));
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
    println!("  created:  {} ({} days ago)", format_millis(task.created_at), task.age_in_days(now));
    if let Some(updated) = task.updated_at {
        println!("  updated:  {}", format_millis(updated));
    }
    if let Some(due) = task.due_date {
        println!("  due:      {}", format_millis(due));
    }
    if task.progress > 0 {
        println!("  progress: {}%", task.progress);
    }
    if let Some(location) = task.location {
        println!("  location: {:.5}, {:.5}", location.latitude, location.longitude);
    }
    Ok(())
}

pub fn run_edit(ctx: &Context, id: &str, changes: TaskChanges) -> Result<(), Box<dyn Error>> {
    let mut repo = ctx.repository()?;
    let mut task = repo.get_task(id)?.ok_or_else(|| format!("task {id} not found"))?;
    if let Some(title) = changes.title {
        task.title = title;
    }
    if let Some(description) = changes.description {
        task.description = description;
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }
    if let Some(category) = changes.category {
        task.category = category;
    }
    if let Some(due) = changes.due {
        task.due_date = Some(parse_due(&due)?);
    }
    if let Some(progress) = changes.progress {
        task.progress = progress;
    }
    repo.update_task(task)?;
    println!("Updated {id}.");
    Ok(())
}

pub fn run_toggle(ctx: &Context, id: &str) -> Result<(), Box<dyn Error>> {
    let task = ctx.repository()?.toggle_completion(id)?;
    let state = if task.is_done() { "done" } else { "open" };
    println!("{} is now {state}.", task.title);
    Ok(())
}

pub fn run_remove(ctx: &Context, id: &str) -> Result<(), Box<dyn Error>> {
    ctx.repository()?.delete_task(id)?;
    println!("Removed {id}.");
    Ok(())
}
