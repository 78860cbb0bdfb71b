//! Plain-text rendering of the current screen

use std::fmt::Write;

use notedown_core::controller::{
    App, AuthForm, Screen, TaskEntry, TaskList, TaskRow, EMPTY_LIST_HINT,
};

const STRIKE_ON: &str = "\x1b[9m";
const STRIKE_OFF: &str = "\x1b[0m";

pub fn screen(app: &App) -> String {
    match app.screen() {
        Screen::Loading => "Loading...\n".to_string(),
        Screen::SignedOut => auth_form(app.auth_form()),
        Screen::SignedIn => {
            let email = app
                .session()
                .and_then(|s| s.user.email)
                .unwrap_or_default();
            match (app.task_list(), app.task_entry()) {
                (Some(list), Some(entry)) => tasks(&email, list, entry),
                _ => "Loading...\n".to_string(),
            }
        }
    }
}

pub fn auth_form(form: &AuthForm) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", form.submit_label());
    let _ = writeln!(out, "Email:    {}", form.email());
    let _ = writeln!(out, "Password: {}", "*".repeat(form.password().chars().count()));

    if let Some(message) = form.message() {
        let tag = if message.is_error { "error" } else { "info" };
        let _ = writeln!(out, "[{}] {}  (dismiss)", tag, message.text);
    }
    if form.is_loading() {
        out.push_str("...\n");
    }

    let _ = write!(out, "submit: {} | switch: {}", form.submit_label(), form.toggle_label());
    if form.offers_password_reset() {
        out.push_str(" | forgot: Forgot password?");
    }
    out.push('\n');
    out
}

pub fn tasks(email: &str, list: &TaskList, entry: &TaskEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== Tasks for {} ==  (logout)", email);

    let action = if entry.editing().is_some() { "Update" } else { "Add" };
    let _ = writeln!(out, "New task: {}  [{}]", entry.title(), action);

    if list.shows_loading_indicator() {
        out.push_str("Loading tasks...\n");
        return out;
    }

    let rows = list.rows();
    if rows.is_empty() {
        let _ = writeln!(out, "{}", EMPTY_LIST_HINT);
        return out;
    }
    let draft = list.editing().map(|e| e.title.as_str()).unwrap_or_default();
    for (i, row) in rows.iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {}", i + 1, task_row(row, draft));
    }
    out
}

fn task_row(row: &TaskRow<'_>, draft: &str) -> String {
    let check = if row.task.completed { "[x]" } else { "[ ]" };
    if row.editing {
        return format!("{} > {}  (save | cancel)", check, draft);
    }

    let title = if row.task.completed {
        format!("{}{}{}", STRIKE_ON, row.task.title, STRIKE_OFF)
    } else {
        row.task.title.clone()
    };
    let actions = match (row.can_edit, row.can_delete) {
        (true, true) => "  (edit | delete)",
        (false, true) => "  (delete)",
        (true, false) => "  (edit)",
        (false, false) => "",
    };
    format!("{} {}{}", check, title, actions)
}
