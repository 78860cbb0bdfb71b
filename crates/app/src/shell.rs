//! Interactive prompt
//!
//! Reads one command per line from stdin and redraws the screen after every
//! command and whenever the session changes underneath us.

use std::io::Write as _;

use notedown_core::controller::{App, AuthForm, Screen, TaskList};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::command::{Command, AUTH_HELP, COMMON_HELP, TASK_HELP};
use crate::render;

pub async fn run(app: &mut App) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut session = app.session_controller().watch();
    let mut watching = true;

    draw(app, None)?;
    loop {
        let notice = tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("stdin closed");
                    break;
                };
                match Command::parse(&line) {
                    None => None,
                    Some(Err(e)) => Some(e.to_string()),
                    Some(Ok(Command::Quit)) => break,
                    Some(Ok(Command::Help)) => Some(help(app.screen())),
                    Some(Ok(command)) => handle(app, command).await.err(),
                }
            }
            changed = session.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                }
                app.sync().await;
                None
            }
        };
        draw(app, notice.as_deref())?;
    }
    Ok(())
}

fn draw(app: &App, notice: Option<&str>) -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout)?;
    write!(stdout, "{}", render::screen(app))?;
    if let Some(notice) = notice {
        writeln!(stdout, "! {}", notice)?;
    }
    write!(stdout, "> ")?;
    stdout.flush()
}

fn help(screen: Screen) -> String {
    let specific = match screen {
        Screen::Loading => "",
        Screen::SignedOut => AUTH_HELP,
        Screen::SignedIn => TASK_HELP,
    };
    format!("Commands:\n{}\n{}", specific, COMMON_HELP)
}

async fn handle(app: &mut App, command: Command) -> Result<(), String> {
    match app.screen() {
        Screen::Loading => Err("Still loading, try again in a moment".into()),
        Screen::SignedOut => handle_auth(app.auth_form_mut(), command).await,
        Screen::SignedIn => handle_tasks(app, command).await,
    }
}

async fn handle_auth(form: &mut AuthForm, command: Command) -> Result<(), String> {
    match command {
        Command::Email(email) => form.set_email(email),
        Command::Password(password) => form.set_password(password),
        Command::Submit => form.submit().await,
        Command::Switch => form.toggle_mode(),
        Command::Forgot if form.offers_password_reset() => form.reset_password().await,
        Command::Forgot => return Err("Password reset is only offered on the login form".into()),
        Command::Dismiss => form.clear_message(),
        _ => return Err("Log in first, or type 'help'".into()),
    }
    Ok(())
}

async fn handle_tasks(app: &mut App, command: Command) -> Result<(), String> {
    match command {
        Command::Logout => {
            if !app.logout().await {
                return Err("Logout failed".into());
            }
        }
        Command::Add(title) => {
            if let Some(entry) = app.task_entry_mut() {
                entry.set_title(title);
            }
            if !app.submit_entry().await {
                return Err("Task was not added".into());
            }
        }
        Command::Text(text) => {
            if is_editing(app) {
                loaded(app)?.set_edit_text(text);
            } else if let Some(entry) = app.task_entry_mut() {
                entry.set_title(text);
            }
        }
        Command::Save => {
            let saved = if is_editing(app) {
                loaded(app)?.confirm_edit().await
            } else {
                app.submit_entry().await
            };
            if !saved {
                return Err("Nothing was saved".into());
            }
        }
        Command::Toggle(n) => {
            let list = loaded(app)?;
            let row = row(list, n)?;
            if !list.toggle_complete(&row.id, row.completed).await {
                return Err(format!("Task {} was not updated", n));
            }
        }
        Command::Delete(n) => {
            let list = loaded(app)?;
            let row = row(list, n)?;
            if !row.can_delete {
                return Err(format!("Task {} is being edited", n));
            }
            if !list.delete(&row.id).await {
                return Err(format!("Task {} was not deleted", n));
            }
        }
        Command::Edit(n) => {
            let list = loaded(app)?;
            let row = row(list, n)?;
            if row.completed {
                return Err("Completed tasks cannot be edited".into());
            }
            if !row.can_edit {
                return Err(format!("Task {} is being edited", n));
            }
            list.start_edit(&row.id);
        }
        Command::Cancel => loaded(app)?.cancel_edit(),
        Command::Reload => loaded(app)?.load().await,
        _ => return Err("Not available while logged in, type 'help'".into()),
    }
    Ok(())
}

fn is_editing(app: &App) -> bool {
    app.task_list().map_or(false, |list| list.editing().is_some())
}

fn loaded(app: &mut App) -> Result<&mut TaskList, String> {
    app.task_list_mut()
        .ok_or_else(|| "Tasks are not loaded yet".to_string())
}

/// What row `n` (1-based) shows and allows
struct RowTarget {
    id: String,
    completed: bool,
    can_edit: bool,
    can_delete: bool,
}

fn row(list: &TaskList, n: usize) -> Result<RowTarget, String> {
    n.checked_sub(1)
        .and_then(|i| list.rows().get(i).map(|row| RowTarget {
            id: row.task.id.clone(),
            completed: row.task.completed,
            can_edit: row.can_edit,
            can_delete: row.can_delete,
        }))
        .ok_or_else(|| format!("There is no task {}", n))
}
