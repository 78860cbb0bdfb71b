//! Line commands typed at the prompt

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Auth screen
    Email(String),
    Password(String),
    Submit,
    Switch,
    Forgot,
    Dismiss,

    // Task screen
    Add(String),
    Toggle(usize),
    Delete(usize),
    Edit(usize),
    Text(String),
    Save,
    Cancel,
    Reload,
    Logout,

    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command '{0}', type 'help' for a list")]
    Unknown(String),

    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a row number")]
    BadRow(String),
}

impl Command {
    /// Parse a trimmed input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Result<Self, ParseError>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        Some(Self::from_parts(&word.to_ascii_lowercase(), rest))
    }

    fn from_parts(word: &str, rest: &str) -> Result<Self, ParseError> {
        let text = |name: &'static str| {
            if rest.is_empty() {
                Err(ParseError::MissingArgument(name))
            } else {
                Ok(rest.to_string())
            }
        };
        let row = |name: &'static str| {
            if rest.is_empty() {
                return Err(ParseError::MissingArgument(name));
            }
            match rest.parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ParseError::BadRow(rest.to_string())),
            }
        };

        Ok(match word {
            // Blank values clear the field
            "email" => Command::Email(rest.to_string()),
            "password" => Command::Password(rest.to_string()),
            "submit" => Command::Submit,
            "switch" => Command::Switch,
            "forgot" => Command::Forgot,
            "dismiss" => Command::Dismiss,
            "add" => Command::Add(text("add")?),
            "toggle" => Command::Toggle(row("toggle")?),
            "delete" => Command::Delete(row("delete")?),
            "edit" => Command::Edit(row("edit")?),
            "text" => Command::Text(rest.to_string()),
            "save" => Command::Save,
            "cancel" => Command::Cancel,
            "reload" => Command::Reload,
            "logout" => Command::Logout,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        })
    }
}

pub const AUTH_HELP: &str = "\
  email <address>     set the email field
  password <secret>   set the password field
  submit              log in or sign up
  switch              toggle between login and sign-up
  forgot              send a password reset email
  dismiss             hide the current message";

pub const TASK_HELP: &str = "\
  add <title>         add a task
  toggle <n>          mark task n done or not done
  delete <n>          delete task n
  edit <n>            start editing task n
  text <title>        set the text being edited or added
  save                save the edit, or add the typed text
  cancel              stop editing
  reload              fetch the list again
  logout              sign out";

pub const COMMON_HELP: &str = "\
  help                show this list
  quit                leave";
