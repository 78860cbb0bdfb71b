//! Controller module
//!
//! Headless view-models for each screen. A front end reads their state and
//! forwards user actions to their operations.

mod app;
mod auth_form;
mod session;
mod task_entry;
mod task_list;

pub use app::{App, Screen};
pub use auth_form::{
    AuthForm, AuthMode, FormMessage, RESET_EMAIL_REQUIRED, RESET_EMAIL_SENT, SIGNUP_SUCCESS,
};
pub use session::SessionController;
pub use task_entry::TaskEntry;
pub use task_list::{TaskList, TaskRow, EMPTY_LIST_HINT};
