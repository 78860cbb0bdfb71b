//! Task module
//!
//! This module contains task-related types and the row-store interface.

mod model;
mod repository;

pub use model::*;
pub use repository::TaskRepository;
