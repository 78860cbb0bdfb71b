//! Core library for NoteDown
//!
//! This crate contains everything except the rendering:
//! - Session and task models
//! - Backend traits with a hosted (HTTP) and an in-process implementation
//! - Controllers for the auth form, task list and task entry views

pub mod auth;
pub mod backend;
pub mod controller;
pub mod error;
pub mod task;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
