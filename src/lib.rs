//! Weekly school timetables as a constrained optimization problem.
//!
//! A document of classes, subjects and teachers goes through
//! [`validate`] → [`model`] → [`solver`] → [`extract`]; [`engine`] runs the
//! whole pipeline and [`server`] exposes it over HTTP.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fixtures;
pub mod import;
pub mod intake;
pub mod model;
pub mod render;
pub mod server;
pub mod solver;
pub mod validate;

#[cfg(test)]
mod testing;

pub use engine::{Engine, SolveRequest};
pub use error::{Result, TimetableError};
