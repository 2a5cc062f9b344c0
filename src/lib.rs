//! rutina - weekly workout planner and session tracker
//!
//! Plans map muscle groups to training days and chosen exercises. They travel
//! as compressed share links, or live as routines in a local database once an
//! owner signs in.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod db;
pub mod plan;
pub mod repository;
pub mod session;
pub mod sync;
pub mod template;
pub mod tui;

pub use plan::{MuscleGroup, Mutation, Plan, Weekday};
pub use repository::{Routine, RoutineRepository};
