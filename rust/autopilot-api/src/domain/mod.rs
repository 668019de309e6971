//! Core domain models.
//!
//! Schedules, articles, projects, generated content and credit balances.

pub mod article;
pub mod content;
pub mod credits;
pub mod project;
pub mod schedule;

pub use article::*;
pub use content::*;
pub use credits::*;
pub use project::*;
pub use schedule::*;
