//! One module per run strategy.

pub mod dry_run;
pub mod hook;
pub mod once;
pub mod poll;
