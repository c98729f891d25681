//! Descriptive analytics over the same record snapshot the budget engine
//! reads. Nothing here feeds back into allocation.

pub mod concentration;
pub mod portfolio;
