//! Domain model module declarations.

pub mod agent;
pub mod event;
pub mod plan;
pub mod session;
