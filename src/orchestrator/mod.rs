//! Session orchestration modules.
//!
//! Covers working memory for the current session, event routing from the
//! backend into that memory, stall detection, agent personalities and the
//! deployment facade.

pub mod personality;
pub mod router;
pub mod stall_monitor;
pub mod store;
pub mod team;
