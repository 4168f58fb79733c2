//! Small helpers shared by the backup and restore workflows.

pub mod filename;
pub mod retention;
