//! Library to backup and restore a MySQL database.
//!
//! A backup dumps the database with an external client, optionally compresses
//! the dump, mails it to an operator and prunes old artifacts. A restore loads
//! a raw or compressed artifact back into the database.
//! The workflows are driven by the [`orchestrator`] module, the external
//! capabilities live in [`backends`].

#![forbid(unsafe_code)]

pub mod archive;
pub mod backends;
pub mod cli;
pub mod config;
pub mod orchestrator;
pub mod util;
