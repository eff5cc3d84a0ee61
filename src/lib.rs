#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
// easier to use when using the functions as callback of foreign functions
#![allow(clippy::needless_pass_by_value)]

//! Hej, personal notes
//!
//! Notes live in a single `SQLite` table. `hejd` serves them through a GraphQL API next to the
//! frontend, `hej` works on the database file directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod graceful_shutdown;
pub mod notes;
pub mod server;
#[cfg(test)]
mod tests;
mod utils;
