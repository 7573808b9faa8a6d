//! CLI subcommand implementations.

pub mod connect;
pub mod listen;
pub mod send;
pub mod token;
