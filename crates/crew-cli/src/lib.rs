//! Crew CLI library surface. The `crew` binary is a thin clap wrapper over
//! these commands; integration tests drive them directly.

pub mod commands;
