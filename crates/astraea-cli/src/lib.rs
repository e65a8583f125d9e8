//! Astraea CLI internals, exposed as a library for integration tests.

pub mod cli;
pub mod commands;
pub mod input;
pub mod logging;
