//! Repository implementations for database operations

pub mod participants;

pub use participants::*;
