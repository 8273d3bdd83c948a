//! Filesystem utilities for roster.

pub mod atomic;

pub use atomic::{atomic_create, atomic_write};
