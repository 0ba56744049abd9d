//! Filesystem utilities for claimdesk.
//!
//! Resource records, config, and heartbeat rewrites of lock files all go
//! through atomic replacement so a crash never leaves a torn file behind.
//! New resource records are published with `atomic_create_file`, which never
//! replaces an existing file.

pub mod atomic;

pub use atomic::{atomic_create_file, atomic_write, atomic_write_file};
