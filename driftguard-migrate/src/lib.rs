//! Driftguard Migration Library
//!
//! Configuration resolution and command handlers behind the `driftguard-migrate` binary.
//! Handlers are generic over the migration source and history store so they can be
//! driven against an in-memory store.

pub mod commands;
pub mod settings;
