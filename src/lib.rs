// ABOUTME: Library root for callgate — re-exports all modules for integration testing.
// ABOUTME: The gatectl binary in main.rs uses this crate as a library.

pub mod admin;
pub mod config;
pub mod gate;
