//! PetFeeder firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod access;
pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod gate;
pub mod health;
pub mod schedule;

pub mod pins;

// Hardware-facing modules; simulation stubs on host targets.
pub mod adapters;
pub mod drivers;
pub mod sensors;
