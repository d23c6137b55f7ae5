//! Closed-loop control: weight-feedback dispensing.

pub mod dispense;
