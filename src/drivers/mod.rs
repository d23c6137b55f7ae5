//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod feed_motor;
pub mod hw_init;
pub mod stepper;
pub mod watchdog;
