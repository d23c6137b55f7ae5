//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements         | Connects to                     |
//! |------------|--------------------|---------------------------------|
//! | `hardware` | WeightPort         | HX711 load cell                 |
//! |            | TagReaderPort      | RDM6300 over UART               |
//! |            | FeedActuatorPort   | Relay GPIO                      |
//! |            | GateActuatorPort   | ULN2003 stepper GPIOs           |
//! | `log_sink` | EventSink          | Serial log output               |
//! | `outbox`   | EventSink          | Bounded backend telemetry queue |
//! | `nvs`      | ConfigPort         | NVS / in-memory store           |
//! |            | StoragePort        |                                 |
//! | `time`     | Clock              | ESP32 timer + SNTP wall clock   |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod outbox;
pub mod time;
