//! GPIO / peripheral pin assignments for the PetFeeder main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Feed motor relay
// ---------------------------------------------------------------------------

/// Relay input driving the auger motor.  Active LOW: driving the pin low
/// energises the relay.
pub const FEED_RELAY_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// Gate stepper (28BYJ-48 on a ULN2003 board)
// ---------------------------------------------------------------------------

pub const GATE_IN1_GPIO: i32 = 19;
pub const GATE_IN2_GPIO: i32 = 18;
pub const GATE_IN3_GPIO: i32 = 5;
pub const GATE_IN4_GPIO: i32 = 17;

/// Full steps per output-shaft revolution (gear-reduced).
pub const GATE_STEPS_PER_REV: u32 = 2048;
/// Gate travel speed.
pub const GATE_SPEED_RPM: u32 = 5;

// ---------------------------------------------------------------------------
// Load cell (HX711)
// ---------------------------------------------------------------------------

/// HX711 DOUT: LOW when a conversion is ready.
pub const SCALE_DATA_GPIO: i32 = 27;
/// HX711 PD_SCK: bit-banged clock.
pub const SCALE_CLOCK_GPIO: i32 = 14;

// ---------------------------------------------------------------------------
// RFID reader (RDM6300, 125 kHz, 9600 8N1 TX-only)
// ---------------------------------------------------------------------------

pub const RFID_RX_GPIO: i32 = 4;
/// UART peripheral used for the reader.
pub const RFID_UART_NUM: i32 = 1;
pub const RFID_BAUD: u32 = 9600;
