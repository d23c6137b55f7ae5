//! One-shot hardware peripheral initialization.
//!
//! Configures the load-cell GPIOs and the RFID UART using raw ESP-IDF sys
//! calls.  Called once from `main()` before the event loop starts.  The
//! relay and stepper pins are owned by `esp-idf-hal` pin drivers instead.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    UartInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::UartInitFailed(rc) => write!(f, "UART init failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_scale_gpio()?;
        init_rfid_uart()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── Load cell GPIO ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_scale_gpio() -> Result<(), HwInitError> {
    let data_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::SCALE_DATA_GPIO,
        mode: gpio_mode_t_GPIO_MODE_INPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&data_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }

    let clk_cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::SCALE_CLOCK_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&clk_cfg) };
    if ret != ESP_OK as i32 { return Err(HwInitError::GpioConfigFailed(ret)); }
    // Clock held low keeps the HX711 powered up.
    unsafe { gpio_set_level(pins::SCALE_CLOCK_GPIO, 0) };

    info!("hw_init: HX711 GPIO configured (DOUT={}, SCK={})", pins::SCALE_DATA_GPIO, pins::SCALE_CLOCK_GPIO);
    Ok(())
}

// ── RFID UART ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
const RFID_RX_BUF: i32 = 256;

#[cfg(target_os = "espidf")]
unsafe fn init_rfid_uart() -> Result<(), HwInitError> {
    let cfg = uart_config_t {
        baud_rate: pins::RFID_BAUD as i32,
        data_bits: uart_word_length_t_UART_DATA_8_BITS,
        parity: uart_parity_t_UART_PARITY_DISABLE,
        stop_bits: uart_stop_bits_t_UART_STOP_BITS_1,
        flow_ctrl: uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE,
        ..Default::default()
    };
    let ret = unsafe { uart_param_config(pins::RFID_UART_NUM, &cfg) };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    let ret = unsafe {
        uart_set_pin(
            pins::RFID_UART_NUM,
            UART_PIN_NO_CHANGE,
            pins::RFID_RX_GPIO,
            UART_PIN_NO_CHANGE,
            UART_PIN_NO_CHANGE,
        )
    };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    let ret = unsafe {
        uart_driver_install(pins::RFID_UART_NUM, RFID_RX_BUF * 2, 0, 0, core::ptr::null_mut(), 0)
    };
    if ret != ESP_OK { return Err(HwInitError::UartInitFailed(ret)); }

    info!("hw_init: RFID UART{} configured (RX={})", pins::RFID_UART_NUM, pins::RFID_RX_GPIO);
    Ok(())
}

/// Non-blocking read of whatever the RFID UART has buffered.
#[cfg(target_os = "espidf")]
pub fn rfid_uart_read(buf: &mut [u8]) -> usize {
    // SAFETY: driver installed in init_rfid_uart(); zero tick timeout
    // makes this a buffer drain. Main-loop only.
    let n = unsafe {
        uart_read_bytes(pins::RFID_UART_NUM, buf.as_mut_ptr().cast(), buf.len() as u32, 0)
    };
    n.max(0) as usize
}

#[cfg(not(target_os = "espidf"))]
pub fn rfid_uart_read(_buf: &mut [u8]) -> usize {
    0
}

// ── GPIO helpers ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: gpio_get_level is a read-only register access on an
    // already-configured input pin; safe to call from main context.
    (unsafe { gpio_get_level(pin) }) != 0
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(_pin: i32) -> bool {
    true
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Main-loop only.
    unsafe { gpio_set_level(pin, if high { 1 } else { 0 }); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

/// Busy-wait for bit-banged protocols.
#[cfg(target_os = "espidf")]
pub fn delay_us(us: u32) {
    // SAFETY: ROM busy-wait, no shared state.
    unsafe { esp_rom_delay_us(us) };
}

#[cfg(not(target_os = "espidf"))]
pub fn delay_us(_us: u32) {}
