//! RDM6300 125 kHz RFID reader.
//!
//! The module streams a 14-byte ASCII frame at 9600 baud while a tag sits
//! in the field:
//!
//! ```text
//!   0x02 │ V V │ T T T T T T T T │ C C │ 0x03
//!   STX  │ ver │  tag id (hex)   │ xor │ ETX
//! ```
//!
//! Data and checksum are hex digits.  The checksum is the XOR of the five
//! data bytes (version + 4 tag bytes).  The tag id is the 32-bit value of
//! the four tag bytes.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drains the UART configured in hw_init.
//! On host/test: tags injected through `sim_present_tag`.

use log::debug;

use crate::access::TagId;
use crate::error::SensorError;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

const STX: u8 = 0x02;
const ETX: u8 = 0x03;
/// Full frame including STX and ETX.
pub const FRAME_LEN: usize = 14;

/// Pending simulated tag (0 = none).
#[cfg(not(target_os = "espidf"))]
static SIM_TAG: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn sim_present_tag(tag: TagId) {
    SIM_TAG.store(tag.0, Ordering::Relaxed);
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Decode one complete frame.
pub fn decode_frame(frame: &[u8]) -> Result<TagId, SensorError> {
    if frame.len() != FRAME_LEN || frame[0] != STX || frame[FRAME_LEN - 1] != ETX {
        return Err(SensorError::MalformedFrame);
    }

    let mut bytes = [0u8; 6];
    for (i, pair) in frame[1..FRAME_LEN - 1].chunks_exact(2).enumerate() {
        let hi = hex_val(pair[0]).ok_or(SensorError::MalformedFrame)?;
        let lo = hex_val(pair[1]).ok_or(SensorError::MalformedFrame)?;
        bytes[i] = (hi << 4) | lo;
    }

    let checksum = bytes[..5].iter().fold(0u8, |acc, b| acc ^ b);
    if checksum != bytes[5] {
        return Err(SensorError::BadChecksum);
    }

    Ok(TagId(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]])))
}

/// Streaming frame assembler.  Resynchronises on every STX.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: heapless::Vec<u8, FRAME_LEN>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  Returns a decode result when a frame closes.
    pub fn push(&mut self, byte: u8) -> Option<Result<TagId, SensorError>> {
        if byte == STX {
            self.buf.clear();
        } else if self.buf.is_empty() {
            // Outside a frame.
            return None;
        }

        if self.buf.push(byte).is_err() {
            self.buf.clear();
            return Some(Err(SensorError::MalformedFrame));
        }

        if self.buf.len() == FRAME_LEN {
            let result = decode_frame(&self.buf);
            self.buf.clear();
            return Some(result);
        }
        None
    }

    /// Feed a chunk.  Returns the last tag decoded cleanly in it.
    pub fn feed(&mut self, data: &[u8]) -> Option<TagId> {
        let mut last = None;
        for &b in data {
            match self.push(b) {
                Some(Ok(tag)) => last = Some(tag),
                Some(Err(e)) => debug!("RFID: frame dropped ({})", e),
                None => {}
            }
        }
        last
    }

    pub fn reset(&mut self) {
        self.buf.clear();
    }
}

pub struct TagReader {
    decoder: FrameDecoder,
}

impl Default for TagReader {
    fn default() -> Self {
        Self::new()
    }
}

impl TagReader {
    pub fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
        }
    }

    /// Latest tag seen since the previous poll.
    #[cfg(target_os = "espidf")]
    pub fn poll(&mut self) -> Option<TagId> {
        let mut chunk = [0u8; 64];
        let mut last = None;
        loop {
            let n = crate::drivers::hw_init::rfid_uart_read(&mut chunk);
            if n == 0 {
                break;
            }
            if let Some(tag) = self.decoder.feed(&chunk[..n]) {
                last = Some(tag);
            }
        }
        last
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn poll(&mut self) -> Option<TagId> {
        match SIM_TAG.swap(0, Ordering::Relaxed) {
            0 => None,
            raw => Some(TagId(raw)),
        }
    }
}
