use core::fmt::Write as _;

use crate::reading::{Reading, SENSOR_NAME_MAX};

/// Worst case: every name byte escaped as `\u00XX` plus the fixed frame.
pub const PAYLOAD_MAX: usize = 32 + SENSOR_NAME_MAX * 6;

pub type Payload = heapless::String<PAYLOAD_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadTooLarge;

/// `{"sensor":"<name>","value":<int>}` with the name JSON-escaped.
pub fn encode(reading: &Reading) -> Result<Payload, PayloadTooLarge> {
    let mut out = Payload::new();
    write_json(&mut out, reading.sensor_name(), reading.value()).map_err(|_| PayloadTooLarge)?;
    Ok(out)
}

fn write_json<W: core::fmt::Write>(out: &mut W, sensor: &str, value: u16) -> core::fmt::Result {
    out.write_str("{\"sensor\":\"")?;
    write_escaped(out, sensor)?;
    write!(out, "\",\"value\":{value}}}")
}

fn write_escaped<W: core::fmt::Write>(out: &mut W, text: &str) -> core::fmt::Result {
    for ch in text.chars() {
        match ch {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            c if (c as u32) < 0x20 => write!(out, "\\u{:04x}", c as u32)?,
            c => out.write_char(c)?,
        }
    }
    Ok(())
}
