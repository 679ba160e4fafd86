//! Extended inquiry response / advertising data parsing.
//!
//! The blob is a sequence of `[len][type][len - 1 bytes of data]` fields,
//! terminated by a zero length or the end of the buffer.

use crate::command::uuid16;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::debug;
use uuid::Uuid;

/// Incomplete list of 16-bit service UUIDs
pub const EIR_UUID16_SOME: u8 = 0x02;
/// Complete list of 16-bit service UUIDs
pub const EIR_UUID16_ALL: u8 = 0x03;
/// Shortened local name
pub const EIR_NAME_SHORT: u8 = 0x08;
/// Complete local name
pub const EIR_NAME_COMPLETE: u8 = 0x09;
/// Class of device
pub const EIR_CLASS_OF_DEV: u8 = 0x0D;

/// Fields extracted from an advertising blob
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EirData {
    /// Remote name, complete if present, otherwise shortened
    pub name: Option<String>,
    /// Whether `name` is the complete name
    pub name_complete: bool,
    /// Class of device, 0 when absent
    pub class: u32,
    /// Advertised 16-bit services
    pub services: Vec<Uuid>,
}

/// Parses advertising blobs for the dispatcher
pub trait EirParser: Send + Sync + Debug {
    /// Extract fields from a length-validated blob
    fn parse(&self, eir: &[u8]) -> EirData;
}

/// Parser for name, class of device and 16-bit service fields
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicEirParser;

impl EirParser for BasicEirParser {
    fn parse(&self, eir: &[u8]) -> EirData {
        let mut data = EirData::default();
        let mut rest = eir;

        while let Some((&len, tail)) = rest.split_first() {
            let len = len as usize;
            if len == 0 {
                break;
            }
            if len > tail.len() {
                debug!("Truncated EIR field ({} > {})", len, tail.len());
                break;
            }

            let (field, next) = tail.split_at(len);
            let (kind, value) = (field[0], &field[1..]);

            match kind {
                EIR_NAME_COMPLETE => {
                    data.name = Some(String::from_utf8_lossy(value).into_owned());
                    data.name_complete = true;
                }
                EIR_NAME_SHORT if !data.name_complete => {
                    data.name = Some(String::from_utf8_lossy(value).into_owned());
                }
                EIR_CLASS_OF_DEV if value.len() >= 3 => {
                    data.class = u32::from_le_bytes([value[0], value[1], value[2], 0]);
                }
                EIR_UUID16_SOME | EIR_UUID16_ALL => {
                    data.services.extend(
                        value
                            .chunks_exact(2)
                            .map(|c| uuid16(u16::from_le_bytes([c[0], c[1]]))),
                    );
                }
                _ => {}
            }

            rest = next;
        }

        data
    }
}
