//! AXI4 signal encodings.

use std::fmt;

use crate::{TbError, TbResult};

pub const BURST_WIDTH: u32 = 2;
pub const CACHE_WIDTH: u32 = 4;
pub const XRESP_WIDTH: u32 = 2;

/// AxBURST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Burst {
    Fixed = 0,
    Incr = 1,
    Wrap = 2,
}

impl Burst {
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn from_bits(bits: u64) -> TbResult<Burst> {
        match bits {
            0 => Ok(Burst::Fixed),
            1 => Ok(Burst::Incr),
            2 => Ok(Burst::Wrap),
            _ => Err(TbError::Malformed {
                reason: format!("reserved burst encoding {}", bits),
            }),
        }
    }
}

impl fmt::Display for Burst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Burst::Fixed => write!(f, "FIXED"),
            Burst::Incr => write!(f, "INCR"),
            Burst::Wrap => write!(f, "WRAP"),
        }
    }
}
