//! Bit-level wire format of the channel payloads.
//!
//! Fields are packed LSB-first in declaration order; a field of width zero
//! takes no bits. The packed vector is little-endian and exactly
//! `ceil(width / 8)` bytes long.

use crate::axi::config::AxiConfig;
use crate::{TbError, TbResult};

pub trait Marshall: Sized {
    /// Total bits on the wire under `cfg`.
    fn width(cfg: &AxiConfig) -> u32;
    fn marshall(&self, cfg: &AxiConfig, m: &mut Marshaller);
    fn unmarshall(cfg: &AxiConfig, u: &mut Unmarshaller) -> TbResult<Self>;

    fn to_bits(&self, cfg: &AxiConfig) -> Vec<u8> {
        let mut m = Marshaller::new(Self::width(cfg));
        self.marshall(cfg, &mut m);
        m.finish()
    }

    fn from_bits(cfg: &AxiConfig, bits: &[u8]) -> TbResult<Self> {
        let width = Self::width(cfg);
        let expected = byte_len(width);
        if bits.len() != expected {
            return Err(TbError::Malformed {
                reason: format!(
                    "{} bytes for a {}-bit payload, expected {}",
                    bits.len(),
                    width,
                    expected
                ),
            });
        }
        let mut u = Unmarshaller::new(bits);
        Self::unmarshall(cfg, &mut u)
    }
}

fn byte_len(width: u32) -> usize {
    ((width + 7) / 8) as usize
}

pub struct Marshaller {
    bytes: Vec<u8>,
    pos: usize,
}

impl Marshaller {
    pub fn new(width: u32) -> Self {
        Marshaller {
            bytes: vec![0; byte_len(width)],
            pos: 0,
        }
    }

    /// Appends the low `width` bits of `value`.
    pub fn put(&mut self, value: u128, width: u32) {
        for i in 0..width.min(128) {
            if (value >> i) & 1 == 1 {
                self.set_bit(self.pos + i as usize);
            }
        }
        self.pos += width as usize;
    }

    /// Appends `width` bits taken from `bytes`, missing bytes read as zero.
    pub fn put_bytes(&mut self, bytes: &[u8], width: u32) {
        for i in 0..width as usize {
            let byte = bytes.get(i / 8).copied().unwrap_or(0);
            if (byte >> (i % 8)) & 1 == 1 {
                self.set_bit(self.pos + i);
            }
        }
        self.pos += width as usize;
    }

    fn set_bit(&mut self, bit: usize) {
        self.bytes[bit / 8] |= 1 << (bit % 8);
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

pub struct Unmarshaller<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Unmarshaller<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Unmarshaller { bytes, pos: 0 }
    }

    fn bit(&self, bit: usize) -> bool {
        self.bytes
            .get(bit / 8)
            .map_or(false, |b| (b >> (bit % 8)) & 1 == 1)
    }

    pub fn take(&mut self, width: u32) -> u128 {
        let mut value = 0u128;
        for i in 0..width.min(128) {
            if self.bit(self.pos + i as usize) {
                value |= 1 << i;
            }
        }
        self.pos += width as usize;
        value
    }

    /// `None` for a zero-width field.
    pub fn take_opt(&mut self, width: u32) -> Option<u128> {
        (width > 0).then(|| self.take(width))
    }

    pub fn take_bytes(&mut self, width: u32) -> Vec<u8> {
        let mut bytes = vec![0u8; byte_len(width)];
        for i in 0..width as usize {
            if self.bit(self.pos + i) {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        self.pos += width as usize;
        bytes
    }
}
