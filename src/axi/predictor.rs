//! Expected beats of a generated transaction.
//!
//! A burst is walked byte by byte. Byte `n` of a read carries `n & 0xff`; a
//! write carries the same pattern except for its final byte, which holds the
//! id of the master that wrote it.

use crate::axi::config::AxiConfig;
use crate::axi::enc::Burst;
use crate::axi::payload::{AddrPayload, Data, ReadPayload, WritePayload};
use crate::utils::log2c;

struct LaneWalker {
    lanes: usize,
    beat_bytes: usize,
    init: usize,
    ptr: usize,
    fixed: bool,
}

impl LaneWalker {
    fn new(req: &AddrPayload, lanes: usize) -> Self {
        let init = (req.addr % lanes as u64) as usize;
        LaneWalker {
            lanes,
            beat_bytes: 1 << req.asize(),
            init,
            ptr: init,
            fixed: req.aburst() == Burst::Fixed,
        }
    }

    // an unaligned FIXED burst can point past the bus
    fn lane(&self) -> usize {
        self.ptr % self.lanes
    }

    /// Steps to the next byte. True when the step crosses a beat boundary.
    fn advance(&mut self) -> bool {
        self.ptr = if self.fixed {
            (self.ptr + 1) % self.beat_bytes + self.init
        } else {
            (self.ptr + 1) % self.lanes
        };
        self.ptr % self.beat_bytes == 0
    }
}

/// Byte lanes used by every beat of `req` on a `lanes`-byte bus, in byte
/// order.
pub fn beat_lanes(req: &AddrPayload, lanes: usize) -> Vec<Vec<usize>> {
    let total = req.bytes_total();
    let mut walker = LaneWalker::new(req, lanes);
    let mut beats = Vec::new();
    let mut beat = Vec::new();
    for count in 1..=total {
        beat.push(walker.lane());
        if walker.advance() || count == total {
            beats.push(std::mem::take(&mut beat));
        }
    }
    beats
}

/// Beat length and size of `(m_len, m_size)` once downsized to `s_lanes`.
pub fn slave_equivalent(m_len: u32, m_size: u32, s_lanes: usize) -> (u32, u32) {
    if (1usize << m_size) > s_lanes {
        let s_size = log2c(s_lanes as u64);
        (((m_len + 1) << (m_size - s_size)) - 1, s_size)
    } else {
        (m_len, m_size)
    }
}

/// The request as a slave with `s_lanes` byte lanes receives it.
pub fn slave_request(req: &AddrPayload, s_lanes: usize) -> AddrPayload {
    let (len, size) = slave_equivalent(req.alen(), req.asize(), s_lanes);
    AddrPayload {
        len: req.len.map(|_| len),
        size: req.size.map(|_| size),
        ..req.cleared()
    }
}

/// Spreads `bytes` over the beats of `req`. Returns each beat with the
/// strobes of the lanes it wrote.
pub fn pack_beats(req: &AddrPayload, lanes: usize, bytes: &[u8]) -> Vec<(Data, u128)> {
    let mut bytes = bytes.iter();
    beat_lanes(req, lanes)
        .into_iter()
        .map(|beat| {
            let mut data = Data::zeroed(lanes);
            let mut strobe = 0u128;
            for lane in beat {
                data.set_lane(lane, bytes.next().copied().unwrap_or(0));
                strobe |= 1 << lane;
            }
            (data, strobe)
        })
        .collect()
}

/// Inverse of [`pack_beats`]: the byte stream carried by `beats`.
pub fn unpack_bytes(req: &AddrPayload, lanes: usize, beats: &[Data]) -> Vec<u8> {
    beat_lanes(req, lanes)
        .iter()
        .zip(beats)
        .flat_map(|(beat, data)| beat.iter().map(move |&lane| data.lane(lane)))
        .collect()
}

/// R beats a master expects for `req`; `resp` is the destination the
/// request resolves to.
pub fn predict_read(cfg: &AxiConfig, req: &AddrPayload, resp: u32) -> Vec<ReadPayload> {
    let total = req.bytes_total();
    let pattern: Vec<u8> = (0..total).map(|n| (n & 0xff) as u8).collect();
    let beats = pack_beats(req, cfg.lanes(), &pattern);
    let n_beats = beats.len();
    beats
        .into_iter()
        .enumerate()
        .map(|(i, (data, _))| {
            let mut beat = ReadPayload::new(cfg);
            beat.id = beat.id.map(|_| req.id());
            beat.data = data;
            beat.resp = resp;
            beat.last = beat.last.map(|_| i + 1 == n_beats);
            beat
        })
        .collect()
}

/// W beats of one write, as injected and as expected at the slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePrediction {
    pub master_beats: Vec<WritePayload>,
    pub slave_beats: Vec<WritePayload>,
}

pub fn predict_write(
    m_cfg: &AxiConfig,
    s_cfg: &AxiConfig,
    req: &AddrPayload,
    master_id: usize,
) -> WritePrediction {
    let total = req.bytes_total();
    let pattern: Vec<u8> = (0..total)
        .map(|n| {
            let byte = if n + 1 == total { master_id as u64 } else { n };
            (byte & 0xff) as u8
        })
        .collect();
    WritePrediction {
        master_beats: write_beats(m_cfg, req, &pattern),
        slave_beats: write_beats(s_cfg, &slave_request(req, s_cfg.lanes()), &pattern),
    }
}

fn write_beats(cfg: &AxiConfig, req: &AddrPayload, bytes: &[u8]) -> Vec<WritePayload> {
    let beats = pack_beats(req, cfg.lanes(), bytes);
    let n_beats = beats.len();
    beats
        .into_iter()
        .enumerate()
        .map(|(i, (data, strobe))| {
            let mut beat = WritePayload::new(cfg);
            beat.data = data;
            beat.wstrb = beat.wstrb.map(|_| strobe);
            beat.last = beat.last.map(|_| i + 1 == n_beats);
            beat
        })
        .collect()
}
