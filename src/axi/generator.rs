use rand::rngs::StdRng;
use rand::Rng;

use crate::axi::config::{AxiConfig, GenLimits, MasterConfig};
use crate::axi::enc::Burst;
use crate::axi::payload::AddrPayload;
use crate::utils::{chance, log2c, seeded_rng};
use crate::{TbError, TbResult};

/// Randomized read and write requests of one master.
pub struct TransactionGenerator {
    rng: StdRng,
    limits: GenLimits,
    rd: PathGen,
    wr: PathGen,
}

// one per direction: each has its own widths and address counter
struct PathGen {
    cfg: AxiConfig,
    m_lanes: usize,
    s_lanes: usize,
    next_addr: u64,
}

impl TransactionGenerator {
    pub fn new(cfg: &MasterConfig) -> TbResult<Self> {
        check_limits(&cfg.limits)?;
        let rd = PathGen::new("read", &cfg.rd_cfg, cfg.rd_slave_lanes, &cfg.limits)?;
        let wr = PathGen::new("write", &cfg.wr_cfg, cfg.wr_slave_lanes, &cfg.limits)?;
        Ok(TransactionGenerator {
            rng: seeded_rng(cfg.seed, cfg.id as u64),
            limits: cfg.limits.clone(),
            rd,
            wr,
        })
    }

    /// True with `rate` percent probability.
    pub fn fire(&mut self, rate: u32) -> bool {
        chance(&mut self.rng, rate)
    }

    pub fn gen_rd_req(&mut self) -> AddrPayload {
        self.rd.gen_req(&mut self.rng, &self.limits)
    }

    pub fn gen_wr_req(&mut self) -> AddrPayload {
        self.wr.gen_req(&mut self.rng, &self.limits)
    }
}

fn check_limits(limits: &GenLimits) -> TbResult<()> {
    if limits.tid_num == 0 {
        return Err(TbError::config("at least one transaction id is needed"));
    }
    if limits.burst_num == 0 || limits.burst_num > 3 {
        return Err(TbError::config(format!(
            "burst_num {} outside 1..=3",
            limits.burst_num
        )));
    }
    if limits.max_len == 0 || limits.max_incr_len == 0 {
        return Err(TbError::config("burst length limits must be positive"));
    }
    Ok(())
}

impl PathGen {
    fn new(dir: &str, cfg: &AxiConfig, s_lanes: usize, limits: &GenLimits) -> TbResult<Self> {
        cfg.validate()?;
        let m_lanes = cfg.lanes();
        if m_lanes < 2 {
            return Err(TbError::config(format!(
                "{} master needs at least 2 byte lanes to draw a beat size",
                dir
            )));
        }
        if !s_lanes.is_power_of_two() {
            return Err(TbError::config(format!(
                "{} slave lanes {} not a power of two",
                dir, s_lanes
            )));
        }
        if m_lanes > s_lanes && m_lanes / s_lanes > limits.max_incr_len as usize {
            return Err(TbError::config(format!(
                "{} downsize ratio {} exceeds max INCR length {}",
                dir,
                m_lanes / s_lanes,
                limits.max_incr_len
            )));
        }
        if cfg.id_width == 0 || cfg.burst_width() == 0 || cfg.asize_width() == 0 {
            return Err(TbError::config(format!(
                "{} generator needs id, burst and size fields",
                dir
            )));
        }
        if cfg.last_width() == 0 {
            return Err(TbError::config(format!("{} generator needs LAST", dir)));
        }
        if limits.max_len.max(limits.max_incr_len) > cfg.max_burst_size {
            return Err(TbError::config(format!(
                "{} burst limits exceed max burst size {}",
                dir, cfg.max_burst_size
            )));
        }
        // FIXED and WRAP lengths are not capped, the downsized burst must
        // still fit the slave's length field
        let ratio = (m_lanes / s_lanes).max(1) as u32;
        if limits.max_len * ratio > cfg.max_burst_size {
            return Err(TbError::config(format!(
                "{} downsized bursts of {} beats exceed max burst size {}",
                dir,
                limits.max_len * ratio,
                cfg.max_burst_size
            )));
        }
        Ok(PathGen {
            cfg: cfg.clone(),
            m_lanes,
            s_lanes,
            next_addr: 0,
        })
    }

    fn gen_req(&mut self, rng: &mut StdRng, limits: &GenLimits) -> AddrPayload {
        let lanes_log = log2c(self.m_lanes as u64);
        let mut req = AddrPayload::new(&self.cfg);

        req.id = Some(rng.gen_range(0..limits.tid_num));
        // beat size 0 (one byte) is never drawn
        let size = ((rng.gen_range(0..lanes_log)) + 1) & ((1 << lanes_log) - 1);
        req.size = Some(size);
        let burst = match rng.gen_range(0..limits.burst_num) {
            0 => Burst::Fixed,
            1 => Burst::Incr,
            _ => Burst::Wrap,
        };
        req.burst = Some(burst);
        let len = match burst {
            Burst::Wrap => (1 << rng.gen_range(0..log2c(limits.max_len as u64 + 1))) - 1,
            Burst::Fixed => rng.gen_range(0..limits.max_len),
            // cap INCR so the downsized burst stays short
            Burst::Incr if self.m_lanes > self.s_lanes => {
                let ratio = (self.m_lanes / self.s_lanes) as u32;
                rng.gen_range(0..limits.max_incr_len / ratio)
            }
            Burst::Incr => rng.gen_range(0..limits.max_incr_len),
        };
        req.len = Some(len);

        req.addr = if rng.gen::<bool>() {
            self.next_addr
        } else {
            self.next_addr + limits.region_offset
        };
        self.next_addr += self.m_lanes as u64;
        req
    }
}
