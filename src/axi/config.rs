use crate::axi::enc;
use crate::utils::log2c;
use crate::{TbError, TbResult};

/// Elaboration-time parameters of one AXI interface.
///
/// Every derived field width is a pure function of these values. A width of
/// zero removes the field from the payload altogether.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxiConfig {
    pub data_width: u32,
    pub addr_width: u32,
    pub id_width: u32,
    pub max_burst_size: u32,
    pub use_burst: bool,
    pub use_fixed_burst: bool,
    pub use_wrap_burst: bool,
    pub use_variable_beat_size: bool,
    pub use_last: bool,
    pub use_cache: bool,
    pub use_write_strobes: bool,
    pub use_write_responses: bool,
    pub use_ace: bool,
    pub a_user_width: u32,
    pub w_user_width: u32,
    pub b_user_width: u32,
    pub r_user_width: u32,
}

impl AxiConfig {
    /// 64-bit AXI4 with every burst type, variable beat size and last.
    pub fn standard() -> Self {
        AxiConfig {
            data_width: 64,
            addr_width: 32,
            id_width: 4,
            max_burst_size: 256,
            use_burst: true,
            use_fixed_burst: true,
            use_wrap_burst: true,
            use_variable_beat_size: true,
            use_last: true,
            use_cache: false,
            use_write_strobes: true,
            use_write_responses: true,
            use_ace: false,
            a_user_width: 0,
            w_user_width: 0,
            b_user_width: 0,
            r_user_width: 0,
        }
    }

    /// [`AxiConfig::standard`] plus cache and the ACE extension fields.
    pub fn ace() -> Self {
        AxiConfig {
            use_cache: true,
            use_ace: true,
            ..AxiConfig::standard()
        }
    }

    pub fn with_data_width(&self, data_width: u32) -> Self {
        AxiConfig {
            data_width,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> TbResult<()> {
        if self.data_width < 8 || !self.data_width.is_power_of_two() || self.data_width > 1024 {
            return Err(TbError::config(format!(
                "data width {} is not a power of two between 8 and 1024",
                self.data_width
            )));
        }
        if self.addr_width == 0 || self.addr_width > 64 {
            return Err(TbError::config(format!(
                "address width {} out of range 1..=64",
                self.addr_width
            )));
        }
        if self.id_width > 32 {
            return Err(TbError::config(format!("id width {} above 32", self.id_width)));
        }
        if self.use_burst && (self.max_burst_size < 2 || !self.max_burst_size.is_power_of_two()) {
            return Err(TbError::config(format!(
                "max burst size {} is not a power of two above 1",
                self.max_burst_size
            )));
        }
        for (name, w) in [
            ("a", self.a_user_width),
            ("w", self.w_user_width),
            ("b", self.b_user_width),
            ("r", self.r_user_width),
        ] {
            if w > 64 {
                return Err(TbError::config(format!("{}user width {} above 64", name, w)));
            }
        }
        Ok(())
    }

    /// Bytes per data beat.
    pub fn lanes(&self) -> usize {
        (self.data_width / 8) as usize
    }

    pub fn bid_width(&self) -> u32 {
        if self.use_write_responses {
            self.id_width
        } else {
            0
        }
    }
    pub fn alen_width(&self) -> u32 {
        if self.use_burst {
            log2c(self.max_burst_size as u64)
        } else {
            0
        }
    }
    pub fn asize_width(&self) -> u32 {
        if self.use_variable_beat_size {
            3
        } else {
            0
        }
    }
    pub fn last_width(&self) -> u32 {
        self.use_last as u32
    }
    pub fn cache_width(&self) -> u32 {
        if self.use_cache {
            enc::CACHE_WIDTH
        } else {
            0
        }
    }
    pub fn burst_width(&self) -> u32 {
        if self.use_burst && (self.use_fixed_burst || self.use_wrap_burst) {
            enc::BURST_WIDTH
        } else {
            0
        }
    }
    pub fn wstrb_width(&self) -> u32 {
        if self.use_write_strobes {
            self.data_width >> 3
        } else {
            0
        }
    }
    pub fn resp_width(&self) -> u32 {
        if self.use_ace {
            enc::XRESP_WIDTH + 2
        } else {
            enc::XRESP_WIDTH
        }
    }
    pub fn buser_width(&self) -> u32 {
        if self.use_write_responses {
            self.b_user_width
        } else {
            0
        }
    }
    pub fn snoop_width(&self) -> u32 {
        if self.use_ace {
            4
        } else {
            0
        }
    }
    pub fn domain_width(&self) -> u32 {
        if self.use_ace {
            2
        } else {
            0
        }
    }
    pub fn barrier_width(&self) -> u32 {
        if self.use_ace {
            2
        } else {
            0
        }
    }
    // AWUNIQUE, only needed by components supporting WriteEvict
    pub fn unique_width(&self) -> u32 {
        self.use_ace as u32
    }
}

impl Default for AxiConfig {
    fn default() -> Self {
        AxiConfig::standard()
    }
}

/// Bounds of the randomized traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenLimits {
    /// Distinct transaction ids.
    pub tid_num: u32,
    /// Burst encodings drawn from, starting at FIXED.
    pub burst_num: u32,
    /// FIXED and WRAP bursts stay below this many beats.
    pub max_len: u32,
    /// INCR bursts stay below this many beats before downsizing.
    pub max_incr_len: u32,
    /// Every other transaction targets `addr + region_offset`.
    pub region_offset: u64,
}

impl Default for GenLimits {
    fn default() -> Self {
        GenLimits {
            tid_num: 4,
            burst_num: 3,
            max_len: 4,
            max_incr_len: 4,
            region_offset: 0x10000,
        }
    }
}

/// One traffic-generating master.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub id: usize,
    /// Master side of the read path.
    pub rd_cfg: AxiConfig,
    /// Master side of the write path.
    pub wr_cfg: AxiConfig,
    /// Byte lanes of the slaves the read requests end up at.
    pub rd_slave_lanes: usize,
    pub wr_slave_lanes: usize,
    /// Percent chance per cycle of generating a new transaction.
    pub gen_rate_rd: u32,
    pub gen_rate_wr: u32,
    pub limits: GenLimits,
    pub seed: u64,
}

impl MasterConfig {
    /// Master and slaves of equal width.
    pub fn new(id: usize, cfg: &AxiConfig) -> Self {
        MasterConfig {
            id,
            rd_cfg: cfg.clone(),
            wr_cfg: cfg.clone(),
            rd_slave_lanes: cfg.lanes(),
            wr_slave_lanes: cfg.lanes(),
            gen_rate_rd: 20,
            gen_rate_wr: 20,
            limits: GenLimits::default(),
            seed: 0,
        }
    }

    pub fn with_slave_lanes(mut self, rd_slave_lanes: usize, wr_slave_lanes: usize) -> Self {
        self.rd_slave_lanes = rd_slave_lanes;
        self.wr_slave_lanes = wr_slave_lanes;
        self
    }

    pub fn with_rates(mut self, gen_rate_rd: u32, gen_rate_wr: u32) -> Self {
        self.gen_rate_rd = gen_rate_rd;
        self.gen_rate_wr = gen_rate_wr;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configuration of the write slaves, as seen by the scoreboard.
    pub fn wr_slave_cfg(&self) -> AxiConfig {
        self.wr_cfg.with_data_width(self.wr_slave_lanes as u32 * 8)
    }

    pub fn rd_slave_cfg(&self) -> AxiConfig {
        self.rd_cfg.with_data_width(self.rd_slave_lanes as u32 * 8)
    }
}
