//! Responding slave.
//!
//! Stands in for a memory at one destination of the address map. Requests
//! and write data are checked against what the scoreboard expects at this
//! destination; reads are answered with the counting byte pattern at the
//! slave's own width and every write burst gets one B response. The response
//! code carries the slave index.

use queues::{IsQueue, Queue};
use rand::rngs::StdRng;

use crate::axi::config::AxiConfig;
use crate::axi::payload::{AddrPayload, ReadPayload, WRespPayload};
use crate::axi::predictor::predict_read;
use crate::axi::read;
use crate::axi::scoreboard::Scoreboard;
use crate::axi::write;
use crate::utils::{chance, seeded_rng};
use crate::{Clock, Sim, TbError, TbObj, TbResult};

// streams 0..n are used by the masters
const SLAVE_STREAM: u64 = 0x5_0000;

pub struct AxiSlave {
    id: usize,
    sim: Sim,
    clk: Clock,
    rd_cfg: AxiConfig,
    wr_cfg: AxiConfig,
    rd: read::Slave,
    wr: write::Slave,
    sb: TbObj<Scoreboard>,
    rng: StdRng,
    stall_rate: u32,
    rd_resp: Queue<ReadPayload>,
    wr_resp: Queue<WRespPayload>,
    // AW of the burst whose remaining W beats are still arriving
    wr_burst: Option<AddrPayload>,
    served: (u64, u64),
}

impl AxiSlave {
    /// `rd_cfg` and `wr_cfg` describe the slave side of each path.
    pub fn new(
        sim: &Sim,
        id: usize,
        rd_cfg: &AxiConfig,
        wr_cfg: &AxiConfig,
        rd: read::Slave,
        wr: write::Slave,
        sb: TbObj<Scoreboard>,
    ) -> TbResult<Self> {
        rd_cfg.validate()?;
        wr_cfg.validate()?;
        let n_slaves = sb.get().n_slaves();
        if id >= n_slaves {
            return Err(TbError::config(format!(
                "slave {} outside address map of {} regions",
                id, n_slaves
            )));
        }
        Ok(AxiSlave {
            id,
            sim: sim.clone(),
            clk: sim.clock(),
            rd_cfg: rd_cfg.clone(),
            wr_cfg: wr_cfg.clone(),
            rd,
            wr,
            sb,
            rng: seeded_rng(sim.seed(), SLAVE_STREAM + id as u64),
            stall_rate: 0,
            rd_resp: Queue::new(),
            wr_resp: Queue::new(),
            wr_burst: None,
            served: (0, 0),
        })
    }

    /// Refuses new requests and write data in `percent` percent of the
    /// cycles.
    pub fn with_stall_rate(mut self, percent: u32) -> Self {
        self.stall_rate = percent;
        self
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Read and write bursts accepted so far.
    pub fn served(&self) -> (u64, u64) {
        self.served
    }

    fn log(&self, msg: &str) {
        self.sim.log(&format!("[Slave {}] {}", self.id, msg));
    }

    pub fn do_cycle(&mut self) -> TbResult<()> {
        let stalled = self.stall_rate > 0 && chance(&mut self.rng, self.stall_rate);
        if !stalled {
            self.accept_read()?;
            self.accept_write()?;
        }
        self.respond()
    }

    fn accept_read(&mut self) -> TbResult<()> {
        let req = match self.rd.nb_aread() {
            Some(req) => req,
            None => return Ok(()),
        };
        let (id, now) = (self.id, self.sim.cycle());
        self.sb.with_mut(|sb| sb.verify_slave_rd_req(id, &req, now))?;
        self.log(&format!("AR: {}", req));
        for beat in predict_read(&self.rd_cfg, &req, id as u32) {
            self.rd_resp.add(beat).map_err(TbError::queue)?;
        }
        self.served.0 += 1;
        Ok(())
    }

    fn accept_write(&mut self) -> TbResult<()> {
        let (id, now) = (self.id, self.sim.cycle());
        let (req, beat) = match self.wr_burst.take() {
            Some(req) => match self.wr.w.pop_nb() {
                Some(beat) => (req, beat),
                None => {
                    self.wr_burst = Some(req);
                    return Ok(());
                }
            },
            None => match self.wr.nb_wread() {
                Some((req, beat)) => {
                    self.sb.with_mut(|sb| sb.verify_slave_wr_req(id, &req, now))?;
                    self.log(&format!("AW: {}", req));
                    (req, beat)
                }
                None => return Ok(()),
            },
        };
        self.sb.with_mut(|sb| sb.verify_slave_wr_data(id, &beat, now))?;
        self.log(&format!("W: {}", beat));

        if !beat.is_last() {
            self.wr_burst = Some(req);
            return Ok(());
        }
        self.served.1 += 1;
        if self.wr_cfg.use_write_responses {
            let mut b = WRespPayload::new(&self.wr_cfg);
            b.id = b.id.map(|_| req.id());
            b.resp = id as u32;
            self.wr_resp.add(b).map_err(TbError::queue)?;
        }
        Ok(())
    }

    fn respond(&mut self) -> TbResult<()> {
        let next_r = self.rd_resp.peek().ok();
        if let Some(beat) = next_r {
            if self.rd.nb_rwrite(&beat) {
                self.rd_resp.remove().map_err(TbError::queue)?;
            }
        }
        let next_b = self.wr_resp.peek().ok();
        if let Some(b) = next_b {
            if self.wr.nb_bwrite(&b) {
                self.wr_resp.remove().map_err(TbError::queue)?;
            }
        }
        Ok(())
    }

    pub async fn run(mut self) -> TbResult {
        loop {
            self.clk.rising_edge().await;
            self.do_cycle()?;
        }
    }
}
