//! Traffic-generating master.
//!
//! Every cycle the master may generate one read and one write, tries to
//! inject the oldest pending AR, AW and W entries, and verifies whatever
//! response arrived on R and B. Generation and verification go through the
//! shared scoreboard; a protocol violation ends the master task with an
//! error.

use queues::{IsQueue, Queue};

use crate::axi::config::{AxiConfig, MasterConfig};
use crate::axi::generator::TransactionGenerator;
use crate::axi::payload::{AddrPayload, WritePayload};
use crate::axi::read;
use crate::axi::scoreboard::Scoreboard;
use crate::axi::write;
use crate::{Clock, Dir, Signal, Sim, TbError, TbObj, TbResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterStats {
    pub rd_trans_generated: u64,
    pub wr_trans_generated: u64,
    /// Beats predicted for generated transactions.
    pub rd_data_generated: u64,
    pub wr_data_generated: u64,
    pub rd_trans_inj: u64,
    pub wr_trans_inj: u64,
    pub wr_data_inj: u64,
    /// Responses that passed verification, one per R beat or B response.
    pub rd_resp_ej: u64,
    pub wr_resp_ej: u64,
    /// Latency sum and count over completed transactions.
    pub rd_resp_delay: u64,
    pub rd_resp_count: u64,
    pub wr_resp_delay: u64,
    pub wr_resp_count: u64,
    pub last_rd_sinked_cycle: u64,
    pub last_wr_sinked_cycle: u64,
    pub error_sb_rd_resp_not_found: u64,
    pub error_sb_wr_resp_not_found: u64,
}

impl MasterStats {
    pub fn avg_rd_latency(&self) -> Option<f64> {
        (self.rd_resp_count > 0).then(|| self.rd_resp_delay as f64 / self.rd_resp_count as f64)
    }

    pub fn avg_wr_latency(&self) -> Option<f64> {
        (self.wr_resp_count > 0).then(|| self.wr_resp_delay as f64 / self.wr_resp_count as f64)
    }
}

pub struct AxiMaster {
    cfg: MasterConfig,
    wr_slave_cfg: AxiConfig,
    sim: Sim,
    clk: Clock,
    rd: read::Master,
    wr: write::Master,
    sb: TbObj<Scoreboard>,
    stop_gen: Signal<bool>,
    gen: TransactionGenerator,
    stored_rd_trans: Queue<AddrPayload>,
    stored_wr_trans: Queue<AddrPayload>,
    stored_wr_data: Queue<WritePayload>,
    stats: TbObj<MasterStats>,
}

impl AxiMaster {
    pub fn new(
        sim: &Sim,
        cfg: MasterConfig,
        rd: read::Master,
        wr: write::Master,
        sb: TbObj<Scoreboard>,
        stop_gen: Signal<bool>,
    ) -> TbResult<Self> {
        let n_masters = sb.get().n_masters();
        if cfg.id >= n_masters {
            return Err(TbError::config(format!(
                "master {} outside scoreboard of {} masters",
                cfg.id, n_masters
            )));
        }
        let gen = TransactionGenerator::new(&cfg)?;
        Ok(AxiMaster {
            wr_slave_cfg: cfg.wr_slave_cfg(),
            cfg,
            sim: sim.clone(),
            clk: sim.clock(),
            rd,
            wr,
            sb,
            stop_gen,
            gen,
            stored_rd_trans: Queue::new(),
            stored_wr_trans: Queue::new(),
            stored_wr_data: Queue::new(),
            stats: TbObj::new(MasterStats::default()),
        })
    }

    pub fn id(&self) -> usize {
        self.cfg.id
    }

    /// Shared handle to the counters; stays valid after [`run`](Self::run)
    /// consumes the master.
    pub fn stats(&self) -> TbObj<MasterStats> {
        self.stats.clone()
    }

    /// Transactions and beats generated but not injected yet.
    pub fn pending_injection(&self) -> usize {
        self.stored_rd_trans.size() + self.stored_wr_trans.size() + self.stored_wr_data.size()
    }

    fn log(&self, msg: &str) {
        self.sim.log(&format!("[Master {}] {}", self.cfg.id, msg));
    }

    pub fn do_cycle(&mut self) -> TbResult<()> {
        if !self.stop_gen.read() {
            self.generate()?;
        }
        for pushed in self.inject()? {
            self.log(&pushed);
        }
        self.eject()
    }

    fn generate(&mut self) -> TbResult<()> {
        let now = self.sim.cycle();
        let master = self.cfg.id;

        if self.gen.fire(self.cfg.gen_rate_rd) {
            let req = self.gen.gen_rd_req();
            let (rd_cfg, s_lanes) = (&self.cfg.rd_cfg, self.cfg.rd_slave_lanes);
            let n_beats = self.sb.with_mut(|sb| sb.push_read(master, rd_cfg, s_lanes, &req, now))?;
            self.stats.with_mut(|s| {
                s.rd_trans_generated += 1;
                s.rd_data_generated += n_beats as u64;
            });
            self.stored_rd_trans.add(req).map_err(TbError::queue)?;
        }

        if self.gen.fire(self.cfg.gen_rate_wr) {
            let req = self.gen.gen_wr_req();
            let (wr_cfg, s_cfg) = (&self.cfg.wr_cfg, &self.wr_slave_cfg);
            let beats = self.sb.with_mut(|sb| sb.push_write(master, wr_cfg, s_cfg, &req, now))?;
            self.stats.with_mut(|s| {
                s.wr_trans_generated += 1;
                s.wr_data_generated += beats.len() as u64;
            });
            self.stored_wr_trans.add(req).map_err(TbError::queue)?;
            for beat in beats {
                self.stored_wr_data.add(beat).map_err(TbError::queue)?;
            }
        }
        Ok(())
    }

    // Returns a log line per entry that entered its channel.
    fn inject(&mut self) -> TbResult<Vec<String>> {
        let mut pushed = Vec::new();
        let next_ar = self.stored_rd_trans.peek().ok();
        if let Some(req) = next_ar {
            if self.rd.ar.push_nb(&req) {
                self.stored_rd_trans.remove().map_err(TbError::queue)?;
                self.stats.with_mut(|s| s.rd_trans_inj += 1);
                pushed.push(format!(": PUSHED AR: {}", req));
            }
        }
        let next_aw = self.stored_wr_trans.peek().ok();
        if let Some(req) = next_aw {
            if self.wr.aw.push_nb(&req) {
                self.stored_wr_trans.remove().map_err(TbError::queue)?;
                self.stats.with_mut(|s| s.wr_trans_inj += 1);
                pushed.push(format!(": PUSHED AW: {}", req));
            }
        }
        let next_w = self.stored_wr_data.peek().ok();
        if let Some(beat) = next_w {
            if self.wr.w.push_nb(&beat) {
                self.stored_wr_data.remove().map_err(TbError::queue)?;
                self.stats.with_mut(|s| s.wr_data_inj += 1);
                pushed.push(format!(": PUSHED W: {}", beat));
            }
        }
        Ok(pushed)
    }

    fn eject(&mut self) -> TbResult<()> {
        let now = self.sim.cycle();
        let master = self.cfg.id;

        if let Some(resp) = self.rd.r.pop_nb() {
            let verdict = self.sb.with_mut(|sb| sb.verify_read(master, &resp, now))?;
            if verdict.matched.is_none() {
                self.stats.with_mut(|s| s.error_sb_rd_resp_not_found += 1);
                if let Some(front) = self.sb.get().rd_resp_front(master) {
                    self.log(&format!("-SB_front - {}", front));
                }
            }
            if let Some(req) = &verdict.ordered_req {
                self.log(&format!("REQ-Ordered - {}", req));
            }
            let matched = verdict.into_result(master, Dir::Rd, resp.to_string(), now)?;
            self.log(&format!("RD-Resp OK   : << {}", resp));
            self.stats.with_mut(|s| {
                s.rd_resp_ej += 1;
                if matched.last {
                    s.rd_resp_delay += matched.latency;
                    s.rd_resp_count += 1;
                    s.last_rd_sinked_cycle = now;
                }
            });
        }

        if let Some(resp) = self.wr.b.pop_nb() {
            let verdict = self.sb.with_mut(|sb| sb.verify_write(master, &resp, now))?;
            if verdict.matched.is_none() {
                self.stats.with_mut(|s| s.error_sb_wr_resp_not_found += 1);
                if let Some(front) = self.sb.get().wr_resp_front(master) {
                    self.log(&format!("-SB_front - {}", front));
                }
            }
            let matched = verdict.into_result(master, Dir::Wr, resp.to_string(), now)?;
            self.log(&format!("WR-Resp OK   : << {}", resp));
            self.stats.with_mut(|s| {
                s.wr_resp_ej += 1;
                s.wr_resp_delay += matched.latency;
                s.wr_resp_count += 1;
                s.last_wr_sinked_cycle = now;
            });
        }
        Ok(())
    }

    /// Runs one [`do_cycle`](Self::do_cycle) per rising edge until a
    /// protocol violation occurs.
    pub async fn run(mut self) -> TbResult {
        loop {
            self.clk.rising_edge().await;
            self.do_cycle()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axi::addr_map::AddrMap;
    use crate::axi::payload::ReadPayload;
    use crate::axi::predictor::predict_read;
    use crate::TbConfig;

    struct Bench {
        sim: Sim,
        rd: read::Chan,
        wr: write::Chan,
        sb: TbObj<Scoreboard>,
        stop_gen: Signal<bool>,
    }

    fn bench() -> Bench {
        let sim = Sim::new(&TbConfig::default());
        let clk = sim.clock();
        let map = AddrMap::new()
            .with_region(0, 0xffff)
            .and_then(|m| m.with_region(0x1_0000, 0x1_ffff))
            .unwrap();
        Bench {
            rd: read::Chan::new("m0", 1, &clk),
            wr: write::Chan::new("m0", 1, &clk),
            sb: TbObj::new(Scoreboard::new(1, map, 4)),
            stop_gen: Signal::new("stop_gen", false),
            sim,
        }
    }

    fn master(b: &Bench, cfg: MasterConfig) -> AxiMaster {
        AxiMaster::new(&b.sim, cfg, b.rd.master(), b.wr.master(), b.sb.clone(), b.stop_gen.clone())
            .unwrap()
    }

    #[test]
    fn generates_and_injects() {
        let b = bench();
        let cfg = MasterConfig::new(0, &AxiConfig::standard()).with_rates(100, 100);
        let mut m = master(&b, cfg);
        m.do_cycle().unwrap();
        let stats = m.stats().snapshot();
        assert_eq!(stats.rd_trans_generated, 1);
        assert_eq!(stats.wr_trans_generated, 1);
        assert_eq!((stats.rd_trans_inj, stats.wr_trans_inj, stats.wr_data_inj), (1, 1, 1));
        assert_eq!(b.rd.ar.occupancy(), 1);

        // channels are full now, generation keeps queueing
        m.do_cycle().unwrap();
        assert_eq!(m.stats().snapshot().rd_trans_inj, 1);
        assert!(m.pending_injection() >= 2);
    }

    #[test]
    fn pushes_are_reported_on_injection() {
        let b = bench();
        let cfg = MasterConfig::new(0, &AxiConfig::standard()).with_rates(100, 0);
        let mut m = master(&b, cfg);
        m.generate().unwrap();
        let pushed = m.inject().unwrap();
        assert_eq!(pushed.len(), 1);
        assert!(pushed[0].starts_with(": PUSHED AR: Id:"), "{}", pushed[0]);

        // the AR channel is full, the new request stays queued
        m.generate().unwrap();
        assert!(m.inject().unwrap().is_empty());
        assert_eq!(m.pending_injection(), 1);
    }

    #[test]
    fn stop_gen_halts_generation() {
        let b = bench();
        let cfg = MasterConfig::new(0, &AxiConfig::standard()).with_rates(100, 100);
        let mut m = master(&b, cfg);
        b.stop_gen.write(true);
        for _ in 0..5 {
            m.do_cycle().unwrap();
        }
        assert_eq!(m.stats().snapshot(), MasterStats::default());
        assert!(b.sb.get().passed());
    }

    #[test]
    fn verifies_predicted_read() {
        let b = bench();
        let cfg = MasterConfig::new(0, &AxiConfig::standard()).with_rates(100, 0);
        let mut m = master(&b, cfg.clone());
        m.do_cycle().unwrap();

        let slave = b.rd.slave();
        let req = slave.nb_aread().unwrap();
        let dst = b.sb.get().resolve(req.addr).unwrap();
        b.stop_gen.write(true);
        for beat in predict_read(&cfg.rd_cfg, &req, dst as u32) {
            assert!(slave.nb_rwrite(&beat));
            m.do_cycle().unwrap();
        }
        let stats = m.stats().snapshot();
        assert_eq!(stats.rd_resp_count, 1);
        assert_eq!(stats.rd_resp_ej, stats.rd_data_generated);
        assert_eq!(stats.avg_rd_latency(), Some(0.0));
        // the slave side request was never consumed
        assert_eq!(b.sb.get().result_str(), "pending: AR=1, AW=0, W=0, R=0, B=0");
    }

    #[test]
    fn unexpected_read_fails_the_master_task() {
        let b = bench();
        let cfg = MasterConfig::new(0, &AxiConfig::standard()).with_rates(0, 0);
        let m = master(&b, cfg);
        let stats = m.stats();
        let slave = b.rd.slave();
        assert!(slave.nb_rwrite(&ReadPayload::new(&AxiConfig::standard())));

        let mut task = b.sim.fork(m.run());
        b.sim.run_once();
        b.sim.run_cycles(2);
        match task.try_result() {
            Some(Err(TbError::RespNotFound { master: 0, dir: Dir::Rd, .. })) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(stats.snapshot().error_sb_rd_resp_not_found, 1);
    }

    #[test]
    fn rejects_master_outside_scoreboard() {
        let b = bench();
        let cfg = MasterConfig::new(3, &AxiConfig::standard());
        let res = AxiMaster::new(&b.sim, cfg, b.rd.master(), b.wr.master(), b.sb.clone(), b.stop_gen.clone());
        assert!(matches!(res, Err(TbError::Config { .. })));
    }
}
