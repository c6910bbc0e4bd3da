//! Test interconnect and testbench assembly for the traffic tests.
//!
//! The interconnect decodes addresses, forwards whole bursts (store and
//! forward), converts beats between master and slave widths, and hands
//! responses back to each master in the order it issued its requests.
//! In out-of-order mode the newest completed response goes first instead,
//! whatever its id.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};

use acetb::axi::predictor::{pack_beats, slave_request, unpack_bytes};
use acetb::axi::{read, write};
use acetb::prelude::*;

struct PendingRead {
    master: usize,
    seq: u64,
    m_req: AddrPayload,
    s_req: AddrPayload,
}

struct PendingWrite {
    master: usize,
    seq: u64,
    s_req: AddrPayload,
    beats: VecDeque<WritePayload>,
    aw_sent: bool,
}

struct MasterSide {
    rd: read::Slave,
    wr: write::Slave,
    cfg: AxiConfig,
    next_seq: u64,
    rd_order: VecDeque<u64>,
    wr_order: VecDeque<u64>,
    rd_done: BTreeMap<u64, VecDeque<ReadPayload>>,
    // burst whose R beats are being returned
    rd_current: Option<u64>,
    wr_done: BTreeMap<u64, WRespPayload>,
    // AW whose W beats are being collected
    wr_collect: Option<(u64, AddrPayload, Vec<WritePayload>)>,
}

struct SlaveSide {
    rd: read::Master,
    wr: write::Master,
    lanes: usize,
    rd_fwd: VecDeque<PendingRead>,
    rd_issued: VecDeque<PendingRead>,
    rd_beats: Vec<Data>,
    rd_resp: u32,
    wr_fwd: VecDeque<PendingWrite>,
    wr_issued: VecDeque<(usize, u64)>,
}

pub struct Fabric {
    addr_map: AddrMap,
    masters: Vec<MasterSide>,
    slaves: Vec<SlaveSide>,
    corrupt_reads: bool,
    out_of_order: bool,
}

impl Fabric {
    pub fn new(addr_map: AddrMap) -> Self {
        Fabric {
            addr_map,
            masters: Vec::new(),
            slaves: Vec::new(),
            corrupt_reads: false,
            out_of_order: false,
        }
    }

    /// Returns the newest completed response first, letting it overtake
    /// older requests to other slaves even when the ids are equal.
    pub fn out_of_order(mut self) -> Self {
        self.out_of_order = true;
        self
    }

    /// Flips a byte of every read beat returned to a master.
    pub fn corrupt_reads(mut self) -> Self {
        self.corrupt_reads = true;
        self
    }

    pub fn add_master(&mut self, cfg: &AxiConfig, rd: read::Slave, wr: write::Slave) {
        self.masters.push(MasterSide {
            rd,
            wr,
            cfg: cfg.clone(),
            next_seq: 0,
            rd_order: VecDeque::new(),
            wr_order: VecDeque::new(),
            rd_done: BTreeMap::new(),
            rd_current: None,
            wr_done: BTreeMap::new(),
            wr_collect: None,
        });
    }

    pub fn add_slave(&mut self, lanes: usize, rd: read::Master, wr: write::Master) {
        self.slaves.push(SlaveSide {
            rd,
            wr,
            lanes,
            rd_fwd: VecDeque::new(),
            rd_issued: VecDeque::new(),
            rd_beats: Vec::new(),
            rd_resp: 0,
            wr_fwd: VecDeque::new(),
            wr_issued: VecDeque::new(),
        });
    }

    pub fn do_cycle(&mut self) -> TbResult<()> {
        self.route_requests()?;
        self.forward_to_slaves();
        self.collect_responses()?;
        self.return_responses();
        Ok(())
    }

    fn route_requests(&mut self) -> TbResult<()> {
        for (m, side) in self.masters.iter_mut().enumerate() {
            if let Some(m_req) = side.rd.nb_aread() {
                let dst = self.addr_map.resolve(m_req.addr)?;
                let seq = side.next_seq;
                side.next_seq += 1;
                side.rd_order.push_back(seq);
                let s_req = slave_request(&m_req, self.slaves[dst].lanes);
                self.slaves[dst].rd_fwd.push_back(PendingRead {
                    master: m,
                    seq,
                    m_req,
                    s_req,
                });
            }

            if side.wr_collect.is_none() {
                if let Some(m_req) = side.wr.aw.pop_nb() {
                    let seq = side.next_seq;
                    side.next_seq += 1;
                    side.wr_order.push_back(seq);
                    side.wr_collect = Some((seq, m_req, Vec::new()));
                }
            }
            let complete = match &mut side.wr_collect {
                Some((_, _, beats)) => match side.wr.w.pop_nb() {
                    Some(beat) => {
                        let last = beat.is_last();
                        beats.push(beat);
                        last
                    }
                    None => false,
                },
                None => false,
            };
            if complete {
                if let Some((seq, m_req, beats)) = side.wr_collect.take() {
                    let dst = self.addr_map.resolve(m_req.addr)?;
                    let slave = &mut self.slaves[dst];
                    let data: Vec<Data> = beats.into_iter().map(|b| b.data).collect();
                    let bytes = unpack_bytes(&m_req, side.cfg.lanes(), &data);
                    let s_req = slave_request(&m_req, slave.lanes);
                    let s_cfg = side.cfg.with_data_width(slave.lanes as u32 * 8);
                    let packed = pack_beats(&s_req, slave.lanes, &bytes);
                    let n = packed.len();
                    let beats = packed
                        .into_iter()
                        .enumerate()
                        .map(|(i, (data, strobe))| {
                            let mut beat = WritePayload::new(&s_cfg);
                            beat.data = data;
                            beat.wstrb = beat.wstrb.map(|_| strobe);
                            beat.last = beat.last.map(|_| i + 1 == n);
                            beat
                        })
                        .collect();
                    slave.wr_fwd.push_back(PendingWrite {
                        master: m,
                        seq,
                        s_req,
                        beats,
                        aw_sent: false,
                    });
                }
            }
        }
        Ok(())
    }

    fn forward_to_slaves(&mut self) {
        for slave in self.slaves.iter_mut() {
            if let Some(p) = slave.rd_fwd.front() {
                if slave.rd.ar.push_nb(&p.s_req) {
                    if let Some(p) = slave.rd_fwd.pop_front() {
                        slave.rd_issued.push_back(p);
                    }
                }
            }

            let mut sent = false;
            if let Some(p) = slave.wr_fwd.front_mut() {
                if !p.aw_sent {
                    p.aw_sent = slave.wr.aw.push_nb(&p.s_req);
                }
                if p.aw_sent {
                    if let Some(beat) = p.beats.front() {
                        if slave.wr.w.push_nb(beat) {
                            p.beats.pop_front();
                        }
                    }
                    sent = p.beats.is_empty();
                }
            }
            if sent {
                if let Some(p) = slave.wr_fwd.pop_front() {
                    slave.wr_issued.push_back((p.master, p.seq));
                }
            }
        }
    }

    fn collect_responses(&mut self) -> TbResult<()> {
        for slave in self.slaves.iter_mut() {
            if let Some(beat) = slave.rd.r.pop_nb() {
                slave.rd_resp = beat.resp;
                slave.rd_beats.push(beat.data.clone());
                if beat.is_last() {
                    let p = slave
                        .rd_issued
                        .pop_front()
                        .ok_or_else(|| TbError::TestFailed("R beat without AR".into()))?;
                    let beats = std::mem::take(&mut slave.rd_beats);
                    let bytes = unpack_bytes(&p.s_req, slave.lanes, &beats);
                    let side = &mut self.masters[p.master];
                    let packed = pack_beats(&p.m_req, side.cfg.lanes(), &bytes);
                    let n = packed.len();
                    let resp = packed
                        .into_iter()
                        .enumerate()
                        .map(|(i, (mut data, _))| {
                            if self.corrupt_reads {
                                data.set_lane(0, data.lane(0) ^ 0xff);
                            }
                            let mut r = ReadPayload::new(&side.cfg);
                            r.id = r.id.map(|_| p.m_req.id());
                            r.data = data;
                            r.resp = slave.rd_resp;
                            r.last = r.last.map(|_| i + 1 == n);
                            r
                        })
                        .collect();
                    side.rd_done.insert(p.seq, resp);
                }
            }

            if let Some(b) = slave.wr.b.pop_nb() {
                let (master, seq) = slave
                    .wr_issued
                    .pop_front()
                    .ok_or_else(|| TbError::TestFailed("B without AW".into()))?;
                self.masters[master].wr_done.insert(seq, b);
            }
        }
        Ok(())
    }

    fn return_responses(&mut self) {
        let out_of_order = self.out_of_order;
        for side in self.masters.iter_mut() {
            let next_rd = match side.rd_current {
                Some(seq) => Some(seq),
                None if out_of_order => side.rd_done.keys().next_back().copied(),
                None => side.rd_order.front().copied(),
            };
            if let Some(seq) = next_rd {
                if let Some(beats) = side.rd_done.get_mut(&seq) {
                    side.rd_current = Some(seq);
                    if let Some(beat) = beats.front() {
                        if side.rd.nb_rwrite(beat) {
                            beats.pop_front();
                        }
                    }
                    if beats.is_empty() {
                        side.rd_done.remove(&seq);
                        side.rd_order.retain(|&s| s != seq);
                        side.rd_current = None;
                    }
                }
            }

            let next_wr = match out_of_order {
                true => side.wr_done.keys().next_back().copied(),
                false => side.wr_order.front().copied(),
            };
            if let Some(seq) = next_wr {
                if let Some(b) = side.wr_done.get(&seq) {
                    if side.wr.nb_bwrite(b) {
                        side.wr_done.remove(&seq);
                        side.wr_order.retain(|&s| s != seq);
                    }
                }
            }
        }
    }

    pub async fn run(mut self, clk: Clock) -> TbResult {
        loop {
            clk.rising_edge().await;
            self.do_cycle()?;
        }
    }
}

/// Shape of one traffic test.
#[derive(Debug, Clone)]
pub struct Setup {
    pub n_masters: usize,
    pub cfg: AxiConfig,
    pub slave_bits: u32,
    pub rates: (u32, u32),
    pub stall_rate: u32,
    pub corrupt_reads: bool,
    pub out_of_order: bool,
}

impl Default for Setup {
    fn default() -> Self {
        Setup {
            n_masters: 1,
            cfg: AxiConfig::standard(),
            slave_bits: 64,
            rates: (20, 20),
            stall_rate: 0,
            corrupt_reads: false,
            out_of_order: false,
        }
    }
}

pub struct Tb {
    pub sim: Sim,
    pub sb: TbObj<Scoreboard>,
    pub stop_gen: Signal<bool>,
    pub stats: Vec<TbObj<MasterStats>>,
}

impl Tb {
    /// Builds masters, slaves and the interconnect and starts them.
    pub fn start(sim: &Sim, setup: &Setup) -> TbResult<Tb> {
        let clk = sim.clock();
        let addr_map = AddrMap::new()
            .with_region(0x0, 0xffff)?
            .with_region(0x1_0000, 0x1_ffff)?;
        let sb = TbObj::new(Scoreboard::new(
            setup.n_masters,
            addr_map.clone(),
            setup.cfg.id_width,
        ));
        let stop_gen = Signal::new("stop_gen", false);
        let mut fabric = Fabric::new(addr_map.clone());
        if setup.corrupt_reads {
            fabric = fabric.corrupt_reads();
        }
        if setup.out_of_order {
            fabric = fabric.out_of_order();
        }

        let s_cfg = setup.cfg.with_data_width(setup.slave_bits);
        let s_lanes = s_cfg.lanes();
        let mut stats = Vec::new();
        for m in 0..setup.n_masters {
            let rd = read::Chan::new(&format!("m{}", m), 2, &clk);
            let wr = write::Chan::new(&format!("m{}", m), 2, &clk);
            fabric.add_master(&setup.cfg, rd.slave(), wr.slave());
            let cfg = MasterConfig::new(m, &setup.cfg)
                .with_slave_lanes(s_lanes, s_lanes)
                .with_rates(setup.rates.0, setup.rates.1)
                .with_seed(sim.seed());
            let master = AxiMaster::new(sim, cfg, rd.master(), wr.master(), sb.clone(), stop_gen.clone())?;
            stats.push(master.stats());
            sim.fork_checked(&format!("master{}", m), master.run());
        }
        for s in 0..addr_map.len() {
            let rd = read::Chan::new(&format!("s{}", s), 2, &clk);
            let wr = write::Chan::new(&format!("s{}", s), 2, &clk);
            fabric.add_slave(s_lanes, rd.master(), wr.master());
            let slave = AxiSlave::new(sim, s, &s_cfg, &s_cfg, rd.slave(), wr.slave(), sb.clone())?
                .with_stall_rate(setup.stall_rate);
            sim.fork_checked(&format!("slave{}", s), slave.run());
        }
        sim.fork_checked("fabric", fabric.run(clk));

        Ok(Tb {
            sim: sim.clone(),
            sb,
            stop_gen,
            stats,
        })
    }

    /// Generates for `gen_cycles`, then stops generation and waits up to
    /// `drain_cycles` for every prediction to be consumed.
    pub async fn run_traffic(&self, gen_cycles: u64, drain_cycles: u64) -> TbResult {
        let clk = self.sim.clock();
        clk.cycles(gen_cycles).await;
        self.stop_gen.write(true);
        for _ in 0..drain_cycles {
            clk.rising_edge().await;
            if self.sb.get().passed() {
                return self.sb.get().result();
            }
        }
        self.sb.get().result()
    }

    pub fn totals(&self) -> MasterStats {
        let mut t = MasterStats::default();
        for s in self.stats.iter().map(TbObj::snapshot) {
            t.rd_trans_generated += s.rd_trans_generated;
            t.wr_trans_generated += s.wr_trans_generated;
            t.rd_data_generated += s.rd_data_generated;
            t.wr_data_generated += s.wr_data_generated;
            t.rd_resp_ej += s.rd_resp_ej;
            t.wr_resp_ej += s.wr_resp_ej;
            t.rd_resp_count += s.rd_resp_count;
            t.wr_resp_count += s.wr_resp_count;
        }
        t
    }
}
