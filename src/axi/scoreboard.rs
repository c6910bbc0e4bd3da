//! Expected traffic shared by all masters and slaves of a testbench.
//!
//! Requests and write data expected at a slave are queued per destination;
//! responses expected at a master, and the order in which that master issued
//! its requests, are queued per master. Every queue keeps insertion order.
//! One [`TbObj`](crate::TbObj) guards the whole scoreboard, so a generation
//! or a verification updates all queues in one step.

use std::collections::VecDeque;
use std::fmt;

use crate::axi::addr_map::AddrMap;
use crate::axi::config::AxiConfig;
use crate::axi::payload::{AddrPayload, ReadPayload, WRespPayload, WritePayload};
use crate::axi::predictor::{predict_read, predict_write, slave_request};
use crate::{Dir, TbError, TbResult, Val};

/// A prediction and the cycle it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbWrap<T> {
    pub msg: T,
    pub time_gen: u64,
}

impl<T> TbWrap<T> {
    pub fn new(msg: T, time_gen: u64) -> Self {
        TbWrap { msg, time_gen }
    }
}

impl<T: fmt::Display> fmt::Display for TbWrap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.msg, self.time_gen)
    }
}

/// Result of checking a response against the master's issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Ok,
    /// The oldest request with this id went to another destination.
    Reordered,
    /// No outstanding request carries this id.
    RequestNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matched {
    /// Cycles between prediction and arrival, minus one.
    pub latency: u64,
    /// The matched prediction ends its burst.
    pub last: bool,
}

/// Outcome of verifying one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub matched: Option<Matched>,
    pub order: OrderStatus,
    /// Oldest outstanding request with the response id.
    pub ordered_req: Option<AddrPayload>,
}

impl Verdict {
    /// Turns the verdict into the protocol error it stands for, content
    /// mismatch first.
    pub fn into_result(self, master: usize, dir: Dir, resp: String, cycle: u64) -> TbResult<Matched> {
        let matched = match self.matched {
            Some(m) => m,
            None => {
                return Err(TbError::RespNotFound {
                    master,
                    dir,
                    resp,
                    cycle,
                })
            }
        };
        match self.order {
            OrderStatus::Ok => Ok(matched),
            OrderStatus::RequestNotFound => Err(TbError::RequestNotFound {
                master,
                dir,
                resp,
                cycle,
            }),
            OrderStatus::Reordered => Err(TbError::Reordered {
                master,
                dir,
                resp,
                expected: self
                    .ordered_req
                    .map(|r| r.to_string())
                    .unwrap_or_default(),
                cycle,
            }),
        }
    }
}

type Queues<T> = Vec<VecDeque<TbWrap<T>>>;

fn empty_queues<T>(n: usize) -> Queues<T> {
    (0..n).map(|_| VecDeque::new()).collect()
}

fn pending<T>(qs: &Queues<T>) -> usize {
    qs.iter().map(VecDeque::len).sum()
}

pub struct Scoreboard {
    addr_map: AddrMap,
    tid_mask: u32,
    // per destination
    rd_req_q: Queues<AddrPayload>,
    wr_req_q: Queues<AddrPayload>,
    wr_data_q: Queues<WritePayload>,
    // per master
    rd_resp_q: Queues<ReadPayload>,
    wr_resp_q: Queues<WRespPayload>,
    rd_order_q: Vec<VecDeque<AddrPayload>>,
    wr_order_q: Vec<VecDeque<AddrPayload>>,
}

impl Scoreboard {
    /// `id_width` is the id width seen by the masters; ids are compared
    /// under this mask.
    pub fn new(n_masters: usize, addr_map: AddrMap, id_width: u32) -> Self {
        let n_slaves = addr_map.len();
        Scoreboard {
            addr_map,
            tid_mask: 1u64.checked_shl(id_width).map_or(u32::MAX, |v| (v - 1) as u32),
            rd_req_q: empty_queues(n_slaves),
            wr_req_q: empty_queues(n_slaves),
            wr_data_q: empty_queues(n_slaves),
            rd_resp_q: empty_queues(n_masters),
            wr_resp_q: empty_queues(n_masters),
            rd_order_q: vec![VecDeque::new(); n_masters],
            wr_order_q: vec![VecDeque::new(); n_masters],
        }
    }

    pub fn n_masters(&self) -> usize {
        self.rd_resp_q.len()
    }

    pub fn n_slaves(&self) -> usize {
        self.rd_req_q.len()
    }

    pub fn resolve(&self, addr: u64) -> TbResult<usize> {
        self.addr_map.resolve(addr)
    }

    /// Records a generated read of `master`: the request its destination
    /// will see, the beats the master will get back and the issue order.
    /// Returns the number of predicted beats.
    pub fn push_read(
        &mut self,
        master: usize,
        m_cfg: &AxiConfig,
        s_lanes: usize,
        req: &AddrPayload,
        now: u64,
    ) -> TbResult<usize> {
        let dst = self.resolve(req.addr)?;
        self.rd_req_q[dst].push_back(TbWrap::new(slave_request(req, s_lanes), now));
        let beats = predict_read(m_cfg, req, dst as u32);
        let n_beats = beats.len();
        self.rd_resp_q[master].extend(beats.into_iter().map(|b| TbWrap::new(b, now)));
        self.rd_order_q[master].push_back(req.clone());
        Ok(n_beats)
    }

    /// Records a generated write of `master` and returns the beats to inject.
    /// The write response is only expected when the master interface has
    /// one.
    pub fn push_write(
        &mut self,
        master: usize,
        m_cfg: &AxiConfig,
        s_cfg: &AxiConfig,
        req: &AddrPayload,
        now: u64,
    ) -> TbResult<Vec<WritePayload>> {
        let dst = self.resolve(req.addr)?;
        let pred = predict_write(m_cfg, s_cfg, req, master);
        self.wr_req_q[dst].push_back(TbWrap::new(slave_request(req, s_cfg.lanes()), now));
        self.wr_data_q[dst].extend(pred.slave_beats.into_iter().map(|b| TbWrap::new(b, now)));
        if m_cfg.use_write_responses {
            let mut b = WRespPayload::new(m_cfg);
            b.id = b.id.map(|_| req.id());
            b.resp = dst as u32;
            self.wr_resp_q[master].push_back(TbWrap::new(b, now));
            self.wr_order_q[master].push_back(req.clone());
        }
        Ok(pred.master_beats)
    }

    // Oldest request with the same raw id. Status 0 when it went where the
    // response says it came from.
    fn check_order(
        &mut self,
        dir: Dir,
        master: usize,
        id: u32,
        resp: u32,
        terminal: bool,
    ) -> TbResult<(OrderStatus, Option<AddrPayload>)> {
        let order_q = match dir {
            Dir::Rd => &mut self.rd_order_q[master],
            Dir::Wr => &mut self.wr_order_q[master],
        };
        let pos = match order_q.iter().position(|r| r.id() == id) {
            Some(pos) => pos,
            None => return Ok((OrderStatus::RequestNotFound, None)),
        };
        let req = if terminal {
            order_q.remove(pos)
        } else {
            order_q.get(pos).cloned()
        };
        let req = match req {
            Some(req) => req,
            None => return Ok((OrderStatus::RequestNotFound, None)),
        };
        let status = if self.addr_map.resolve(req.addr)? as u32 == resp {
            OrderStatus::Ok
        } else {
            OrderStatus::Reordered
        };
        Ok((status, Some(req)))
    }

    pub fn verify_read(&mut self, master: usize, resp: &ReadPayload, now: u64) -> TbResult<Verdict> {
        let id = resp.id.unwrap_or(0);
        let (order, ordered_req) = self.check_order(Dir::Rd, master, id, resp.resp, resp.is_last())?;

        let mask = self.tid_mask;
        let q = &mut self.rd_resp_q[master];
        let matched = q
            .iter()
            .position(|exp| eq_rd_data(&exp.msg, resp, mask))
            .and_then(|pos| q.remove(pos))
            .map(|exp| Matched {
                latency: latency(now, exp.time_gen),
                last: exp.msg.is_last(),
            });
        Ok(Verdict {
            matched,
            order,
            ordered_req,
        })
    }

    pub fn verify_write(&mut self, master: usize, resp: &WRespPayload, now: u64) -> TbResult<Verdict> {
        let id = resp.id.unwrap_or(0);
        let (order, ordered_req) = self.check_order(Dir::Wr, master, id, resp.resp, true)?;

        let mask = self.tid_mask;
        let q = &mut self.wr_resp_q[master];
        let matched = q
            .iter()
            .position(|exp| eq_wr_resp(&exp.msg, resp, mask))
            .and_then(|pos| q.remove(pos))
            .map(|exp| Matched {
                latency: latency(now, exp.time_gen),
                last: true,
            });
        Ok(Verdict {
            matched,
            order,
            ordered_req,
        })
    }

    /// Consumes the first read request expected at `slave` equal to `req`.
    pub fn verify_slave_rd_req(&mut self, slave: usize, req: &AddrPayload, cycle: u64) -> TbResult<()> {
        let mask = self.tid_mask;
        take_first(&mut self.rd_req_q[slave], |exp| eq_req(exp, req, mask))
            .map(|_| ())
            .ok_or_else(|| mismatch(slave, "AR", req, cycle))
    }

    pub fn verify_slave_wr_req(&mut self, slave: usize, req: &AddrPayload, cycle: u64) -> TbResult<()> {
        let mask = self.tid_mask;
        take_first(&mut self.wr_req_q[slave], |exp| eq_req(exp, req, mask))
            .map(|_| ())
            .ok_or_else(|| mismatch(slave, "AW", req, cycle))
    }

    pub fn verify_slave_wr_data(&mut self, slave: usize, beat: &WritePayload, cycle: u64) -> TbResult<()> {
        take_first(&mut self.wr_data_q[slave], |exp| exp == beat)
            .map(|_| ())
            .ok_or_else(|| mismatch(slave, "W", beat, cycle))
    }

    pub fn rd_resp_front(&self, master: usize) -> Option<&TbWrap<ReadPayload>> {
        self.rd_resp_q.get(master)?.front()
    }

    pub fn wr_resp_front(&self, master: usize) -> Option<&TbWrap<WRespPayload>> {
        self.wr_resp_q.get(master)?.front()
    }

    pub fn rd_req_front(&self, slave: usize) -> Option<&TbWrap<AddrPayload>> {
        self.rd_req_q.get(slave)?.front()
    }

    pub fn wr_req_front(&self, slave: usize) -> Option<&TbWrap<AddrPayload>> {
        self.wr_req_q.get(slave)?.front()
    }

    /// Predicted read beats and write responses still waiting at `master`.
    pub fn outstanding(&self, master: usize) -> (usize, usize) {
        (
            self.rd_resp_q.get(master).map_or(0, VecDeque::len),
            self.wr_resp_q.get(master).map_or(0, VecDeque::len),
        )
    }

    pub fn passed(&self) -> bool {
        pending(&self.rd_req_q) == 0
            && pending(&self.wr_req_q) == 0
            && pending(&self.wr_data_q) == 0
            && pending(&self.rd_resp_q) == 0
            && pending(&self.wr_resp_q) == 0
            && self.rd_order_q.iter().all(VecDeque::is_empty)
            && self.wr_order_q.iter().all(VecDeque::is_empty)
    }

    pub fn result_str(&self) -> String {
        format!(
            "pending: AR={}, AW={}, W={}, R={}, B={}",
            pending(&self.rd_req_q),
            pending(&self.wr_req_q),
            pending(&self.wr_data_q),
            pending(&self.rd_resp_q),
            pending(&self.wr_resp_q),
        )
    }

    pub fn result(&self) -> TbResult {
        match self.passed() {
            true => Ok(Val::String(self.result_str())),
            false => Err(TbError::TestFailed(self.result_str())),
        }
    }
}

fn latency(now: u64, time_gen: u64) -> u64 {
    now.saturating_sub(time_gen).saturating_sub(1)
}

fn take_first<T>(q: &mut VecDeque<TbWrap<T>>, pred: impl Fn(&T) -> bool) -> Option<TbWrap<T>> {
    let pos = q.iter().position(|e| pred(&e.msg))?;
    q.remove(pos)
}

fn mismatch(slave: usize, what: &'static str, msg: &impl fmt::Display, cycle: u64) -> TbError {
    TbError::SlaveMismatch {
        slave,
        what,
        msg: msg.to_string(),
        cycle,
    }
}

fn masked(id: Option<u32>, mask: u32) -> Option<u32> {
    id.map(|id| id & mask)
}

/// R beats are equal when id (under `mask`), data, resp and last agree.
pub fn eq_rd_data(a: &ReadPayload, b: &ReadPayload, mask: u32) -> bool {
    masked(a.id, mask) == masked(b.id, mask) && a.data == b.data && a.resp == b.resp && a.last == b.last
}

pub fn eq_wr_resp(a: &WRespPayload, b: &WRespPayload, mask: u32) -> bool {
    masked(a.id, mask) == masked(b.id, mask) && a.resp == b.resp
}

fn eq_req(a: &AddrPayload, b: &AddrPayload, mask: u32) -> bool {
    masked(a.id, mask) == masked(b.id, mask)
        && a.addr == b.addr
        && a.len == b.len
        && a.size == b.size
        && a.burst == b.burst
}
