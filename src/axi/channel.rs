//! Ready/valid channels between testbench components.
//!
//! A channel is a bounded FIFO shared by one [`Out`] and one [`In`] port.
//! Non-blocking operations report success immediately; the blocking forms
//! retry once per clock edge.

use std::collections::VecDeque;

use crate::signal::Clock;
use crate::tb_obj::TbObj;

struct ChanState<T> {
    queue: VecDeque<T>,
    depth: usize,
    pushed: u64,
    popped: u64,
}

#[derive(Clone)]
pub struct Combinational<T> {
    name: String,
    state: TbObj<ChanState<T>>,
    clk: Clock,
}

impl<T: Clone> Combinational<T> {
    pub fn new(name: &str, depth: usize, clk: &Clock) -> Self {
        Combinational {
            name: name.to_string(),
            state: TbObj::new(ChanState {
                queue: VecDeque::with_capacity(depth),
                depth: depth.max(1),
                pushed: 0,
                popped: 0,
            }),
            clk: clk.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn out_port(&self) -> Out<T> {
        Out { chan: self.clone() }
    }

    pub fn in_port(&self) -> In<T> {
        In { chan: self.clone() }
    }

    /// Messages waiting to be popped.
    pub fn occupancy(&self) -> usize {
        self.state.get().queue.len()
    }

    /// Total pushes and pops so far.
    pub fn transfers(&self) -> (u64, u64) {
        let s = self.state.get();
        (s.pushed, s.popped)
    }

    fn reset(&self) {
        self.state.get().queue.clear();
    }

    fn push_nb(&self, msg: &T) -> bool {
        let mut s = self.state.get();
        if s.queue.len() < s.depth {
            s.queue.push_back(msg.clone());
            s.pushed += 1;
            true
        } else {
            false
        }
    }

    fn pop_nb(&self) -> Option<T> {
        let mut s = self.state.get();
        let msg = s.queue.pop_front();
        if msg.is_some() {
            s.popped += 1;
        }
        msg
    }
}

/// Sending end of a channel.
#[derive(Clone)]
pub struct Out<T> {
    chan: Combinational<T>,
}

impl<T: Clone> Out<T> {
    pub fn reset(&self) {
        self.chan.reset();
    }

    pub fn push_nb(&self, msg: &T) -> bool {
        self.chan.push_nb(msg)
    }

    pub async fn push(&self, msg: &T) {
        while !self.chan.push_nb(msg) {
            self.chan.clk.rising_edge().await;
        }
    }

    pub fn is_full(&self) -> bool {
        let s = self.chan.state.get();
        s.queue.len() >= s.depth
    }
}

/// Receiving end of a channel.
#[derive(Clone)]
pub struct In<T> {
    chan: Combinational<T>,
}

impl<T: Clone> In<T> {
    pub fn reset(&self) {
        self.chan.reset();
    }

    pub fn pop_nb(&self) -> Option<T> {
        self.chan.pop_nb()
    }

    pub async fn pop(&self) -> T {
        loop {
            if let Some(msg) = self.chan.pop_nb() {
                return msg;
            }
            self.chan.clk.rising_edge().await;
        }
    }

    pub fn peek(&self) -> Option<T> {
        self.chan.state.get().queue.front().cloned()
    }
}
