//! Read path: AR requests from master to slave, R beats back.

use crate::axi::channel::{Combinational, In, Out};
use crate::axi::payload::{AddrPayload, ReadPayload};
use crate::signal::Clock;

/// The AR and R channels between one master and one slave.
#[derive(Clone)]
pub struct Chan {
    pub ar: Combinational<AddrPayload>,
    pub r: Combinational<ReadPayload>,
}

impl Chan {
    pub fn new(name: &str, depth: usize, clk: &Clock) -> Self {
        Chan {
            ar: Combinational::new(&format!("{}_ar", name), depth, clk),
            r: Combinational::new(&format!("{}_r", name), depth, clk),
        }
    }

    pub fn master(&self) -> Master {
        Master {
            ar: self.ar.out_port(),
            r: self.r.in_port(),
        }
    }

    pub fn slave(&self) -> Slave {
        Slave {
            ar: self.ar.in_port(),
            r: self.r.out_port(),
        }
    }
}

#[derive(Clone)]
pub struct Master {
    pub ar: Out<AddrPayload>,
    pub r: In<ReadPayload>,
}

impl Master {
    pub fn reset(&self) {
        self.ar.reset();
        self.r.reset();
    }

    /// Sends `addr` and waits for the first response beat.
    pub async fn query(&self, addr: &AddrPayload) -> ReadPayload {
        self.ar.push(addr).await;
        self.r.pop().await
    }

    /// Sends `addr` and collects beats up to the one flagged last.
    pub async fn query_burst(&self, addr: &AddrPayload) -> Vec<ReadPayload> {
        self.ar.push(addr).await;
        let mut beats = Vec::new();
        loop {
            let beat = self.r.pop().await;
            let last = beat.is_last();
            beats.push(beat);
            if last {
                return beats;
            }
        }
    }
}

#[derive(Clone)]
pub struct Slave {
    pub ar: In<AddrPayload>,
    pub r: Out<ReadPayload>,
}

impl Slave {
    pub fn reset(&self) {
        self.ar.reset();
        self.r.reset();
    }

    pub async fn aread(&self) -> AddrPayload {
        self.ar.pop().await
    }

    pub fn nb_aread(&self) -> Option<AddrPayload> {
        self.ar.pop_nb()
    }

    pub async fn rwrite(&self, data: &ReadPayload) {
        self.r.push(data).await
    }

    pub fn nb_rwrite(&self, data: &ReadPayload) -> bool {
        self.r.push_nb(data)
    }
}
