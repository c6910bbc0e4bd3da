//! Write path: AW requests and W beats from master to slave, B back.

use crate::axi::channel::{Combinational, In, Out};
use crate::axi::payload::{AddrPayload, WRespPayload, WritePayload};
use crate::signal::Clock;

#[derive(Clone)]
pub struct Chan {
    pub aw: Combinational<AddrPayload>,
    pub w: Combinational<WritePayload>,
    pub b: Combinational<WRespPayload>,
}

impl Chan {
    pub fn new(name: &str, depth: usize, clk: &Clock) -> Self {
        Chan {
            aw: Combinational::new(&format!("{}_aw", name), depth, clk),
            w: Combinational::new(&format!("{}_w", name), depth, clk),
            b: Combinational::new(&format!("{}_b", name), depth, clk),
        }
    }

    pub fn master(&self) -> Master {
        Master {
            aw: self.aw.out_port(),
            w: self.w.out_port(),
            b: self.b.in_port(),
        }
    }

    pub fn slave(&self) -> Slave {
        Slave {
            aw: self.aw.in_port(),
            w: self.w.in_port(),
            b: self.b.out_port(),
            stored_waddr: None,
        }
    }
}

#[derive(Clone)]
pub struct Master {
    pub aw: Out<AddrPayload>,
    pub w: Out<WritePayload>,
    pub b: In<WRespPayload>,
}

impl Master {
    pub fn reset(&self) {
        self.aw.reset();
        self.w.reset();
        self.b.reset();
    }

    /// Single-beat write: sends address and data, waits for the response.
    pub async fn write(&self, addr: &AddrPayload, data: &WritePayload) -> WRespPayload {
        self.aw.push(addr).await;
        self.w.push(data).await;
        self.b.pop().await
    }
}

/// Slave end of the write path.
///
/// AW and W arrive independently. An address popped before its data is kept
/// until a data beat pairs with it, and no further address is accepted
/// meanwhile.
pub struct Slave {
    pub aw: In<AddrPayload>,
    pub w: In<WritePayload>,
    pub b: Out<WRespPayload>,
    stored_waddr: Option<AddrPayload>,
}

impl Slave {
    pub fn reset(&mut self) {
        self.aw.reset();
        self.w.reset();
        self.b.reset();
        self.stored_waddr = None;
    }

    pub fn got_waddr(&self) -> bool {
        self.stored_waddr.is_some()
    }

    pub async fn wread(&self) -> (AddrPayload, WritePayload) {
        let addr = self.aw.pop().await;
        let data = self.w.pop().await;
        (addr, data)
    }

    /// Pairs the held (or a newly popped) address with one data beat. The
    /// address is released once the beat is consumed.
    pub fn nb_wread(&mut self) -> Option<(AddrPayload, WritePayload)> {
        if self.stored_waddr.is_none() {
            self.stored_waddr = Some(self.aw.pop_nb()?);
        }
        let data = self.w.pop_nb()?;
        self.stored_waddr.take().map(|addr| (addr, data))
    }

    pub async fn bwrite(&self, resp: &WRespPayload) {
        self.b.push(resp).await
    }

    pub fn nb_bwrite(&self, resp: &WRespPayload) -> bool {
        self.b.push_nb(resp)
    }
}
