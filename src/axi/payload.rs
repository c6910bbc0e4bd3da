//! Messages carried on the AR/AW, W, R and B channels.
//!
//! Fields absent under the interface configuration are `None`; they take no
//! bits on the wire and are never compared as zero.

use std::fmt;

use crate::axi::config::AxiConfig;
use crate::axi::enc::Burst;
use crate::axi::marshall::{Marshall, Marshaller, Unmarshaller};
use crate::TbResult;

fn present<T>(width: u32, zero: T) -> Option<T> {
    (width > 0).then_some(zero)
}

fn strobe_mask(lanes: usize) -> u128 {
    if lanes >= 128 {
        u128::MAX
    } else {
        (1u128 << lanes) - 1
    }
}

struct Hex(Option<u128>);

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:x}", v),
            None => write!(f, "-"),
        }
    }
}

fn hex<T: Into<u128>>(v: Option<T>) -> Hex {
    Hex(v.map(Into::into))
}

/// Data bus value, one byte per lane, lane 0 first.
#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct Data(Vec<u8>);

impl Data {
    pub fn zeroed(lanes: usize) -> Self {
        Data(vec![0; lanes])
    }
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Data(bytes)
    }
    pub fn lanes(&self) -> usize {
        self.0.len()
    }
    pub fn lane(&self, lane: usize) -> u8 {
        self.0.get(lane).copied().unwrap_or(0)
    }
    pub fn set_lane(&mut self, lane: usize, byte: u8) {
        if let Some(b) = self.0.get_mut(lane) {
            *b = byte;
        }
    }
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Data {
    // hex number, most significant lane first
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.iter().rposition(|b| *b != 0) {
            None => write!(f, "0"),
            Some(top) => {
                write!(f, "{:x}", self.0[top])?;
                for b in self.0[..top].iter().rev() {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// AR/AW request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrPayload {
    pub id: Option<u32>,
    pub addr: u64,
    pub burst: Option<Burst>,
    /// Beats minus one.
    pub len: Option<u32>,
    /// log2 of the bytes per beat.
    pub size: Option<u32>,
    pub cache: Option<u8>,
    pub auser: Option<u64>,
    pub snoop: Option<u8>,
    pub domain: Option<u8>,
    pub barrier: Option<u8>,
    /// AW only.
    pub unique: Option<bool>,
}

impl AddrPayload {
    pub fn new(cfg: &AxiConfig) -> Self {
        AddrPayload {
            id: present(cfg.id_width, 0),
            addr: 0,
            burst: present(cfg.burst_width(), Burst::Fixed),
            len: present(cfg.alen_width(), 0),
            size: present(cfg.asize_width(), 0),
            cache: present(cfg.cache_width(), 0),
            auser: present(cfg.a_user_width, 0),
            snoop: present(cfg.snoop_width(), 0),
            domain: present(cfg.domain_width(), 0),
            barrier: present(cfg.barrier_width(), 0),
            unique: present(cfg.unique_width(), false),
        }
    }

    pub fn id(&self) -> u32 {
        self.id.unwrap_or(0)
    }
    pub fn alen(&self) -> u32 {
        self.len.unwrap_or(0)
    }
    pub fn asize(&self) -> u32 {
        self.size.unwrap_or(0)
    }
    /// An interface without AxBURST only does INCR bursts.
    pub fn aburst(&self) -> Burst {
        self.burst.unwrap_or(Burst::Incr)
    }

    /// Bytes moved by the whole burst.
    pub fn bytes_total(&self) -> u64 {
        ((self.alen() as u64) + 1) << self.asize()
    }

    /// Same routing fields, metadata reset to zero.
    pub fn cleared(&self) -> Self {
        AddrPayload {
            cache: self.cache.map(|_| 0),
            auser: self.auser.map(|_| 0),
            snoop: self.snoop.map(|_| 0),
            domain: self.domain.map(|_| 0),
            barrier: self.barrier.map(|_| 0),
            unique: self.unique.map(|_| false),
            ..self.clone()
        }
    }
}

impl Marshall for AddrPayload {
    fn width(cfg: &AxiConfig) -> u32 {
        cfg.addr_width
            + cfg.id_width
            + cfg.alen_width()
            + cfg.asize_width()
            + cfg.burst_width()
            + cfg.cache_width()
            + cfg.a_user_width
            + cfg.snoop_width()
            + cfg.domain_width()
            + cfg.barrier_width()
            + cfg.unique_width()
    }

    fn marshall(&self, cfg: &AxiConfig, m: &mut Marshaller) {
        m.put(self.id() as u128, cfg.id_width);
        m.put(self.addr as u128, cfg.addr_width);
        m.put(self.alen() as u128, cfg.alen_width());
        m.put(self.asize() as u128, cfg.asize_width());
        m.put(self.burst.map_or(0, Burst::bits) as u128, cfg.burst_width());
        m.put(self.cache.unwrap_or(0) as u128, cfg.cache_width());
        m.put(self.auser.unwrap_or(0) as u128, cfg.a_user_width);
        m.put(self.snoop.unwrap_or(0) as u128, cfg.snoop_width());
        m.put(self.domain.unwrap_or(0) as u128, cfg.domain_width());
        m.put(self.barrier.unwrap_or(0) as u128, cfg.barrier_width());
        m.put(self.unique.unwrap_or(false) as u128, cfg.unique_width());
    }

    fn unmarshall(cfg: &AxiConfig, u: &mut Unmarshaller) -> TbResult<Self> {
        let id = u.take_opt(cfg.id_width).map(|v| v as u32);
        let addr = u.take(cfg.addr_width) as u64;
        let len = u.take_opt(cfg.alen_width()).map(|v| v as u32);
        let size = u.take_opt(cfg.asize_width()).map(|v| v as u32);
        let burst = match u.take_opt(cfg.burst_width()) {
            Some(bits) => Some(Burst::from_bits(bits as u64)?),
            None => None,
        };
        Ok(AddrPayload {
            id,
            addr,
            burst,
            len,
            size,
            cache: u.take_opt(cfg.cache_width()).map(|v| v as u8),
            auser: u.take_opt(cfg.a_user_width).map(|v| v as u64),
            snoop: u.take_opt(cfg.snoop_width()).map(|v| v as u8),
            domain: u.take_opt(cfg.domain_width()).map(|v| v as u8),
            barrier: u.take_opt(cfg.barrier_width()).map(|v| v as u8),
            unique: u.take_opt(cfg.unique_width()).map(|v| v == 1),
        })
    }
}

impl fmt::Display for AddrPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id:{} Addr:{:x} Len:{} Sz:{} Bu:{}",
            hex(self.id),
            self.addr,
            hex(self.len),
            hex(self.size),
            hex(self.burst.map(Burst::bits)),
        )?;
        if self.cache.is_some() {
            write!(f, " csh:{}", hex(self.cache))?;
        }
        if self.auser.is_some() {
            write!(f, " Us:{}", hex(self.auser))?;
        }
        if self.snoop.is_some() {
            write!(
                f,
                " --ACE-- Snp:{} Dom:{} Bar:{} Unq:{}",
                hex(self.snoop),
                hex(self.domain),
                hex(self.barrier),
                hex(self.unique.map(u8::from)),
            )?;
        }
        Ok(())
    }
}

/// R beat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPayload {
    pub id: Option<u32>,
    pub data: Data,
    pub resp: u32,
    pub last: Option<bool>,
    pub ruser: Option<u64>,
}

impl ReadPayload {
    pub fn new(cfg: &AxiConfig) -> Self {
        ReadPayload {
            id: present(cfg.id_width, 0),
            data: Data::zeroed(cfg.lanes()),
            resp: 0,
            last: present(cfg.last_width(), false),
            ruser: present(cfg.r_user_width, 0),
        }
    }

    /// Without a LAST signal every beat ends its burst.
    pub fn is_last(&self) -> bool {
        self.last.unwrap_or(true)
    }
}

impl Marshall for ReadPayload {
    fn width(cfg: &AxiConfig) -> u32 {
        cfg.data_width + cfg.resp_width() + cfg.id_width + cfg.last_width() + cfg.r_user_width
    }

    fn marshall(&self, cfg: &AxiConfig, m: &mut Marshaller) {
        m.put(self.id.unwrap_or(0) as u128, cfg.id_width);
        m.put_bytes(self.data.as_bytes(), cfg.data_width);
        m.put(self.resp as u128, cfg.resp_width());
        m.put(self.last.unwrap_or(false) as u128, cfg.last_width());
        m.put(self.ruser.unwrap_or(0) as u128, cfg.r_user_width);
    }

    fn unmarshall(cfg: &AxiConfig, u: &mut Unmarshaller) -> TbResult<Self> {
        Ok(ReadPayload {
            id: u.take_opt(cfg.id_width).map(|v| v as u32),
            data: Data::from_bytes(u.take_bytes(cfg.data_width)),
            resp: u.take(cfg.resp_width()) as u32,
            last: u.take_opt(cfg.last_width()).map(|v| v == 1),
            ruser: u.take_opt(cfg.r_user_width).map(|v| v as u64),
        })
    }
}

impl fmt::Display for ReadPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id:{} Data:{} Resp:{:x} Last:{} Usr:{}",
            hex(self.id),
            self.data,
            self.resp,
            hex(self.last.map(u8::from)),
            hex(self.ruser),
        )
    }
}

/// B response, one per write burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WRespPayload {
    pub id: Option<u32>,
    pub resp: u32,
    pub buser: Option<u64>,
}

impl WRespPayload {
    pub fn new(cfg: &AxiConfig) -> Self {
        WRespPayload {
            id: present(cfg.bid_width(), 0),
            resp: 0,
            buser: present(cfg.buser_width(), 0),
        }
    }
}

impl Marshall for WRespPayload {
    fn width(cfg: &AxiConfig) -> u32 {
        cfg.resp_width() + cfg.bid_width() + cfg.buser_width()
    }

    fn marshall(&self, cfg: &AxiConfig, m: &mut Marshaller) {
        m.put(self.id.unwrap_or(0) as u128, cfg.bid_width());
        m.put(self.resp as u128, cfg.resp_width());
        m.put(self.buser.unwrap_or(0) as u128, cfg.buser_width());
    }

    fn unmarshall(cfg: &AxiConfig, u: &mut Unmarshaller) -> TbResult<Self> {
        Ok(WRespPayload {
            id: u.take_opt(cfg.bid_width()).map(|v| v as u32),
            resp: u.take(cfg.resp_width()) as u32,
            buser: u.take_opt(cfg.buser_width()).map(|v| v as u64),
        })
    }
}

impl fmt::Display for WRespPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id:{} Resp:{:x} Usr:{}",
            hex(self.id),
            self.resp,
            hex(self.buser)
        )
    }
}

/// W beat. Carries no id: it belongs to the AW accepted before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePayload {
    pub data: Data,
    pub last: Option<bool>,
    pub wstrb: Option<u128>,
    pub wuser: Option<u64>,
}

impl WritePayload {
    /// All strobes set.
    pub fn new(cfg: &AxiConfig) -> Self {
        WritePayload {
            data: Data::zeroed(cfg.lanes()),
            last: present(cfg.last_width(), false),
            wstrb: present(cfg.wstrb_width(), strobe_mask(cfg.lanes())),
            wuser: present(cfg.w_user_width, 0),
        }
    }

    pub fn is_last(&self) -> bool {
        self.last.unwrap_or(true)
    }
}

impl Marshall for WritePayload {
    fn width(cfg: &AxiConfig) -> u32 {
        cfg.data_width + cfg.last_width() + cfg.wstrb_width() + cfg.w_user_width
    }

    fn marshall(&self, cfg: &AxiConfig, m: &mut Marshaller) {
        m.put_bytes(self.data.as_bytes(), cfg.data_width);
        m.put(self.last.unwrap_or(false) as u128, cfg.last_width());
        m.put(self.wstrb.unwrap_or(0), cfg.wstrb_width());
        m.put(self.wuser.unwrap_or(0) as u128, cfg.w_user_width);
    }

    fn unmarshall(cfg: &AxiConfig, u: &mut Unmarshaller) -> TbResult<Self> {
        Ok(WritePayload {
            data: Data::from_bytes(u.take_bytes(cfg.data_width)),
            last: u.take_opt(cfg.last_width()).map(|v| v == 1),
            wstrb: u.take_opt(cfg.wstrb_width()),
            wuser: u.take_opt(cfg.w_user_width).map(|v| v as u64),
        })
    }
}

impl fmt::Display for WritePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Data:{} Last:{} Strb:{} Usr:{}",
            self.data,
            hex(self.last.map(u8::from)),
            hex(self.wstrb),
            hex(self.wuser),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TbError;

    #[test]
    fn zero_construction_follows_config() {
        let cfg = AxiConfig::standard();
        let req = AddrPayload::new(&cfg);
        assert_eq!(req.id, Some(0));
        assert_eq!(req.len, Some(0));
        assert_eq!(req.cache, None);
        assert_eq!(req.snoop, None);

        let w = WritePayload::new(&cfg);
        assert_eq!(w.wstrb, Some(0xff));
        assert_eq!(w.data.lanes(), 8);

        let b = WRespPayload::new(&AxiConfig {
            use_write_responses: false,
            ..cfg
        });
        assert_eq!(b.id, None);
    }

    #[test]
    fn payload_widths() {
        let cfg = AxiConfig::standard();
        // addr 32 + id 4 + len 8 + size 3 + burst 2
        assert_eq!(AddrPayload::width(&cfg), 49);
        assert_eq!(ReadPayload::width(&cfg), 64 + 2 + 4 + 1);
        assert_eq!(WRespPayload::width(&cfg), 2 + 4);
        assert_eq!(WritePayload::width(&cfg), 64 + 1 + 8);

        let ace = AxiConfig::ace();
        assert_eq!(AddrPayload::width(&ace), 49 + 4 + 4 + 2 + 2 + 1);
        assert_eq!(ReadPayload::width(&ace), 64 + 4 + 4 + 1);
    }

    #[test]
    fn addr_payload_wire_layout() {
        let cfg = AxiConfig {
            addr_width: 8,
            ..AxiConfig::standard()
        };
        let mut req = AddrPayload::new(&cfg);
        req.id = Some(0x3);
        req.addr = 0xa5;
        req.len = Some(1);
        req.size = Some(2);
        req.burst = Some(Burst::Wrap);
        // id[3:0] addr[11:4] len[19:12] size[22:20] burst[24:23]
        let bits = req.to_bits(&cfg);
        assert_eq!(bits, vec![0x53, 0x1a, 0x20, 0x01]);
        assert_eq!(AddrPayload::from_bits(&cfg, &bits).unwrap(), req);
    }

    #[test]
    fn ace_fields_survive_the_wire() {
        let cfg = AxiConfig::ace();
        let mut req = AddrPayload::new(&cfg);
        req.addr = 0x1_0040;
        req.snoop = Some(0xb);
        req.domain = Some(2);
        req.barrier = Some(1);
        req.unique = Some(true);
        req.cache = Some(0x3);
        let bits = req.to_bits(&cfg);
        assert_eq!(bits.len(), 8);
        assert_eq!(AddrPayload::from_bits(&cfg, &bits).unwrap(), req);
    }

    #[test]
    fn write_beat_wire_layout() {
        let cfg = AxiConfig::standard().with_data_width(16);
        let mut w = WritePayload::new(&cfg);
        w.data = Data::from_bytes(vec![0x12, 0x34]);
        w.last = Some(true);
        w.wstrb = Some(0b10);
        // data[15:0] last[16] wstrb[18:17]
        assert_eq!(w.to_bits(&cfg), vec![0x12, 0x34, 0b101]);
    }

    #[test]
    fn malformed_bits_are_rejected() {
        let cfg = AxiConfig::standard();
        assert!(matches!(
            WRespPayload::from_bits(&cfg, &[0, 0]),
            Err(TbError::Malformed { .. })
        ));
        let narrow = AxiConfig {
            addr_width: 8,
            id_width: 0,
            use_variable_beat_size: false,
            use_burst: true,
            max_burst_size: 2,
            ..AxiConfig::standard()
        };
        // addr[7:0] len[8] burst[10:9] = 3
        assert!(matches!(
            AddrPayload::from_bits(&narrow, &[0, 0b110]),
            Err(TbError::Malformed { .. })
        ));
    }

    #[test]
    fn display_formats() {
        let cfg = AxiConfig::standard().with_data_width(32);
        let mut req = AddrPayload::new(&cfg);
        req.id = Some(2);
        req.addr = 0x10040;
        req.len = Some(3);
        req.size = Some(2);
        req.burst = Some(Burst::Incr);
        assert_eq!(req.to_string(), "Id:2 Addr:10040 Len:3 Sz:2 Bu:1");

        let mut r = ReadPayload::new(&cfg);
        r.id = Some(1);
        r.data = Data::from_bytes(vec![0x00, 0x01, 0x02, 0x0a]);
        r.resp = 1;
        r.last = Some(true);
        assert_eq!(r.to_string(), "Id:1 Data:a020100 Resp:1 Last:1 Usr:-");

        let ace = AddrPayload::new(&AxiConfig::ace());
        assert_eq!(
            ace.to_string(),
            "Id:0 Addr:0 Len:0 Sz:0 Bu:0 csh:0 --ACE-- Snp:0 Dom:0 Bar:0 Unq:0"
        );
    }

    #[test]
    fn cleared_keeps_routing_fields() {
        let mut req = AddrPayload::new(&AxiConfig::ace());
        req.id = Some(3);
        req.addr = 0x80;
        req.snoop = Some(7);
        req.unique = Some(true);
        let c = req.cleared();
        assert_eq!(c.id, Some(3));
        assert_eq!(c.addr, 0x80);
        assert_eq!(c.snoop, Some(0));
        assert_eq!(c.unique, Some(false));
    }
}
