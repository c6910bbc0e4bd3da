//! AXI4/ACE transaction-level model: payloads and their wire format, ports,
//! the per-master generator and the shared scoreboard.

pub mod addr_map;
pub mod channel;
pub mod config;
pub mod enc;
pub mod generator;
pub mod marshall;
pub mod master;
pub mod payload;
pub mod predictor;
pub mod read;
pub mod scoreboard;
pub mod slave;
pub mod write;
