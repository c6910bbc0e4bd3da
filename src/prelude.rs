pub use crate::axi::{
    addr_map::AddrMap,
    config::{AxiConfig, GenLimits, MasterConfig},
    enc::Burst,
    marshall::Marshall,
    master::{AxiMaster, MasterStats},
    payload::{AddrPayload, Data, ReadPayload, WRespPayload, WritePayload},
    scoreboard::Scoreboard,
    slave::AxiSlave,
};
pub use crate::sim_if::SimIf;
pub use crate::utils::clock_cycles;
pub use crate::{run, run_tests};
pub use crate::{Clock, Dir, JoinHandle, Signal, Sim, Task, Trigger};
pub use crate::{TbConfig, TbError, TbObj, TbResult, TbTests, Test, Val};
pub use futures::future::FutureExt;
