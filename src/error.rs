use std::fmt;
use std::io;

/// Direction of the transaction a verdict refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dir {
    Rd,
    Wr,
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dir::Rd => write!(f, "RD"),
            Dir::Wr => write!(f, "WR"),
        }
    }
}

/// Everything that can stop a testbench.
///
/// Protocol violations are fatal: they are returned up to the task that
/// detected them, which fails the running test.
#[derive(Debug, thiserror::Error)]
pub enum TbError {
    /// No region of the address map contains the address.
    #[error("target address {addr:#x} not found in address map")]
    AddrNotMapped { addr: u64 },

    /// Invalid elaboration-time parameters.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// A time value could not be converted to clock cycles without rounding.
    #[error("can't convert {time} {unit} to clock cycles")]
    TimeConversion { time: f64, unit: String },

    /// A received response matches no prediction.
    #[error("[Master {master}] {dir}-Resp : {resp} . NOT FOUND! @{cycle}")]
    RespNotFound {
        master: usize,
        dir: Dir,
        resp: String,
        cycle: u64,
    },

    /// The order queue holds no request with the response id.
    #[error("[Master {master}] {dir}-Resp : {resp} . Respective Request wasn't found!!! @{cycle}")]
    RequestNotFound {
        master: usize,
        dir: Dir,
        resp: String,
        cycle: u64,
    },

    /// A same-id response overtook an older request.
    #[error("[Master {master}] {dir}-Resp : {resp} . Got Reordered !!! @{cycle} (REQ-Ordered - {expected})")]
    Reordered {
        master: usize,
        dir: Dir,
        resp: String,
        expected: String,
        cycle: u64,
    },

    /// A slave received a request or data beat nobody predicted.
    #[error("[Slave {slave}] unexpected {what}: {msg} @{cycle}")]
    SlaveMismatch {
        slave: usize,
        what: &'static str,
        msg: String,
        cycle: u64,
    },

    #[error("malformed payload: {reason}")]
    Malformed { reason: String },

    /// A bounded injection queue refused an entry.
    #[error("injection queue: {0}")]
    Queue(String),

    #[error("test stopped after {cycles} cycles")]
    SimTimeout { cycles: u64 },

    #[error("awaited task was cancelled")]
    TaskCancelled,

    #[error("test failed: {0}")]
    TestFailed(String),

    #[error("report error: {0}")]
    Report(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TbError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        TbError::Config {
            reason: reason.into(),
        }
    }

    pub(crate) fn queue(reason: &str) -> Self {
        TbError::Queue(reason.to_string())
    }

    /// True for the fatal protocol-violation class.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            TbError::RespNotFound { .. }
                | TbError::RequestNotFound { .. }
                | TbError::Reordered { .. }
                | TbError::SlaveMismatch { .. }
        )
    }
}
