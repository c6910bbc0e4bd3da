use crate::{TbError, TbResult};

// Simulation time is counted in clock cycles; wall units are derived from the
// clock period, which is expressed in picoseconds.
const PERIOD_SCALE: i8 = -12;

#[derive(Debug, Hash, Clone, Copy, Eq, PartialEq)]
pub enum SimCallback {
    /// Next rising clock edge.
    Edge,
    /// Timer. Registered with a delay in cycles, reported back with the
    /// absolute cycle it fired at.
    Time(u64),
}

/// Narrow interface to the clock that drives the testbench.
pub trait SimIf: Send + Sync {
    fn get_sim_cycles(&self) -> u64;
    fn get_clk_period_ps(&self) -> u64;
    fn log(&self, s: &str);
    fn register_callback(&self, cb: SimCallback) -> TbResult<usize>;
    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()>;
    fn get_sim_time(&self, unit: &str) -> TbResult<f64> {
        // this function does not preserve precision, so don't use carelessly
        let ps = (self.get_sim_cycles() * self.get_clk_period_ps()) as f64;
        Ok(ldexp10(ps, PERIOD_SCALE - time_scale(unit)?))
    }
    fn get_sim_steps(&self, time: f64, unit: &str) -> TbResult<u64> {
        let ps = ldexp10(time, time_scale(unit)? - PERIOD_SCALE);
        let cycles = ps / self.get_clk_period_ps() as f64;
        if cycles % 1.0 == 0.0 {
            Ok(cycles as u64)
        } else {
            Err(TbError::TimeConversion {
                time,
                unit: unit.to_string(),
            })
        }
    }
}

fn time_scale(unit: &str) -> TbResult<i8> {
    match unit {
        "fs" => Ok(-15),
        "ps" => Ok(-12),
        "ns" => Ok(-9),
        "us" => Ok(-6),
        "ms" => Ok(-3),
        "sec" => Ok(0),
        _ => Err(TbError::config(format!("unknown time unit '{}'", unit))),
    }
}

fn ldexp10(frac: f64, exp: i8) -> f64 {
    // Like math.ldexp, but base 10
    if exp >= 0 {
        frac * 10_u64.pow(exp as u32) as f64
    } else {
        let div = 10_u64.pow(-exp as u32) as f64;
        frac / div
    }
}
