use intmap::IntMap;
use num_format::{Locale, ToFormattedString};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::sim_if::{SimCallback, SimIf};
use crate::{TbError, TbResult};

/// Built-in clock: one rising edge per cycle, nothing else.
pub(crate) struct CycleSim {
    cycle: AtomicU64,
    clk_period_ps: u64,
    verbose: bool,
    callbacks: Mutex<CallbackTable>,
}

struct CallbackTable {
    next_hdl: usize,
    edge: Option<usize>,
    // absolute cycle -> handle
    timers: BTreeMap<u64, usize>,
    handles: IntMap<SimCallback>,
}

impl CycleSim {
    pub(crate) fn new(clk_period_ps: u64, verbose: bool) -> Self {
        CycleSim {
            cycle: AtomicU64::new(0),
            clk_period_ps,
            verbose,
            callbacks: Mutex::new(CallbackTable {
                next_hdl: 0,
                edge: None,
                timers: BTreeMap::new(),
                handles: IntMap::new(),
            }),
        }
    }

    /// Moves the clock to its next rising edge and returns the callbacks that
    /// fire on it, edge callbacks first.
    pub(crate) fn advance(&self) -> Vec<SimCallback> {
        let now = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let mut table = self.callbacks.lock().unwrap();
        let mut fired = Vec::new();
        if let Some(hdl) = table.edge.take() {
            table.handles.remove(hdl as u64);
            fired.push(SimCallback::Edge);
        }
        let later = table.timers.split_off(&(now + 1));
        let due = std::mem::replace(&mut table.timers, later);
        for (abs_time, hdl) in due {
            table.handles.remove(hdl as u64);
            fired.push(SimCallback::Time(abs_time));
        }
        fired
    }

    pub(crate) fn clear(&self) {
        let mut table = self.callbacks.lock().unwrap();
        table.edge = None;
        table.timers.clear();
        table.handles = IntMap::new();
    }
}

impl SimIf for CycleSim {
    fn get_sim_cycles(&self) -> u64 {
        self.cycle.load(Ordering::SeqCst)
    }

    fn get_clk_period_ps(&self) -> u64 {
        self.clk_period_ps
    }

    fn log(&self, msg: &str) {
        if !self.verbose {
            return;
        }
        let t = self.get_sim_time("ns").unwrap_or_default();
        let int = t.floor() as u64;
        let mut frac_str = format!("{:.3}", t % 1.0);
        frac_str.remove(0);
        println!("{}{}ns {}", int.to_formatted_string(&Locale::en), frac_str, msg);
    }

    fn register_callback(&self, cb: SimCallback) -> TbResult<usize> {
        let now = self.get_sim_cycles();
        let mut table = self.callbacks.lock().unwrap();
        let hdl = table.next_hdl;
        table.next_hdl += 1;
        let registered = match cb {
            SimCallback::Edge => {
                if let Some(old) = table.edge.replace(hdl) {
                    table.handles.remove(old as u64);
                }
                SimCallback::Edge
            }
            SimCallback::Time(delay) => {
                // a zero delay fires on the next edge
                let abs_time = now + delay.max(1);
                if let Some(old) = table.timers.insert(abs_time, hdl) {
                    table.handles.remove(old as u64);
                }
                SimCallback::Time(abs_time)
            }
        };
        table.handles.insert(hdl as u64, registered);
        Ok(hdl)
    }

    fn cancel_callback(&self, cb_hdl: usize) -> TbResult<()> {
        let mut table = self.callbacks.lock().unwrap();
        match table.handles.remove(cb_hdl as u64) {
            Some(SimCallback::Edge) => {
                table.edge = None;
                Ok(())
            }
            Some(SimCallback::Time(abs_time)) => {
                table.timers.remove(&abs_time);
                Ok(())
            }
            None => Err(TbError::config(format!(
                "unknown callback handle {}",
                cb_hdl
            ))),
        }
    }
}
