use std::fmt;
use std::sync::Arc;

use crate::tb_obj::TbObj;
use crate::trigger::Trigger;
use crate::Sim;

/// Handle to the clock that drives a simulation.
#[derive(Clone)]
pub struct Clock {
    sim: Sim,
}

impl Clock {
    pub(crate) fn new(sim: Sim) -> Self {
        Clock { sim }
    }

    pub fn sim(&self) -> &Sim {
        &self.sim
    }

    pub fn rising_edge(&self) -> Trigger {
        Trigger::rising_edge(self)
    }

    /// Resolves after `n` rising edges.
    pub fn cycles(&self, n: u64) -> Trigger {
        Trigger::timer_cycles(&self.sim, n)
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Clock@{}", self.sim.cycle())
    }
}

/// Named value shared between testbench tasks.
#[derive(Clone)]
pub struct Signal<T> {
    name: Arc<str>,
    value: TbObj<T>,
}

impl<T: Copy> Signal<T> {
    pub fn new(name: &str, init: T) -> Self {
        Signal {
            name: Arc::from(name),
            value: TbObj::new(init),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read(&self) -> T {
        *self.value.get()
    }

    pub fn write(&self, val: T) {
        *self.value.get() = val;
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.name, self.read())
    }
}
