use intmap::IntMap;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::signal::Clock;
use crate::sim_if::{SimCallback, SimIf};
use crate::{Sim, TbResult};

struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<Waker>,
}

impl CallbackHandles {
    fn new() -> Self {
        CallbackHandles {
            handle: None,
            callbacks: VecDeque::new(),
        }
    }
}

/// Wakers parked on the clock, per simulation.
pub(crate) struct TriggerTable {
    edge: CallbackHandles,
    // key is absolute callback cycle
    timers: IntMap<CallbackHandles>,
}

impl TriggerTable {
    pub(crate) fn new() -> Self {
        TriggerTable {
            edge: CallbackHandles::new(),
            timers: IntMap::new(),
        }
    }

    pub(crate) fn clear(&mut self) {
        self.edge = CallbackHandles::new();
        self.timers = IntMap::new();
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TrigKind {
    Edge,
    Timer(u64),
}

/// Suspension point of a testbench task: resolves on a future clock edge.
#[derive(Clone)]
pub struct Trigger {
    sim: Sim,
    kind: TrigKind,
    awaited: bool,
}

impl Trigger {
    pub fn rising_edge(clk: &Clock) -> Self {
        Trigger {
            sim: clk.sim().clone(),
            kind: TrigKind::Edge,
            awaited: false,
        }
    }
    pub fn timer_cycles(sim: &Sim, cycles: u64) -> Self {
        Trigger {
            sim: sim.clone(),
            kind: TrigKind::Timer(cycles),
            awaited: false,
        }
    }
    pub fn timer(sim: &Sim, time: u64, unit: &str) -> TbResult<Self> {
        let cycles = sim.sim_if().get_sim_steps(time as f64, unit)?;
        Ok(Trigger::timer_cycles(sim, cycles))
    }
    pub fn kind(&self) -> TrigKind {
        self.kind
    }

    fn register(&self, waker: Waker) -> TbResult<()> {
        let inner = self.sim.inner();
        let mut table = inner.triggers.lock().unwrap();
        match self.kind {
            TrigKind::Edge => {
                table.edge.callbacks.push_back(waker);
                if table.edge.handle.is_none() {
                    let cb_hdl = inner.sim_if.register_callback(SimCallback::Edge)?;
                    table.edge.handle.replace(cb_hdl);
                }
            }
            TrigKind::Timer(t) => {
                // the clock reports absolute cycles back, not the delay
                let abs_time = inner.sim_if.get_sim_cycles() + t.max(1);
                if let Some(callbacks) = table.timers.get_mut(abs_time) {
                    callbacks.callbacks.push_back(waker);
                } else {
                    let handle = inner.sim_if.register_callback(SimCallback::Time(t))?;
                    let mut callbacks = CallbackHandles::new();
                    callbacks.handle = Some(handle);
                    callbacks.callbacks.push_back(waker);
                    table.timers.insert(abs_time, callbacks);
                }
            }
        }
        Ok(())
    }
}

impl Future for Trigger {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A trigger is polled a second time only after its waker fired.
        if self.awaited {
            Poll::Ready(())
        } else {
            self.awaited = true;
            if let Err(e) = self.register(cx.waker().clone()) {
                // the task stays parked, the runner stops the test
                self.sim.fail_test(e);
            }
            Poll::Pending
        }
    }
}

/// Collects the wakers released by a fired clock callback.
pub(crate) fn react(table: &mut TriggerTable, cb: SimCallback) -> VecDeque<Waker> {
    match cb {
        SimCallback::Edge => {
            table.edge.handle = None;
            std::mem::take(&mut table.edge.callbacks)
        }
        SimCallback::Time(t) => table
            .timers
            .remove(t)
            .map(|callbacks| callbacks.callbacks)
            .unwrap_or_default(),
    }
}
