//! Transaction-level AXI4/ACE testbench: channel payloads and ports, a
//! randomized traffic generator with an expected-response predictor, and a
//! scoreboard that checks data, response codes and per-id ordering.
//!
//! Testbench code runs as cooperative tasks on a cycle-based clock. Each test
//! is an async function taking a [`Sim`] handle; [`run`] (or [`run_tests!`])
//! executes a list of them and reports the results.

pub mod axi;
mod cycle_sim;
mod error;
mod executor;
mod junit;
pub mod prelude;
mod signal;
pub mod sim_if;
mod tb_obj;
mod trigger;
pub mod utils;
mod value;

use num_format::{Locale, ToFormattedString};
use once_cell::sync::OnceCell;
use prettytable::{Cell, Row, Table};
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::task::Waker;
use std::time;

use cycle_sim::CycleSim;
use executor::ReadyQueue;
use sim_if::SimIf;
use trigger::TriggerTable;

pub use error::{Dir, TbError};
pub use executor::{JoinHandle, Task};
pub use signal::{Clock, Signal};
pub use tb_obj::TbObj;
pub use test::{TbTests, Test, TestFn};
pub use trigger::Trigger;
pub use value::Val;

pub type TbResult<T = Val> = Result<T, TbError>;

/// Run-time options shared by all tests of one run.
#[derive(Debug, Clone)]
pub struct TbConfig {
    /// Base seed; every random component derives its own stream from it.
    pub seed: u64,
    pub clk_period_ps: u64,
    /// A test still running after this many cycles fails.
    pub max_cycles: u64,
    pub verbose: bool,
    pub suite_name: String,
    pub junit_path: Option<PathBuf>,
}

impl Default for TbConfig {
    fn default() -> Self {
        TbConfig {
            seed: 1,
            clk_period_ps: 10_000,
            max_cycles: 1_000_000,
            verbose: false,
            suite_name: env!("CARGO_PKG_NAME").to_string(),
            junit_path: None,
        }
    }
}

pub(crate) struct SimInner {
    pub(crate) sim_if: CycleSim,
    pub(crate) triggers: Mutex<TriggerTable>,
    pub(crate) ready: Arc<ReadyQueue>,
    failure: OnceCell<TbError>,
    seed: u64,
}

/// Handle to one running simulation. Cheap to clone; every task of a test
/// holds one.
#[derive(Clone)]
pub struct Sim(Arc<SimInner>);

impl Sim {
    pub fn new(cfg: &TbConfig) -> Self {
        Sim(Arc::new(SimInner {
            sim_if: CycleSim::new(cfg.clk_period_ps, cfg.verbose),
            triggers: Mutex::new(TriggerTable::new()),
            ready: ReadyQueue::new(),
            failure: OnceCell::new(),
            seed: cfg.seed,
        }))
    }

    pub(crate) fn inner(&self) -> &SimInner {
        &self.0
    }

    pub fn sim_if(&self) -> &dyn SimIf {
        &self.0.sim_if
    }

    pub fn clock(&self) -> Clock {
        Clock::new(self.clone())
    }

    pub fn cycle(&self) -> u64 {
        self.0.sim_if.get_sim_cycles()
    }

    pub fn seed(&self) -> u64 {
        self.0.seed
    }

    pub fn log(&self, msg: &str) {
        self.0.sim_if.log(msg);
    }

    pub fn fork(&self, fut: impl Future<Output = TbResult> + Send + 'static) -> JoinHandle {
        self.spawn("forked", fut)
    }

    pub fn spawn(
        &self,
        name: &str,
        fut: impl Future<Output = TbResult> + Send + 'static,
    ) -> JoinHandle {
        Task::spawn_from_future(&self.0.ready, fut, name)
    }

    /// Spawns a task whose error fails the running test.
    pub fn fork_checked(
        &self,
        name: &str,
        fut: impl Future<Output = TbResult> + Send + 'static,
    ) -> JoinHandle {
        let sim = self.clone();
        let tag = name.to_string();
        self.spawn(name, async move {
            match fut.await {
                Ok(val) => Ok(val),
                Err(e) => {
                    let msg = format!("{}: {}", tag, e);
                    sim.log(&msg);
                    sim.fail_test(e);
                    Err(TbError::TestFailed(msg))
                }
            }
        })
    }

    /// Records a fatal error. The first one wins; the runner stops the test
    /// before the next cycle.
    pub fn fail_test(&self, err: TbError) {
        let _ = self.0.failure.set(err);
    }

    pub fn failure(&self) -> Option<&TbError> {
        self.0.failure.get()
    }

    /// Polls every task that is ready without advancing the clock.
    pub fn run_once(&self) {
        self.0.ready.run_once();
    }

    /// Advances the clock by one cycle and runs every task woken by it.
    pub fn step(&self) {
        let fired = self.0.sim_if.advance();
        let wakers: Vec<Waker> = {
            let mut table = self.0.triggers.lock().unwrap();
            fired
                .into_iter()
                .flat_map(|cb| trigger::react(&mut table, cb))
                .collect()
        };
        for waker in wakers {
            waker.wake();
        }
        self.run_once();
    }

    pub fn run_cycles(&self, n: u64) {
        for _ in 0..n {
            self.step();
        }
    }

    // Drops every parked waker and queued task, which releases the futures
    // (and their Sim clones) of the finished test.
    fn tear_down(&self) {
        self.0.triggers.lock().unwrap().clear();
        self.0.sim_if.clear();
        self.0.ready.clear();
    }
}

/// Runs `tests` one after another, each on a fresh simulation.
///
/// Returns the tests with their results filled in. Failing tests are not an
/// error of `run` itself; only reporting failures are.
pub fn run(mut tests: TbTests, cfg: &TbConfig) -> TbResult<TbTests> {
    let sim_start = time::Instant::now();

    for test in tests.iter_mut() {
        let sim = Sim::new(cfg);
        let time_start = time::Instant::now();
        sim.log(&format!("Starting test {}", test.name));

        let mut handle = sim.spawn(&test.name, (test.generator)(sim.clone()));
        sim.run_once();
        let result = loop {
            if let Some(err) = sim.failure() {
                break Err(TbError::TestFailed(err.to_string()));
            }
            if let Some(result) = handle.try_result() {
                break result;
            }
            if sim.cycle() >= cfg.max_cycles {
                break Err(TbError::SimTimeout {
                    cycles: sim.cycle(),
                });
            }
            sim.step();
        };

        test.time_secs = time_start.elapsed().as_secs_f64();
        test.sim_cycles = sim.cycle();
        match &result {
            Ok(_) => sim.log(&format!("Test {} passed", test.name)),
            Err(e) => sim.log(&format!("Test {} failed: {}", test.name, e)),
        }
        handle.cancel();
        sim.tear_down();
        test.set_result(result);
    }

    end_of_simulation(&tests, cfg, sim_start.elapsed().as_secs_f64())?;
    Ok(tests)
}

fn end_of_simulation(tests: &TbTests, cfg: &TbConfig, duration: f64) -> TbResult<()> {
    if cfg.verbose {
        summary_table(tests, duration).printstd();
    }
    if let Some(path) = &cfg.junit_path {
        junit::create_junit_xml(tests, &cfg.suite_name, path)?;
    }
    Ok(())
}

fn summary_table(tests: &TbTests, duration: f64) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![
        Cell::new("Test"),
        Cell::new("Result"),
        Cell::new("Real time [s]"),
        Cell::new("Sim cycles"),
        Cell::new("Speed [cycles/s]"),
    ]));
    let mut total_cycles: u64 = 0;
    for t in tests.iter() {
        total_cycles += t.sim_cycles;
        table.add_row(Row::new(vec![
            Cell::new(&t.name),
            Cell::new(t.result_str()),
            Cell::new(&format!("{:.3}", t.time_secs)),
            Cell::new(&t.sim_cycles.to_formatted_string(&Locale::en)),
            Cell::new(&cycles_per_sec(t.sim_cycles, t.time_secs)),
        ]));
    }
    let passed = tests.iter().filter(|t| t.passed()).count();
    table.add_row(Row::new(vec![
        Cell::new("TOTAL"),
        Cell::new(&format!("{}/{} passed", passed, tests.len())),
        Cell::new(&format!("{:.3}", duration)),
        Cell::new(&total_cycles.to_formatted_string(&Locale::en)),
        Cell::new(&cycles_per_sec(total_cycles, duration)),
    ]));
    table
}

fn cycles_per_sec(cycles: u64, secs: f64) -> String {
    if secs > 0.0 {
        ((cycles as f64 / secs) as u64).to_formatted_string(&Locale::en)
    } else {
        "-".to_string()
    }
}

/// Builds a [`TbTests`] list from async test functions and runs it.
///
/// ```ignore
/// run_tests!(TbConfig::default(); smoke_test, downsize_test)
/// ```
#[macro_export]
macro_rules! run_tests {
    ($cfg:expr; $( $test:ident ),+ $(,)?) => {{
        let mut tests = $crate::TbTests::new();
        $(
            tests.push($crate::Test::new(stringify!($test), |sim| {
                $crate::prelude::FutureExt::boxed($test(sim))
            }));
        )+
        $crate::run(tests, &$cfg)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    async fn passes(sim: Sim) -> TbResult {
        sim.clock().cycles(3).await;
        Ok(Val::Int(sim.cycle() as i64))
    }

    async fn fails(_sim: Sim) -> TbResult {
        Err(TbError::config("broken"))
    }

    async fn checked_task_fails(sim: Sim) -> TbResult {
        let clk = sim.clock();
        sim.fork_checked("checker", async move {
            clk.cycles(2).await;
            Err(TbError::AddrNotMapped { addr: 0x40 })
        });
        loop {
            sim.clock().rising_edge().await;
        }
    }

    async fn never_ends(sim: Sim) -> TbResult {
        loop {
            sim.clock().rising_edge().await;
        }
    }

    #[test]
    fn runner_reports_each_test() {
        let cfg = TbConfig {
            max_cycles: 50,
            ..TbConfig::default()
        };
        let tests = run_tests!(cfg; passes, fails, checked_task_fails, never_ends).unwrap();
        assert_eq!(tests.len(), 4);
        assert!(matches!(
            tests.get("passes").and_then(|t| t.result.as_ref()),
            Some(Ok(Val::Int(3)))
        ));
        assert!(!tests.get("fails").unwrap().passed());

        let checked = tests.get("checked_task_fails").unwrap();
        match &checked.result {
            Some(Err(TbError::TestFailed(msg))) => assert!(msg.contains("0x40")),
            other => panic!("unexpected result {:?}", other),
        }
        assert_eq!(checked.sim_cycles, 2);

        assert!(matches!(
            tests.get("never_ends").and_then(|t| t.result.as_ref()),
            Some(Err(TbError::SimTimeout { cycles: 50 }))
        ));
        assert!(!tests.all_passed());
    }

    #[test]
    fn summary_lists_totals() {
        let mut tests = TbTests::new();
        let mut t = Test::new("a", |sim| FutureExt::boxed(passes(sim)));
        t.set_result(Ok(Val::None));
        t.sim_cycles = 1200;
        tests.push(t);
        let table = summary_table(&tests, 0.5);
        let rendered = table.to_string();
        assert!(rendered.contains("1/1 passed"));
        assert!(rendered.contains("1,200"));
    }
}
