//! Sampler loop
//!
//! Two states: **Active** while the counter is at most `num_exec` (the
//! pattern runs each iteration) and **Idle** afterwards (collection only).
//! The switch happens once and never reverses, so the tail of the output
//! shows whether memory settles once allocation stops.

use crate::diagnostics::{Collector, MemoryProbe};
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::pattern::Pattern;
use chrono::Local;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Loop phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Active,
    Idle,
}

/// Output and pacing options
#[derive(Debug, Clone)]
pub struct SamplerOptions {
    /// Iterations that run the pattern
    pub num_exec: u64,
    /// Sleep at the end of each iteration
    pub interval: Duration,
    /// Prefix sample lines with local time
    pub timestamps: bool,
    /// Print ledger counters after each sample line
    pub stats: bool,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            num_exec: 10,
            interval: Duration::from_secs(5),
            timestamps: false,
            stats: false,
        }
    }
}

pub struct Sampler<'a, W: Write> {
    dispatcher: Dispatcher<'a>,
    probe: &'a dyn MemoryProbe,
    collector: &'a dyn Collector,
    pattern: Pattern,
    options: SamplerOptions,
    count: u64,
    out: W,
}

impl<'a, W: Write> Sampler<'a, W> {
    pub fn new(
        dispatcher: Dispatcher<'a>,
        probe: &'a dyn MemoryProbe,
        collector: &'a dyn Collector,
        pattern: Pattern,
        options: SamplerOptions,
        out: W,
    ) -> Self {
        Self {
            dispatcher,
            probe,
            collector,
            pattern,
            options,
            count: 1,
            out,
        }
    }

    /// Counter value the next iteration will use
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn state(&self) -> LoopState {
        if self.count <= self.options.num_exec {
            LoopState::Active
        } else {
            LoopState::Idle
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Iterate until `cancel` fires. Without cancellation this never returns
    /// `Ok`.
    pub fn run_loop(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!(
            pattern = %self.pattern,
            num_exec = self.options.num_exec,
            interval_ms = self.options.interval.as_millis() as u64,
            "Sampler loop starting"
        );

        while !cancel.is_cancelled() {
            self.step()?;
        }

        info!(iterations = self.count - 1, "Sampler loop cancelled");
        Ok(())
    }

    /// One iteration; returns the state it ran in
    pub fn step(&mut self) -> Result<LoopState> {
        let state = self.state();
        self.sample()?;

        match state {
            LoopState::Active => {
                writeln!(
                    self.out,
                    "---- pattern:{} cnt:{}/{} running query and start GC",
                    self.pattern, self.count, self.options.num_exec
                )?;
                self.out.flush()?;
                self.dispatcher.run_once(self.pattern)?;
            }
            LoopState::Idle => {
                writeln!(
                    self.out,
                    "---- pattern:{} cnt:{}/{} starts only GC",
                    self.pattern, self.count, self.options.num_exec
                )?;
            }
        }

        self.collector.collect()?;
        self.sample()?;

        if !self.options.interval.is_zero() {
            std::thread::sleep(self.options.interval);
        }

        debug!(count = self.count, ?state, "Iteration finished");
        self.count += 1;
        Ok(state)
    }

    fn sample(&mut self) -> Result<()> {
        let mem = self.probe.resident_percent()?;
        if self.options.timestamps {
            write!(self.out, "[{}] ", Local::now().format("%Y%m%d %H:%M:%S"))?;
        }
        writeln!(self.out, "mem: {}%", mem)?;
        if self.options.stats {
            writeln!(self.out, "  -> {}", self.dispatcher.ledger().snapshot())?;
        }
        self.out.flush()?;
        Ok(())
    }
}
