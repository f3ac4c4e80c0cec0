use std::{
    fs::File,
    io::{BufRead, BufReader, Lines},
};

use eyre::{Context, Result};
use serde::Serialize;

use crate::{
    cache::{AccessKind, Cache},
    config::HierarchyConfig,
    error::CacheResult,
    sim::{SimComponent, SimRunner},
};

/// two chained caches: a first-level miss is replayed on the second level
pub struct MemoryHierarchy<'a> {
    pub l1: &'a mut Cache,
    pub l2: &'a mut Cache,
}

impl<'a> MemoryHierarchy<'a> {
    pub fn new(l1: &'a mut Cache, l2: &'a mut Cache) -> Self {
        MemoryHierarchy { l1, l2 }
    }

    /// the latency of L1, plus the latency of L2 when L1 missed
    pub fn access(&mut self, current_cycle: u64, kind: AccessKind, addr: u64) -> u64 {
        let latency = self.l1.access(current_cycle, kind, addr);
        if latency > self.l1.config().hit_latency {
            latency + self.l2.access(current_cycle, kind, addr)
        } else {
            latency
        }
    }
}

impl HierarchyConfig {
    pub fn build(&self) -> CacheResult<(Cache, Cache)> {
        Ok((Cache::new(self.l1.clone())?, Cache::new(self.l2.clone())?))
    }
}

#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct TraceStatus {
    pub accesses: u64,
    pub l2_accesses: u64,
    pub total_latency: u64,
}

/// # TraceDriver
/// reads one hexadecimal address per line and issues it as a read,
/// one address per cycle.
/// - an optional `0x` prefix is accepted and blank lines are skipped
/// - a line that is not an address stops the run with its line number
pub struct TraceDriver<'a, R> {
    lines: Lines<R>,
    line_number: usize,
    hierarchy: MemoryHierarchy<'a>,
}

impl<'a> TraceDriver<'a, BufReader<File>> {
    pub fn from_file(path: &str, hierarchy: MemoryHierarchy<'a>) -> Result<Self> {
        let file = File::open(path).wrap_err_with(|| format!("cannot open trace file {path}"))?;
        Ok(Self::new(BufReader::new(file), hierarchy))
    }
}

impl<'a, R: BufRead> TraceDriver<'a, R> {
    pub fn new(reader: R, hierarchy: MemoryHierarchy<'a>) -> Self {
        TraceDriver {
            lines: reader.lines(),
            line_number: 0,
            hierarchy,
        }
    }

    pub fn run(self) -> Result<TraceStatus> {
        let mut sim_runner = SimRunner::new(self, TraceStatus::default());
        sim_runner.run()?;
        let (_, status, cycles) = sim_runner.into_inner();
        tracing::info!(cycles, ?status, "trace finished");
        Ok(status)
    }

    /// the next address of the trace, `None` at the end
    fn next_addr(&mut self) -> Result<Option<u64>> {
        for line in self.lines.by_ref() {
            self.line_number += 1;
            let line = line.wrap_err_with(|| format!("cannot read line {}", self.line_number))?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let digits = text
                .strip_prefix("0x")
                .or_else(|| text.strip_prefix("0X"))
                .unwrap_or(text);
            let addr = u64::from_str_radix(digits, 16).wrap_err_with(|| {
                format!("line {}: invalid address {:?}", self.line_number, text)
            })?;
            return Ok(Some(addr));
        }
        Ok(None)
    }
}

impl<'a, R: BufRead> SimComponent for TraceDriver<'a, R> {
    type SharedStatus = TraceStatus;
    fn update(
        &mut self,
        shared_status: &mut Self::SharedStatus,
        current_cycle: u64,
    ) -> Result<(bool, bool)> {
        match self.next_addr()? {
            Some(addr) => {
                let latency = self
                    .hierarchy
                    .access(current_cycle, AccessKind::Read, addr);
                if latency > self.hierarchy.l1.config().hit_latency {
                    shared_status.l2_accesses += 1;
                }
                shared_status.accesses += 1;
                shared_status.total_latency += latency;
                Ok((true, true))
            }
            None => Ok((false, false)),
        }
    }
}
