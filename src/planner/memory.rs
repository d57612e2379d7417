use std::fs;

use log::warn;

use super::PlannerErr;

// statm reports pages
const PAGE_SIZE: u64 = 4096;

/// Watches resident memory while searching.
///
/// Sampling is cheap but not free so it only happens every `check_every` ticks.
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    ceiling_mb: u64,
    check_every: u64,
    ticks: u64,
    peak_mb: u64,
}

impl ResourceBudget {
    pub fn new(ceiling_mb: u64, check_every: u64) -> Self {
        ResourceBudget {
            ceiling_mb,
            check_every: check_every.max(1),
            ticks: 0,
            peak_mb: 0,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Highest sample seen so far.
    pub fn peak_mb(&self) -> u64 {
        self.peak_mb
    }

    pub fn tick(&mut self) -> Result<(), PlannerErr> {
        self.ticks += 1;
        if self.ticks % self.check_every != 0 {
            return Ok(());
        }
        match resident_mb() {
            Some(used) => self.check(used),
            None => Ok(()),
        }
    }

    fn check(&mut self, used_mb: u64) -> Result<(), PlannerErr> {
        self.peak_mb = self.peak_mb.max(used_mb);
        if used_mb > self.ceiling_mb {
            warn!("Using {} MB, ceiling is {} MB", used_mb, self.ceiling_mb);
            return Err(PlannerErr::ResourceExceeded {
                used_mb,
                ceiling_mb: self.ceiling_mb,
            });
        }
        Ok(())
    }
}

/// `None` where /proc isn't available.
fn resident_mb() -> Option<u64> {
    let statm = fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm(&statm)
}

fn parse_statm(statm: &str) -> Option<u64> {
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * PAGE_SIZE / (1024 * 1024))
}
