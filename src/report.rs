use std::time::Instant;

use tracing::{info, warn};

use crate::error::PageKind;

/// Counters for one conversion run. Every data-consistency warning goes through here.
pub struct RunReport {
    started: Instant,
    person_pages: usize,
    family_pages: usize,
    families: usize,
    sources: usize,
    warnings: usize,
}

impl RunReport {
    pub fn new() -> Self {
        RunReport {
            started: Instant::now(),
            person_pages: 0,
            family_pages: 0,
            families: 0,
            sources: 0,
            warnings: 0,
        }
    }

    pub fn warn(&mut self, message: &str) {
        warn!("{}", message);
        self.warnings += 1;
    }

    pub fn page(&mut self, kind: PageKind) {
        match kind {
            PageKind::Person => self.person_pages += 1,
            PageKind::Family => self.family_pages += 1,
        }
    }

    pub fn set_totals(&mut self, families: usize, sources: usize) {
        self.families = families;
        self.sources = sources;
    }

    #[cfg(test)]
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn log_summary(&self) {
        info!(
            persons = self.person_pages,
            family_pages = self.family_pages,
            families = self.families,
            sources = self.sources,
            warnings = self.warnings,
            "Converted in {:.1}s",
            self.started.elapsed().as_secs_f64()
        );
        if self.warnings > 0 {
            warn!("{} warnings; see log above", self.warnings);
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}
