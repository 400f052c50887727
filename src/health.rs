// src/health.rs
//
// Health hysteresis. Per-source flags gate the empty-source alert so one
// outage produces exactly one alert; the system flag gates the unhandled
// failure notification the same way.

use crate::db;
use crate::errors::TrackerError;
use rusqlite::Connection;
use std::collections::HashMap;

/// What an empty snapshot means for a source this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyObservation {
    /// First empty snapshot while healthy and intolerable: alert once and
    /// skip reconciliation so the stored records survive the outage.
    Alert,
    /// Source is already unhealthy: still skip reconciliation, stay silent.
    Suppressed,
    /// Empty is normal for this source: reconcile as usual (which removes
    /// whatever is still stored).
    Tolerated,
}

pub struct HealthTracker {
    sources: HashMap<String, bool>,
    system_healthy: bool,
}

impl HealthTracker {
    pub fn load(conn: &Connection) -> Result<Self, TrackerError> {
        Ok(Self {
            sources: db::health::load_source_health(conn)?,
            system_healthy: db::health::load_system_health(conn)?,
        })
    }

    #[cfg(test)]
    pub fn new_healthy() -> Self {
        Self {
            sources: HashMap::new(),
            system_healthy: true,
        }
    }

    /// A source's fresh snapshot came back empty.
    pub fn observe_empty(&mut self, source: &str, tolerable: bool) -> EmptyObservation {
        if tolerable {
            // A tolerable flag also recovers a source that went unhealthy
            // before the flag was set.
            self.sources.insert(source.to_string(), true);
            return EmptyObservation::Tolerated;
        }
        let was_healthy = self.source_healthy(source);
        self.sources.insert(source.to_string(), false);
        if was_healthy {
            EmptyObservation::Alert
        } else {
            EmptyObservation::Suppressed
        }
    }

    /// A source produced records again; recovery needs no manual reset.
    pub fn observe_nonempty(&mut self, source: &str) {
        self.sources.insert(source.to_string(), true);
    }

    pub fn source_healthy(&self, source: &str) -> bool {
        // Unknown sources count as healthy; the row appears lazily on the
        // first transition.
        self.sources.get(source).copied().unwrap_or(true)
    }

    pub fn unhealthy_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self
            .sources
            .iter()
            .filter(|(_, healthy)| !**healthy)
            .map(|(source, _)| source.clone())
            .collect();
        sources.sort();
        sources
    }

    pub fn system_healthy(&self) -> bool {
        self.system_healthy
    }

    pub fn set_system_healthy(&mut self, healthy: bool) {
        self.system_healthy = healthy;
    }

    pub fn persist_sources(&self, conn: &Connection) -> Result<(), TrackerError> {
        for (source, healthy) in &self.sources {
            db::health::save_source_health(conn, source, *healthy)?;
        }
        Ok(())
    }

    pub fn persist_system(&self, conn: &Connection) -> Result<(), TrackerError> {
        db::health::save_system_health(conn, self.system_healthy, chrono::Utc::now().naive_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_intolerable_alerts_exactly_once() {
        let mut tracker = HealthTracker::new_healthy();
        assert_eq!(
            tracker.observe_empty("src_a", false),
            EmptyObservation::Alert
        );
        assert_eq!(
            tracker.observe_empty("src_a", false),
            EmptyObservation::Suppressed
        );
        assert!(!tracker.source_healthy("src_a"));
        assert_eq!(tracker.unhealthy_sources(), vec!["src_a".to_string()]);
    }

    #[test]
    fn nonempty_snapshot_recovers_without_reset() {
        let mut tracker = HealthTracker::new_healthy();
        tracker.observe_empty("src_a", false);
        tracker.observe_nonempty("src_a");
        assert!(tracker.source_healthy("src_a"));

        // The next outage alerts again.
        assert_eq!(
            tracker.observe_empty("src_a", false),
            EmptyObservation::Alert
        );
    }

    #[test]
    fn tolerable_empty_never_alerts_and_recovers() {
        let mut tracker = HealthTracker::new_healthy();
        assert_eq!(
            tracker.observe_empty("src_a", true),
            EmptyObservation::Tolerated
        );
        assert!(tracker.source_healthy("src_a"));

        // Flag flipped on after an outage started: source recovers.
        tracker.observe_empty("src_b", false);
        assert_eq!(
            tracker.observe_empty("src_b", true),
            EmptyObservation::Tolerated
        );
        assert!(tracker.source_healthy("src_b"));
    }

    #[test]
    fn sources_track_independently() {
        let mut tracker = HealthTracker::new_healthy();
        tracker.observe_empty("src_a", false);
        assert!(tracker.source_healthy("src_b"));
        assert_eq!(
            tracker.observe_empty("src_b", false),
            EmptyObservation::Alert
        );
    }
}
