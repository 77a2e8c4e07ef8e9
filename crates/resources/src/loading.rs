//! Loading-progress tracking.
//!
//! Asset uploads run while the splash screen is up; each named loading point
//! flips to done as its work completes, and the splash pass polls the
//! tracker to report progress. Everything must be complete before the first
//! geometry pass references the results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Completion flag shared with the work that fulfills a loading point.
#[derive(Clone, Debug, Default)]
pub struct LoadingPoint {
    done: Arc<AtomicBool>,
}

impl LoadingPoint {
    /// Marks the point complete.
    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Whether the point has completed.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

/// Tracks a set of named loading points.
#[derive(Debug, Default)]
pub struct LoadTracker {
    points: Vec<(String, LoadingPoint)>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named loading point and returns its completion handle.
    pub fn register(&mut self, name: impl Into<String>) -> LoadingPoint {
        let point = LoadingPoint::default();
        self.points.push((name.into(), point.clone()));
        point
    }

    /// Number of completed points.
    pub fn completed(&self) -> usize {
        self.points.iter().filter(|(_, p)| p.is_done()).count()
    }

    /// Total number of registered points.
    pub fn total(&self) -> usize {
        self.points.len()
    }

    /// Whether every registered point has completed. An empty tracker is
    /// complete.
    pub fn is_complete(&self) -> bool {
        self.points.iter().all(|(_, p)| p.is_done())
    }

    /// Names of the points still pending, for the splash readout.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.points
            .iter()
            .filter(|(_, p)| !p.is_done())
            .map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker_is_complete() {
        assert!(LoadTracker::new().is_complete());
    }

    #[test]
    fn test_progress_tracking() {
        let mut tracker = LoadTracker::new();
        let first = tracker.register("models/monkey.obj");
        let second = tracker.register("textures/ground.png");

        assert_eq!(tracker.total(), 2);
        assert_eq!(tracker.completed(), 0);
        assert!(!tracker.is_complete());

        first.finish();
        assert_eq!(tracker.completed(), 1);
        let pending: Vec<&str> = tracker.pending().collect();
        assert_eq!(pending, vec!["textures/ground.png"]);

        second.finish();
        assert!(tracker.is_complete());
    }

    #[test]
    fn test_point_shared_across_threads() {
        let mut tracker = LoadTracker::new();
        let point = tracker.register("async upload");

        let handle = std::thread::spawn(move || point.finish());
        handle.join().unwrap();

        assert!(tracker.is_complete());
    }
}
