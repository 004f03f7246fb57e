//! Plate detachment detection during a pull

use std::collections::VecDeque;

/// Phase of a pull cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    /// Force has not started rising steadily yet
    Waiting,
    /// Positive peak has risen on every recent sample
    Pulling,
    /// Force fell away from the peak, the plate let go
    Detached,
}

/// Watches the total force while the arm pulls on the plate
#[derive(Debug, Clone)]
pub struct PullMonitor {
    recent_peaks: VecDeque<f64>,
    positive_peak: f64,
    absolute_peak: f64,
    threshold: f64,
    state: PullState,
}

impl PullMonitor {
    /// Positive peaks that must rise strictly before the pull counts as started
    pub const WINDOW: usize = 10;

    /// `threshold` is the drop below the positive peak, in newtons, that
    /// means detachment
    pub fn new(threshold: f64) -> Self {
        Self {
            recent_peaks: VecDeque::from(vec![0.0; Self::WINDOW]),
            positive_peak: 0.0,
            absolute_peak: 0.0,
            threshold,
            state: PullState::Waiting,
        }
    }

    /// Feed one total force sample
    pub fn update(&mut self, force: f64) -> PullState {
        if force.abs() > self.absolute_peak.abs() {
            self.absolute_peak = force;
        }
        if force > self.positive_peak {
            self.positive_peak = force;
        }

        self.recent_peaks.pop_front();
        self.recent_peaks.push_back(self.positive_peak);

        if self.state == PullState::Waiting && self.rising() {
            self.state = PullState::Pulling;
        }
        if self.state == PullState::Pulling && self.positive_peak - force > self.threshold {
            self.state = PullState::Detached;
        }
        self.state
    }

    fn rising(&self) -> bool {
        self.recent_peaks
            .iter()
            .zip(self.recent_peaks.iter().skip(1))
            .all(|(a, b)| a < b)
    }

    /// Current phase
    pub fn state(&self) -> PullState {
        self.state
    }

    /// Largest positive total force
    pub fn positive_peak(&self) -> f64 {
        self.positive_peak
    }

    /// Total force with the largest magnitude
    pub fn absolute_peak(&self) -> f64 {
        self.absolute_peak
    }
}
