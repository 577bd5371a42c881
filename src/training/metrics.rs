//! Training metrics and checkpoint selection state

/// Averages reported when a metrics window fills up
#[derive(Debug, Clone, Copy)]
pub struct WindowReport {
    /// Summed loss over the window
    pub loss: f32,
    /// correct / total over the window
    pub accuracy: f64,
}

/// Loss/accuracy accumulators reset every `print_every` steps.
///
/// Partial windows at an epoch boundary are dropped by calling `reset`
/// at the start of each epoch; they are never flushed.
#[derive(Debug, Clone)]
pub struct MetricsWindow {
    print_every: usize,
    steps: usize,
    loss_sum: f64,
    correct: usize,
    total: usize,
}

impl MetricsWindow {
    pub fn new(print_every: usize) -> Self {
        MetricsWindow {
            print_every: print_every.max(1),
            steps: 0,
            loss_sum: 0.0,
            correct: 0,
            total: 0,
        }
    }

    /// Record one training step; returns a report exactly when the window
    /// fills, resetting the accumulators.
    pub fn push(&mut self, loss: f32, correct: usize, batch_size: usize) -> Option<WindowReport> {
        self.steps += 1;
        self.loss_sum += loss as f64;
        self.correct += correct;
        self.total += batch_size;

        if self.steps == self.print_every {
            let report = WindowReport {
                loss: self.loss_sum as f32,
                accuracy: if self.total == 0 {
                    0.0
                } else {
                    self.correct as f64 / self.total as f64
                },
            };
            self.reset();
            Some(report)
        } else {
            None
        }
    }

    /// Discard any partially accumulated window
    pub fn reset(&mut self) {
        self.steps = 0;
        self.loss_sum = 0.0;
        self.correct = 0;
        self.total = 0;
    }

    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Best-checkpoint selection state.
///
/// The snapshot is refreshed iff a validation F1 strictly exceeds every
/// previous one. Best accuracy is tracked separately and may belong to a
/// different step than the saved checkpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestTracker {
    pub best_f1: f64,
    pub best_acc: f64,
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a validation result; returns true when the caller should
    /// snapshot the current model parameters.
    pub fn observe(&mut self, f1: f64, accuracy: f64) -> bool {
        if accuracy > self.best_acc {
            self.best_acc = accuracy;
        }
        if f1 > self.best_f1 {
            self.best_f1 = f1;
            true
        } else {
            false
        }
    }
}

/// Per-class true/false positive and false negative counts
#[derive(Debug, Clone)]
pub struct ConfusionCounts {
    tp: Vec<usize>,
    fp: Vec<usize>,
    fn_: Vec<usize>,
}

impl ConfusionCounts {
    pub fn new(class_count: usize) -> Self {
        ConfusionCounts {
            tp: vec![0; class_count],
            fp: vec![0; class_count],
            fn_: vec![0; class_count],
        }
    }

    pub fn record(&mut self, predicted: usize, target: usize) {
        if predicted == target {
            self.tp[predicted] += 1;
        } else {
            self.fp[predicted] += 1;
            self.fn_[target] += 1;
        }
    }

    /// Micro-averaged F1 over all classes except `exclude` (the majority
    /// class for the EmoContext metric).
    pub fn micro_f1(&self, exclude: Option<usize>) -> f64 {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for class in 0..self.tp.len() {
            if Some(class) == exclude {
                continue;
            }
            tp += self.tp[class];
            fp += self.fp[class];
            fn_ += self.fn_[class];
        }

        let precision = if tp + fp == 0 {
            0.0
        } else {
            tp as f64 / (tp + fp) as f64
        };
        let recall = if tp + fn_ == 0 {
            0.0
        } else {
            tp as f64 / (tp + fn_) as f64
        };
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_resets_every_print_every_steps() {
        let mut window = MetricsWindow::new(3);

        assert!(window.push(1.0, 8, 10).is_none());
        assert!(window.push(1.0, 9, 10).is_none());
        let report = window.push(1.0, 7, 10).unwrap();

        assert!((report.loss - 3.0).abs() < 1e-6);
        assert!((report.accuracy - 24.0 / 30.0).abs() < 1e-9);
        assert_eq!(window.steps(), 0);

        // Next window starts fresh
        assert!(window.push(2.0, 5, 10).is_none());
    }

    #[test]
    fn test_partial_window_dropped_on_reset() {
        let mut window = MetricsWindow::new(4);
        window.push(1.0, 10, 10);
        window.push(1.0, 10, 10);
        window.reset();

        // Only the two post-reset steps count toward the next report
        assert!(window.push(0.5, 0, 10).is_none());
        assert!(window.push(0.5, 0, 10).is_none());
        assert!(window.push(0.5, 0, 10).is_none());
        let report = window.push(0.5, 0, 10).unwrap();
        assert!((report.accuracy - 0.0).abs() < 1e-9);
        assert!((report.loss - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_best_tracker_strict_improvement_only() {
        let mut tracker = BestTracker::new();
        let sequence = [0.2, 0.5, 0.3, 0.6];
        let snapshots: Vec<bool> = sequence
            .iter()
            .map(|f1| tracker.observe(*f1, 0.5))
            .collect();

        assert_eq!(snapshots, vec![true, true, false, true]);
        assert!((tracker.best_f1 - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_best_tracker_ties_do_not_snapshot() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(0.4, 0.4));
        assert!(!tracker.observe(0.4, 0.4));
    }

    #[test]
    fn test_best_acc_and_best_f1_can_diverge() {
        let mut tracker = BestTracker::new();
        assert!(tracker.observe(0.5, 0.6));
        // Higher accuracy but lower F1: accuracy updates, no snapshot
        assert!(!tracker.observe(0.4, 0.9));
        assert!((tracker.best_acc - 0.9).abs() < 1e-9);
        assert!((tracker.best_f1 - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_micro_f1_excludes_majority_class() {
        let mut counts = ConfusionCounts::new(3);
        // class 0 is "others": perfectly predicted but excluded
        counts.record(0, 0);
        counts.record(0, 0);
        // class 1: one hit, one miss predicted as class 2
        counts.record(1, 1);
        counts.record(2, 1);
        // class 2: one hit
        counts.record(2, 2);

        // tp = 2 (classes 1, 2), fp = 1 (class 2), fn = 1 (class 1)
        let f1 = counts.micro_f1(Some(0));
        let precision = 2.0 / 3.0;
        let recall = 2.0 / 3.0;
        let expected = 2.0 * precision * recall / (precision + recall);
        assert!((f1 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_micro_f1_empty_is_zero() {
        let counts = ConfusionCounts::new(3);
        assert_eq!(counts.micro_f1(None), 0.0);
    }
}
