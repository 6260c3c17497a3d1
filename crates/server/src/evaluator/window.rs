// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A time-bounded ring buffer of samples, with pluggable reducers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::rules::model::Reducer;

#[derive(Debug, Clone, Copy)]
struct Point {
    at: DateTime<Utc>,
    value: f64,
}

/// A sliding window of `(timestamp, value)` points, bounded by age rather
/// than count: points older than `window` are evicted on every push, so
/// the buffer never needs a separate sweep.
#[derive(Debug, Clone)]
pub struct Window {
    points: VecDeque<Point>,
    span: chrono::Duration,
}

impl Window {
    pub fn new(span_secs: u64) -> Self {
        Self { points: VecDeque::new(), span: chrono::Duration::seconds(span_secs as i64) }
    }

    pub fn push(&mut self, at: DateTime<Utc>, value: f64) {
        self.points.push_back(Point { at, value });
        self.evict_older_than(at);
    }

    fn evict_older_than(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.span;
        while let Some(front) = self.points.front() {
            if front.at < cutoff {
                self.points.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.points.front().map(|p| p.at)
    }

    /// Reduce the window to a single value. Returns `None` for an empty
    /// window — callers treat that as "not enough data yet", not zero.
    pub fn reduce(&self, reducer: Reducer, sample_threshold: Option<f64>) -> Option<f64> {
        if self.points.is_empty() {
            return None;
        }
        match reducer {
            Reducer::Last => self.points.back().map(|p| p.value),
            Reducer::Avg => {
                let sum: f64 = self.points.iter().map(|p| p.value).sum();
                Some(sum / self.points.len() as f64)
            }
            Reducer::Max => self.points.iter().map(|p| p.value).fold(None, |acc, v| {
                Some(acc.map_or(v, |a: f64| a.max(v)))
            }),
            Reducer::Min => self.points.iter().map(|p| p.value).fold(None, |acc, v| {
                Some(acc.map_or(v, |a: f64| a.min(v)))
            }),
            Reducer::P95 => Some(percentile(&self.points, 0.95)),
            Reducer::CountOverThreshold => {
                let threshold = sample_threshold.unwrap_or(f64::INFINITY);
                let count = self.points.iter().filter(|p| p.value > threshold).count();
                Some(count as f64)
            }
        }
    }
}

fn percentile(points: &VecDeque<Point>, p: f64) -> f64 {
    let mut values: Vec<f64> = points.iter().map(|pt| pt.value).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if values.is_empty() {
        return 0.0;
    }
    let rank = (p * (values.len() - 1) as f64).round() as usize;
    values[rank.min(values.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_secs(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + secs, 0).expect("valid timestamp")
    }

    #[test]
    fn empty_window_reduces_to_none() {
        let window = Window::new(60);
        assert_eq!(window.reduce(Reducer::Avg, None), None);
    }

    #[test]
    fn avg_reduces_correctly() {
        let mut window = Window::new(60);
        window.push(at_secs(0), 1.0);
        window.push(at_secs(1), 2.0);
        window.push(at_secs(2), 3.0);
        assert_eq!(window.reduce(Reducer::Avg, None), Some(2.0));
    }

    #[test]
    fn old_points_are_evicted() {
        let mut window = Window::new(10);
        window.push(at_secs(0), 100.0);
        window.push(at_secs(20), 1.0);
        assert_eq!(window.len(), 1);
        assert_eq!(window.reduce(Reducer::Last, None), Some(1.0));
    }

    #[test]
    fn count_over_threshold_counts_breaches() {
        let mut window = Window::new(60);
        for v in [0.1, 0.9, 0.95, 0.2] {
            window.push(at_secs(0), v);
        }
        assert_eq!(window.reduce(Reducer::CountOverThreshold, Some(0.8)), Some(2.0));
    }

    #[test]
    fn p95_of_uniform_series() {
        let mut window = Window::new(60);
        for i in 0..100 {
            window.push(at_secs(i), i as f64);
        }
        assert_eq!(window.reduce(Reducer::P95, None), Some(95.0));
    }
}
