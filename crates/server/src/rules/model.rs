// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// How a rule's window of samples is reduced to a single comparable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Last,
    Avg,
    Max,
    Min,
    P95,
    CountOverThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
    NotEqual,
}

impl Comparator {
    pub fn evaluate(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessThan => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equal => (lhs - rhs).abs() < f64::EPSILON,
            Self::NotEqual => (lhs - rhs).abs() >= f64::EPSILON,
        }
    }
}

/// Ordered `Info < Warning < Critical` so rule evaluation can sort matches
/// highest-severity-first deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A threshold rule evaluated against a sliding window of samples for one
/// metric on every target it matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    pub metric: String,
    /// Optional label filter restricting which targets this rule watches;
    /// an empty map matches every target reporting `metric`.
    pub target_labels: std::collections::HashMap<String, String>,
    pub window_secs: u64,
    pub reducer: Reducer,
    /// Only meaningful for `Reducer::CountOverThreshold`: the per-sample
    /// threshold counted against, separate from the rule's own `threshold`
    /// (which bounds the resulting count).
    pub sample_threshold: Option<f64>,
    pub comparator: Comparator,
    pub threshold: f64,
    /// How long the condition must continuously breach before the alert
    /// moves from `Pending` to `Firing`, in seconds. Measured wall-clock
    /// time between the first breaching sample and the current one, not a
    /// count of evaluations — a burst of samples arriving within the same
    /// second doesn't fire early.
    pub persistence_secs: i64,
    pub cooldown_secs: i64,
    pub severity: Severity,
    pub channels: Vec<Uuid>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("rule name must not be empty".into()));
        }
        if self.metric.trim().is_empty() {
            return Err(AppError::Validation("rule metric must not be empty".into()));
        }
        if self.window_secs == 0 {
            return Err(AppError::Validation("window_secs must be greater than zero".into()));
        }
        if self.persistence_secs < 0 {
            return Err(AppError::Validation("persistence_secs must not be negative".into()));
        }
        if self.cooldown_secs < 0 {
            return Err(AppError::Validation("cooldown_secs must not be negative".into()));
        }
        if self.reducer == Reducer::CountOverThreshold && self.sample_threshold.is_none() {
            return Err(AppError::Validation(
                "count_over_threshold reducer requires sample_threshold".into(),
            ));
        }
        if !self.threshold.is_finite() {
            return Err(AppError::Validation("threshold must be finite".into()));
        }
        Ok(())
    }
}
