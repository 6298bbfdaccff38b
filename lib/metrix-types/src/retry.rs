/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

/// Delay schedule for bounded retries.
///
/// `delay(n)` is the wait before retry `n` (zero based), and `None` once the
/// schedule is exhausted. No policy retries forever.
#[derive(Clone, Debug, PartialEq)]
pub enum BackoffPolicy {
    Fixed(Vec<Duration>),
    Exponential {
        initial: Duration,
        factor: f64,
        max_delay: Duration,
        max_retries: usize,
    },
    Jittered {
        base: Box<BackoffPolicy>,
        jitter: f64,
    },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Fixed(vec![
            Duration::from_secs(1),
            Duration::from_secs(3),
            Duration::from_secs(5),
        ])
    }
}

impl BackoffPolicy {
    pub fn check(&self) -> Result<(), String> {
        match self {
            BackoffPolicy::Fixed(_) => Ok(()),
            BackoffPolicy::Exponential {
                initial,
                factor,
                max_delay,
                ..
            } => {
                if !factor.is_finite() || *factor < 1.0 {
                    return Err(format!("invalid backoff factor {factor}"));
                }
                if initial > max_delay {
                    return Err("initial delay exceeds max delay".to_string());
                }
                Ok(())
            }
            BackoffPolicy::Jittered { base, jitter } => {
                if !(0.0..=1.0).contains(jitter) {
                    return Err(format!("jitter {jitter} out of range [0, 1]"));
                }
                base.check()
            }
        }
    }

    pub fn max_retries(&self) -> usize {
        match self {
            BackoffPolicy::Fixed(delays) => delays.len(),
            BackoffPolicy::Exponential { max_retries, .. } => *max_retries,
            BackoffPolicy::Jittered { base, .. } => base.max_retries(),
        }
    }

    pub fn delay(&self, attempt: usize) -> Option<Duration> {
        match self {
            BackoffPolicy::Fixed(delays) => delays.get(attempt).copied(),
            BackoffPolicy::Exponential {
                initial,
                factor,
                max_delay,
                max_retries,
            } => {
                if attempt >= *max_retries {
                    return None;
                }
                let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
                let secs = initial.as_secs_f64() * factor.powi(exp);
                let secs = secs.min(max_delay.as_secs_f64());
                Some(Duration::try_from_secs_f64(secs).unwrap_or(*max_delay))
            }
            BackoffPolicy::Jittered { base, jitter } => {
                let d = base.delay(attempt)?;
                let scale = 1.0 + jitter * (fastrand::f64() * 2.0 - 1.0);
                let secs = d.as_secs_f64() * scale.max(0.0);
                Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
            }
        }
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..).map_while(|i| self.delay(i))
    }
}
