/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MetricKind, ValidationError};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricValue {
    Gauge(f64),
    Counter(i64),
}

impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Counter(_) => MetricKind::Counter,
        }
    }

    /// Parse the text form used by the plain update route.
    pub fn parse(kind: MetricKind, raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidValue {
            kind,
            raw: raw.to_string(),
        };
        match kind {
            MetricKind::Gauge => {
                let v = f64::from_str(raw).map_err(|_| invalid())?;
                if !v.is_finite() {
                    return Err(invalid());
                }
                Ok(MetricValue::Gauge(v))
            }
            MetricKind::Counter => {
                let v = i64::from_str(raw).map_err(|_| invalid())?;
                Ok(MetricValue::Counter(v))
            }
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Gauge(v) => write!(f, "{v}"),
            MetricValue::Counter(v) => write!(f, "{v}"),
        }
    }
}

/// A single named metric sample.
///
/// On the wire this is `{"id","type","delta","value"}` where only the field
/// matching `type` is emitted. Decoding ignores the field of the other kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMetric", into = "WireMetric")]
pub struct MetricRecord {
    name: String,
    value: MetricValue,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        MetricRecord {
            name: name.into(),
            value,
        }
    }

    pub fn gauge(name: impl Into<String>, v: f64) -> Self {
        MetricRecord::new(name, MetricValue::Gauge(v))
    }

    pub fn counter(name: impl Into<String>, delta: i64) -> Self {
        MetricRecord::new(name, MetricValue::Counter(delta))
    }

    pub fn parse(kind: &str, name: &str, raw_value: &str) -> Result<Self, ValidationError> {
        let kind = MetricKind::from_str(kind)?;
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let value = MetricValue::parse(kind, raw_value)?;
        Ok(MetricRecord::new(name, value))
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn value(&self) -> MetricValue {
        self.value
    }

    #[inline]
    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }

    pub fn gauge_value(&self) -> Option<f64> {
        match self.value {
            MetricValue::Gauge(v) => Some(v),
            MetricValue::Counter(_) => None,
        }
    }

    pub fn counter_value(&self) -> Option<i64> {
        match self.value {
            MetricValue::Gauge(_) => None,
            MetricValue::Counter(v) => Some(v),
        }
    }

    /// The `name: value` line used by listing views.
    pub fn listing_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

#[derive(Serialize, Deserialize)]
struct WireMetric {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<f64>,
}

impl TryFrom<WireMetric> for MetricRecord {
    type Error = ValidationError;

    fn try_from(w: WireMetric) -> Result<Self, Self::Error> {
        let kind = MetricKind::from_str(&w.kind)?;
        if w.id.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        let value = match kind {
            MetricKind::Gauge => w.value.map(MetricValue::Gauge),
            MetricKind::Counter => w.delta.map(MetricValue::Counter),
        };
        match value {
            Some(value) => Ok(MetricRecord { name: w.id, value }),
            None => Err(ValidationError::MissingValue { kind, name: w.id }),
        }
    }
}

impl From<MetricRecord> for WireMetric {
    fn from(r: MetricRecord) -> Self {
        let (delta, value) = match r.value {
            MetricValue::Gauge(v) => (None, Some(v)),
            MetricValue::Counter(d) => (Some(d), None),
        };
        WireMetric {
            id: r.name,
            kind: r.value.kind().as_str().to_string(),
            delta,
            value,
        }
    }
}

/// Lookup request body of the JSON value route.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MetricQuery {
    #[serde(rename = "id")]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
}
