// /////////////////////////////////////////////////////////////////////////////
// Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! One network measurement, retained in the Network Observer's bounded ring
//! buffers (`spec.md` §3, cap default 50 per direction).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkSample {
    pub timestamp_millis: i64,
    pub direction: Direction,
    pub speed_kbps: f64,
    pub latency_ms: Option<f64>,
}

/// A connection event retained by the Stability Analyzer (`spec.md` §4.4),
/// last 100 within a 3-minute window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    Online { at_millis: i64 },
    Offline { at_millis: i64 },
    TypeChange { at_millis: i64 },
    QualityChange { at_millis: i64 },
}

impl ConnectionEvent {
    pub fn at_millis(&self) -> i64 {
        match self {
            ConnectionEvent::Online { at_millis }
            | ConnectionEvent::Offline { at_millis }
            | ConnectionEvent::TypeChange { at_millis }
            | ConnectionEvent::QualityChange { at_millis } => *at_millis,
        }
    }
}

/// Network access technology, used as the base term in the quality score
/// (`spec.md` §6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Ethernet,
    Wifi,
    Cellular5g,
    Cellular4g,
    Cellular3g,
    Cellular2g,
    None,
    Unknown,
}

impl NetworkType {
    pub fn base_score(&self) -> i32 {
        match self {
            NetworkType::Ethernet => 100,
            NetworkType::Wifi => 90,
            NetworkType::Cellular5g => 85,
            NetworkType::Cellular4g => 70,
            NetworkType::Cellular3g => 50,
            NetworkType::Cellular2g => 30,
            NetworkType::None => 0,
            NetworkType::Unknown => 40,
        }
    }
}
