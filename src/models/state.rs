use std::fmt;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorState {
    Focused,
    Drowsy,
    Distracted,
    Away,
    Idle,
    Unknown,
}

impl BehaviorState {
    pub const ALL: [BehaviorState; 6] = [
        BehaviorState::Focused,
        BehaviorState::Drowsy,
        BehaviorState::Distracted,
        BehaviorState::Away,
        BehaviorState::Idle,
        BehaviorState::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorState::Focused => "focused",
            BehaviorState::Drowsy => "drowsy",
            BehaviorState::Distracted => "distracted",
            BehaviorState::Away => "away",
            BehaviorState::Idle => "idle",
            BehaviorState::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "focused" => Ok(BehaviorState::Focused),
            "drowsy" => Ok(BehaviorState::Drowsy),
            "distracted" => Ok(BehaviorState::Distracted),
            "away" => Ok(BehaviorState::Away),
            "idle" => Ok(BehaviorState::Idle),
            "unknown" => Ok(BehaviorState::Unknown),
            other => Err(anyhow!("unknown behavior state '{other}'")),
        }
    }
}

impl fmt::Display for BehaviorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Rule,
    Llm,
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationSource::Rule => "rule",
            ClassificationSource::Llm => "llm",
            ClassificationSource::Fallback => "fallback",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "rule" => Ok(ClassificationSource::Rule),
            "llm" => Ok(ClassificationSource::Llm),
            "fallback" => Ok(ClassificationSource::Fallback),
            other => Err(anyhow!("unknown classification source '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub state: BehaviorState,
    /// Always within [0, 1].
    pub confidence: f64,
    pub reasoning: String,
    pub source: ClassificationSource,
}

impl ClassificationResult {
    pub fn new(
        state: BehaviorState,
        confidence: f64,
        reasoning: impl Into<String>,
        source: ClassificationSource,
    ) -> Self {
        Self {
            state,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            source,
        }
    }
}

/// One integration tick's verdict, as broadcast to clients.
///
/// `camera_state` and `pc_state` are always `None`: classification is joint,
/// but older consumers still read the per-signal fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratedState {
    pub state: BehaviorState,
    pub confidence: f64,
    pub camera_state: Option<BehaviorState>,
    pub pc_state: Option<BehaviorState>,
    pub reasoning: String,
    pub source: ClassificationSource,
    pub timestamp: DateTime<Utc>,
}

impl IntegratedState {
    pub fn from_classification(result: ClassificationResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            state: result.state,
            confidence: result.confidence,
            camera_state: None,
            pc_state: None,
            reasoning: result.reasoning,
            source: result.source,
            timestamp,
        }
    }

    pub fn to_log_entry(&self) -> StateLogEntry {
        StateLogEntry {
            id: None,
            timestamp: self.timestamp,
            integrated_state: self.state,
            camera_state: self.camera_state,
            pc_state: self.pc_state,
            confidence: self.confidence,
            source: Some(self.source),
        }
    }
}

/// A persisted row of the append-only state log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateLogEntry {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub integrated_state: BehaviorState,
    pub camera_state: Option<BehaviorState>,
    pub pc_state: Option<BehaviorState>,
    pub confidence: f64,
    pub source: Option<ClassificationSource>,
}

impl StateLogEntry {
    pub fn new(timestamp: DateTime<Utc>, state: BehaviorState, confidence: f64) -> Self {
        Self {
            id: None,
            timestamp,
            integrated_state: state,
            camera_state: None,
            pc_state: None,
            confidence,
            source: None,
        }
    }
}
