//! Simulated request progress.
//!
//! The image service reports nothing while it works, so the bar shown during a
//! request is a timer: it climbs in fixed steps to a ceiling below 100, jumps to
//! 100 when the response arrives and falls back to idle shortly after. The value
//! is cosmetic and must never be used to decide whether a request succeeded.

use super::types::Tab;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of time for the simulator
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Timing of the simulated progress bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressConfig {
    /// Percentage added on every step
    #[serde(default = "default_increment")]
    pub increment: u8,

    /// Time between steps in milliseconds
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Highest value reached before the response arrives (kept below 100)
    #[serde(default = "default_ceiling")]
    pub ceiling: u8,

    /// How long 100% stays visible before returning to idle
    #[serde(default = "default_reset_ms")]
    pub reset_ms: u64,
}

fn default_increment() -> u8 {
    10
}

fn default_interval_ms() -> u64 {
    100
}

fn default_ceiling() -> u8 {
    90
}

fn default_reset_ms() -> u64 {
    2000
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            increment: default_increment(),
            interval_ms: default_interval_ms(),
            ceiling: default_ceiling(),
            reset_ms: default_reset_ms(),
        }
    }
}

/// Observable state of the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Idle,
    Running(u8),
    Complete,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Running { started: Instant },
    Complete { at: Instant },
}

#[derive(Debug, Clone)]
pub struct ProgressSimulator {
    config: ProgressConfig,
    phase: Phase,
}

impl ProgressSimulator {
    pub fn new(mut config: ProgressConfig) -> Self {
        config.ceiling = config.ceiling.min(99);
        config.interval_ms = config.interval_ms.max(1);
        Self {
            config,
            phase: Phase::Idle,
        }
    }

    /// Request started: restart from 0
    pub fn start(&mut self, now: Instant) {
        self.phase = Phase::Running { started: now };
    }

    /// Response arrived, successful or not: show 100
    pub fn finish(&mut self, now: Instant) {
        self.phase = Phase::Complete { at: now };
    }

    /// Drop straight back to idle
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Advance internal transitions (complete -> idle) and report the state
    pub fn tick(&mut self, now: Instant) -> ProgressState {
        if let Phase::Complete { at } = self.phase {
            if now.saturating_duration_since(at) >= self.reset_delay() {
                self.phase = Phase::Idle;
            }
        }
        self.state(now)
    }

    pub fn state(&self, now: Instant) -> ProgressState {
        match self.phase {
            Phase::Idle => ProgressState::Idle,
            Phase::Running { started } => {
                let steps = now.saturating_duration_since(started).as_millis()
                    / u128::from(self.config.interval_ms);
                let pct = steps
                    .saturating_mul(u128::from(self.config.increment))
                    .min(u128::from(self.config.ceiling));
                ProgressState::Running(pct as u8)
            }
            Phase::Complete { at } => {
                if now.saturating_duration_since(at) >= self.reset_delay() {
                    ProgressState::Idle
                } else {
                    ProgressState::Complete
                }
            }
        }
    }

    pub fn percent(&self, now: Instant) -> u8 {
        match self.state(now) {
            ProgressState::Idle => 0,
            ProgressState::Running(pct) => pct,
            ProgressState::Complete => 100,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.state(now) != ProgressState::Idle
    }

    fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.config.reset_ms)
    }
}

impl Default for ProgressSimulator {
    fn default() -> Self {
        Self::new(ProgressConfig::default())
    }
}

/// Label shown next to the bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStage {
    Uploading,
    Processing,
    Generating,
    Complete,
}

impl ProgressStage {
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0..=29 => ProgressStage::Uploading,
            30..=69 => ProgressStage::Processing,
            70..=99 => ProgressStage::Generating,
            _ => ProgressStage::Complete,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProgressStage::Uploading => "Uploading image...",
            ProgressStage::Processing => "Processing with AI...",
            ProgressStage::Generating => "Generating result...",
            ProgressStage::Complete => "Complete!",
        }
    }
}

/// Themed waiting overlay for each tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    PaintBrush,
    CameraCapture,
    MergeImages,
}

impl Overlay {
    pub fn for_tab(tab: Tab) -> Self {
        match tab {
            Tab::Generate => Overlay::PaintBrush,
            Tab::Edit => Overlay::CameraCapture,
            Tab::Compose => Overlay::MergeImages,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Overlay::PaintBrush => "Painting preview…",
            Overlay::CameraCapture => "Capturing image…",
            Overlay::MergeImages => "Merging images…",
        }
    }

    pub fn submessage(&self) -> &'static str {
        match self {
            Overlay::PaintBrush => "Rendering style transfer",
            Overlay::CameraCapture => "Optimizing exposure & focus",
            Overlay::MergeImages => "Blending layers & colors",
        }
    }
}
