//! Simulated instrument link
//!
//! Answers register reads with generated data so the logger and the live view
//! can be exercised without hardware. Select it per channel with
//! `transport = "simulated"` in the config.
//!
//! # Data Patterns
//!
//! - [`SimPattern::Constant`] - Fixed register value
//! - [`SimPattern::Sine`] - Sinusoid around an offset, phase-shifted per unit
//! - [`SimPattern::Counter`] - Incrementing counter with wrap-around
//!
//! Every generated value is clamped into the `u16` register range.

use super::transport::{RegisterRequest, RegisterTransport};
use crate::error::{DataLogError, Result};
use std::time::Instant;

/// Pattern used to generate register values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments once per read
    Counter { step: f64, min: f64, max: f64 },
}

impl Default for SimPattern {
    fn default() -> Self {
        SimPattern::Sine {
            frequency: 0.5,
            amplitude: 25.0,
            offset: 175.0,
        }
    }
}

/// Register source that never touches a real port
#[derive(Debug)]
pub struct SimulatedTransport {
    name: String,
    pattern: SimPattern,
    started: Instant,
    counter_value: f64,
    /// Fail every n-th read (0 = never)
    fail_every: u64,
    reads: u64,
    open: bool,
}

impl SimulatedTransport {
    /// Create a simulated link with the default sine pattern
    pub fn new(name: String) -> Self {
        tracing::info!("Opened simulated link {}", name);
        Self {
            name,
            pattern: SimPattern::default(),
            started: Instant::now(),
            counter_value: 0.0,
            fail_every: 0,
            reads: 0,
            open: true,
        }
    }

    /// Use a different data pattern
    pub fn with_pattern(mut self, pattern: SimPattern) -> Self {
        self.pattern = pattern;
        if let SimPattern::Counter { min, step, .. } = pattern {
            self.counter_value = min - step;
        }
        self
    }

    /// Make every n-th read time out
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = n;
        self
    }

    /// Number of read attempts so far
    pub fn reads(&self) -> u64 {
        self.reads
    }

    fn generate(&mut self, unit_address: u8, register_offset: u16) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        match self.pattern {
            SimPattern::Constant(v) => v,
            SimPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => {
                let phase = unit_address as f64 * 0.7 + register_offset as f64 * 0.3;
                offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed + phase).sin()
            }
            SimPattern::Counter { step, min, max } => {
                if register_offset == 0 {
                    self.counter_value += step;
                    if self.counter_value > max {
                        self.counter_value = min;
                    }
                }
                self.counter_value
            }
        }
    }
}

impl RegisterTransport for SimulatedTransport {
    fn read_registers(&mut self, request: &RegisterRequest) -> Result<Vec<u16>> {
        if !self.open {
            return Err(DataLogError::transport(&self.name, "link is closed"));
        }
        self.reads += 1;
        if self.fail_every > 0 && self.reads % self.fail_every == 0 {
            return Err(DataLogError::Timeout(format!(
                "simulated timeout on {} unit {}",
                self.name, request.unit_address
            )));
        }

        Ok((0..request.register_count)
            .map(|offset| {
                self.generate(request.unit_address, offset)
                    .round()
                    .clamp(0.0, u16::MAX as f64) as u16
            })
            .collect())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            tracing::info!("Closed simulated link {}", self.name);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }
}
