//! Ease-out interpolation for animations
//!
//! [`ease_out`] computes a single animation step: it moves `1 / speed` of the
//! remaining distance toward the target, and snaps onto the target once less
//! than one `jump` unit remains. Callers feed the result back in as the next
//! `start`, typically once per rendered frame.
//!
//! `speed` with magnitude at most 1, or negative, oscillates or diverges
//! instead of converging. That is left to the caller.

use crate::error::{PreludeError, Result};
use serde::{Deserialize, Serialize};

/// Snap threshold used when no `jump` is given
pub const DEFAULT_JUMP: f64 = 1.0;

/// Compute one ease-out step from `start` toward `finish`
///
/// # Example
///
/// ```
/// use chatscript_core::easing::{ease_out, DEFAULT_JUMP};
///
/// assert_eq!(ease_out(0.0, 10.0, 2.0, DEFAULT_JUMP), Ok(5.0));
/// assert_eq!(ease_out(9.6, 10.0, 2.0, 1.0), Ok(10.0));
/// ```
pub fn ease_out(start: f64, finish: f64, speed: f64, jump: f64) -> Result<f64> {
    if speed == 0.0 {
        return Err(PreludeError::DivideByZero);
    }

    let steps = ((finish - start).abs() / jump).floor();
    if steps > 0.0 {
        Ok(start + (finish - start) / speed)
    } else {
        Ok(finish)
    }
}

/// Tuning parameters for a repeated ease-out animation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EaseOut {
    /// Divisor applied to the remaining distance each step
    pub speed: f64,
    /// Distance below which the value snaps to the target
    #[serde(default = "default_jump")]
    pub jump: f64,
}

fn default_jump() -> f64 {
    DEFAULT_JUMP
}

impl EaseOut {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            jump: DEFAULT_JUMP,
        }
    }

    pub fn with_jump(mut self, jump: f64) -> Self {
        self.jump = jump;
        self
    }

    /// One step from `start` toward `finish`
    pub fn step(&self, start: f64, finish: f64) -> Result<f64> {
        ease_out(start, finish, self.speed, self.jump)
    }

    /// Successive positions from `start` until `finish` is reached
    ///
    /// Yields at most `max_frames` values. The last value is `finish` unless
    /// the animation did not converge within the limit.
    pub fn frames(&self, start: f64, finish: f64, max_frames: usize) -> Result<Frames> {
        if self.speed == 0.0 {
            return Err(PreludeError::DivideByZero);
        }
        Ok(Frames {
            params: *self,
            current: start,
            finish,
            remaining: max_frames,
            done: false,
        })
    }
}

/// Iterator returned by [`EaseOut::frames`]
#[derive(Debug, Clone)]
pub struct Frames {
    params: EaseOut,
    current: f64,
    finish: f64,
    remaining: usize,
    done: bool,
}

impl Iterator for Frames {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.done || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        // Speed was checked when the iterator was built
        let next = self.params.step(self.current, self.finish).ok()?;
        self.current = next;
        if next == self.finish {
            self.done = true;
        }
        Some(next)
    }
}
