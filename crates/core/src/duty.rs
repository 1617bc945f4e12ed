//! Discrete fan duty-cycle levels.
//!
//! The controller never works with raw duty values. It moves an index
//! over an ordered range of levels and only encodes the index when the
//! actuator is called or a snapshot is recorded.

use crate::error::{CoreError, CoreResult};

/// Lowest duty the chassis accepts (`0x04`, 4 %).
pub const DEFAULT_MIN_DUTY: u8 = 0x04;

/// Full speed (`0x64`, 100 %).
pub const DEFAULT_MAX_DUTY: u8 = 0x64;

/// Ordered range of duty levels, `min_duty..=max_duty`, one level per
/// percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyTable {
    min_duty: u8,
    max_duty: u8,
}

impl Default for DutyTable {
    fn default() -> Self {
        Self {
            min_duty: DEFAULT_MIN_DUTY,
            max_duty: DEFAULT_MAX_DUTY,
        }
    }
}

impl DutyTable {
    /// Build a table spanning `min_duty..=max_duty`.
    ///
    /// Rejects empty ranges and duties above 100 %.
    pub fn new(min_duty: u8, max_duty: u8) -> CoreResult<Self> {
        if min_duty >= max_duty {
            return Err(CoreError::Validation(format!(
                "duty range must be increasing, got {min_duty}..={max_duty}"
            )));
        }
        if max_duty > DEFAULT_MAX_DUTY {
            return Err(CoreError::Validation(format!(
                "max duty {max_duty} exceeds 100%"
            )));
        }
        Ok(Self { min_duty, max_duty })
    }

    /// Highest valid index (full speed).
    pub fn max_index(&self) -> usize {
        usize::from(self.max_duty - self.min_duty)
    }

    /// Index the controller starts from.
    pub fn midpoint(&self) -> usize {
        self.max_index() / 2
    }

    /// Encoded duty value for `index`. Out-of-range indices saturate at
    /// full speed.
    pub fn duty(&self, index: usize) -> u8 {
        let index = index.min(self.max_index());
        // max_index fits in u8, so the cast cannot truncate.
        self.min_duty + index as u8
    }
}

/// One resolved level: the controller's index and its encoded duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanLevel {
    pub index: usize,
    pub duty: u8,
}

impl FanLevel {
    pub fn resolve(table: &DutyTable, index: usize) -> Self {
        Self {
            index,
            duty: table.duty(index),
        }
    }
}
