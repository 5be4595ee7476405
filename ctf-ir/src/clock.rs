//! Clock classes and clock snapshots (spec §3.4).

use crate::value::Value;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

#[derive(Debug)]
pub struct ClockClass {
    name: Option<String>,
    description: Option<String>,
    frequency: u64,
    precision: u64,
    offset_seconds: i64,
    offset_cycles: u64,
    origin_is_unix_epoch: bool,
    uuid: Option<Uuid>,
    user_attributes: IndexMap<String, Value>,
    frozen: Cell<bool>,
}

impl ClockClass {
    /// `frequency` must be > 0 and `offset_cycles` must be < `frequency`.
    pub fn new(frequency: u64) -> Result<Self> {
        if frequency == 0 {
            return Err(Error::InvalidFieldClass(
                "clock class frequency must be > 0".to_string(),
            ));
        }
        Ok(Self {
            name: None,
            description: None,
            frequency,
            precision: 0,
            offset_seconds: 0,
            offset_cycles: 0,
            origin_is_unix_epoch: false,
            uuid: None,
            user_attributes: IndexMap::new(),
            frozen: Cell::new(false),
        })
    }

    fn check_mut(&self) -> Result<()> {
        if self.frozen.get() {
            Err(Error::Frozen("clock class".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidFieldClass(
                "clock class name must be non-empty if set".to_string(),
            ));
        }
        self.name = Some(name);
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) -> Result<()> {
        self.check_mut()?;
        self.description = Some(description.into());
        Ok(())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn frequency(&self) -> u64 {
        self.frequency
    }

    pub fn set_precision(&mut self, precision: u64) -> Result<()> {
        self.check_mut()?;
        self.precision = precision;
        Ok(())
    }

    pub fn precision(&self) -> u64 {
        self.precision
    }

    pub fn set_offset(&mut self, seconds: i64, cycles: u64) -> Result<()> {
        self.check_mut()?;
        if cycles >= self.frequency {
            return Err(Error::InvalidFieldClass(
                "clock class offset cycles must be < frequency".to_string(),
            ));
        }
        self.offset_seconds = seconds;
        self.offset_cycles = cycles;
        Ok(())
    }

    pub fn offset(&self) -> (i64, u64) {
        (self.offset_seconds, self.offset_cycles)
    }

    pub fn set_origin_is_unix_epoch(&mut self, value: bool) -> Result<()> {
        self.check_mut()?;
        self.origin_is_unix_epoch = value;
        Ok(())
    }

    pub fn origin_is_unix_epoch(&self) -> bool {
        self.origin_is_unix_epoch
    }

    pub fn set_uuid(&mut self, uuid: Uuid) -> Result<()> {
        self.check_mut()?;
        self.uuid = Some(uuid);
        Ok(())
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn user_attributes(&self) -> &IndexMap<String, Value> {
        &self.user_attributes
    }

    pub fn set_user_attribute(&mut self, key: impl Into<String>, value: Value) -> Result<()> {
        self.check_mut()?;
        self.user_attributes.insert(key.into(), value);
        Ok(())
    }

    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Converts a raw cycle value to nanoseconds from the clock's origin.
    ///
    /// `floor(cycles/frequency)*1e9 + (cycles mod frequency)*1e9/frequency
    ///  + offset_seconds*1e9 + offset_cycles*1e9/frequency`
    ///
    /// All intermediate arithmetic is performed in `i128` so overflow can be
    /// detected precisely against `i64::MIN`/`i64::MAX` rather than
    /// wrapping silently.
    pub fn cycles_to_ns_from_origin(&self, cycles: u64) -> Result<i64> {
        let freq = self.frequency as i128;
        let cycles = cycles as i128;

        let whole_seconds_ns = (cycles / freq) * 1_000_000_000i128;
        let frac_ns = (cycles % freq) * 1_000_000_000i128 / freq;
        let offset_seconds_ns = (self.offset_seconds as i128) * 1_000_000_000i128;
        let offset_cycles_ns = (self.offset_cycles as i128) * 1_000_000_000i128 / freq;

        let total = whole_seconds_ns
            .checked_add(frac_ns)
            .and_then(|v| v.checked_add(offset_seconds_ns))
            .and_then(|v| v.checked_add(offset_cycles_ns))
            .ok_or(Error::ClockOverflow)?;

        if total > i64::MAX as i128 || total < i64::MIN as i128 {
            return Err(Error::ClockOverflow);
        }

        Ok(total as i64)
    }
}

/// `(clock class, raw cycle value)`.
#[derive(Debug, Clone)]
pub struct ClockSnapshot {
    pub clock_class: Rc<ClockClass>,
    pub cycles: u64,
}

impl ClockSnapshot {
    pub fn new(clock_class: Rc<ClockClass>, cycles: u64) -> Self {
        Self {
            clock_class,
            cycles,
        }
    }

    pub fn ns_from_origin(&self) -> Result<i64> {
        self.clock_class.cycles_to_ns_from_origin(self.cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_matches_formula_with_no_offset() {
        let cc = ClockClass::new(1_000_000_000).unwrap();
        assert_eq!(cc.cycles_to_ns_from_origin(0).unwrap(), 0);
        assert_eq!(cc.cycles_to_ns_from_origin(1).unwrap(), 1);
        assert_eq!(cc.cycles_to_ns_from_origin(1_000_000_000).unwrap(), 1_000_000_000);
    }

    #[test]
    fn conversion_applies_offset() {
        let mut cc = ClockClass::new(1_000_000_000).unwrap();
        cc.set_offset(2, 500_000_000).unwrap();
        assert_eq!(
            cc.cycles_to_ns_from_origin(0).unwrap(),
            2_500_000_000
        );
    }

    #[test]
    fn conversion_strictly_increases_with_cycles() {
        let cc = ClockClass::new(1_193_182).unwrap();
        let mut prev = cc.cycles_to_ns_from_origin(0).unwrap();
        for c in (1..100_000u64).step_by(997) {
            let next = cc.cycles_to_ns_from_origin(c).unwrap();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn conversion_detects_overflow() {
        let cc = ClockClass::new(1).unwrap();
        assert_eq!(
            cc.cycles_to_ns_from_origin(u64::MAX),
            Err(Error::ClockOverflow)
        );
    }

    #[test]
    fn zero_frequency_is_rejected() {
        assert!(ClockClass::new(0).is_err());
    }

    #[test]
    fn offset_cycles_must_be_less_than_frequency() {
        let mut cc = ClockClass::new(100).unwrap();
        assert!(cc.set_offset(0, 100).is_err());
        assert!(cc.set_offset(0, 99).is_ok());
    }

    #[test]
    fn mutating_frozen_clock_class_fails() {
        let mut cc = ClockClass::new(100).unwrap();
        cc.freeze();
        assert!(matches!(cc.set_precision(1), Err(Error::Frozen(_))));
    }
}
