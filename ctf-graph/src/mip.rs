//! Message interchange protocol (MIP) version negotiation, ported from
//! `graph/mip.c`.
//!
//! As in the original, only MIP version 0 exists, so negotiation reduces
//! to checking that every component descriptor in the set supports it.
//! The structure is kept because the original library documents this as
//! a placeholder for future MIP versions, not an accident of its design.

use crate::status::FuncStatus;
use ctf_ir::interval::UnsignedIntegerRangeSet;

/// One entry of a component descriptor set: which component class is
/// being instantiated and what MIP versions it claims to support.
pub trait ComponentDescriptor {
    /// Appends this component class's supported MIP versions to
    /// `range_set`. Returning `FuncStatus::Ok` without adding at least one
    /// range is a contract violation in the original
    /// (`"status-ok-with-at-least-one-range"`); callers here are expected
    /// to always add a range, typically `{0}`.
    fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus;
}

fn validate_operative_mip_version<'a, I>(descriptors: I) -> FuncStatus
where
    I: IntoIterator<Item = &'a dyn ComponentDescriptor>,
{
    for descr in descriptors {
        let mut range_set = UnsignedIntegerRangeSet::new();
        let status = descr.supported_mip_versions(&mut range_set);
        if !status.is_ok() {
            return status;
        }
        if !range_set.contains(0) {
            return FuncStatus::NoMatch;
        }
    }
    FuncStatus::Ok
}

/// Ported from `bt_get_greatest_operative_mip_version`: finds the
/// greatest MIP version every descriptor supports. As of this version of
/// the library, only version 0 exists, so this always resolves to `0` or
/// fails with `FuncStatus::NoMatch` when some descriptor doesn't support
/// it.
pub fn greatest_operative_mip_version<'a, I>(descriptors: I) -> Result<u64, FuncStatus>
where
    I: IntoIterator<Item = &'a dyn ComponentDescriptor>,
{
    let status = validate_operative_mip_version(descriptors);
    if status.is_ok() {
        Ok(0)
    } else {
        Err(status)
    }
}

/// Ported from `bt_get_maximal_mip_version`.
pub fn maximal_mip_version() -> u64 {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SupportsZero;
    impl ComponentDescriptor for SupportsZero {
        fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
            range_set.add_range(0, 0).unwrap();
            FuncStatus::Ok
        }
    }

    struct SupportsOnlyOne;
    impl ComponentDescriptor for SupportsOnlyOne {
        fn supported_mip_versions(&self, range_set: &mut UnsignedIntegerRangeSet) -> FuncStatus {
            range_set.add_range(1, 1).unwrap();
            FuncStatus::Ok
        }
    }

    #[test]
    fn resolves_to_zero_when_all_descriptors_support_it() {
        let a = SupportsZero;
        let b = SupportsZero;
        let descrs: Vec<&dyn ComponentDescriptor> = vec![&a, &b];
        assert_eq!(greatest_operative_mip_version(descrs).unwrap(), 0);
    }

    #[test]
    fn fails_when_a_descriptor_does_not_support_version_zero() {
        let a = SupportsZero;
        let b = SupportsOnlyOne;
        let descrs: Vec<&dyn ComponentDescriptor> = vec![&a, &b];
        assert_eq!(
            greatest_operative_mip_version(descrs).unwrap_err(),
            FuncStatus::NoMatch
        );
    }

    #[test]
    fn maximal_is_zero() {
        assert_eq!(maximal_mip_version(), 0);
    }
}
