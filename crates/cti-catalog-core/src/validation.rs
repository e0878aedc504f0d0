//! Change set validation.
//!
//! A response for `(from, to]` must contain every offset in that range
//! exactly once, in increasing order. Anything else is rejected before a
//! single operation is applied.

use crate::changes::Offset;
use crate::error::CoreError;

/// Check that `offsets` is exactly the run `from + 1 ..= to`.
pub fn validate_offsets(from: u64, to: u64, offsets: &[Offset]) -> Result<(), CoreError> {
    if from > to {
        return Err(CoreError::InvalidRange { from, to });
    }

    let mut expected = from + 1;
    for record in offsets {
        if record.offset <= from || record.offset > to {
            return Err(CoreError::OutOfRange {
                offset: record.offset,
                from,
                to,
            });
        }
        if record.offset != expected {
            return Err(CoreError::OutOfOrder {
                expected,
                got: record.offset,
            });
        }
        expected += 1;
    }

    let last = expected - 1;
    if last != to {
        return Err(CoreError::Truncated { last, to });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn run(from: u64, to: u64) -> Vec<Offset> {
        ((from + 1)..=to).map(|o| Offset::delete(o, format!("r{}", o))).collect()
    }

    #[test]
    fn test_empty_range_is_valid() {
        assert!(validate_offsets(5, 5, &[]).is_ok());
    }

    #[test]
    fn test_inverted_range() {
        assert!(matches!(
            validate_offsets(6, 5, &[]),
            Err(CoreError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_truncated_response() {
        let offsets = run(0, 8);
        assert!(matches!(
            validate_offsets(0, 10, &offsets),
            Err(CoreError::Truncated { last: 8, to: 10 })
        ));
    }

    #[test]
    fn test_offset_at_from_is_out_of_range() {
        let offsets = vec![Offset::delete(0, "r0")];
        assert!(matches!(
            validate_offsets(0, 1, &offsets),
            Err(CoreError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_duplicate_offset() {
        let offsets = vec![Offset::delete(1, "a"), Offset::delete(1, "a")];
        assert!(matches!(
            validate_offsets(0, 2, &offsets),
            Err(CoreError::OutOfOrder { expected: 2, got: 1 })
        ));
    }

    proptest! {
        #[test]
        fn contiguous_runs_validate(from in 0u64..100_000, len in 0u64..200) {
            let to = from + len;
            prop_assert!(validate_offsets(from, to, &run(from, to)).is_ok());
        }

        #[test]
        fn dropping_any_offset_fails(from in 0u64..100_000, len in 1u64..200, idx in any::<prop::sample::Index>()) {
            let to = from + len;
            let mut offsets = run(from, to);
            offsets.remove(idx.index(offsets.len()));
            prop_assert!(validate_offsets(from, to, &offsets).is_err());
        }

        #[test]
        fn swapping_neighbours_fails(from in 0u64..100_000, len in 2u64..200, at in any::<prop::sample::Index>()) {
            let to = from + len;
            let mut offsets = run(from, to);
            let i = at.index(offsets.len() - 1);
            offsets.swap(i, i + 1);
            prop_assert!(validate_offsets(from, to, &offsets).is_err());
        }
    }
}
