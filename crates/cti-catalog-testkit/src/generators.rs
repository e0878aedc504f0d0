//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{json, Value};

use cti_catalog_core::{ContentType, Offset, PatchOperation};

use crate::fixtures::rule_payload;

/// Generate a content type.
pub fn content_type() -> impl Strategy<Value = ContentType> {
    prop::sample::select(ContentType::ALL.to_vec())
}

/// Generate a chunk size for changes requests.
pub fn chunk_size() -> impl Strategy<Value = u64> {
    1u64..=50
}

/// Generate a `(from, to)` offset window.
pub fn offset_window() -> impl Strategy<Value = (u64, u64)> {
    (0u64..500, 0u64..500).prop_map(|(from, len)| (from, from + len))
}

/// Generate a raw category string such as `cloud-services-aws`.
pub fn category() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,8}", 0..4).prop_map(|words| words.join("-"))
}

/// Generate a small JSON document with string, number and nested fields.
pub fn document() -> impl Strategy<Value = Value> {
    (
        "[a-z0-9-]{1,12}",
        "[ -~]{0,24}",
        any::<u16>(),
        prop::collection::vec("[a-z]{1,6}", 0..4),
    )
        .prop_map(|(id, title, level, tags)| {
            json!({
                "id": id,
                "title": title,
                "level": level,
                "tags": tags,
                "meta": {"source": "generated"}
            })
        })
}

/// One step of a change log, before offsets are assigned.
#[derive(Debug, Clone)]
pub enum LogStep {
    Create(usize),
    Update(usize),
    Delete(usize),
    Empty,
}

fn log_step(pool: usize) -> impl Strategy<Value = LogStep> {
    prop_oneof![
        3 => (0..pool).prop_map(LogStep::Create),
        2 => (0..pool).prop_map(LogStep::Update),
        1 => (0..pool).prop_map(LogStep::Delete),
        1 => Just(LogStep::Empty),
    ]
}

/// Generate a change log of 1..=`max_len` offsets starting at 1, over a
/// pool of `pool` rule ids.
///
/// The log is valid: updates only target resources that exist at that
/// point in the log, so replaying it never stops on a missing resource.
pub fn change_log(pool: usize, max_len: usize) -> impl Strategy<Value = Vec<Offset>> {
    let pool = pool.max(1);
    prop::collection::vec(log_step(pool), 1..=max_len.max(1)).prop_map(move |steps| {
        let mut live = vec![false; pool];
        steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                let offset = i as u64 + 1;
                let id = |n: usize| format!("r-{}", n);
                match step {
                    LogStep::Create(n) => {
                        live[n] = true;
                        Offset::create(offset, id(n), rule_payload(&id(n), &format!("v{}", offset)))
                    }
                    LogStep::Update(n) if live[n] => Offset::update(
                        offset,
                        id(n),
                        vec![PatchOperation::replace(
                            "/document/title",
                            json!(format!("v{}", offset)),
                        )],
                    ),
                    LogStep::Update(n) => {
                        live[n] = true;
                        Offset::create(offset, id(n), rule_payload(&id(n), &format!("v{}", offset)))
                    }
                    LogStep::Delete(n) => {
                        live[n] = false;
                        Offset::delete(offset, id(n))
                    }
                    LogStep::Empty => Offset::delete(offset, ""),
                }
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cti_catalog_core::{chunk_ranges, validate_offsets, OperationType};

    proptest! {
        #[test]
        fn generated_logs_are_contiguous(log in change_log(4, 40)) {
            let last = log.last().map(|o| o.offset).unwrap_or(0);
            prop_assert!(validate_offsets(0, last, &log).is_ok());
        }

        #[test]
        fn updates_follow_creates(log in change_log(3, 40)) {
            let mut live = std::collections::HashSet::new();
            for offset in &log {
                match offset.kind {
                    OperationType::Create => { live.insert(offset.resource.clone()); }
                    OperationType::Update => prop_assert!(live.contains(&offset.resource)),
                    OperationType::Delete => { live.remove(&offset.resource); }
                }
            }
        }

        #[test]
        fn chunks_cover_window((from, to) in offset_window(), size in chunk_size()) {
            let ranges = chunk_ranges(from, to, size);
            let mut cursor = from;
            for (start, end) in &ranges {
                prop_assert_eq!(*start, cursor);
                prop_assert!(end > start);
                prop_assert!(end - start <= size);
                cursor = *end;
            }
            prop_assert_eq!(cursor, to);
        }
    }
}
