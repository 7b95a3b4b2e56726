//! Sort-key comparison honoring per-column direction.
//!
//! Every operator that needs a total order (`Take`, `Skip`, pagination
//! anchors) compares rows via these helpers rather than `Value`'s own
//! `Ord`, since `orderBy` can mix ascending and descending columns (§3, §4.2).

use std::cmp::Ordering;

use crate::ast::Direction;
use crate::value::Value;

pub fn compare_keys(a: &[Value], b: &[Value], dirs: &[Direction]) -> Ordering {
    for (i, dir) in dirs.iter().enumerate() {
        let av = a.get(i).unwrap_or(&Value::Null);
        let bv = b.get(i).unwrap_or(&Value::Null);
        let cmp = av.partial_cmp(bv).unwrap_or(Ordering::Equal);
        let cmp = match dir {
            Direction::Asc => cmp,
            Direction::Desc => cmp.reverse(),
        };
        if cmp != Ordering::Equal {
            return cmp;
        }
    }
    Ordering::Equal
}

/// Whether `key` is at or after `start` in the direction `dirs` impose,
/// honoring the inclusive/exclusive flag on the pagination anchor (§4.2, §8 S4).
pub fn admits_start(key: &[Value], start: &[Value], dirs: &[Direction], inclusive: bool) -> bool {
    match compare_keys(key, start, dirs) {
        Ordering::Greater => true,
        Ordering::Equal => inclusive,
        Ordering::Less => false,
    }
}
