//! Bitemporal polygon engine (spec §4.D): reconstructs per-row `(valid_from, valid_to,
//! system_from, system_to)` rectangles from a stream of events in `(iid asc, system_from
//! desc)` order.

use crate::engine::core::event::{Event, Op};
use crate::engine::core::iid::Iid;
use std::collections::BTreeMap;

/// A fully-resolved validity rectangle, ready to be filtered by the query's temporal
/// bounds (§4.I) and projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polygon {
    pub valid_from: i64,
    pub valid_to: i64,
    pub system_from: i64,
    /// `None` encodes +∞ — the slice has not yet been superseded.
    pub system_to: Option<i64>,
}

/// Piecewise-constant map `valid_time -> most recent system_from claiming that slice`.
///
/// Represented as breakpoints on a `BTreeMap`; the value recorded at a breakpoint holds
/// from that point (inclusive) until the next breakpoint (exclusive). A permanent
/// sentinel at `i64::MIN` with `None` means "unclaimed" for any valid-time not yet
/// touched by a more recent event.
#[derive(Debug, Clone)]
pub struct Ceiling {
    breakpoints: BTreeMap<i64, Option<i64>>,
}

impl Ceiling {
    pub fn new() -> Self {
        let mut breakpoints = BTreeMap::new();
        breakpoints.insert(i64::MIN, None);
        Self { breakpoints }
    }

    fn value_at(&self, point: i64) -> Option<i64> {
        self.breakpoints
            .range(..=point)
            .next_back()
            .and_then(|(_, v)| *v)
    }

    /// Partitions `[valid_from, valid_to)` by the ceiling's existing breakpoints,
    /// returning each sub-range paired with the `system_from` already claiming it
    /// (`None` if unclaimed, i.e. the resulting polygon piece's `system_to`).
    pub fn query(&self, valid_from: i64, valid_to: i64) -> Vec<(i64, i64, Option<i64>)> {
        if valid_from >= valid_to {
            return Vec::new();
        }
        let mut points: Vec<i64> = std::iter::once(valid_from)
            .chain(
                self.breakpoints
                    .range((valid_from + 1)..valid_to)
                    .map(|(k, _)| *k),
            )
            .collect();
        points.push(valid_to);

        points
            .windows(2)
            .filter(|w| w[0] < w[1])
            .map(|w| (w[0], w[1], self.value_at(w[0])))
            .collect()
    }

    /// Overwrites `[valid_from, valid_to)` to `system_from`, preserving whatever value
    /// held beyond `valid_to` so later (older, smaller-system_from) events still see it.
    pub fn set(&mut self, valid_from: i64, valid_to: i64, system_from: i64) {
        if valid_from >= valid_to {
            return;
        }
        let after = self.value_at(valid_to);
        let stale: Vec<i64> = self
            .breakpoints
            .range(valid_from..=valid_to)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            self.breakpoints.remove(&key);
        }
        self.breakpoints.insert(valid_from, Some(system_from));
        self.breakpoints.insert(valid_to, after);
    }
}

impl Default for Ceiling {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the per-entity state machine described in §4.D over a stream of events already
/// ordered `(iid asc, system_from desc)`.
pub struct PolygonEngine {
    ceiling: Ceiling,
    current_iid: Option<Iid>,
    skip_iid: Option<Iid>,
}

impl PolygonEngine {
    pub fn new() -> Self {
        Self {
            ceiling: Ceiling::new(),
            current_iid: None,
            skip_iid: None,
        }
    }

    /// Feed the next event. `system_range` is the query's `[lo, hi)` bound on
    /// `system_from` (§4.I); events outside it are treated as not having happened yet and
    /// never touch the ceiling, so an as-of query before an erase still sees prior state
    /// (testable property 4).
    pub fn process(&mut self, event: &Event, system_range: (i64, i64)) -> Vec<Polygon> {
        if self.current_iid != Some(event.iid) {
            self.ceiling = Ceiling::new();
            self.skip_iid = None;
            self.current_iid = Some(event.iid);
        }

        if self.skip_iid == Some(event.iid) {
            return Vec::new();
        }

        let (lo, hi) = system_range;
        if event.system_from < lo || event.system_from >= hi {
            return Vec::new();
        }

        if event.is_erase() {
            self.ceiling = Ceiling::new();
            self.skip_iid = Some(event.iid);
            return Vec::new();
        }

        let (valid_from, valid_to) = match event.valid_range() {
            Some((vf, Some(vt))) => (vf, vt),
            Some((vf, None)) => (vf, i64::MAX),
            None => return Vec::new(),
        };

        let pieces = self.ceiling.query(valid_from, valid_to);
        self.ceiling.set(valid_from, valid_to, event.system_from);

        match &event.op {
            Op::Put { .. } => pieces
                .into_iter()
                .map(|(vf, vt, system_to)| Polygon {
                    valid_from: vf,
                    valid_to: vt,
                    system_from: event.system_from,
                    system_to,
                })
                .collect(),
            Op::Delete { .. } => Vec::new(),
            Op::Erase => unreachable!("handled above"),
        }
    }
}

impl Default for PolygonEngine {
    fn default() -> Self {
        Self::new()
    }
}
