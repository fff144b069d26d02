//! Temporal bounds parsing (spec §4.I): turns a query's `AT` / `IN` / `BETWEEN` / `ALL
//! TIME` clauses — on either the system-time or valid-time axis — into the half-open
//! `[lo, hi)` windows the polygon engine (§4.D) and scan cursor (§4.G) consume directly.

use crate::engine::errors::CoreError;
use crate::shared::time::{TimeKind, TimeParser};
use serde::{Deserialize, Serialize};

/// One temporal clause, generic over which axis (system-time or valid-time) it binds —
/// the grammar is identical on both per SPEC_FULL.md §4.I.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TimeClause {
    At(String),
    In(Option<String>, Option<String>),
    Between(Option<String>, Option<String>),
    AllTime,
}

/// The resolved `[lo, hi)` windows a query's merge-planner/scan pass runs against.
///
/// `system_range` is always the *processing gate*: the polygon engine (§4.D) needs to see
/// every event up to the query's upper system-time bound to correctly compute which
/// slices have been superseded, even for a single-instant query whose requested window is
/// far narrower — an old, never-superseded put must still surface when queried `AS OF` a
/// much later instant. `system_point`, when set, additionally names the single instant a
/// point-style clause (an explicit `AT`, or no clause at all, which defaults to `AS OF`
/// the transaction basis) wants the *current* row as of; the scan cursor (§4.G) uses it to
/// drop polygon pieces that were already superseded before that instant. Window-style
/// clauses (`IN`, `BETWEEN`, `ALL TIME`) leave it `None`: every polygon piece whose
/// `system_from` falls in `system_range` is a valid answer, not just the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalBounds {
    pub system_range: (i64, i64),
    pub system_point: Option<i64>,
    pub valid_range: (i64, i64),
}

impl TemporalBounds {
    /// `basis_system_time` is the transaction basis the query is pinned to (§3); `now` is
    /// the wall-clock instant the query started, used for the valid-time default unless
    /// `default_all_valid_time` asks for the unrestricted range instead.
    pub fn resolve(
        system_clause: Option<&TimeClause>,
        valid_clause: Option<&TimeClause>,
        basis_system_time: i64,
        now: i64,
        default_all_valid_time: bool,
    ) -> Result<Self, CoreError> {
        let (system_range, system_point) = match system_clause {
            Some(TimeClause::At(instant)) => {
                let t = parse_instant(instant)?;
                ((i64::MIN, t.saturating_add(1)), Some(t))
            }
            Some(clause @ (TimeClause::In(..) | TimeClause::Between(..) | TimeClause::AllTime)) => {
                (resolve_clause(clause, i64::MIN, basis_system_time + 1)?, None)
            }
            None => (
                (i64::MIN, basis_system_time.saturating_add(1)),
                Some(basis_system_time),
            ),
        };

        let valid_range = match valid_clause {
            Some(clause) => resolve_clause(clause, i64::MIN, i64::MAX)?,
            None if default_all_valid_time => (i64::MIN, i64::MAX),
            None => (now, now.saturating_add(1)),
        };

        if system_range.0 >= system_range.1 {
            return Err(CoreError::InvalidArgument(
                "system-time clause resolves to an empty range".into(),
            ));
        }
        if valid_range.0 >= valid_range.1 {
            return Err(CoreError::InvalidArgument(
                "valid-time clause resolves to an empty range".into(),
            ));
        }

        Ok(Self {
            system_range,
            system_point,
            valid_range,
        })
    }
}

fn resolve_clause(
    clause: &TimeClause,
    default_lo: i64,
    default_hi: i64,
) -> Result<(i64, i64), CoreError> {
    match clause {
        TimeClause::At(instant) => {
            let t = parse_instant(instant)?;
            Ok((t, t.saturating_add(1)))
        }
        TimeClause::In(from, to) => {
            let lo = from.as_deref().map(parse_instant).transpose()?.unwrap_or(default_lo);
            let hi = to.as_deref().map(parse_instant).transpose()?.unwrap_or(default_hi);
            Ok((lo, hi))
        }
        TimeClause::Between(from, to) => {
            let lo = from.as_deref().map(parse_instant).transpose()?.unwrap_or(default_lo);
            let hi = match to.as_deref().map(parse_instant).transpose()? {
                Some(t) => t.saturating_add(1),
                None => default_hi,
            };
            Ok((lo, hi))
        }
        TimeClause::AllTime => Ok((i64::MIN, i64::MAX)),
    }
}

fn parse_instant(raw: &str) -> Result<i64, CoreError> {
    TimeParser::parse_str_to_epoch_micros(raw, TimeKind::DateTime)
        .ok_or_else(|| CoreError::InvalidArgument(format!("unparseable temporal literal: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_basis_system_time_and_now_valid_time() {
        let bounds = TemporalBounds::resolve(None, None, 1_000, 2_000, false).unwrap();
        assert_eq!(bounds.system_range, (i64::MIN, 1_001));
        assert_eq!(bounds.system_point, Some(1_000));
        assert_eq!(bounds.valid_range, (2_000, 2_001));
    }

    #[test]
    fn at_clause_on_system_axis_widens_gate_but_keeps_the_point() {
        let bounds = TemporalBounds::resolve(
            Some(&TimeClause::At("1970-01-01T00:00:00.000005Z".into())),
            None,
            1_000,
            2_000,
            false,
        )
        .unwrap();
        assert_eq!(bounds.system_range, (i64::MIN, 6));
        assert_eq!(bounds.system_point, Some(5));
    }

    #[test]
    fn in_clause_on_system_axis_has_no_point() {
        let bounds = TemporalBounds::resolve(
            Some(&TimeClause::In(Some("100".into()), None)),
            None,
            1_000,
            2_000,
            false,
        )
        .unwrap();
        assert_eq!(bounds.system_point, None);
    }

    #[test]
    fn default_all_valid_time_widens_valid_range() {
        let bounds = TemporalBounds::resolve(None, None, 1_000, 2_000, true).unwrap();
        assert_eq!(bounds.valid_range, (i64::MIN, i64::MAX));
    }

    #[test]
    fn all_time_clause_widens_either_axis() {
        let bounds = TemporalBounds::resolve(
            Some(&TimeClause::AllTime),
            Some(&TimeClause::AllTime),
            1_000,
            2_000,
            false,
        )
        .unwrap();
        assert_eq!(bounds.system_range, (i64::MIN, i64::MAX));
        assert_eq!(bounds.valid_range, (i64::MIN, i64::MAX));
    }

    #[test]
    fn at_clause_parses_rfc3339_instant() {
        let bounds = TemporalBounds::resolve(
            None,
            Some(&TimeClause::At("1970-01-01T00:00:00.000005Z".into())),
            1_000,
            2_000,
            false,
        )
        .unwrap();
        assert_eq!(bounds.valid_range, (5, 6));
    }

    #[test]
    fn between_is_end_inclusive_in_is_end_exclusive() {
        let between = resolve_clause(&TimeClause::Between(Some("100".into()), Some("200".into())), 0, 0).unwrap();
        assert_eq!(between, (100_000_000, 200_000_001));

        let inn = resolve_clause(&TimeClause::In(Some("100".into()), Some("200".into())), 0, 0).unwrap();
        assert_eq!(inn, (100_000_000, 200_000_000));
    }

    #[test]
    fn invalid_literal_is_rejected() {
        let err = TemporalBounds::resolve(
            Some(&TimeClause::At("not-a-time".into())),
            None,
            0,
            0,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }
}
