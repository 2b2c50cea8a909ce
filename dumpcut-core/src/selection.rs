//! Revision selections
//!
//! A selection is a comma-separated list of revisions or `lo:hi` ranges,
//! e.g. `0:10,15,20:HEAD`. Lower bounds must not decrease from one item
//! to the next; the dump driver relies on that to stop reading as soon as
//! it passes the last upper bound.

use crate::error::{CutterError, Result};
use std::fmt;
use std::str::FromStr;

/// Upper bound meaning "no limit".
pub const HEAD: u64 = u64::MAX;

/// Union of closed revision intervals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    intervals: Vec<(u64, u64)>,
}

impl Selection {
    /// `0:HEAD`, every revision.
    pub fn all() -> Self {
        Self {
            intervals: vec![(0, HEAD)],
        }
    }

    /// Build the most compact selection covering a set of revisions.
    pub fn from_revisions<I: IntoIterator<Item = u64>>(revisions: I) -> Self {
        let mut revs: Vec<u64> = revisions.into_iter().collect();
        revs.sort_unstable();
        revs.dedup();
        let mut intervals: Vec<(u64, u64)> = Vec::new();
        for rev in revs {
            match intervals.last_mut() {
                Some((_, hi)) if hi.checked_add(1) == Some(rev) => *hi = rev,
                _ => intervals.push((rev, rev)),
            }
        }
        Self { intervals }
    }

    /// Does the selection include `rev`?
    pub fn contains(&self, rev: u64) -> bool {
        self.intervals
            .iter()
            .any(|&(lo, hi)| rev >= lo && rev <= hi)
    }

    /// Upper bound of the last interval. Nothing past it can match.
    pub fn upper_bound(&self) -> u64 {
        self.intervals.last().map(|&(_, hi)| hi).unwrap_or(0)
    }

    /// Lower bound of the first interval.
    pub fn lower_bound(&self) -> u64 {
        self.intervals.first().map(|&(lo, _)| lo).unwrap_or(0)
    }

    pub fn intervals(&self) -> &[(u64, u64)] {
        &self.intervals
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::all()
    }
}

impl FromStr for Selection {
    type Err = CutterError;

    fn from_str(spec: &str) -> Result<Self> {
        let fail = |reason: String| CutterError::Selection {
            spec: spec.to_string(),
            reason,
        };
        let number = |text: &str| {
            text.trim()
                .parse::<u64>()
                .map_err(|_| fail(format!("'{}' is not a revision number", text)))
        };

        let mut intervals = Vec::new();
        let mut floor = 0u64;
        for item in spec.split(',') {
            let (lo, hi) = match item.split_once(':') {
                Some((lo, hi)) => {
                    if lo.trim() == "HEAD" {
                        return Err(fail("HEAD can't be a lower bound".into()));
                    }
                    let hi = if hi.trim() == "HEAD" { HEAD } else { number(hi)? };
                    (number(lo)?, hi)
                }
                None if item.trim() == "HEAD" => {
                    return Err(fail("HEAD can't be a lower bound".into()));
                }
                None => {
                    let rev = number(item)?;
                    (rev, rev)
                }
            };
            if lo > hi {
                return Err(fail(format!("range {}:{} runs backwards", lo, hi)));
            }
            if lo < floor {
                return Err(fail(format!(
                    "lower bound {} is below the previous one ({})",
                    lo, floor
                )));
            }
            floor = lo;
            intervals.push((lo, hi));
        }
        Ok(Self { intervals })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, &(lo, hi)) in self.intervals.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match (lo, hi) {
                (lo, HEAD) => write!(f, "{}:HEAD", lo)?,
                (lo, hi) if lo == hi => write!(f, "{}", lo)?,
                (lo, hi) => write!(f, "{}:{}", lo, hi)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_range_semantics() {
        let sel: Selection = "5:10,15".parse().unwrap();
        for rev in 5..=10 {
            assert!(sel.contains(rev), "r{} should be selected", rev);
        }
        assert!(sel.contains(15));
        for rev in [4, 11, 12, 13, 14, 16] {
            assert!(!sel.contains(rev), "r{} should not be selected", rev);
        }
        assert_eq!(sel.upper_bound(), 15);
        assert_eq!(sel.lower_bound(), 5);
    }

    #[test]
    fn test_lower_bounds_must_not_decrease() {
        assert!("3,1".parse::<Selection>().is_err());
        assert!("1,3".parse::<Selection>().is_ok());
        assert!("2:5,2".parse::<Selection>().is_ok());
    }

    #[test]
    fn test_head() {
        let sel: Selection = "7:HEAD".parse().unwrap();
        assert!(sel.contains(7));
        assert!(sel.contains(1_000_000));
        assert!(!sel.contains(6));
        assert_eq!(sel.upper_bound(), HEAD);
        assert!("HEAD:7".parse::<Selection>().is_err());
        assert!("HEAD".parse::<Selection>().is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<Selection>().is_err());
        assert!("a:b".parse::<Selection>().is_err());
        assert!("9:3".parse::<Selection>().is_err());
        assert!(matches!(
            "4,x".parse::<Selection>(),
            Err(CutterError::Selection { .. })
        ));
    }

    #[test]
    fn test_all() {
        let sel = Selection::all();
        assert!(sel.contains(0));
        assert!(sel.contains(HEAD));
        assert_eq!(sel.to_string(), "0:HEAD");
    }

    #[test]
    fn test_from_revisions_compacts_runs() {
        let sel = Selection::from_revisions([9, 0, 1, 2, 2, 5, 10, 11]);
        assert_eq!(sel.to_string(), "0:2,5,9:11");
        assert_eq!(sel.to_string().parse::<Selection>().unwrap(), sel);
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(revs in proptest::collection::vec(0u64..500, 1..40)) {
            let sel = Selection::from_revisions(revs.clone());
            let reparsed: Selection = sel.to_string().parse().unwrap();
            prop_assert_eq!(&reparsed, &sel);
            for rev in 0..510u64 {
                prop_assert_eq!(sel.contains(rev), revs.contains(&rev));
            }
        }
    }
}
