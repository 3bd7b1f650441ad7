//! Pure resolution of the currently active period.
//!
//! Given "now" and one day's marker timestamps, decide which named period we
//! are in. This is a linear scan of the enumeration in chronological order,
//! not a nearest-timestamp search: the winner is the *last enumeration member*
//! whose marker is at or before now. Two consequences fall out of that:
//!
//! - ties (two markers at the identical instant) resolve to the later member,
//! - an unsorted MarkerSet cannot crash or confuse the scan; sortedness is an
//!   upstream invariant we tolerate being broken.
//!
//! The function is pure and deterministic given its two inputs, so it is unit
//! tested without a clock or store.

use chrono::{DateTime, Utc};

use crate::zman::{ActivePeriod, MarkerSet};

/// Resolve the active period at `now` from a day's markers.
///
/// Returns the "none" period when `now` precedes every marker of the day.
pub fn resolve(markers: &MarkerSet, now: DateTime<Utc>) -> ActivePeriod {
    let mut label = None;
    // BTreeMap keyed by Zman iterates in enumeration order.
    for (&zman, &at) in &markers.times {
        if at <= now {
            label = Some(zman);
        }
    }
    ActivePeriod {
        label,
        evaluated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zman::Zman;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, hour, min, 0).unwrap()
    }

    fn markers(entries: &[(Zman, DateTime<Utc>)]) -> MarkerSet {
        let mut set = MarkerSet::new("2024-03-05".parse().unwrap());
        for &(zman, time) in entries {
            set.times.insert(zman, time);
        }
        set
    }

    #[test]
    fn resolves_most_recently_passed_marker() {
        let set = markers(&[
            (Zman::Sunrise, at(6, 0)),
            (Zman::Chatzot, at(12, 0)),
            (Zman::MinchaGedola, at(12, 30)),
        ]);
        assert_eq!(resolve(&set, at(12, 15)).label, Some(Zman::Chatzot));
    }

    #[test]
    fn marker_boundary_is_inclusive() {
        let set = markers(&[(Zman::Sunrise, at(6, 0)), (Zman::Chatzot, at(12, 0))]);
        assert_eq!(resolve(&set, at(12, 0)).label, Some(Zman::Chatzot));
    }

    #[test]
    fn before_first_marker_resolves_to_none() {
        let set = markers(&[(Zman::Sunrise, at(6, 0)), (Zman::Chatzot, at(12, 0))]);
        assert_eq!(resolve(&set, at(4, 30)).label, None);
    }

    #[test]
    fn empty_marker_set_resolves_to_none() {
        let set = MarkerSet::new("2024-03-05".parse().unwrap());
        assert_eq!(resolve(&set, at(12, 0)).label, None);
    }

    #[test]
    fn ties_resolve_to_later_enumeration_member() {
        let set = markers(&[
            (Zman::SofZmanShma, at(9, 0)),
            (Zman::SofZmanTfilla, at(9, 0)),
        ]);
        assert_eq!(resolve(&set, at(9, 0)).label, Some(Zman::SofZmanTfilla));
    }

    #[test]
    fn tolerates_unsorted_timestamps() {
        // Chatzot reported *earlier* than sunrise. The scan still keeps the
        // last qualifying enumeration member, so chatzot wins after both have
        // passed even though its timestamp is smaller.
        let set = markers(&[(Zman::Sunrise, at(8, 0)), (Zman::Chatzot, at(7, 0))]);
        assert_eq!(resolve(&set, at(9, 0)).label, Some(Zman::Chatzot));
        // Between the two out-of-order instants only chatzot has passed.
        assert_eq!(resolve(&set, at(7, 30)).label, Some(Zman::Chatzot));
    }

    #[test]
    fn resolution_is_deterministic() {
        let set = markers(&[
            (Zman::Sunrise, at(6, 0)),
            (Zman::Sunset, at(18, 0)),
            (Zman::Tzeit85deg, at(18, 45)),
        ]);
        let now = at(19, 0);
        let first = resolve(&set, now);
        let second = resolve(&set, now);
        assert_eq!(first, second);
        assert_eq!(first.label, Some(Zman::Tzeit85deg));
        assert_eq!(first.evaluated_at, now);
    }

    #[test]
    fn full_day_walkthrough() {
        let entries: Vec<(Zman, DateTime<Utc>)> = Zman::ALL
            .into_iter()
            .enumerate()
            .map(|(i, z)| (z, at(i as u32 + 1, 0)))
            .collect();
        let set = markers(&entries);

        // Half past each marker's hour we should still be in its period.
        for (i, zman) in Zman::ALL.into_iter().enumerate() {
            let resolved = resolve(&set, at(i as u32 + 1, 30));
            assert_eq!(resolved.label, Some(zman));
        }
        // After the last marker, the last period holds for the rest of the day.
        assert_eq!(resolve(&set, at(23, 59)).label, Some(Zman::Tzeit85deg));
    }
}
