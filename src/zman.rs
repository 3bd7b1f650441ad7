//! The zman enumeration and the period transition table.
//!
//! A "zman" is a named instant within the halachic day (sunrise, chatzot,
//! etc.). The conceptual period beginning at a marker carries that marker's
//! name. Entering a period applies an *overlay* to the switch set: an explicit
//! subset is forced on, another explicit subset forced off, and every switch
//! not named keeps its prior state. Several conceptually related switches
//! (e.g. `sofZmanShma`/`sofZmanTfilla`) therefore stay lit across multiple
//! consecutive periods.
//!
//! The declaration order of [`Zman`] is the chronological order of the markers
//! within one day and is load-bearing: the resolver scans it in order, and
//! ordered maps keyed by `Zman` iterate in it.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The 13 daily time markers, in chronological enumeration order.
///
/// Serde names are the canonical camelCase marker names used by the zmanim
/// provider and the persistence files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Zman {
    ChatzotNight,
    Misheyakir,
    Dawn,
    Sunrise,
    SofZmanShma,
    SofZmanTfilla,
    Chatzot,
    MinchaGedola,
    MinchaKetana,
    PlagHaMincha,
    Sunset,
    BeinHaShmashos,
    Tzeit85deg,
}

impl Zman {
    /// Every marker, in chronological enumeration order.
    pub const ALL: [Zman; 13] = [
        Zman::ChatzotNight,
        Zman::Misheyakir,
        Zman::Dawn,
        Zman::Sunrise,
        Zman::SofZmanShma,
        Zman::SofZmanTfilla,
        Zman::Chatzot,
        Zman::MinchaGedola,
        Zman::MinchaKetana,
        Zman::PlagHaMincha,
        Zman::Sunset,
        Zman::BeinHaShmashos,
        Zman::Tzeit85deg,
    ];

    /// The canonical camelCase marker name.
    pub fn key(self) -> &'static str {
        match self {
            Zman::ChatzotNight => "chatzotNight",
            Zman::Misheyakir => "misheyakir",
            Zman::Dawn => "dawn",
            Zman::Sunrise => "sunrise",
            Zman::SofZmanShma => "sofZmanShma",
            Zman::SofZmanTfilla => "sofZmanTfilla",
            Zman::Chatzot => "chatzot",
            Zman::MinchaGedola => "minchaGedola",
            Zman::MinchaKetana => "minchaKetana",
            Zman::PlagHaMincha => "plagHaMincha",
            Zman::Sunset => "sunset",
            Zman::BeinHaShmashos => "beinHaShmashos",
            Zman::Tzeit85deg => "tzeit85deg",
        }
    }

    /// Parse a canonical marker name. Unknown names yield `None`; the provider
    /// response carries many fields beyond the 13 we drive.
    pub fn from_key(key: &str) -> Option<Zman> {
        Zman::ALL.into_iter().find(|z| z.key() == key)
    }

    /// The switch overlay applied when this marker's period becomes active.
    pub const fn transition(self) -> Transition {
        use Zman::*;
        match self {
            ChatzotNight => Transition::new(&[ChatzotNight], &[]),
            Misheyakir => Transition::new(&[Misheyakir, SofZmanShma, SofZmanTfilla], &[]),
            Dawn => Transition::new(&[Dawn, SofZmanShma, SofZmanTfilla], &[Misheyakir]),
            Sunrise => Transition::new(&[Sunrise, SofZmanShma, SofZmanTfilla], &[Dawn]),
            SofZmanShma => Transition::new(&[Sunrise, SofZmanTfilla], &[SofZmanShma]),
            SofZmanTfilla => Transition::new(&[Sunrise], &[SofZmanShma, SofZmanTfilla]),
            Chatzot => Transition::new(&[Chatzot], &[Sunrise]),
            MinchaGedola => Transition::new(&[MinchaGedola, Chatzot], &[]),
            MinchaKetana => Transition::new(&[MinchaKetana, Chatzot], &[MinchaGedola]),
            PlagHaMincha => Transition::new(&[PlagHaMincha], &[Chatzot, MinchaKetana]),
            Sunset => Transition::new(&[Sunset], &[PlagHaMincha]),
            BeinHaShmashos => Transition::new(&[BeinHaShmashos], &[Sunrise]),
            Tzeit85deg => Transition::new(&[Tzeit85deg], &[BeinHaShmashos]),
        }
    }
}

impl std::fmt::Display for Zman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A period's switch overlay: the subsets forced on and forced off.
///
/// This is an overlay, not a full-state replacement: switches in neither set
/// keep whatever state they already had. The two sets of a single entry never
/// intersect, so application order between them does not matter.
#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub turn_on: &'static [Zman],
    pub turn_off: &'static [Zman],
}

impl Transition {
    pub const EMPTY: Transition = Transition::new(&[], &[]);

    const fn new(turn_on: &'static [Zman], turn_off: &'static [Zman]) -> Self {
        Self { turn_on, turn_off }
    }
}

/// One calendar day's marker timestamps.
///
/// Timestamps are expected to be non-decreasing in enumeration order, but the
/// resolver tolerates violations by construction (it keeps the last qualifying
/// member of the enumeration, not the greatest timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSet {
    pub date: NaiveDate,
    pub times: BTreeMap<Zman, DateTime<Utc>>,
}

impl MarkerSet {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            times: BTreeMap::new(),
        }
    }
}

/// The sole authoritative "current state" record: which period is active (or
/// none) and when that was last decided.
///
/// Persisted as JSON `{"label": ..., "time": ...}`, the historical shape of
/// the recent-time record. A `null` label means no marker has passed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePeriod {
    pub label: Option<Zman>,
    #[serde(rename = "time")]
    pub evaluated_at: DateTime<Utc>,
}

impl ActivePeriod {
    /// The "no marker has passed" record.
    pub fn none(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            label: None,
            evaluated_at,
        }
    }

    /// The overlay this period applies; "none" applies the empty overlay.
    pub fn transition(&self) -> Transition {
        match self.label {
            Some(zman) => zman.transition(),
            None => Transition::EMPTY,
        }
    }
}
