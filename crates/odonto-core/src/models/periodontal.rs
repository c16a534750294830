//! Periodontal measurement model.
//!
//! A chart always holds all 32 permanent teeth, each with both surfaces and
//! all three probing sites. Unmeasured sites read as zero/false; there is no
//! separate "missing" state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tooth::{Site, Surface, ToothNumber};

/// Default gingival margin bounds in mm (negative = recession).
pub const MARGIN_MIN: i32 = -10;
pub const MARGIN_MAX: i32 = 10;
/// Default probing depth bounds in mm.
pub const PROBING_DEPTH_MIN: i32 = 0;
pub const PROBING_DEPTH_MAX: i32 = 15;
/// Mobility and furcation grades run 0-3.
pub const GRADE_MAX: u8 = 3;

/// Inclusive integer range for a millimeter measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRange {
    pub min: i32,
    pub max: i32,
}

/// Direction for point-and-click cycling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Increment,
    Decrement,
}

impl MeasurementRange {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Clamp to the nearest bound.
    pub fn clamp(&self, value: i32) -> i32 {
        value.max(self.min).min(self.max)
    }

    /// Step by one, wrapping past either end.
    pub fn step(&self, value: i32, direction: StepDirection) -> i32 {
        let value = self.clamp(value);
        match direction {
            StepDirection::Increment if value >= self.max => self.min,
            StepDirection::Increment => value + 1,
            StepDirection::Decrement if value <= self.min => self.max,
            StepDirection::Decrement => value - 1,
        }
    }

    pub fn contains(&self, value: i32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Active bounds for margin and probing depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementLimits {
    pub margin: MeasurementRange,
    pub probing_depth: MeasurementRange,
}

impl Default for MeasurementLimits {
    fn default() -> Self {
        Self {
            margin: MeasurementRange::new(MARGIN_MIN, MARGIN_MAX),
            probing_depth: MeasurementRange::new(PROBING_DEPTH_MIN, PROBING_DEPTH_MAX),
        }
    }
}

/// One value per probing site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteValues<T> {
    pub mesial: T,
    pub central: T,
    pub distal: T,
}

impl<T: Copy> SiteValues<T> {
    pub fn get(&self, site: Site) -> T {
        match site {
            Site::Mesial => self.mesial,
            Site::Central => self.central,
            Site::Distal => self.distal,
        }
    }

    pub fn set(&mut self, site: Site, value: T) {
        match site {
            Site::Mesial => self.mesial = value,
            Site::Central => self.central = value,
            Site::Distal => self.distal = value,
        }
    }

    /// Values in mesial, central, distal order.
    pub fn to_array(&self) -> [T; 3] {
        [self.mesial, self.central, self.distal]
    }

    pub fn map<U>(&self, f: impl Fn(T) -> U) -> SiteValues<U> {
        SiteValues {
            mesial: f(self.mesial),
            central: f(self.central),
            distal: f(self.distal),
        }
    }
}

/// All readings for one surface of a tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceMeasurements {
    pub margin: SiteValues<i32>,
    pub probing_depth: SiteValues<i32>,
    pub bleeding: SiteValues<bool>,
    pub plaque: SiteValues<bool>,
}

/// Readings at a single site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteReading {
    pub margin: i32,
    pub probing_depth: i32,
    pub bleeding: bool,
    pub plaque: bool,
}

impl SurfaceMeasurements {
    pub fn site(&self, site: Site) -> SiteReading {
        SiteReading {
            margin: self.margin.get(site),
            probing_depth: self.probing_depth.get(site),
            bleeding: self.bleeding.get(site),
            plaque: self.plaque.get(site),
        }
    }

    fn clamp_to(&mut self, limits: &MeasurementLimits) {
        self.margin = self.margin.map(|v| limits.margin.clamp(v));
        self.probing_depth = self.probing_depth.map(|v| limits.probing_depth.clamp(v));
    }
}

/// Periodontal record of one tooth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToothRecord {
    pub vestibular: SurfaceMeasurements,
    pub lingual: SurfaceMeasurements,
    /// Mobility grade 0-3
    pub mobility: u8,
    /// Furcation grade 0-3
    pub furcation: u8,
    /// Tooth is missing; excluded from statistics and plotting
    pub absent: bool,
}

const EMPTY_TOOTH: ToothRecord = ToothRecord {
    vestibular: EMPTY_SURFACE,
    lingual: EMPTY_SURFACE,
    mobility: 0,
    furcation: 0,
    absent: false,
};

const EMPTY_SURFACE: SurfaceMeasurements = SurfaceMeasurements {
    margin: SiteValues { mesial: 0, central: 0, distal: 0 },
    probing_depth: SiteValues { mesial: 0, central: 0, distal: 0 },
    bleeding: SiteValues { mesial: false, central: false, distal: false },
    plaque: SiteValues { mesial: false, central: false, distal: false },
};

impl ToothRecord {
    pub fn surface(&self, surface: Surface) -> &SurfaceMeasurements {
        match surface {
            Surface::Vestibular => &self.vestibular,
            Surface::Lingual => &self.lingual,
        }
    }

    pub fn surface_mut(&mut self, surface: Surface) -> &mut SurfaceMeasurements {
        match surface {
            Surface::Vestibular => &mut self.vestibular,
            Surface::Lingual => &mut self.lingual,
        }
    }
}

/// Kind of periodontal reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementKind {
    Margin,
    ProbingDepth,
    Bleeding,
    Plaque,
}

/// A reading tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Measurement {
    Margin(i32),
    ProbingDepth(i32),
    Bleeding(bool),
    Plaque(bool),
}

impl Measurement {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Margin(_) => MeasurementKind::Margin,
            Measurement::ProbingDepth(_) => MeasurementKind::ProbingDepth,
            Measurement::Bleeding(_) => MeasurementKind::Bleeding,
            Measurement::Plaque(_) => MeasurementKind::Plaque,
        }
    }
}

/// Full-mouth periodontal chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodontalChart {
    #[serde(default)]
    teeth: BTreeMap<ToothNumber, ToothRecord>,
    #[serde(skip)]
    limits: MeasurementLimits,
    #[serde(skip)]
    modified: bool,
}

impl Default for PeriodontalChart {
    fn default() -> Self {
        Self::new()
    }
}

impl PeriodontalChart {
    /// Empty chart with default limits.
    pub fn new() -> Self {
        Self::with_limits(MeasurementLimits::default())
    }

    /// Empty chart with the given limits.
    pub fn with_limits(limits: MeasurementLimits) -> Self {
        Self {
            teeth: ToothNumber::all().map(|t| (t, ToothRecord::default())).collect(),
            limits,
            modified: false,
        }
    }

    /// Restore the full-mouth invariant after deserializing a stored blob:
    /// fills in missing teeth and re-clamps values to `limits`.
    pub fn normalized(mut self, limits: MeasurementLimits) -> Self {
        self.limits = limits;
        for tooth in ToothNumber::all() {
            self.teeth.entry(tooth).or_default();
        }
        for record in self.teeth.values_mut() {
            record.vestibular.clamp_to(&limits);
            record.lingual.clamp_to(&limits);
            record.mobility = record.mobility.min(GRADE_MAX);
            record.furcation = record.furcation.min(GRADE_MAX);
        }
        self.modified = false;
        self
    }

    pub fn limits(&self) -> &MeasurementLimits {
        &self.limits
    }

    /// Teeth in FDI numeric order.
    pub fn teeth(&self) -> impl Iterator<Item = (ToothNumber, &ToothRecord)> {
        self.teeth.iter().map(|(t, r)| (*t, r))
    }

    pub fn tooth(&self, tooth: ToothNumber) -> &ToothRecord {
        self.teeth.get(&tooth).unwrap_or(&EMPTY_TOOTH)
    }

    fn tooth_mut(&mut self, tooth: ToothNumber) -> &mut ToothRecord {
        self.modified = true;
        self.teeth.entry(tooth).or_default()
    }

    /// Read one value.
    pub fn value(
        &self,
        tooth: ToothNumber,
        surface: Surface,
        site: Site,
        kind: MeasurementKind,
    ) -> Measurement {
        let reading = self.tooth(tooth).surface(surface).site(site);
        match kind {
            MeasurementKind::Margin => Measurement::Margin(reading.margin),
            MeasurementKind::ProbingDepth => Measurement::ProbingDepth(reading.probing_depth),
            MeasurementKind::Bleeding => Measurement::Bleeding(reading.bleeding),
            MeasurementKind::Plaque => Measurement::Plaque(reading.plaque),
        }
    }

    /// Write one value, clamping millimeter readings. Returns the stored value.
    pub fn set(
        &mut self,
        tooth: ToothNumber,
        surface: Surface,
        site: Site,
        measurement: Measurement,
    ) -> Measurement {
        let limits = self.limits;
        let measurements = self.tooth_mut(tooth).surface_mut(surface);
        match measurement {
            Measurement::Margin(v) => {
                let v = limits.margin.clamp(v);
                measurements.margin.set(site, v);
                Measurement::Margin(v)
            }
            Measurement::ProbingDepth(v) => {
                let v = limits.probing_depth.clamp(v);
                measurements.probing_depth.set(site, v);
                Measurement::ProbingDepth(v)
            }
            Measurement::Bleeding(v) => {
                measurements.bleeding.set(site, v);
                Measurement::Bleeding(v)
            }
            Measurement::Plaque(v) => {
                measurements.plaque.set(site, v);
                Measurement::Plaque(v)
            }
        }
    }

    /// Cycle one value: millimeter readings wrap around their range,
    /// flags toggle.
    pub fn step(
        &mut self,
        tooth: ToothNumber,
        surface: Surface,
        site: Site,
        kind: MeasurementKind,
        direction: StepDirection,
    ) -> Measurement {
        let next = match self.value(tooth, surface, site, kind) {
            Measurement::Margin(v) => Measurement::Margin(self.limits.margin.step(v, direction)),
            Measurement::ProbingDepth(v) => {
                Measurement::ProbingDepth(self.limits.probing_depth.step(v, direction))
            }
            Measurement::Bleeding(v) => Measurement::Bleeding(!v),
            Measurement::Plaque(v) => Measurement::Plaque(!v),
        };
        self.set(tooth, surface, site, next)
    }

    pub fn toggle_bleeding(&mut self, tooth: ToothNumber, surface: Surface, site: Site) -> bool {
        let current = self.tooth(tooth).surface(surface).bleeding.get(site);
        self.set(tooth, surface, site, Measurement::Bleeding(!current));
        !current
    }

    pub fn toggle_plaque(&mut self, tooth: ToothNumber, surface: Surface, site: Site) -> bool {
        let current = self.tooth(tooth).surface(surface).plaque.get(site);
        self.set(tooth, surface, site, Measurement::Plaque(!current));
        !current
    }

    pub fn set_absent(&mut self, tooth: ToothNumber, absent: bool) {
        self.tooth_mut(tooth).absent = absent;
    }

    /// Flip the absent flag; returns the new state.
    pub fn toggle_absent(&mut self, tooth: ToothNumber) -> bool {
        let record = self.tooth_mut(tooth);
        record.absent = !record.absent;
        record.absent
    }

    /// Set mobility, clamped to 0-3.
    pub fn set_mobility(&mut self, tooth: ToothNumber, grade: i32) -> u8 {
        let grade = clamp_grade(grade);
        self.tooth_mut(tooth).mobility = grade;
        grade
    }

    /// Set furcation, clamped to 0-3.
    pub fn set_furcation(&mut self, tooth: ToothNumber, grade: i32) -> u8 {
        let grade = clamp_grade(grade);
        self.tooth_mut(tooth).furcation = grade;
        grade
    }

    /// True when the chart changed since it was created, loaded or saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }
}

fn clamp_grade(grade: i32) -> u8 {
    grade.clamp(0, GRADE_MAX as i32) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tooth(n: u8) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    #[test]
    fn test_new_chart_has_all_teeth_zeroed() {
        let chart = PeriodontalChart::new();
        assert_eq!(chart.teeth().count(), 32);
        for (_, record) in chart.teeth() {
            assert_eq!(*record, ToothRecord::default());
        }
        assert!(!chart.is_modified());
    }

    #[test]
    fn test_set_clamps_silently() {
        let mut chart = PeriodontalChart::new();
        let t = tooth(16);

        let stored = chart.set(t, Surface::Vestibular, Site::Mesial, Measurement::Margin(-25));
        assert_eq!(stored, Measurement::Margin(MARGIN_MIN));

        let stored = chart.set(t, Surface::Vestibular, Site::Mesial, Measurement::ProbingDepth(40));
        assert_eq!(stored, Measurement::ProbingDepth(PROBING_DEPTH_MAX));

        let stored = chart.set(t, Surface::Lingual, Site::Distal, Measurement::ProbingDepth(-2));
        assert_eq!(stored, Measurement::ProbingDepth(0));
    }

    #[test]
    fn test_mutation_marks_modified() {
        let mut chart = PeriodontalChart::new();
        chart.toggle_bleeding(tooth(11), Surface::Lingual, Site::Central);
        assert!(chart.is_modified());
        assert!(chart.tooth(tooth(11)).lingual.bleeding.central);

        chart.mark_saved();
        assert!(!chart.is_modified());
    }

    #[test]
    fn test_step_wraps_margin() {
        let mut chart = PeriodontalChart::new();
        let t = tooth(36);
        chart.set(t, Surface::Vestibular, Site::Central, Measurement::Margin(MARGIN_MAX));

        let next = chart.step(
            t,
            Surface::Vestibular,
            Site::Central,
            MeasurementKind::Margin,
            StepDirection::Increment,
        );
        assert_eq!(next, Measurement::Margin(MARGIN_MIN));

        let prev = chart.step(
            t,
            Surface::Vestibular,
            Site::Central,
            MeasurementKind::Margin,
            StepDirection::Decrement,
        );
        assert_eq!(prev, Measurement::Margin(MARGIN_MAX));
    }

    #[test]
    fn test_step_toggles_flags() {
        let mut chart = PeriodontalChart::new();
        let t = tooth(21);
        let next = chart.step(
            t,
            Surface::Lingual,
            Site::Mesial,
            MeasurementKind::Plaque,
            StepDirection::Increment,
        );
        assert_eq!(next, Measurement::Plaque(true));
    }

    #[test]
    fn test_grades_clamped() {
        let mut chart = PeriodontalChart::new();
        assert_eq!(chart.set_mobility(tooth(41), 7), 3);
        assert_eq!(chart.set_furcation(tooth(46), -1), 0);
        assert_eq!(chart.tooth(tooth(41)).mobility, 3);
    }

    #[test]
    fn test_toggle_absent() {
        let mut chart = PeriodontalChart::new();
        assert!(chart.toggle_absent(tooth(18)));
        assert!(chart.tooth(tooth(18)).absent);
        assert!(!chart.toggle_absent(tooth(18)));
    }

    #[test]
    fn test_normalize_fills_missing_teeth_and_reclamps() {
        let json = r#"{"teeth":{"16":{"vestibular":{"margin":{"mesial":-9}},"mobility":9}}}"#;
        let chart: PeriodontalChart = serde_json::from_str(json).unwrap();
        let limits = MeasurementLimits {
            margin: MeasurementRange::new(-5, 5),
            ..MeasurementLimits::default()
        };
        let chart = chart.normalized(limits);

        assert_eq!(chart.teeth().count(), 32);
        let record = chart.tooth(tooth(16));
        assert_eq!(record.vestibular.margin.mesial, -5);
        assert_eq!(record.mobility, 3);
        assert_eq!(chart.tooth(tooth(11)).lingual, SurfaceMeasurements::default());
    }

    #[test]
    fn test_chart_json_roundtrip_keeps_values() {
        let mut chart = PeriodontalChart::new();
        chart.set(tooth(26), Surface::Lingual, Site::Distal, Measurement::ProbingDepth(6));
        let json = serde_json::to_string(&chart).unwrap();
        let loaded: PeriodontalChart = serde_json::from_str(&json).unwrap();
        let loaded = loaded.normalized(MeasurementLimits::default());
        assert_eq!(
            loaded.value(tooth(26), Surface::Lingual, Site::Distal, MeasurementKind::ProbingDepth),
            Measurement::ProbingDepth(6)
        );
    }
}
