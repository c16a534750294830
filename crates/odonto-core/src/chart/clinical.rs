//! Clinical values derived from raw periodontal readings.

use serde::{Deserialize, Serialize};

use crate::models::{PeriodontalChart, SiteValues, Surface, SurfaceMeasurements};

/// Probing depths above this many millimeters are pathological pockets.
pub const POCKET_THRESHOLD_MM: i32 = 3;

/// Upper bound of the "mild" severity band.
const MILD_MAX_MM: i32 = 5;
/// Upper bound of the "moderate" severity band.
const MODERATE_MAX_MM: i32 = 7;

pub fn is_pathological_pocket(probing_depth: i32) -> bool {
    probing_depth > POCKET_THRESHOLD_MM
}

/// Clinical attachment level: probing depth minus gingival margin.
///
/// Applied uniformly regardless of the margin's sign.
pub fn clinical_attachment_level(margin: i32, probing_depth: i32) -> i32 {
    probing_depth - margin
}

/// CAL for the three sites of a surface.
pub fn attachment_levels(surface: &SurfaceMeasurements) -> SiteValues<i32> {
    SiteValues {
        mesial: clinical_attachment_level(surface.margin.mesial, surface.probing_depth.mesial),
        central: clinical_attachment_level(surface.margin.central, surface.probing_depth.central),
        distal: clinical_attachment_level(surface.margin.distal, surface.probing_depth.distal),
    }
}

/// Display band for a probing depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PocketSeverity {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl PocketSeverity {
    pub fn from_depth(probing_depth: i32) -> Self {
        if probing_depth <= POCKET_THRESHOLD_MM {
            PocketSeverity::Normal
        } else if probing_depth <= MILD_MAX_MM {
            PocketSeverity::Mild
        } else if probing_depth <= MODERATE_MAX_MM {
            PocketSeverity::Moderate
        } else {
            PocketSeverity::Severe
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            PocketSeverity::Normal => "#22c55e",
            PocketSeverity::Mild => "#eab308",
            PocketSeverity::Moderate => "#f97316",
            PocketSeverity::Severe => "#ef4444",
        }
    }
}

/// Whole-mouth site counts. Absent teeth are skipped entirely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStatistics {
    pub total_sites: u32,
    pub bleeding_sites: u32,
    pub plaque_sites: u32,
    pub pocket_sites: u32,
}

impl SiteStatistics {
    pub fn from_chart(chart: &PeriodontalChart) -> Self {
        let mut stats = SiteStatistics::default();
        for (_, record) in chart.teeth().filter(|(_, r)| !r.absent) {
            for surface in Surface::ALL {
                let measurements = record.surface(surface);
                for site in crate::models::Site::ALL {
                    let reading = measurements.site(site);
                    stats.total_sites += 1;
                    stats.bleeding_sites += u32::from(reading.bleeding);
                    stats.plaque_sites += u32::from(reading.plaque);
                    stats.pocket_sites += u32::from(is_pathological_pocket(reading.probing_depth));
                }
            }
        }
        stats
    }

    fn percent(&self, count: u32) -> f64 {
        if self.total_sites == 0 {
            return 0.0;
        }
        f64::from(count) / f64::from(self.total_sites) * 100.0
    }

    pub fn bleeding_percent(&self) -> f64 {
        self.percent(self.bleeding_sites)
    }

    pub fn plaque_percent(&self) -> f64 {
        self.percent(self.plaque_sites)
    }

    pub fn pocket_percent(&self) -> f64 {
        self.percent(self.pocket_sites)
    }

    /// Percentages rounded to whole numbers: (bleeding, plaque, pocket).
    pub fn rounded_percentages(&self) -> (u32, u32, u32) {
        (
            self.bleeding_percent().round() as u32,
            self.plaque_percent().round() as u32,
            self.pocket_percent().round() as u32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Measurement, Site, ToothNumber};

    fn tooth(n: u8) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    #[test]
    fn test_pocket_threshold_boundary() {
        assert!(!is_pathological_pocket(3));
        assert!(is_pathological_pocket(4));
        assert!(!is_pathological_pocket(0));
    }

    #[test]
    fn test_cal_formula() {
        // Recession
        assert_eq!(clinical_attachment_level(-2, 3), 5);
        // Hyperplasia
        assert_eq!(clinical_attachment_level(2, 5), 3);
        assert_eq!(clinical_attachment_level(0, 4), 4);
    }

    #[test]
    fn test_attachment_levels_per_site() {
        let mut surface = SurfaceMeasurements::default();
        surface.margin.set(Site::Mesial, -1);
        surface.probing_depth.set(Site::Mesial, 4);
        surface.probing_depth.set(Site::Distal, 2);

        let cal = attachment_levels(&surface);
        assert_eq!(cal.to_array(), [5, 0, 2]);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(PocketSeverity::from_depth(3), PocketSeverity::Normal);
        assert_eq!(PocketSeverity::from_depth(5), PocketSeverity::Mild);
        assert_eq!(PocketSeverity::from_depth(7), PocketSeverity::Moderate);
        assert_eq!(PocketSeverity::from_depth(8), PocketSeverity::Severe);
    }

    #[test]
    fn test_statistics_empty_chart() {
        let stats = SiteStatistics::from_chart(&PeriodontalChart::new());
        assert_eq!(stats.total_sites, 32 * 6);
        assert_eq!(stats.bleeding_percent(), 0.0);
    }

    #[test]
    fn test_statistics_skip_absent_teeth() {
        let mut chart = PeriodontalChart::new();
        let t18 = tooth(18);
        for surface in Surface::ALL {
            for site in Site::ALL {
                chart.set(t18, surface, site, Measurement::Bleeding(true));
            }
        }
        chart.set_absent(t18, true);
        chart.set(tooth(11), Surface::Vestibular, Site::Central, Measurement::Bleeding(true));

        let stats = SiteStatistics::from_chart(&chart);
        assert_eq!(stats.total_sites, 31 * 6);
        assert_eq!(stats.bleeding_sites, 1);
    }

    #[test]
    fn test_statistics_all_sites_zero_total() {
        let mut chart = PeriodontalChart::new();
        let teeth: Vec<_> = ToothNumber::all().collect();
        for t in teeth {
            chart.set_absent(t, true);
        }
        let stats = SiteStatistics::from_chart(&chart);
        assert_eq!(stats.total_sites, 0);
        assert_eq!(stats.rounded_percentages(), (0, 0, 0));
    }

    #[test]
    fn test_rounded_percentages() {
        let mut chart = PeriodontalChart::new();
        // 3 of 192 sites = 1.5625% -> 2
        for site in Site::ALL {
            chart.set(tooth(36), Surface::Lingual, site, Measurement::ProbingDepth(5));
        }
        let stats = SiteStatistics::from_chart(&chart);
        assert_eq!(stats.pocket_sites, 3);
        assert_eq!(stats.rounded_percentages().2, 2);
    }
}
