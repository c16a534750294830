//! Maps periodontal readings onto the 2-D chart drawn over each tooth.
//!
//! Each tooth cell has a dashed zero line. Maxillary teeth plot positive
//! values upward from it, mandibular teeth downward, so the sign of the
//! offset follows the arch. Margin and probing depth are both measured from
//! the zero line; probing depth is not stacked on the margin line.

use serde::{Deserialize, Serialize};

use crate::models::{
    Arch, MeasurementKind, PeriodontalChart, Site, Surface, ToothNumber,
};

use super::clinical::is_pathological_pocket;

/// Pixel layout of one tooth cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Pixels per millimeter
    pub scale_px_per_mm: f64,
    /// Cell width in pixels
    pub tooth_width: f64,
    /// Cell height in pixels
    pub chart_height: f64,
    /// Distance of the mesial/distal sites from the cell edges
    pub site_inset: f64,
    /// Zero line for upper teeth (near the roots)
    pub zero_line_maxillary: f64,
    /// Zero line for lower teeth (near the crowns)
    pub zero_line_mandibular: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            scale_px_per_mm: 4.0,
            tooth_width: 55.0,
            chart_height: 80.0,
            site_inset: 8.0,
            zero_line_maxillary: 65.0,
            zero_line_mandibular: 15.0,
        }
    }
}

/// How a plotted point is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointFill {
    Margin,
    ProbingDepth,
    PathologicalPocket,
}

impl PointFill {
    pub fn color(&self) -> &'static str {
        match self {
            PointFill::Margin => "#3b82f6",
            PointFill::ProbingDepth => "#ef4444",
            PointFill::PathologicalPocket => "#dc2626",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub site: Site,
    pub x: f64,
    pub y: f64,
    /// Reading in mm
    pub value: i32,
    pub fill: PointFill,
}

/// Three points joined mesial → central → distal by straight segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub kind: MeasurementKind,
    pub points: [PlotPoint; 3],
}

impl Series {
    /// SVG path data for the polyline.
    pub fn svg_path(&self) -> String {
        let [a, b, c] = self.points;
        format!("M {} {} L {} {} L {} {}", a.x, a.y, b.x, b.y, c.x, c.y)
    }
}

/// Both series for one surface of one tooth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfacePlot {
    pub tooth: ToothNumber,
    pub surface: Surface,
    pub zero_line_y: f64,
    pub margin: Series,
    pub probing_depth: Series,
}

/// Converts chart readings into plot coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChartGeometry {
    config: GeometryConfig,
}

impl ChartGeometry {
    pub fn new(config: GeometryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeometryConfig {
        &self.config
    }

    pub fn zero_line(&self, arch: Arch) -> f64 {
        match arch {
            Arch::Maxillary => self.config.zero_line_maxillary,
            Arch::Mandibular => self.config.zero_line_mandibular,
        }
    }

    /// Vertical pixel position of a reading.
    pub fn y_for(&self, value_mm: i32, arch: Arch) -> f64 {
        let offset = f64::from(value_mm) * self.config.scale_px_per_mm;
        match arch {
            Arch::Maxillary => self.zero_line(arch) - offset,
            Arch::Mandibular => self.zero_line(arch) + offset,
        }
    }

    /// Horizontal pixel position of a site.
    pub fn site_x(&self, site: Site) -> f64 {
        match site {
            Site::Mesial => self.config.site_inset,
            Site::Central => self.config.tooth_width / 2.0,
            Site::Distal => self.config.tooth_width - self.config.site_inset,
        }
    }

    /// Plot one surface. Absent teeth have no series.
    pub fn plot_surface(
        &self,
        chart: &PeriodontalChart,
        tooth: ToothNumber,
        surface: Surface,
    ) -> Option<SurfacePlot> {
        let record = chart.tooth(tooth);
        if record.absent {
            return None;
        }
        let arch = tooth.arch();
        let measurements = record.surface(surface);

        let point = |site: Site, value: i32, fill: PointFill| PlotPoint {
            site,
            x: self.site_x(site),
            y: self.y_for(value, arch),
            value,
            fill,
        };

        let margin = Site::ALL.map(|site| point(site, measurements.margin.get(site), PointFill::Margin));
        let probing_depth = Site::ALL.map(|site| {
            let depth = measurements.probing_depth.get(site);
            let fill = if is_pathological_pocket(depth) {
                PointFill::PathologicalPocket
            } else {
                PointFill::ProbingDepth
            };
            point(site, depth, fill)
        });

        Some(SurfacePlot {
            tooth,
            surface,
            zero_line_y: self.zero_line(arch),
            margin: Series {
                kind: MeasurementKind::Margin,
                points: margin,
            },
            probing_depth: Series {
                kind: MeasurementKind::ProbingDepth,
                points: probing_depth,
            },
        })
    }

    /// Plot every present tooth for a surface, in chart order.
    pub fn plot_chart(&self, chart: &PeriodontalChart, surface: Surface) -> Vec<SurfacePlot> {
        ToothNumber::all()
            .filter_map(|tooth| self.plot_surface(chart, tooth, surface))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;

    fn tooth(n: u8) -> ToothNumber {
        ToothNumber::new(n).unwrap()
    }

    #[test]
    fn test_sign_flip_by_arch() {
        let geometry = ChartGeometry::default();
        let up = geometry.y_for(3, Arch::Maxillary);
        let down = geometry.y_for(3, Arch::Mandibular);
        assert_eq!(up, 65.0 - 12.0);
        assert_eq!(down, 15.0 + 12.0);
        assert_eq!(geometry.zero_line(Arch::Maxillary) - up, down - geometry.zero_line(Arch::Mandibular));
    }

    #[test]
    fn test_site_positions() {
        let geometry = ChartGeometry::default();
        assert_eq!(geometry.site_x(Site::Mesial), 8.0);
        assert_eq!(geometry.site_x(Site::Central), 27.5);
        assert_eq!(geometry.site_x(Site::Distal), 47.0);
    }

    #[test]
    fn test_probing_depth_plotted_from_zero_line() {
        let mut chart = PeriodontalChart::new();
        let t = tooth(16);
        chart.set(t, Surface::Vestibular, Site::Mesial, Measurement::Margin(2));
        chart.set(t, Surface::Vestibular, Site::Mesial, Measurement::ProbingDepth(5));

        let geometry = ChartGeometry::default();
        let plot = geometry.plot_surface(&chart, t, Surface::Vestibular).unwrap();
        assert_eq!(plot.margin.points[0].y, 65.0 - 8.0);
        assert_eq!(plot.probing_depth.points[0].y, 65.0 - 20.0);
    }

    #[test]
    fn test_pocket_fill() {
        let mut chart = PeriodontalChart::new();
        let t = tooth(46);
        chart.set(t, Surface::Lingual, Site::Central, Measurement::ProbingDepth(4));
        chart.set(t, Surface::Lingual, Site::Distal, Measurement::ProbingDepth(3));

        let plot = ChartGeometry::default()
            .plot_surface(&chart, t, Surface::Lingual)
            .unwrap();
        assert_eq!(plot.probing_depth.points[1].fill, PointFill::PathologicalPocket);
        assert_eq!(plot.probing_depth.points[2].fill, PointFill::ProbingDepth);
        assert_eq!(plot.margin.points[1].fill, PointFill::Margin);
    }

    #[test]
    fn test_svg_path() {
        let chart = PeriodontalChart::new();
        let plot = ChartGeometry::default()
            .plot_surface(&chart, tooth(31), Surface::Vestibular)
            .unwrap();
        assert_eq!(plot.margin.svg_path(), "M 8 15 L 27.5 15 L 47 15");
    }

    #[test]
    fn test_absent_tooth_not_plotted() {
        let mut chart = PeriodontalChart::new();
        chart.set_absent(tooth(28), true);
        let geometry = ChartGeometry::default();
        assert!(geometry.plot_surface(&chart, tooth(28), Surface::Vestibular).is_none());
        assert_eq!(geometry.plot_chart(&chart, Surface::Vestibular).len(), 31);
    }
}
