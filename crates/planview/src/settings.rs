//! Projection settings.

use planview_geom::{Vec3, ViewFrame};
use planview_polygon::MAX_SCALE;
use serde::{Deserialize, Serialize};

use crate::error::{ProjectionError, Result};
use crate::task::TimeBudget;

/// How candidate occluders are found for each edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcclusionStrategy {
    /// One joint traversal of an edge BVH against each mesh BVH.
    #[default]
    Batched,
    /// One shape cast per edge.
    PerEdge,
}

/// Order in which the outline accumulator visits triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriangleOrder {
    /// Scene order.
    #[default]
    Input,
    /// Largest projected footprint first.
    LargestFirst,
}

/// Which outline geometry to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineOutput {
    /// Triangulated fill.
    #[default]
    Fill,
    /// Boundary line segments.
    Lines,
    /// Fill and boundary lines.
    Both,
}

impl OutlineOutput {
    /// True if fill triangles are requested.
    pub fn wants_fill(self) -> bool {
        matches!(self, OutlineOutput::Fill | OutlineOutput::Both)
    }

    /// True if boundary lines are requested.
    pub fn wants_lines(self) -> bool {
        matches!(self, OutlineOutput::Lines | OutlineOutput::Both)
    }
}

/// Projection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    /// Projection direction in world space.
    pub direction: [f64; 3],
    /// Crease angle threshold (degrees).
    pub angle_threshold: f64,
    /// Decimal digits kept when merging coincident vertices.
    pub precision: u32,
    /// Time slice per resume (ms); `None` runs each resume to completion.
    pub time_budget_ms: Option<f64>,
    /// Add edges where surfaces cross each other.
    pub include_intersection_edges: bool,
    /// Occluder search strategy.
    pub occlusion_strategy: OcclusionStrategy,
    /// Leaf size of the edge BVH used by the batched strategy.
    pub edge_leaf_size: usize,
    /// Keep back faces in the outline.
    pub double_sided: bool,
    /// Outline triangle visitation order.
    pub triangle_order: TriangleOrder,
    /// Outline geometry to produce.
    pub outline_output: OutlineOutput,
    /// Fixed-point scale for outline coordinates.
    pub outline_scale: f64,
    /// Outline compaction distance (projection-plane units).
    pub outline_tolerance: f64,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            direction: [0.0, 0.0, -1.0],
            angle_threshold: 50.0,
            precision: 4,
            time_budget_ms: Some(30.0),
            include_intersection_edges: true,
            occlusion_strategy: OcclusionStrategy::Batched,
            edge_leaf_size: 4,
            double_sided: false,
            triangle_order: TriangleOrder::Input,
            outline_output: OutlineOutput::Fill,
            outline_scale: 1e6,
            outline_tolerance: 1e-6,
        }
    }
}

impl ProjectionSettings {
    /// Largest accepted quantization precision.
    pub const MAX_PRECISION: u32 = 9;

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.direction.iter().any(|c| !c.is_finite()) {
            return Err(ProjectionError::InvalidSettings(
                "direction must be finite".into(),
            ));
        }
        if self.direction_vec().norm() < planview_geom::EPSILON {
            return Err(ProjectionError::InvalidSettings(
                "direction must be non-zero".into(),
            ));
        }
        if !(0.0..=180.0).contains(&self.angle_threshold) {
            return Err(ProjectionError::InvalidSettings(
                "angle_threshold must be between 0 and 180 degrees".into(),
            ));
        }
        if self.precision > Self::MAX_PRECISION {
            return Err(ProjectionError::InvalidSettings(format!(
                "precision must be at most {}",
                Self::MAX_PRECISION
            )));
        }
        if let Some(ms) = self.time_budget_ms {
            if !ms.is_finite() || ms < 0.0 {
                return Err(ProjectionError::InvalidSettings(
                    "time_budget_ms must be finite and non-negative".into(),
                ));
            }
        }
        if self.edge_leaf_size < 2 {
            return Err(ProjectionError::InvalidSettings(
                "edge_leaf_size must be at least 2".into(),
            ));
        }
        if !self.outline_scale.is_finite()
            || self.outline_scale <= 0.0
            || self.outline_scale > MAX_SCALE
        {
            return Err(ProjectionError::InvalidSettings(format!(
                "outline_scale must be in (0, {MAX_SCALE:e}]"
            )));
        }
        if !self.outline_tolerance.is_finite() || self.outline_tolerance < 0.0 {
            return Err(ProjectionError::InvalidSettings(
                "outline_tolerance must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Parse and validate settings from TOML. Missing keys take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Projection direction as a vector.
    pub fn direction_vec(&self) -> Vec3 {
        Vec3::new(self.direction[0], self.direction[1], self.direction[2])
    }

    /// View frame for the projection direction.
    pub fn view_frame(&self) -> Result<ViewFrame> {
        ViewFrame::new(self.direction_vec()).ok_or_else(|| {
            ProjectionError::InvalidSettings("direction must be non-zero".into())
        })
    }

    /// Time budget for one resume.
    pub fn time_budget(&self) -> TimeBudget {
        match self.time_budget_ms {
            Some(ms) => TimeBudget::Millis(ms),
            None => TimeBudget::Unbounded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ProjectionSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.time_budget(), TimeBudget::Millis(30.0));
    }

    #[test]
    fn test_rejects_out_of_range() {
        let cases: [fn(&mut ProjectionSettings); 10] = [
            |s| s.direction = [0.0, 0.0, 0.0],
            |s| s.direction = [f64::NAN, 0.0, 1.0],
            |s| s.angle_threshold = -1.0,
            |s| s.angle_threshold = 181.0,
            |s| s.precision = 10,
            |s| s.time_budget_ms = Some(-1.0),
            |s| s.edge_leaf_size = 1,
            |s| s.outline_scale = 0.0,
            |s| s.outline_scale = 1e13,
            |s| s.outline_tolerance = f64::INFINITY,
        ];
        for mutate in cases {
            let mut settings = ProjectionSettings::default();
            mutate(&mut settings);
            assert!(
                matches!(settings.validate(), Err(ProjectionError::InvalidSettings(_))),
                "{settings:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let settings = ProjectionSettings {
            direction: [1.0, 0.0, -1.0],
            angle_threshold: 30.0,
            occlusion_strategy: OcclusionStrategy::PerEdge,
            triangle_order: TriangleOrder::LargestFirst,
            outline_output: OutlineOutput::Both,
            ..Default::default()
        };
        let text = settings.to_toml_string().unwrap();
        let parsed = ProjectionSettings::from_toml_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn test_toml_partial_uses_defaults() {
        let parsed = ProjectionSettings::from_toml_str(
            r#"
            angle_threshold = 10.0
            occlusion_strategy = "per_edge"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.angle_threshold, 10.0);
        assert_eq!(parsed.occlusion_strategy, OcclusionStrategy::PerEdge);
        assert_eq!(parsed.precision, 4);
    }

    #[test]
    fn test_toml_rejects_invalid_values() {
        assert!(matches!(
            ProjectionSettings::from_toml_str("precision = 12"),
            Err(ProjectionError::InvalidSettings(_))
        ));
        assert!(matches!(
            ProjectionSettings::from_toml_str("precision = \"four\""),
            Err(ProjectionError::Toml(_))
        ));
    }
}
