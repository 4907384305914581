use serde::Deserialize;

/// Tunable thresholds shared by all detectors
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Color regions must be strictly larger than this (px²).
    pub color_min_area: f64,
    /// Shape contours must be at least this large (px²).
    pub shape_min_area: f64,
    /// Grayscale level separating dark foreground from light background.
    pub shape_threshold: u8,
    /// Allowed deviation of width/height from 1.0 for a square.
    pub square_tolerance: f64,
    /// Polygon approximation epsilon as a fraction of contour arc length.
    pub approx_epsilon_ratio: f64,
    /// Rows with objectness below this are dropped.
    pub objectness_threshold: f32,
    /// Rows whose best class score does not exceed this are dropped.
    pub class_score_threshold: f32,
    /// Draw only knife/scissors detections.
    pub sharp_only: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            color_min_area: 500.0,
            shape_min_area: 300.0,
            shape_threshold: 60,
            square_tolerance: 0.1,
            approx_epsilon_ratio: 0.04,
            objectness_threshold: 0.2,
            class_score_threshold: 0.2,
            sharp_only: false,
        }
    }
}

impl DetectionConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.color_min_area < 0.0 || self.shape_min_area < 0.0 {
            return Err("Minimum areas must not be negative".to_string());
        }

        if self.square_tolerance < 0.0 {
            return Err("Square tolerance must not be negative".to_string());
        }

        if self.approx_epsilon_ratio <= 0.0 || self.approx_epsilon_ratio >= 1.0 {
            return Err("Approximation epsilon ratio must be between 0.0 and 1.0".to_string());
        }

        if !(0.0..=1.0).contains(&self.objectness_threshold)
            || !(0.0..=1.0).contains(&self.class_score_threshold)
        {
            return Err("Confidence thresholds must be between 0.0 and 1.0".to_string());
        }

        Ok(())
    }

    pub fn with_sharp_only(mut self, sharp_only: bool) -> Self {
        self.sharp_only = sharp_only;
        self
    }

    pub fn with_square_tolerance(mut self, tolerance: f64) -> Self {
        self.square_tolerance = tolerance;
        self
    }
}
