use std::time::Instant;

use image::{GrayImage, Rgb, RgbImage};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::filter::gaussian_blur_f32;
use indexmap::IndexMap;
use tracing::debug;

use super::config::DetectionConfig;
use super::core::{DetectionResult, Detector, ImageRegion};
use super::geometry::{
    approximate_closed_polygon, bounding_rect, closed_arc_length, contour_area, external_contours,
};
use crate::error::AppError;
use crate::pipeline::services::image::canvas::{Canvas, LABEL_SCALE, SUMMARY_SCALE};
use crate::pipeline::services::image::codec::to_luma;

/// Sigma OpenCV derives for a 5×5 Gaussian kernel when none is given.
const BLUR_SIGMA: f32 = 1.1;
const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const SUMMARY_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SUMMARY_ORIGIN: (i32, i32) = (10, 30);
const SUMMARY_LINE_SPACING: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Triangle,
    Square,
    Rectangle,
    Circle,
    Unknown,
}

impl Shape {
    /// Classify a simplified polygon by vertex count, using the bounding
    /// box's aspect ratio to split quadrilaterals.
    pub fn classify(vertices: usize, aspect_ratio: f64, square_tolerance: f64) -> Self {
        match vertices {
            3 => Shape::Triangle,
            4 if (aspect_ratio - 1.0).abs() <= square_tolerance => Shape::Square,
            4 => Shape::Rectangle,
            v if v > 4 => Shape::Circle,
            _ => Shape::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Shape::Triangle => "Triangle",
            Shape::Square => "Square",
            Shape::Rectangle => "Rectangle",
            Shape::Circle => "Circle",
            Shape::Unknown => "Unknown",
        }
    }
}

/// Occurrences per shape, in first-seen order
pub type ShapeTally = IndexMap<Shape, usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRegion {
    pub shape: Shape,
    pub vertices: usize,
    pub area: f64,
    pub bounds: ImageRegion,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeReport {
    pub shapes: Vec<ShapeRegion>,
    pub tally: ShapeTally,
}

pub struct ShapeDetector {
    min_area: f64,
    threshold: u8,
    square_tolerance: f64,
    epsilon_ratio: f64,
}

impl ShapeDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            min_area: config.shape_min_area,
            threshold: config.shape_threshold,
            square_tolerance: config.square_tolerance,
            epsilon_ratio: config.approx_epsilon_ratio,
        }
    }

    /// Dark pixels become foreground so dark shapes on a light background
    /// are the outermost components.
    fn binarize(&self, image: &RgbImage) -> GrayImage {
        let gray = to_luma(image);
        let blurred = gaussian_blur_f32(&gray, BLUR_SIGMA);
        threshold(&blurred, self.threshold, ThresholdType::BinaryInverted)
    }
}

impl Detector for ShapeDetector {
    type Output = ShapeReport;

    fn detect(&self, canvas: &mut Canvas) -> Result<DetectionResult<Self::Output>, AppError> {
        let start_time = Instant::now();
        let binary = self.binarize(canvas.image());
        let mut report = ShapeReport::default();

        for contour in external_contours(&binary) {
            let area = contour_area(&contour.points);
            if area < self.min_area {
                continue;
            }

            let epsilon = self.epsilon_ratio * closed_arc_length(&contour.points);
            let vertices = approximate_closed_polygon(&contour.points, epsilon).len();
            let bounds = bounding_rect(&contour.points);
            let shape = Shape::classify(vertices, bounds.aspect_ratio(), self.square_tolerance);

            *report.tally.entry(shape).or_insert(0) += 1;
            canvas.contour(&contour.points, OUTLINE_COLOR, 2);
            canvas.text(
                shape.label(),
                (bounds.x as i32, bounds.y as i32),
                LABEL_SCALE,
                LABEL_COLOR,
            );
            report.shapes.push(ShapeRegion {
                shape,
                vertices,
                area,
                bounds,
            });
        }

        let mut y = SUMMARY_ORIGIN.1;
        for (shape, count) in &report.tally {
            canvas.text(
                &format!("{}: {}", shape.label(), count),
                (SUMMARY_ORIGIN.0, y),
                SUMMARY_SCALE,
                SUMMARY_COLOR,
            );
            y += SUMMARY_LINE_SPACING;
        }

        debug!("{}: tally {:?}", self.name(), report.tally);
        Ok(DetectionResult::new(report).with_timing(start_time))
    }

    fn name(&self) -> &'static str {
        "ShapeDetector"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::pipeline::services::image::canvas::LabelFont;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut, draw_polygon_mut};
    use imageproc::point::Point;
    use imageproc::rect::Rect;

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    fn three_shapes() -> RgbImage {
        let mut image = RgbImage::from_pixel(420, 200, WHITE);
        draw_polygon_mut(
            &mut image,
            &[Point::new(20, 160), Point::new(120, 160), Point::new(70, 40)],
            BLACK,
        );
        draw_filled_rect_mut(&mut image, Rect::at(160, 60).of_size(80, 80), BLACK);
        draw_filled_circle_mut(&mut image, (330, 100), 50, BLACK);
        image
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(Shape::classify(3, 2.5, 0.1), Shape::Triangle);
        assert_eq!(Shape::classify(4, 1.0, 0.1), Shape::Square);
        assert_eq!(Shape::classify(4, 0.95, 0.1), Shape::Square);
        assert_eq!(Shape::classify(4, 1.11, 0.1), Shape::Rectangle);
        assert_eq!(Shape::classify(4, 0.5, 0.1), Shape::Rectangle);
        assert_eq!(Shape::classify(5, 1.0, 0.1), Shape::Circle);
        assert_eq!(Shape::classify(12, 3.0, 0.1), Shape::Circle);
        for degenerate in 0..3 {
            assert_eq!(Shape::classify(degenerate, 1.0, 0.1), Shape::Unknown);
        }
    }

    #[test]
    fn test_triangle_square_circle_tally() {
        let mut canvas = Canvas::new(three_shapes(), None);
        let detector = ShapeDetector::new(&DetectionConfig::default());
        let report = detector.detect(&mut canvas).unwrap().result;

        let expected: ShapeTally = [(Shape::Triangle, 1), (Shape::Square, 1), (Shape::Circle, 1)]
            .into_iter()
            .collect();
        // Order-insensitive comparison
        assert_eq!(report.tally.len(), expected.len());
        for (shape, count) in &expected {
            assert_eq!(report.tally.get(shape), Some(count), "{:?}", shape);
        }
        assert_eq!(report.shapes.len(), 3);
    }

    fn count_in_band(
        image: &RgbImage,
        xs: std::ops::Range<u32>,
        ys: std::ops::RangeInclusive<u32>,
        matches: impl Fn(&Rgb<u8>) -> bool,
    ) -> usize {
        image
            .enumerate_pixels()
            .filter(|(x, y, p)| xs.contains(x) && ys.contains(y) && matches(*p))
            .count()
    }

    #[test]
    fn test_tally_summary_is_stacked_from_origin() {
        let font = LabelFont::bundled().map(Arc::new);
        let mut canvas = Canvas::new(three_shapes(), font);
        ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap();

        let reddish = |p: &Rgb<u8>| p[0] > p[1].saturating_add(60) && p[0] > p[2].saturating_add(60);
        for line in 0..3u32 {
            let baseline = 30 + 30 * line;
            let inked = count_in_band(canvas.image(), 10..200, baseline - 20..=baseline, reddish);
            assert!(inked > 30, "summary line {} has {} pixels", line, inked);
        }
        // Nothing beyond the third line.
        assert_eq!(count_in_band(canvas.image(), 0..420, 100..=200, reddish), 0);
        // The first glyph starts at the origin column.
        assert!(count_in_band(canvas.image(), 10..15, 10..=30, reddish) > 0);
    }

    #[test]
    fn test_shape_labels_sit_at_bounds_corner() {
        let font = LabelFont::bundled().map(Arc::new);
        let mut canvas = Canvas::new(three_shapes(), font);
        let report = ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap()
            .result;

        let bluish = |p: &Rgb<u8>| p[2] > p[0].saturating_add(60) && p[2] > p[1].saturating_add(60);
        for region in &report.shapes {
            let b = region.bounds;
            let inked = count_in_band(canvas.image(), b.x..b.x + 60, b.y.saturating_sub(14)..=b.y, bluish);
            assert!(inked > 10, "{:?} label has {} pixels", region.shape, inked);
        }
    }

    #[test]
    fn test_threshold_uses_bt601_luma() {
        // Pure red is luma 76 (background), dark green 53 (foreground).
        let mut image = RgbImage::from_pixel(300, 160, WHITE);
        draw_filled_rect_mut(&mut image, Rect::at(30, 40).of_size(80, 80), Rgb([255, 0, 0]));
        draw_filled_rect_mut(&mut image, Rect::at(180, 40).of_size(80, 80), Rgb([0, 90, 0]));

        let mut canvas = Canvas::new(image, None);
        let report = ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap()
            .result;

        assert_eq!(report.shapes.len(), 1);
        assert_eq!(report.shapes[0].shape, Shape::Square);
        assert!(report.shapes[0].bounds.x >= 175);
    }

    #[test]
    fn test_wide_rectangle() {
        let mut image = RgbImage::from_pixel(300, 200, WHITE);
        draw_filled_rect_mut(&mut image, Rect::at(40, 60).of_size(160, 60), BLACK);

        let mut canvas = Canvas::new(image, None);
        let report = ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap()
            .result;

        assert_eq!(report.tally.get(&Shape::Rectangle), Some(&1));
        assert_eq!(report.shapes[0].vertices, 4);
    }

    #[test]
    fn test_small_blobs_are_ignored() {
        let mut image = RgbImage::from_pixel(100, 100, WHITE);
        draw_filled_rect_mut(&mut image, Rect::at(40, 40).of_size(12, 12), BLACK);

        let mut canvas = Canvas::new(image.clone(), None);
        let report = ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap()
            .result;

        assert!(report.tally.is_empty());
        assert_eq!(canvas.into_image(), image);
    }

    #[test]
    fn test_outline_is_drawn() {
        let mut canvas = Canvas::new(three_shapes(), None);
        let report = ShapeDetector::new(&DetectionConfig::default())
            .detect(&mut canvas)
            .unwrap()
            .result;

        let square = report
            .shapes
            .iter()
            .find(|s| s.shape == Shape::Square)
            .unwrap();
        assert_eq!(
            *canvas.image().get_pixel(square.bounds.x, square.bounds.y + 40),
            OUTLINE_COLOR
        );
    }

    #[test]
    fn test_identical_inputs_produce_identical_output() {
        let detector = ShapeDetector::new(&DetectionConfig::default());
        let mut first = Canvas::new(three_shapes(), None);
        let mut second = Canvas::new(three_shapes(), None);

        let a = detector.detect(&mut first).unwrap().result;
        let b = detector.detect(&mut second).unwrap().result;

        assert_eq!(a, b);
        assert_eq!(first.into_image(), second.into_image());
    }
}
