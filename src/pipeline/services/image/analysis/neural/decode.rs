//! Pre- and post-processing around the detection network.
//!
//! Output rows follow the YOLOv5 layout: `[cx, cy, w, h, objectness,
//! class scores...]`, with box values normalized to the network input.
//! Boxes are rescaled by multiplying x components by the source width and y
//! components by the source height. That is only exact when the source shares
//! the network input's aspect ratio; other images get proportionally
//! stretched boxes.

use image::imageops::{resize, FilterType};
use image::RgbImage;

use super::labels::{is_sharp, CLASS_LABELS};
use crate::error::AppError;

/// Leading values of a row before the class scores.
const BOX_FIELDS: usize = 5;

/// NCHW float tensor, batch of one.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

/// Resize to `size`×`size`, scale to [0, 1] and lay channels out as planes
/// (R, G, B).
pub fn preprocess(image: &RgbImage, size: u32) -> InputTensor {
    let resized = resize(image, size, size, FilterType::Triangle);
    let plane = (size * size) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (idx, pixel) in resized.pixels().enumerate() {
        data[idx] = pixel[0] as f32 / 255.0;
        data[plane + idx] = pixel[1] as f32 / 255.0;
        data[2 * plane + idx] = pixel[2] as f32 / 255.0;
    }
    InputTensor {
        shape: [1, 3, size as usize, size as usize],
        data,
    }
}

/// One output tensor viewed as a 2D table. Leading dimensions are flattened.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTable {
    row_width: usize,
    data: Vec<f32>,
}

impl OutputTable {
    pub fn new(row_width: usize, data: Vec<f32>) -> Result<Self, AppError> {
        if row_width <= BOX_FIELDS {
            return Err(AppError::MalformedOutput(format!(
                "rows have {} values, need box, objectness and at least one class score",
                row_width
            )));
        }
        if data.len() % row_width != 0 {
            return Err(AppError::MalformedOutput(format!(
                "{} values do not form rows of {}",
                data.len(),
                row_width
            )));
        }
        Ok(Self { row_width, data })
    }

    /// Build from a tensor shape; the last dimension is the row width.
    pub fn from_shape(shape: &[i64], data: Vec<f32>) -> Result<Self, AppError> {
        let row_width = match shape.last() {
            Some(&width) if width > 0 => width as usize,
            _ => {
                return Err(AppError::MalformedOutput(format!(
                    "unusable output shape {:?}",
                    shape
                )))
            }
        };
        Self::new(row_width, data)
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.row_width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = RawDetectionRow<'_>> {
        self.data.chunks_exact(self.row_width).map(RawDetectionRow)
    }
}

/// Borrowed view of one output row
#[derive(Debug, Clone, Copy)]
pub struct RawDetectionRow<'a>(&'a [f32]);

impl<'a> RawDetectionRow<'a> {
    pub fn center(&self) -> (f32, f32) {
        (self.0[0], self.0[1])
    }

    pub fn size(&self) -> (f32, f32) {
        (self.0[2], self.0[3])
    }

    pub fn objectness(&self) -> f32 {
        self.0[4]
    }

    pub fn class_scores(&self) -> &'a [f32] {
        &self.0[BOX_FIELDS..]
    }

    /// Index and value of the highest class score; the first wins ties.
    pub fn best_class(&self) -> (usize, f32) {
        let mut best = (0, f32::NEG_INFINITY);
        for (i, &score) in self.class_scores().iter().enumerate() {
            if score > best.1 {
                best = (i, score);
            }
        }
        best
    }
}

/// Box in source image pixels, top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Boxes may overhang the image by this much; strokes there stay off-canvas.
const CLIP_MARGIN: f32 = 8.0;

impl PixelBox {
    /// Integer `(left, top, width, height)` limited to the image plus a small
    /// margin. `None` when a coordinate is not finite or the box is empty.
    pub fn clip_to(&self, image_width: u32, image_height: u32) -> Option<(i32, i32, u32, u32)> {
        if ![self.left, self.top, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }
        let clamp = |v: f32, limit: u32| v.round().clamp(-CLIP_MARGIN, limit as f32 + CLIP_MARGIN);
        let (x0, x1) = (
            clamp(self.left, image_width),
            clamp(self.left + self.width, image_width),
        );
        let (y0, y1) = (
            clamp(self.top, image_height),
            clamp(self.top + self.height, image_height),
        );
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as i32, y0 as i32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: &'static str,
    pub class_id: usize,
    pub objectness: f32,
    pub confidence: f32,
    pub bounds: PixelBox,
    pub is_sharp: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeThresholds {
    pub objectness: f32,
    pub class_score: f32,
}

/// Turn one output table into detections, in row order.
///
/// A row survives when objectness is at least `objectness` and its best class
/// score is strictly above `class_score`. A winning class index outside the
/// label table is reported as malformed output rather than skipped.
pub fn decode_table(
    table: &OutputTable,
    image_width: u32,
    image_height: u32,
    thresholds: DecodeThresholds,
) -> Result<Vec<Detection>, AppError> {
    let (image_width, image_height) = (image_width as f32, image_height as f32);
    let mut detections = Vec::new();

    for (index, row) in table.rows().enumerate() {
        let objectness = row.objectness();
        if objectness < thresholds.objectness {
            continue;
        }

        let (class_id, confidence) = row.best_class();
        if confidence <= thresholds.class_score {
            continue;
        }

        let label = *CLASS_LABELS.get(class_id).ok_or_else(|| {
            AppError::MalformedOutput(format!(
                "row {} names class {} but only {} labels are known",
                index,
                class_id,
                CLASS_LABELS.len()
            ))
        })?;

        let (cx, cy) = row.center();
        let (w, h) = row.size();
        let (cx, cy, w, h) = (
            cx * image_width,
            cy * image_height,
            w * image_width,
            h * image_height,
        );

        detections.push(Detection {
            label,
            class_id,
            objectness,
            confidence,
            bounds: PixelBox {
                left: cx - w / 2.0,
                top: cy - h / 2.0,
                width: w,
                height: h,
            },
            is_sharp: is_sharp(label),
        });
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn pixel_box(left: f32, top: f32, width: f32, height: f32) -> PixelBox {
        PixelBox {
            left,
            top,
            width,
            height,
        }
    }

    #[test]
    fn test_clip_to_image() {
        assert_eq!(pixel_box(30.4, 29.6, 40.0, 40.0).clip_to(200, 200), Some((30, 30, 40, 40)));
        assert_eq!(pixel_box(-20.0, 30.0, 40.0, 40.0).clip_to(200, 200), Some((-8, 30, 28, 40)));
        assert_eq!(pixel_box(-1e30, -1e30, 3e30, 3e30).clip_to(200, 100), Some((-8, -8, 216, 116)));
        assert_eq!(pixel_box(f32::NAN, 0.0, 10.0, 10.0).clip_to(200, 200), None);
        assert_eq!(pixel_box(0.0, 0.0, f32::INFINITY, 10.0).clip_to(200, 200), None);
        assert_eq!(pixel_box(500.0, 0.0, 10.0, 10.0).clip_to(200, 200), None);
        assert_eq!(pixel_box(10.0, 10.0, -5.0, 10.0).clip_to(200, 200), None);
    }

    const THRESHOLDS: DecodeThresholds = DecodeThresholds {
        objectness: 0.2,
        class_score: 0.2,
    };

    fn row(cx: f32, cy: f32, w: f32, h: f32, objectness: f32, class: usize, score: f32) -> Vec<f32> {
        let mut row = vec![cx, cy, w, h, objectness];
        let mut scores = vec![0.0; 80];
        scores[class] = score;
        row.extend(scores);
        row
    }

    fn table(rows: &[Vec<f32>]) -> OutputTable {
        OutputTable::new(85, rows.concat()).unwrap()
    }

    #[test]
    fn test_objectness_boundary() {
        let t = table(&[
            row(0.5, 0.5, 0.1, 0.1, 0.19, 43, 0.9),
            row(0.5, 0.5, 0.1, 0.1, 0.2, 43, 0.21),
        ]);
        let detections = decode_table(&t, 640, 640, THRESHOLDS).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].objectness, 0.2);
        assert_eq!(detections[0].label, "knife");
        assert!(detections[0].is_sharp);
    }

    #[test]
    fn test_class_score_must_exceed_threshold() {
        let t = table(&[
            row(0.5, 0.5, 0.1, 0.1, 0.2, 0, 0.2),
            row(0.5, 0.5, 0.1, 0.1, 0.9, 0, 0.2),
        ]);
        assert!(decode_table(&t, 640, 640, THRESHOLDS).unwrap().is_empty());
    }

    #[test]
    fn test_box_is_scaled_to_image() {
        let t = table(&[row(0.5, 0.25, 0.2, 0.1, 0.8, 2, 0.7)]);
        let detections = decode_table(&t, 640, 640, THRESHOLDS).unwrap();
        assert_eq!(
            detections[0].bounds,
            PixelBox {
                left: 256.0,
                top: 128.0,
                width: 128.0,
                height: 64.0
            }
        );
        assert_eq!(detections[0].label, "car");
        assert!(!detections[0].is_sharp);
    }

    #[test]
    fn test_mismatched_aspect_ratio_stretches_boxes() {
        // A square in network space comes back twice as wide as it is tall
        // on a 2:1 source image.
        let t = table(&[row(0.5, 0.5, 0.25, 0.25, 0.8, 76, 0.7)]);
        let detections = decode_table(&t, 1280, 640, THRESHOLDS).unwrap();
        let b = detections[0].bounds;
        assert_eq!((b.left, b.top, b.width, b.height), (480.0, 240.0, 320.0, 160.0));
        assert_eq!(detections[0].label, "scissors");
    }

    #[test]
    fn test_rows_keep_table_order_without_suppression() {
        let t = table(&[
            row(0.5, 0.5, 0.2, 0.2, 0.5, 0, 0.4),
            row(0.5, 0.5, 0.2, 0.2, 0.9, 0, 0.95),
            row(0.51, 0.5, 0.2, 0.2, 0.7, 0, 0.6),
        ]);
        let detections = decode_table(&t, 640, 640, THRESHOLDS).unwrap();
        let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.4, 0.95, 0.6]);
    }

    #[test]
    fn test_first_best_class_wins_ties() {
        let mut r = row(0.5, 0.5, 0.1, 0.1, 0.9, 10, 0.6);
        r[5 + 20] = 0.6;
        let t = table(&[r]);
        let detections = decode_table(&t, 640, 640, THRESHOLDS).unwrap();
        assert_eq!(detections[0].class_id, 10);
    }

    #[test]
    fn test_unknown_class_is_malformed() {
        let mut r = row(0.5, 0.5, 0.1, 0.1, 0.9, 0, 0.0);
        r.push(0.9);
        let t = OutputTable::new(86, r).unwrap();
        assert!(matches!(
            decode_table(&t, 640, 640, THRESHOLDS),
            Err(AppError::MalformedOutput(_))
        ));
    }

    #[test]
    fn test_unknown_class_below_threshold_is_ignored() {
        let mut r = row(0.5, 0.5, 0.1, 0.1, 0.1, 0, 0.0);
        r.push(0.9);
        let t = OutputTable::new(86, r).unwrap();
        assert!(decode_table(&t, 640, 640, THRESHOLDS).unwrap().is_empty());
    }

    #[test]
    fn test_table_shape_validation() {
        assert!(OutputTable::new(5, vec![0.0; 10]).is_err());
        assert!(OutputTable::new(85, vec![0.0; 100]).is_err());
        assert!(OutputTable::from_shape(&[], vec![]).is_err());

        let t = OutputTable::from_shape(&[1, 2, 85], vec![0.0; 170]).unwrap();
        assert_eq!(t.len(), 2);
        assert!(OutputTable::from_shape(&[1, 0, 85], vec![]).unwrap().is_empty());
    }

    #[test]
    fn test_preprocess_layout() {
        let image = RgbImage::from_pixel(20, 10, Rgb([255, 0, 51]));
        let tensor = preprocess(&image, 8);
        assert_eq!(tensor.shape, [1, 3, 8, 8]);
        assert_eq!(tensor.data.len(), 3 * 64);
        assert_eq!(tensor.data[0], 1.0);
        assert_eq!(tensor.data[64], 0.0);
        assert!((tensor.data[128] - 0.2).abs() < 1e-6);
    }
}
