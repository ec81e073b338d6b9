use std::cmp::Ordering;

use dataprep_utils::config::DetectionSettings;

use crate::model::{LANDMARKS, ROW_LEN, RawRow};

/// Score, candidate and overlap limits applied to raw model rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostprocessConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    /// Candidates kept after sorting by score; 0 keeps all.
    pub top_k: usize,
}

impl Default for PostprocessConfig {
    fn default() -> Self {
        DetectionSettings::default().into()
    }
}

impl From<DetectionSettings> for PostprocessConfig {
    fn from(settings: DetectionSettings) -> Self {
        Self {
            score_threshold: settings.score_threshold,
            nms_threshold: settings.nms_threshold,
            top_k: settings.top_k,
        }
    }
}

impl From<&DetectionSettings> for PostprocessConfig {
    fn from(settings: &DetectionSettings) -> Self {
        settings.clone().into()
    }
}

/// Axis-aligned box with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union; 0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &Self) -> f32 {
        let w = (self.x + self.width).min(other.x + other.width) - self.x.max(other.x);
        let h = (self.y + self.height).min(other.y + other.height) - self.y.max(other.y);
        if w <= 0.0 || h <= 0.0 {
            return 0.0;
        }
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

/// A point in source image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

/// One face: box, five landmarks (right eye, left eye, nose tip, right and
/// left mouth corner) and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub landmarks: [Landmark; LANDMARKS],
    pub score: f32,
}

impl Detection {
    fn from_row(row: &RawRow, scale_x: f32, scale_y: f32) -> Self {
        let mut landmarks = [Landmark { x: 0.0, y: 0.0 }; LANDMARKS];
        for (lm, pair) in landmarks.iter_mut().zip(row[4..ROW_LEN - 1].chunks_exact(2)) {
            *lm = Landmark {
                x: pair[0] * scale_x,
                y: pair[1] * scale_y,
            };
        }
        Self {
            bbox: BoundingBox {
                x: row[0] * scale_x,
                y: row[1] * scale_y,
                width: row[2] * scale_x,
                height: row[3] * scale_y,
            },
            landmarks,
            score: row[ROW_LEN - 1],
        }
    }
}

/// Filter, scale and de-duplicate raw rows into detections sorted by score.
pub fn apply_postprocess(
    rows: &[RawRow],
    scale_x: f32,
    scale_y: f32,
    config: &PostprocessConfig,
) -> Vec<Detection> {
    let mut candidates: Vec<Detection> = rows
        .iter()
        .filter(|row| {
            let score = row[ROW_LEN - 1];
            score.is_finite() && score >= config.score_threshold && row[2] > 0.0 && row[3] > 0.0
        })
        .map(|row| Detection::from_row(row, scale_x, scale_y))
        .collect();

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    if config.top_k > 0 {
        candidates.truncate(config.top_k);
    }

    if config.nms_threshold <= 0.0 {
        return candidates;
    }
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if kept
            .iter()
            .all(|k| candidate.bbox.iou(&k.bbox) <= config.nms_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}
