use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
};

use crate::preprocess::InputSize;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Feature map strides of the YuNet heads.
const STRIDES: [usize; 3] = [8, 16, 32];
/// Raw heads per stride: cls, obj, bbox, kps.
const HEADS: usize = 4;
/// Number of landmarks per face.
pub const LANDMARKS: usize = 5;
/// Values per decoded candidate: box (4), landmarks (10), score (1).
pub const ROW_LEN: usize = 4 + 2 * LANDMARKS + 1;

/// One decoded candidate in model input coordinates:
/// `[x, y, w, h, lx0, ly0, ..., lx4, ly4, score]`.
pub type RawRow = [f32; ROW_LEN];

/// How the ONNX graph was prepared for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    Optimized,
    /// Used when optimization fails; slower but accepts more graphs.
    Decluttered,
}

/// A loaded YuNet graph ready to run on `[1, 3, H, W]` BGR tensors.
#[derive(Debug)]
pub struct FaceModel {
    plan: RunnableModel,
    input_size: InputSize,
    mode: GraphMode,
}

impl FaceModel {
    /// Load the graph at `path`, preferring the optimized plan.
    pub fn load<P: AsRef<Path>>(path: P, input_size: InputSize) -> Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(
            path.is_file(),
            "face detection model not found: {}",
            path.display()
        );

        let (plan, mode) = match build_plan(path, GraphMode::Optimized) {
            Ok(plan) => (plan, GraphMode::Optimized),
            Err(err) => {
                warn!(
                    "Optimizing {} failed ({err:#}); retrying with the decluttered graph",
                    path.display()
                );
                let plan = build_plan(path, GraphMode::Decluttered).with_context(|| {
                    format!("decluttered fallback failed after optimize error: {err}")
                })?;
                (plan, GraphMode::Decluttered)
            }
        };
        Ok(Self {
            plan,
            input_size,
            mode,
        })
    }

    pub fn input_size(&self) -> InputSize {
        self.input_size
    }

    pub fn mode(&self) -> GraphMode {
        self.mode
    }

    /// Run the graph and return every candidate row in input coordinates.
    pub fn infer(&self, input: Tensor) -> Result<Vec<RawRow>> {
        let outputs: Vec<Tensor> = self
            .plan
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("face model execution failed: {e}"))?
            .into_iter()
            .map(|value| value.into_tensor())
            .collect();

        match outputs.as_slice() {
            [] => anyhow::bail!("face model produced no outputs"),
            [fused] => fused_rows(fused),
            heads if heads.len() == STRIDES.len() * HEADS => decode_heads(heads, self.input_size),
            other => anyhow::bail!(
                "expected 1 or {} model outputs, got {}",
                STRIDES.len() * HEADS,
                other.len()
            ),
        }
    }
}

fn build_plan(path: &Path, mode: GraphMode) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    let typed = match mode {
        GraphMode::Optimized => model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?,
        GraphMode::Decluttered => model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?,
    };
    typed
        .into_runnable()
        .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
}

/// Split a `[N, 15]` or `[1, N, 15]` tensor into rows.
pub(crate) fn fused_rows(tensor: &Tensor) -> Result<Vec<RawRow>> {
    match tensor.shape() {
        [_, ROW_LEN] | [1, _, ROW_LEN] => {}
        other => {
            anyhow::bail!("fused output must be [N, {ROW_LEN}] or [1, N, {ROW_LEN}], got {other:?}")
        }
    }
    let data = tensor
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("fused output is not f32: {e}"))?;
    Ok(data
        .chunks_exact(ROW_LEN)
        .map(|chunk| {
            let mut row = [0.0; ROW_LEN];
            row.copy_from_slice(chunk);
            row
        })
        .collect())
}

fn head<'a>(
    heads: &'a [Tensor],
    kind: usize,
    stride_idx: usize,
    expected: usize,
) -> Result<&'a [f32]> {
    const NAMES: [&str; HEADS] = ["cls", "obj", "bbox", "kps"];
    let data = heads[kind * STRIDES.len() + stride_idx]
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("{} head is not f32: {e}", NAMES[kind]))?;
    anyhow::ensure!(
        data.len() == expected,
        "{} head for stride {} has {} values, expected {}",
        NAMES[kind],
        STRIDES[stride_idx],
        data.len(),
        expected
    );
    Ok(data)
}

/// Decode the per-stride cls/obj/bbox/kps heads into candidate rows.
///
/// Heads are ordered `cls_8, cls_16, cls_32, obj_8, ..., kps_32`. The input is
/// treated as padded up to a multiple of 32.
pub(crate) fn decode_heads(heads: &[Tensor], input_size: InputSize) -> Result<Vec<RawRow>> {
    anyhow::ensure!(
        heads.len() == STRIDES.len() * HEADS,
        "expected {} head tensors, got {}",
        STRIDES.len() * HEADS,
        heads.len()
    );

    let padded_w = (input_size.width as usize).div_ceil(32) * 32;
    let padded_h = (input_size.height as usize).div_ceil(32) * 32;

    let mut rows = Vec::new();
    for (stride_idx, &stride) in STRIDES.iter().enumerate() {
        let cols = padded_w / stride;
        let cells = cols * (padded_h / stride);
        let cls = head(heads, 0, stride_idx, cells)?;
        let obj = head(heads, 1, stride_idx, cells)?;
        let bbox = head(heads, 2, stride_idx, cells * 4)?;
        let kps = head(heads, 3, stride_idx, cells * 2 * LANDMARKS)?;

        let s = stride as f32;
        rows.reserve(cells);
        for cell in 0..cells {
            let gx = (cell % cols) as f32;
            let gy = (cell / cols) as f32;

            let score = (cls[cell].clamp(0.0, 1.0) * obj[cell].clamp(0.0, 1.0)).sqrt();
            let b = &bbox[cell * 4..cell * 4 + 4];
            let w = b[2].exp() * s;
            let h = b[3].exp() * s;
            let cx = (gx + b[0]) * s;
            let cy = (gy + b[1]) * s;

            let mut row = [0.0; ROW_LEN];
            row[..4].copy_from_slice(&[cx - w / 2.0, cy - h / 2.0, w, h]);
            let k = &kps[cell * 2 * LANDMARKS..(cell + 1) * 2 * LANDMARKS];
            let points = row[4..4 + 2 * LANDMARKS].chunks_exact_mut(2);
            for (slot, pair) in points.zip(k.chunks_exact(2)) {
                slot[0] = (pair[0] + gx) * s;
                slot[1] = (pair[1] + gy) * s;
            }
            row[ROW_LEN - 1] = if score.is_finite() { score } else { 0.0 };
            rows.push(row);
        }
    }
    Ok(rows)
}
