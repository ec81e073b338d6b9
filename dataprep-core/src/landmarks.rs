//! The landmark preparer: a folder of face images in, four list files out.
//!
//! `trainingData.txt` and `testingData.txt` hold one image path per line.
//! `trainingLabels.txt` and `testingLabels.txt` hold, on the matching line, the
//! landmarks of every face found in that image as `{{{x, y}, ...}, {...}}`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{Level, debug, info, warn};

use dataprep_utils::{config::LandmarkSettings, list_images, timing_guard, write_text};

use crate::{
    literal::push_braced,
    postprocess::{Detection, Landmark},
    split::{Split, train_test_split},
};

pub const TRAINING_DATA_FILE: &str = "trainingData.txt";
pub const TRAINING_LABELS_FILE: &str = "trainingLabels.txt";
pub const TESTING_DATA_FILE: &str = "testingData.txt";
pub const TESTING_LABELS_FILE: &str = "testingLabels.txt";

/// Landmark points of one face, in source image pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceLandmarks {
    pub points: Vec<Landmark>,
}

impl From<&Detection> for FaceLandmarks {
    fn from(detection: &Detection) -> Self {
        Self {
            points: detection.landmarks.to_vec(),
        }
    }
}

/// Anything that can find faces in an image file.
pub trait LandmarkSource {
    /// Landmarks of every face in the image at `path`; empty when there are none.
    fn faces(&self, path: &Path) -> Result<Vec<FaceLandmarks>>;
}

/// An image and the faces found in it. `faces` is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSample {
    pub path: PathBuf,
    pub faces: Vec<FaceLandmarks>,
}

impl LandmarkSample {
    pub fn label_line(&self) -> String {
        format_faces(&self.faces)
    }
}

/// Render faces as nested braces: image, then face, then `{x, y}` point.
pub fn format_faces(faces: &[FaceLandmarks]) -> String {
    let mut out = String::from("{");
    for (idx, face) in faces.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push('{');
        for (pidx, point) in face.points.iter().enumerate() {
            if pidx > 0 {
                out.push_str(", ");
            }
            push_braced(&mut out, [point.x, point.y]);
        }
        out.push('}');
    }
    out.push('}');
    out
}

/// Per-run counts and the files written.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkReport {
    pub scanned: usize,
    /// Images without any detected face.
    pub faceless: usize,
    /// Images that could not be read or run through the detector.
    pub failed: usize,
    pub train: usize,
    pub test: usize,
    pub outputs: Vec<PathBuf>,
}

/// Run `source` over every path, dropping images with no faces or errors.
pub fn collect_samples<S: LandmarkSource + ?Sized>(
    source: &S,
    paths: &[PathBuf],
) -> (Vec<LandmarkSample>, usize, usize) {
    let mut samples = Vec::with_capacity(paths.len());
    let mut faceless = 0;
    let mut failed = 0;
    for path in paths {
        match source.faces(path) {
            Ok(faces) if faces.is_empty() => {
                debug!("No face found in {}", path.display());
                faceless += 1;
            }
            Ok(faces) => samples.push(LandmarkSample {
                path: path.clone(),
                faces,
            }),
            Err(err) => {
                warn!("Skipping {}: {err:#}", path.display());
                failed += 1;
            }
        }
    }
    (samples, faceless, failed)
}

/// Scan, detect, split and write the four landmark list files.
pub fn prepare_landmarks<S: LandmarkSource + ?Sized>(
    source: &S,
    settings: &LandmarkSettings,
    preview_count: usize,
) -> Result<LandmarkReport> {
    let _guard = timing_guard("dataprep_core::prepare_landmarks", Level::Info);
    let image_dir = Path::new(&settings.image_dir);
    let paths = list_images(image_dir, settings.limit())?;
    info!("Found {} images in {}", paths.len(), image_dir.display());

    let (samples, faceless, failed) = collect_samples(source, &paths);
    info!(
        "Detected faces in {} of {} images ({} without faces, {} failed)",
        samples.len(),
        paths.len(),
        faceless,
        failed
    );
    anyhow::ensure!(
        !samples.is_empty(),
        "no faces detected in any of the {} images under {}",
        paths.len(),
        image_dir.display()
    );

    let Split { train, test } = train_test_split(samples, settings.test_size, settings.seed)?;

    let out_dir = Path::new(&settings.output_dir);
    let mut outputs = Vec::with_capacity(4);
    for (data_file, labels_file, set) in [
        (TRAINING_DATA_FILE, TRAINING_LABELS_FILE, &train),
        (TESTING_DATA_FILE, TESTING_LABELS_FILE, &test),
    ] {
        outputs.push(write_lines(out_dir.join(data_file), set.iter().map(path_line))?);
        outputs.push(write_lines(
            out_dir.join(labels_file),
            set.iter().map(LandmarkSample::label_line),
        )?);
    }

    for (name, set) in [("training", &train), ("testing", &test)] {
        let head = &set[..set.len().min(preview_count)];
        info!(
            "First {} {name} paths: {:?}",
            head.len(),
            head.iter().map(path_line).collect::<Vec<_>>()
        );
        info!(
            "First {} {name} labels: {:?}",
            head.len(),
            head.iter().map(LandmarkSample::label_line).collect::<Vec<_>>()
        );
    }

    Ok(LandmarkReport {
        scanned: paths.len(),
        faceless,
        failed,
        train: train.len(),
        test: test.len(),
        outputs,
    })
}

fn path_line(sample: &LandmarkSample) -> String {
    sample.path.display().to_string()
}

fn write_lines<I>(path: PathBuf, lines: I) -> Result<PathBuf>
where
    I: Iterator<Item = String>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
    write_text(&path, &text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Parse a label line back into faces. Returns `None` for malformed input.
pub fn parse_faces(line: &str) -> Option<Vec<FaceLandmarks>> {
    let inner = line.trim().strip_prefix('{')?.strip_suffix('}')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }

    let mut faces = Vec::new();
    for face in inner.strip_prefix('{')?.strip_suffix('}')?.split("}}, {{") {
        let mut points = Vec::new();
        let face = face.trim_start_matches('{').trim_end_matches('}');
        for point in face.split("}, {") {
            let (x, y) = point.split_once(',')?;
            points.push(Landmark {
                x: x.trim().parse().ok()?,
                y: y.trim().parse().ok()?,
            });
        }
        faces.push(FaceLandmarks { points });
    }
    Some(faces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, fs};

    /// Looks faces up by file name; unknown names fail.
    struct FakeSource(HashMap<&'static str, Vec<FaceLandmarks>>);

    impl LandmarkSource for FakeSource {
        fn faces(&self, path: &Path) -> Result<Vec<FaceLandmarks>> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unreadable image {name}"))
        }
    }

    fn face(offset: f32) -> FaceLandmarks {
        FaceLandmarks {
            points: (0..5)
                .map(|i| Landmark {
                    x: offset + i as f32,
                    y: offset * 2.0,
                })
                .collect(),
        }
    }

    #[test]
    fn faces_render_as_nested_braces() {
        let faces = [
            FaceLandmarks {
                points: vec![Landmark { x: 1.0, y: 2.5 }, Landmark { x: 3.0, y: 4.0 }],
            },
            FaceLandmarks {
                points: vec![Landmark { x: 5.0, y: 6.0 }],
            },
        ];
        let line = format_faces(&faces);
        assert_eq!(line, "{{{1.0, 2.5}, {3.0, 4.0}}, {{5.0, 6.0}}}");
        assert_eq!(parse_faces(&line), Some(faces.to_vec()));
        assert_eq!(parse_faces("{{{1.0, oops}}}"), None);
    }

    #[test]
    fn skips_faceless_and_failing_images() {
        let source = FakeSource(HashMap::from([
            ("a.png", vec![face(1.0)]),
            ("b.png", vec![]),
            ("c.jpg", vec![face(2.0), face(3.0)]),
        ]));
        let paths: Vec<PathBuf> = ["a.png", "b.png", "c.jpg", "d.png"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let (samples, faceless, failed) = collect_samples(&source, &paths);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].faces.len(), 2);
        assert_eq!((faceless, failed), (1, 1));
    }

    fn populate(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), b"stub").unwrap();
        }
    }

    #[test]
    fn writes_matching_path_and_label_files() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let names = ["f0.png", "f1.png", "f2.jpg", "f3.jpeg", "f4.png", "f5.png"];
        populate(images.path(), &names);
        populate(images.path(), &["notes.txt"]);

        let mut faces = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            faces.insert(*name, if i == 5 { vec![] } else { vec![face(i as f32 * 10.0)] });
        }
        let source = FakeSource(faces);

        let settings = LandmarkSettings {
            image_dir: images.path().display().to_string(),
            output_dir: out.path().display().to_string(),
            ..LandmarkSettings::default()
        };
        let report = prepare_landmarks(&source, &settings, 5).unwrap();

        assert_eq!(report.scanned, 6);
        assert_eq!(report.faceless, 1);
        assert_eq!((report.train, report.test), (4, 1));
        assert_eq!(report.outputs.len(), 4);

        let read = |name: &str| fs::read_to_string(out.path().join(name)).unwrap();
        let lines = |name: &str| read(name).lines().map(String::from).collect::<Vec<_>>();
        let train_paths = lines(TRAINING_DATA_FILE);
        let train_labels = lines(TRAINING_LABELS_FILE);
        assert_eq!(train_paths.len(), 4);
        assert_eq!(train_labels.len(), 4);
        assert!(read(TESTING_DATA_FILE).ends_with('\n'));

        for (path, label) in train_paths.iter().zip(&train_labels) {
            let name = Path::new(path).file_name().unwrap().to_str().unwrap();
            let idx: f32 = name[1..2].parse().unwrap();
            assert_eq!(parse_faces(label), Some(vec![face(idx * 10.0)]));
        }
    }

    #[test]
    fn limit_caps_scanned_images() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        populate(images.path(), &["a.png", "b.png", "c.png"]);
        let source = FakeSource(HashMap::from([
            ("a.png", vec![face(0.0)]),
            ("b.png", vec![face(1.0)]),
            ("c.png", vec![face(2.0)]),
        ]));

        let settings = LandmarkSettings {
            image_dir: images.path().display().to_string(),
            output_dir: out.path().display().to_string(),
            limit: 2,
            ..LandmarkSettings::default()
        };
        let report = prepare_landmarks(&source, &settings, 5).unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.train + report.test, 2);
    }

    #[test]
    fn no_faces_anywhere_is_an_error() {
        let images = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        populate(images.path(), &["a.png"]);
        let source = FakeSource(HashMap::from([("a.png", vec![])]));

        let settings = LandmarkSettings {
            image_dir: images.path().display().to_string(),
            output_dir: out.path().display().to_string(),
            ..LandmarkSettings::default()
        };
        let err = prepare_landmarks(&source, &settings, 5).unwrap_err();
        assert!(format!("{err}").contains("no faces detected"));
        assert!(!out.path().join(TRAINING_DATA_FILE).exists());
    }
}
