use std::error::Error;
use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

const MODEL_REL_PATH: &str = "../models/face_detection_yunet_2023mar_640.onnx";

fn model_path() -> Option<PathBuf> {
    let path = PathBuf::from(MODEL_REL_PATH);
    if path.exists() {
        Some(path)
    } else {
        eprintln!("Skipping test: model not found at {MODEL_REL_PATH}");
        None
    }
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn help_lists_both_preparers() -> Result<(), Box<dyn Error>> {
    let output = cargo_bin_cmd!("dataprep").arg("--help").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("digits"));
    assert!(stdout.contains("landmarks"));
    Ok(())
}

#[test]
fn digits_without_mnist_files_fails_cleanly() -> Result<(), Box<dyn Error>> {
    let work = tempdir()?;
    let output = cargo_bin_cmd!("dataprep")
        .current_dir(work.path())
        .args(["digits", "--data-dir", "missing", "--output-dir", "out"])
        .output()?;

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("MNIST files missing"));
    assert!(!work.path().join("out").exists());
    Ok(())
}

#[test]
fn landmarks_without_model_fails_cleanly() -> Result<(), Box<dyn Error>> {
    let work = tempdir()?;
    let images = work.path().join("images");
    fs::create_dir_all(&images)?;

    let output = cargo_bin_cmd!("dataprep")
        .current_dir(work.path())
        .args(["landmarks", "--model", "nope.onnx", "--input"])
        .arg(&images)
        .output()?;

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("model not found"));
    Ok(())
}

#[test]
fn invalid_settings_file_is_reported() -> Result<(), Box<dyn Error>> {
    let work = tempdir()?;
    let config = work.path().join("settings.json");
    fs::write(&config, "{ not json")?;

    let output = cargo_bin_cmd!("dataprep")
        .arg("--config")
        .arg(&config)
        .arg("digits")
        .output()?;

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("failed to parse settings JSON"));
    Ok(())
}

#[test]
fn landmarks_on_blank_images_reports_no_faces() -> Result<(), Box<dyn Error>> {
    let Some(model) = model_path() else {
        return Ok(());
    };
    let model = model.canonicalize()?;

    let work = tempdir()?;
    let images = work.path().join("images");
    fs::create_dir_all(&images)?;
    for name in ["a.png", "b.png"] {
        image::RgbImage::from_pixel(64, 64, image::Rgb([40, 40, 40])).save(images.join(name))?;
    }

    let output = cargo_bin_cmd!("dataprep")
        .current_dir(work.path())
        .arg("landmarks")
        .arg("--model")
        .arg(&model)
        .arg("--input")
        .arg(&images)
        .args(["--output-dir", "out"])
        .output()?;

    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("no faces detected"));
    Ok(())
}
