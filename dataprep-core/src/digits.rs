//! The digit preparer: MNIST in, four array literals out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{Level, info};
use ndarray::{Axis, concatenate};

use dataprep_utils::{config::DigitSettings, timing_guard};

use crate::{
    augment::Augmenter,
    labels::{DIGIT_CLASSES, one_hot},
    literal::{ArrayOutput, FormatOptions, write_array},
    mnist::{MnistData, MnistSource},
};

pub const TRAINING_DATA: &str = "trainingData";
pub const TRAINING_LABELS: &str = "trainingLabels";
pub const TESTING_DATA: &str = "testingData";
pub const TESTING_LABELS: &str = "testingLabels";

/// Outcome of a digit preparation run.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitReport {
    /// Samples read from the training split before augmentation.
    pub original_train: usize,
    pub test_samples: usize,
    /// Every literal written, in write order.
    pub outputs: Vec<ArrayOutput>,
}

impl DigitReport {
    pub fn output(&self, name: &str) -> Option<&ArrayOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// Load MNIST as configured and run [`prepare_digits_from`].
pub fn prepare_digits(settings: &DigitSettings, options: &FormatOptions) -> Result<DigitReport> {
    let data = MnistSource::from(settings)
        .load()
        .context("failed to load MNIST")?;
    prepare_digits_from(data, settings, options)
}

/// Normalize, encode, augment and write an already loaded dataset.
pub fn prepare_digits_from(
    data: MnistData,
    settings: &DigitSettings,
    options: &FormatOptions,
) -> Result<DigitReport> {
    let _guard = timing_guard("dataprep_core::prepare_digits", Level::Info);

    let train_x = data.train.normalized()?;
    let test_x = data.test.normalized()?;
    let train_y = one_hot(&data.train.labels, DIGIT_CLASSES, settings.label_epsilon)?;
    let test_y = one_hot(&data.test.labels, DIGIT_CLASSES, settings.label_epsilon)?;
    info!(
        "Normalized {} training and {} testing digits",
        train_x.nrows(),
        test_x.nrows()
    );

    let augmented = Augmenter::new(settings.augment, settings.seed).augment_all(train_x.view())?;
    info!("Augmented {} training digits", augmented.nrows());

    let full_x = concatenate(Axis(0), &[train_x.view(), augmented.view()])?;
    let full_y = concatenate(Axis(0), &[train_y.view(), train_y.view()])?;

    let out_dir = Path::new(&settings.output_dir);
    let mut outputs = Vec::with_capacity(4);
    outputs.push(write_array(
        literal_path(out_dir, TRAINING_DATA),
        full_x.view(),
        TRAINING_DATA,
        options,
    )?);
    outputs.push(write_array(
        literal_path(out_dir, TRAINING_LABELS),
        full_y.view(),
        TRAINING_LABELS,
        options,
    )?);
    outputs.push(write_array(
        literal_path(out_dir, TESTING_DATA),
        test_x.view(),
        TESTING_DATA,
        options,
    )?);
    if settings.write_test_labels {
        outputs.push(write_array(
            literal_path(out_dir, TESTING_LABELS),
            test_y.view(),
            TESTING_LABELS,
            options,
        )?);
    }

    for output in &outputs {
        info!("{} preview:\n{}", output.name, output.preview);
    }

    Ok(DigitReport {
        original_train: train_x.nrows(),
        test_samples: test_x.nrows(),
        outputs,
    })
}

fn literal_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.txt"))
}
