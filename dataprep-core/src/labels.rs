use ndarray::Array2;

use crate::error::DataError;

/// Number of digit classes in MNIST.
pub const DIGIT_CLASSES: usize = 10;

/// One-hot encode `labels`, writing `epsilon` instead of zero in every cold position.
///
/// Row `i` holds `1.0` at column `labels[i]`.
pub fn one_hot(labels: &[u8], num_classes: usize, epsilon: f32) -> Result<Array2<f32>, DataError> {
    let mut encoded = Array2::from_elem((labels.len(), num_classes), epsilon);
    for (index, (&label, mut row)) in labels.iter().zip(encoded.rows_mut()).enumerate() {
        let class = usize::from(label);
        if class >= num_classes {
            return Err(DataError::LabelOutOfRange {
                index,
                label: class,
                classes: num_classes,
            });
        }
        row[class] = 1.0;
    }
    Ok(encoded)
}
