use opencv::core;
use opencv::prelude::*;

use crate::error::{Result, TrainError};

pub const POSITIVE_LABEL: f32 = 1.0;
pub const NEGATIVE_LABEL: f32 = -1.0;

/// Row-major sample matrix with its parallel label column.
///
/// Rows are positives first, then negatives; `labels` follows the same order.
#[derive(Debug)]
pub struct TrainingSet {
    pub samples: Mat,
    pub labels: Mat,
    pub positive_count: usize,
    pub negative_count: usize,
}

impl TrainingSet {
    /// Labels are derived from the vectors actually supplied, never from the
    /// number of images that went into extraction.
    pub fn assemble(positives: &[Vec<f32>], negatives: &[Vec<f32>], descriptor_len: usize) -> Result<Self> {
        let rows: Vec<&[f32]> = positives
            .iter()
            .chain(negatives)
            .map(Vec::as_slice)
            .collect();
        let samples = stack_rows(&rows, descriptor_len)?;

        let mut labels = Mat::zeros(rows.len() as i32, 1, core::CV_32F)?.to_mat()?;
        for i in 0..rows.len() {
            let label = if i < positives.len() { POSITIVE_LABEL } else { NEGATIVE_LABEL };
            *labels.at_2d_mut::<f32>(i as i32, 0)? = label;
        }

        Ok(TrainingSet {
            samples,
            labels,
            positive_count: positives.len(),
            negative_count: negatives.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.positive_count + self.negative_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Stack equal-length vectors into an R x L `CV_32F` matrix.
pub fn stack_rows(rows: &[&[f32]], descriptor_len: usize) -> Result<Mat> {
    let mut data = Mat::zeros(rows.len() as i32, descriptor_len as i32, core::CV_32F)?.to_mat()?;
    for (i, row) in rows.iter().enumerate() {
        if row.len() != descriptor_len {
            return Err(TrainError::DescriptorLength {
                index: i,
                found: row.len(),
                expected: descriptor_len,
            });
        }
        data.at_row_mut::<f32>(i as i32)?.copy_from_slice(row);
    }
    Ok(data)
}

/// Normalize single-row or single-column `CV_32F` matrices to plain row vectors.
///
/// Entry point for descriptors that arrive as OpenCV matrices rather than from
/// [`DescriptorExtractor`](crate::descriptor::DescriptorExtractor); feed the
/// result to [`TrainingSet::assemble`].
pub fn rows_from_mats(vectors: &[Mat], descriptor_len: usize) -> Result<Vec<Vec<f32>>> {
    vectors
        .iter()
        .enumerate()
        .map(|(index, mat)| {
            let found = (mat.rows() * mat.cols()) as usize;
            if found != descriptor_len {
                return Err(TrainError::DescriptorLength {
                    index,
                    found,
                    expected: descriptor_len,
                });
            }
            if mat.rows() != 1 && mat.cols() != 1 {
                return Err(TrainError::NotAVector {
                    index,
                    rows: mat.rows(),
                    cols: mat.cols(),
                });
            }

            let row = if mat.rows() == 1 {
                mat.try_clone()?
            } else {
                let mut transposed = Mat::default();
                core::transpose(mat, &mut transposed)?;
                transposed
            };
            let mut values = Vec::with_capacity(descriptor_len);
            for c in 0..row.cols() {
                values.push(*row.at_2d::<f32>(0, c)?);
            }
            Ok(values)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f32]) -> Mat {
        let mut mat = Mat::zeros(values.len() as i32, 1, core::CV_32F).unwrap().to_mat().unwrap();
        for (i, v) in values.iter().enumerate() {
            *mat.at_2d_mut::<f32>(i as i32, 0).unwrap() = *v;
        }
        mat
    }

    fn row(values: &[f32]) -> Mat {
        let mut mat = Mat::zeros(1, values.len() as i32, core::CV_32F).unwrap().to_mat().unwrap();
        mat.at_row_mut::<f32>(0).unwrap().copy_from_slice(values);
        mat
    }

    #[test]
    fn labels_follow_positives_then_negatives() {
        let pos = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        let neg = vec![vec![5.0, 6.0], vec![7.0, 8.0], vec![9.0, 10.0]];
        let set = TrainingSet::assemble(&pos, &neg, 2).unwrap();

        assert_eq!(set.samples.rows(), 5);
        assert_eq!(set.labels.rows(), 5);
        assert_eq!(set.len(), 5);
        let labels: Vec<f32> = (0..5).map(|i| *set.labels.at_2d::<f32>(i, 0).unwrap()).collect();
        assert_eq!(labels, vec![1.0, 1.0, -1.0, -1.0, -1.0]);
        assert_eq!(*set.samples.at_2d::<f32>(2, 1).unwrap(), 6.0);
    }

    #[test]
    fn mismatched_length_is_fatal() {
        let pos = vec![vec![1.0, 2.0, 3.0]];
        let neg = vec![vec![1.0, 2.0]];
        let err = TrainingSet::assemble(&pos, &neg, 3).unwrap_err();
        assert!(matches!(err, TrainError::DescriptorLength { index: 1, found: 2, expected: 3 }));
    }

    #[test]
    fn columns_are_transposed_to_rows() {
        let vectors = vec![column(&[1.0, 2.0, 3.0]), row(&[4.0, 5.0, 6.0])];
        let rows = rows_from_mats(&vectors, 3).unwrap();
        assert_eq!(rows, vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[test]
    fn matrices_are_not_vectors() {
        let square = Mat::zeros(2, 2, core::CV_32F).unwrap().to_mat().unwrap();
        let err = rows_from_mats(&[square], 4).unwrap_err();
        assert!(matches!(err, TrainError::NotAVector { index: 0, rows: 2, cols: 2 }));
    }

    #[test]
    fn matrix_descriptors_assemble_like_vectors() {
        let pos = rows_from_mats(&[column(&[1.0, 0.0, 1.0])], 3).unwrap();
        let neg = rows_from_mats(&[row(&[0.0, 1.0, 0.0]), column(&[0.5, 0.5, 0.5])], 3).unwrap();
        let set = TrainingSet::assemble(&pos, &neg, 3).unwrap();
        assert_eq!((set.positive_count, set.negative_count), (1, 2));
        assert_eq!(set.samples.rows(), set.labels.rows());
        assert_eq!(*set.samples.at_2d::<f32>(2, 0).unwrap(), 0.5);
    }

    #[test]
    fn wrong_total_is_fatal() {
        let err = rows_from_mats(&[column(&[1.0, 2.0])], 3).unwrap_err();
        assert!(matches!(err, TrainError::DescriptorLength { .. }));
    }
}
