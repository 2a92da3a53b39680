//! The pipeline's output tensors.

use crate::window::{Sequences, SplitSet};
use ndarray::{concatenate, Array1, Array3, ArrayView1, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

/// Where one symbol's sequences sit inside the concatenated tensors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub symbol: String,
    pub train_start: usize,
    pub train_len: usize,
    pub test_start: usize,
    pub test_len: usize,
}

/// `X` tensors are `(count, sequence_length, features)`; `y` vectors are `(count,)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub x_train: Array3<f64>,
    pub y_train: Array1<f64>,
    pub x_test: Array3<f64>,
    pub y_test: Array1<f64>,
    pub feature_names: Vec<String>,
    pub segments: Vec<Segment>,
}

fn stack_x(parts: &[&Sequences], length: usize, features: usize) -> Array3<f64> {
    let views: Vec<ArrayView3<f64>> = parts.iter().map(|s| s.x.view()).collect();
    if views.is_empty() {
        return Array3::zeros((0, length, features));
    }
    // Every part shares (length, features); the shape check cannot fail.
    concatenate(Axis(0), &views).unwrap_or_else(|_| Array3::zeros((0, length, features)))
}

fn stack_y(parts: &[&Sequences]) -> Array1<f64> {
    let views: Vec<ArrayView1<f64>> = parts.iter().map(|s| s.y.view()).collect();
    if views.is_empty() {
        return Array1::zeros(0);
    }
    concatenate(Axis(0), &views).unwrap_or_else(|_| Array1::zeros(0))
}

impl Dataset {
    /// Concatenate per-symbol partitions, in the order given.
    pub fn concat(parts: &[(String, SplitSet)], length: usize, feature_names: Vec<String>) -> Self {
        let features = feature_names.len();
        let train: Vec<&Sequences> = parts.iter().map(|(_, p)| &p.train).collect();
        let test: Vec<&Sequences> = parts.iter().map(|(_, p)| &p.test).collect();

        let mut segments = Vec::with_capacity(parts.len());
        let (mut train_at, mut test_at) = (0, 0);
        for (symbol, split) in parts {
            segments.push(Segment {
                symbol: symbol.clone(),
                train_start: train_at,
                train_len: split.train.len(),
                test_start: test_at,
                test_len: split.test.len(),
            });
            train_at += split.train.len();
            test_at += split.test.len();
        }

        Self {
            x_train: stack_x(&train, length, features),
            y_train: stack_y(&train),
            x_test: stack_x(&test, length, features),
            y_test: stack_y(&test),
            feature_names,
            segments,
        }
    }

    pub fn sequence_length(&self) -> usize {
        self.x_train.shape()[1]
    }

    pub fn feature_count(&self) -> usize {
        self.x_train.shape()[2]
    }

    pub fn train_len(&self) -> usize {
        self.y_train.len()
    }

    pub fn test_len(&self) -> usize {
        self.y_test.len()
    }

    /// Symbols that contributed at least one sequence.
    pub fn symbols(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| s.train_len + s.test_len > 0)
            .map(|s| s.symbol.as_str())
            .collect()
    }

    pub fn segment(&self, symbol: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.symbol == symbol)
    }

    /// BLAKE3 digest over shapes, values, and feature names.
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::dataset_fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seqs(n: usize, fill: f64) -> Sequences {
        Sequences {
            x: Array3::from_elem((n, 3, 2), fill),
            y: Array1::from_elem(n, fill),
        }
    }

    fn names() -> Vec<String> {
        vec!["close".into(), "volume".into()]
    }

    #[test]
    fn concatenates_in_order_with_segments() {
        let parts = vec![
            ("A".to_string(), SplitSet { train: seqs(4, 1.0), test: seqs(1, 1.0) }),
            ("B".to_string(), SplitSet { train: seqs(2, 2.0), test: seqs(3, 2.0) }),
        ];
        let ds = Dataset::concat(&parts, 3, names());

        assert_eq!(ds.x_train.shape(), &[6, 3, 2]);
        assert_eq!(ds.x_test.shape(), &[4, 3, 2]);
        assert_eq!(ds.y_train.to_vec(), vec![1.0, 1.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(ds.y_test[0], 1.0);

        let b = ds.segment("B").unwrap();
        assert_eq!((b.train_start, b.train_len), (4, 2));
        assert_eq!((b.test_start, b.test_len), (1, 3));
        assert_eq!(ds.symbols(), vec!["A", "B"]);
    }

    #[test]
    fn empty_concat_keeps_shape() {
        let ds = Dataset::concat(&[], 5, names());
        assert_eq!(ds.x_train.shape(), &[0, 5, 2]);
        assert_eq!(ds.sequence_length(), 5);
        assert_eq!(ds.feature_count(), 2);
        assert_eq!(ds.train_len(), 0);
        assert!(ds.symbols().is_empty());
    }

    #[test]
    fn symbol_without_sequences_is_not_listed() {
        let parts = vec![
            ("A".to_string(), SplitSet { train: seqs(2, 1.0), test: seqs(0, 0.0) }),
            ("Z".to_string(), SplitSet { train: seqs(0, 0.0), test: seqs(0, 0.0) }),
        ];
        let ds = Dataset::concat(&parts, 3, names());
        assert_eq!(ds.symbols(), vec!["A"]);
        assert_eq!(ds.test_len(), 0);
    }
}
