//! Content fingerprint of a dataset, so two runs can be compared cheaply.

use crate::pipeline::Dataset;
use ndarray::{ArrayBase, Data, Dimension};

fn hash_array<S, D>(hasher: &mut blake3::Hasher, label: &str, array: &ArrayBase<S, D>)
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    hasher.update(label.as_bytes());
    for &dim in array.shape() {
        hasher.update(&(dim as u64).to_le_bytes());
    }
    // Logical (row-major) order, independent of memory layout.
    for v in array.iter() {
        hasher.update(&v.to_bits().to_le_bytes());
    }
}

/// Hex BLAKE3 digest over feature names, tensor shapes, and values.
pub fn dataset_fingerprint(ds: &Dataset) -> String {
    let mut hasher = blake3::Hasher::new();
    for name in &ds.feature_names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hash_array(&mut hasher, "x_train", &ds.x_train);
    hash_array(&mut hasher, "y_train", &ds.y_train);
    hash_array(&mut hasher, "x_test", &ds.x_test);
    hash_array(&mut hasher, "y_test", &ds.y_test);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array3};

    fn dataset(v: f64) -> Dataset {
        Dataset {
            x_train: Array3::from_elem((2, 3, 1), v),
            y_train: Array1::from_elem(2, v),
            x_test: Array3::zeros((0, 3, 1)),
            y_test: Array1::zeros(0),
            feature_names: vec!["close".into()],
            segments: Vec::new(),
        }
    }

    #[test]
    fn stable_and_sensitive() {
        assert_eq!(dataset_fingerprint(&dataset(0.5)), dataset_fingerprint(&dataset(0.5)));
        assert_ne!(dataset_fingerprint(&dataset(0.5)), dataset_fingerprint(&dataset(0.25)));
        assert_eq!(dataset_fingerprint(&dataset(0.5)).len(), 64);
    }

    #[test]
    fn shape_matters() {
        let a = dataset(0.0);
        let mut b = dataset(0.0);
        b.x_train = Array3::zeros((3, 2, 1));
        assert_ne!(dataset_fingerprint(&a), dataset_fingerprint(&b));
    }
}
