//! Sequence windowing and chronological train/test partitioning.

use ndarray::{s, Array1, Array3, ArrayView1, ArrayView2};
use serde::Serialize;

/// Fixed-length input windows and the value that follows each one.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequences {
    /// `(count, length, features)`
    pub x: Array3<f64>,
    /// `(count,)`
    pub y: Array1<f64>,
}

impl Sequences {
    pub fn empty(length: usize, features: usize) -> Self {
        Self {
            x: Array3::zeros((0, length, features)),
            y: Array1::zeros(0),
        }
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Train/test partition of one symbol's sequences. Test is the most recent tail.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitSet {
    pub train: Sequences,
    pub test: Sequences,
}

/// Counts of a partition, for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitCounts {
    pub train: usize,
    pub purged: usize,
    pub test: usize,
}

/// Window `matrix` into sequences of `length` rows.
///
/// Sequence `i` covers rows `[i, i + length)` and its target is
/// `target[i + length]`. Fewer than `length + 1` rows yield no sequences.
///
/// # Panics
/// If `target` and `matrix` disagree on row count.
pub fn make_sequences(matrix: ArrayView2<f64>, target: ArrayView1<f64>, length: usize) -> Sequences {
    let rows = matrix.nrows();
    assert_eq!(rows, target.len(), "target length must match matrix rows");

    if length == 0 || rows <= length {
        return Sequences::empty(length, matrix.ncols());
    }

    let count = rows - length;
    let mut x = Array3::zeros((count, length, matrix.ncols()));
    for i in 0..count {
        x.slice_mut(s![i, .., ..])
            .assign(&matrix.slice(s![i..i + length, ..]));
    }
    let y = target.slice(s![length..]).to_owned();

    Sequences { x, y }
}

/// `floor(ratio * len)`, clamped to `len`.
pub fn split_index(len: usize, ratio: f64) -> usize {
    ((ratio * len as f64).floor() as usize).min(len)
}

/// Positional split: prefix to train, suffix to test. No shuffling.
pub fn split(seqs: &Sequences, ratio: f64) -> SplitSet {
    partition(seqs, ratio, 0)
}

/// Like [`split`], but discards `gap` sequences between train and test.
///
/// The ratio applies to the `n - gap` sequences that survive the purge, so
/// the gap is taken out of what would otherwise be train and the test tail
/// keeps its share. With `gap` equal to the window length, no test window
/// shares a row with any train window or train target.
pub fn partition(seqs: &Sequences, ratio: f64, gap: usize) -> SplitSet {
    let n = seqs.len();
    let k = split_index(n.saturating_sub(gap), ratio);
    let test_start = (k + gap).min(n);

    SplitSet {
        train: Sequences {
            x: seqs.x.slice(s![..k, .., ..]).to_owned(),
            y: seqs.y.slice(s![..k]).to_owned(),
        },
        test: Sequences {
            x: seqs.x.slice(s![test_start.., .., ..]).to_owned(),
            y: seqs.y.slice(s![test_start..]).to_owned(),
        },
    }
}

impl SplitSet {
    pub fn counts(&self, total: usize) -> SplitCounts {
        SplitCounts {
            train: self.train.len(),
            purged: total - self.train.len() - self.test.len(),
            test: self.test.len(),
        }
    }
}

/// Rows read by the train partition of [`partition`]: `0..k + length`, where
/// `k` is the train count (the last train target sits at row `k - 1 + length`).
pub fn train_rows(rows: usize, length: usize, ratio: f64, gap: usize) -> std::ops::Range<usize> {
    let n = rows.saturating_sub(length);
    0..(split_index(n.saturating_sub(gap), ratio) + length).min(rows)
}

/// Fewest rows for which [`partition`] leaves at least one train and one
/// test sequence. `ratio` must lie in `(0, 1)`.
pub fn min_rows(length: usize, ratio: f64, gap: usize) -> usize {
    // Smallest kept count with floor(ratio * kept) >= 1; the rest is test.
    let mut kept = ((1.0 / ratio).ceil() as usize).max(2);
    if split_index(kept, ratio) == 0 {
        kept += 1;
    }
    length.saturating_add(gap).saturating_add(kept)
}
