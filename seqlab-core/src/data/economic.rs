//! Economic series sources: in-memory points and `date,value` CSV files.

use super::provider::{DataError, EconomicDataSource};
use crate::domain::EconomicPoint;
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;

/// Sort by date and keep the last point for each date.
fn canonical(mut points: Vec<EconomicPoint>) -> Vec<EconomicPoint> {
    points.sort_by_key(|p| p.date);
    let mut out: Vec<EconomicPoint> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if last.date == p.date => *last = p,
            _ => out.push(p),
        }
    }
    out
}

fn in_range(points: &[EconomicPoint], start: NaiveDate, end: NaiveDate) -> Vec<EconomicPoint> {
    let lo = points.partition_point(|p| p.date < start);
    let hi = points.partition_point(|p| p.date <= end);
    points[lo..hi.max(lo)].to_vec()
}

/// A fixed set of points held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticEconomicSource {
    points: Vec<EconomicPoint>,
}

impl StaticEconomicSource {
    pub fn new(points: Vec<EconomicPoint>) -> Self {
        Self {
            points: canonical(points),
        }
    }

    pub fn points(&self) -> &[EconomicPoint] {
        &self.points
    }
}

impl EconomicDataSource for StaticEconomicSource {
    fn name(&self) -> &str {
        "static"
    }

    fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EconomicPoint>, DataError> {
        Ok(in_range(&self.points, start, end))
    }
}

/// Points read once from a CSV file with a `date,value` header.
#[derive(Debug, Clone)]
pub struct CsvEconomicSource {
    inner: StaticEconomicSource,
}

impl CsvEconomicSource {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let file = std::fs::File::open(path).map_err(|e| {
            DataError::EconomicUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DataError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut points = Vec::new();
        for (line, record) in rdr.deserialize::<EconomicPoint>().enumerate() {
            let point = record.map_err(|e| {
                DataError::EconomicUnavailable(format!("bad record {}: {e}", line + 1))
            })?;
            if !point.value.is_finite() {
                return Err(DataError::EconomicUnavailable(format!(
                    "non-finite value on {}",
                    point.date
                )));
            }
            points.push(point);
        }
        Ok(Self {
            inner: StaticEconomicSource::new(points),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.points().is_empty()
    }
}

impl EconomicDataSource for CsvEconomicSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EconomicPoint>, DataError> {
        self.inner.range(start, end)
    }
}
