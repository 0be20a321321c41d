//! Fixed-binning 1D and 2D histograms.
//!
//! Bins are uniform over `[min, max)`. Samples below `min` land in the
//! underflow counter, samples at or above `max` (and NaN) in the overflow
//! counter; every fill counts as one entry.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid histogram definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistogramError {
    #[error("histogram '{name}' needs at least one bin")]
    NoBins { name: String },

    #[error("histogram '{name}' has an empty domain [{min}, {max})")]
    EmptyDomain { name: String, min: f64, max: f64 },
}

/// Where a sample falls on an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Underflow,
    Index(usize),
    Overflow,
}

/// A uniformly binned axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis label, including the unit.
    pub title: String,
    /// Number of bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub min: f64,
    /// Upper edge of the last bin.
    pub max: f64,
}

impl Axis {
    fn new(
        name: &str,
        title: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, HistogramError> {
        if bins == 0 {
            return Err(HistogramError::NoBins {
                name: name.to_string(),
            });
        }
        if !(min < max) || !min.is_finite() || !max.is_finite() {
            return Err(HistogramError::EmptyDomain {
                name: name.to_string(),
                min,
                max,
            });
        }

        Ok(Self {
            title: title.to_string(),
            bins,
            min,
            max,
        })
    }

    /// Width of one bin.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Locate the bin of a sample.
    pub fn locate(&self, value: f64) -> Bin {
        if value < self.min {
            return Bin::Underflow;
        }
        if !(value < self.max) {
            return Bin::Overflow;
        }

        let index = ((value - self.min) / self.bin_width()) as usize;
        // Rounding can push values just below `max` onto the edge.
        Bin::Index(index.min(self.bins - 1))
    }

    /// Center of bin `index`.
    #[allow(dead_code)] // Read-side helper for stored runs
    pub fn bin_center(&self, index: usize) -> f64 {
        self.min + (index as f64 + 0.5) * self.bin_width()
    }
}

/// A one-dimensional histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist1D {
    pub name: String,
    pub title: String,
    pub x: Axis,
    /// Bin contents, excluding underflow and overflow.
    pub contents: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
    /// Number of fills, in range or not.
    pub entries: u64,
    /// Sum of in-range samples, for the mean.
    pub sum_x: f64,
}

impl Hist1D {
    /// Create an empty histogram.
    pub fn new(
        name: &str,
        title: &str,
        x_title: &str,
        bins: usize,
        min: f64,
        max: f64,
    ) -> Result<Self, HistogramError> {
        let x = Axis::new(name, x_title, bins, min, max)?;

        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            contents: vec![0.0; x.bins],
            x,
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            sum_x: 0.0,
        })
    }

    /// Add one sample.
    pub fn fill(&mut self, value: f64) {
        self.entries += 1;
        match self.x.locate(value) {
            Bin::Underflow => self.underflow += 1.0,
            Bin::Overflow => self.overflow += 1.0,
            Bin::Index(i) => {
                self.contents[i] += 1.0;
                self.sum_x += value;
            }
        }
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Mean of the in-range samples.
    pub fn mean(&self) -> Option<f64> {
        let n = self.integral();
        (n > 0.0).then(|| self.sum_x / n)
    }

    /// Content of the bin holding `value`.
    #[allow(dead_code)] // Read-side helper for stored runs
    pub fn content_at(&self, value: f64) -> f64 {
        match self.x.locate(value) {
            Bin::Underflow => self.underflow,
            Bin::Overflow => self.overflow,
            Bin::Index(i) => self.contents[i],
        }
    }
}

/// A two-dimensional histogram, contents stored row by row along y.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hist2D {
    pub name: String,
    pub title: String,
    pub x: Axis,
    pub y: Axis,
    /// `x.bins * y.bins` contents; bin (i, j) lives at `j * x.bins + i`.
    pub contents: Vec<f64>,
    /// Samples outside the domain on either axis.
    pub outside: f64,
    pub entries: u64,
}

impl Hist2D {
    /// Create an empty histogram from `(title, bins, min, max)` per axis.
    pub fn new(
        name: &str,
        title: &str,
        (x_title, x_bins, x_min, x_max): (&str, usize, f64, f64),
        (y_title, y_bins, y_min, y_max): (&str, usize, f64, f64),
    ) -> Result<Self, HistogramError> {
        let x = Axis::new(name, x_title, x_bins, x_min, x_max)?;
        let y = Axis::new(name, y_title, y_bins, y_min, y_max)?;

        Ok(Self {
            name: name.to_string(),
            title: title.to_string(),
            contents: vec![0.0; x.bins * y.bins],
            x,
            y,
            outside: 0.0,
            entries: 0,
        })
    }

    /// Add one (x, y) sample.
    pub fn fill(&mut self, x: f64, y: f64) {
        self.entries += 1;
        match (self.x.locate(x), self.y.locate(y)) {
            (Bin::Index(i), Bin::Index(j)) => self.contents[j * self.x.bins + i] += 1.0,
            _ => self.outside += 1.0,
        }
    }

    /// Content of the bin holding (x, y), or the outside counter.
    #[allow(dead_code)] // Read-side helper for stored runs
    pub fn content_at(&self, x: f64, y: f64) -> f64 {
        match (self.x.locate(x), self.y.locate(y)) {
            (Bin::Index(i), Bin::Index(j)) => self.contents[j * self.x.bins + i],
            _ => self.outside,
        }
    }
}

/// Any histogram the pipeline persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Histogram {
    #[serde(rename = "1d")]
    OneD(Hist1D),
    #[serde(rename = "2d")]
    TwoD(Hist2D),
}

impl Histogram {
    pub fn name(&self) -> &str {
        match self {
            Histogram::OneD(h) => &h.name,
            Histogram::TwoD(h) => &h.name,
        }
    }

    pub fn entries(&self) -> u64 {
        match self {
            Histogram::OneD(h) => h.entries,
            Histogram::TwoD(h) => h.entries,
        }
    }
}

impl From<Hist1D> for Histogram {
    fn from(h: Hist1D) -> Self {
        Histogram::OneD(h)
    }
}

impl From<Hist2D> for Histogram {
    fn from(h: Hist2D) -> Self {
        Histogram::TwoD(h)
    }
}
