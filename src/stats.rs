// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Typed histogram containers accumulated across events for quality
//! monitoring, with merge semantics for combining files.

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Cannot merge histograms with different binning")]
    BinningMismatch,

    #[error("Cannot merge a 1D histogram with a 2D histogram")]
    DimensionMismatch,

    #[error("A log axis needs positive bounds; got [{min}, {max}]")]
    NonPositiveLogAxis { min: f64, max: f64 },

    #[error("An irregular axis needs at least 2 sorted edges")]
    BadEdges,
}

/// A binning of the real line. Out-of-range values land in the under- and
/// overflow counters of the owning histogram.
#[derive(Clone, Debug, PartialEq)]
pub enum Axis {
    /// `nbins` equal-width bins over `[min, max)`.
    Regular { min: f64, max: f64, bins: usize },
    /// Sorted bin edges; bin i covers `[edges[i], edges[i+1])`.
    Irregular { edges: Vec<f64> },
    /// Equal-width bins in log space over positive `[min, max)`.
    Log { min: f64, max: f64, bins: usize },
}

impl Axis {
    pub fn regular(min: f64, max: f64, bins: usize) -> Axis {
        Axis::Regular { min, max, bins }
    }

    pub fn irregular(edges: Vec<f64>) -> Result<Axis, StatsError> {
        if edges.len() < 2 || edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(StatsError::BadEdges);
        }
        Ok(Axis::Irregular { edges })
    }

    pub fn log(min: f64, max: f64, bins: usize) -> Result<Axis, StatsError> {
        if min <= 0.0 || max <= 0.0 {
            return Err(StatsError::NonPositiveLogAxis { min, max });
        }
        Ok(Axis::Log { min, max, bins })
    }

    pub fn bins(&self) -> usize {
        match self {
            Axis::Regular { bins, .. } | Axis::Log { bins, .. } => *bins,
            Axis::Irregular { edges } => edges.len() - 1,
        }
    }

    /// Bin index of `x`: `Ok(i)` in range, `Err(false)` underflow,
    /// `Err(true)` overflow.
    fn index(&self, x: f64) -> Result<usize, bool> {
        match self {
            Axis::Regular { min, max, bins } => {
                if x < *min || x.is_nan() {
                    Err(false)
                } else if x >= *max {
                    Err(true)
                } else {
                    Ok((((x - min) * *bins as f64) / (max - min)) as usize)
                }
            }
            Axis::Irregular { edges } => {
                if x < edges[0] || x.is_nan() {
                    Err(false)
                } else if x >= *edges.last().unwrap() {
                    Err(true)
                } else {
                    Ok(edges.partition_point(|e| *e <= x) - 1)
                }
            }
            Axis::Log { min, max, bins } => {
                if x < *min || x.is_nan() {
                    Err(false)
                } else if x >= *max {
                    Err(true)
                } else {
                    let t = (x.ln() - min.ln()) / (max.ln() - min.ln());
                    // Rounding at the upper edge of the last bin.
                    Ok(((t * *bins as f64) as usize).min(bins - 1))
                }
            }
        }
    }

    /// The serialization tag of this axis kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Axis::Regular { .. } => "regular",
            Axis::Irregular { .. } => "irregular",
            Axis::Log { .. } => "log",
        }
    }

    /// Rebuild an axis from its kind tag and edge list, the persisted form.
    pub fn from_kind_edges(kind: &str, edges: Vec<f64>) -> Result<Axis, StatsError> {
        if edges.len() < 2 {
            return Err(StatsError::BadEdges);
        }
        match kind {
            "regular" => Ok(Axis::Regular {
                min: edges[0],
                max: edges[edges.len() - 1],
                bins: edges.len() - 1,
            }),
            "log" => Axis::log(edges[0], edges[edges.len() - 1], edges.len() - 1),
            _ => Axis::irregular(edges),
        }
    }

    /// The bin edges, lowest to highest. For log axes these are in linear
    /// space, so an axis can be reconstructed from its kind and edges.
    pub fn edges(&self) -> Vec<f64> {
        match self {
            Axis::Regular { min, max, bins } => (0..=*bins)
                .map(|i| min + (max - min) * i as f64 / *bins as f64)
                .collect(),
            Axis::Irregular { edges } => edges.clone(),
            Axis::Log { min, max, bins } => (0..=*bins)
                .map(|i| (min.ln() + (max.ln() - min.ln()) * i as f64 / *bins as f64).exp())
                .collect(),
        }
    }
}

/// A 1D histogram with under/overflow counters.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram1D {
    pub axis: Axis,
    pub bins: Vec<f64>,
    pub underflow: f64,
    pub overflow: f64,
}

impl Histogram1D {
    pub fn new(axis: Axis) -> Histogram1D {
        let n = axis.bins();
        Histogram1D {
            axis,
            bins: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        match self.axis.index(x) {
            Ok(i) => self.bins[i] += weight,
            Err(false) => self.underflow += weight,
            Err(true) => self.overflow += weight,
        }
    }

    /// Pointwise sum; the binning must match exactly.
    pub fn merge(&mut self, other: &Histogram1D) -> Result<(), StatsError> {
        if self.axis != other.axis {
            return Err(StatsError::BinningMismatch);
        }
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        Ok(())
    }

    pub fn sum(&self) -> f64 {
        self.bins.iter().sum()
    }
}

/// A 2D histogram. Out-of-range fills distinguish x-only, y-only and
/// both-out-of-range.
#[derive(Clone, Debug, PartialEq)]
pub struct Histogram2D {
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Row-major: `bins[iy * nx + ix]`.
    pub bins: Vec<f64>,
    pub out_x: f64,
    pub out_y: f64,
    pub out_both: f64,
}

impl Histogram2D {
    pub fn new(x_axis: Axis, y_axis: Axis) -> Histogram2D {
        let n = x_axis.bins() * y_axis.bins();
        Histogram2D {
            x_axis,
            y_axis,
            bins: vec![0.0; n],
            out_x: 0.0,
            out_y: 0.0,
            out_both: 0.0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        self.fill_weighted(x, y, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, y: f64, weight: f64) {
        match (self.x_axis.index(x), self.y_axis.index(y)) {
            (Ok(ix), Ok(iy)) => self.bins[iy * self.x_axis.bins() + ix] += weight,
            (Err(_), Ok(_)) => self.out_x += weight,
            (Ok(_), Err(_)) => self.out_y += weight,
            (Err(_), Err(_)) => self.out_both += weight,
        }
    }

    pub fn merge(&mut self, other: &Histogram2D) -> Result<(), StatsError> {
        if self.x_axis != other.x_axis || self.y_axis != other.y_axis {
            return Err(StatsError::BinningMismatch);
        }
        for (a, b) in self.bins.iter_mut().zip(&other.bins) {
            *a += b;
        }
        self.out_x += other.out_x;
        self.out_y += other.out_y;
        self.out_both += other.out_both;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Histogram {
    One(Histogram1D),
    Two(Histogram2D),
}

impl Histogram {
    pub fn merge(&mut self, other: &Histogram) -> Result<(), StatsError> {
        match (self, other) {
            (Histogram::One(a), Histogram::One(b)) => a.merge(b),
            (Histogram::Two(a), Histogram::Two(b)) => a.merge(b),
            _ => Err(StatsError::DimensionMismatch),
        }
    }
}

/// A bag of named histograms. Iteration order is insertion order, which
/// keeps output files stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statistics {
    pub histograms: IndexMap<String, Histogram>,
}

impl Statistics {
    pub fn new() -> Statistics {
        Statistics::default()
    }

    pub fn add_histogram(&mut self, name: &str, histogram: Histogram) {
        self.histograms.insert(name.to_string(), histogram);
    }

    pub fn fill_1d(&mut self, name: &str, x: f64) {
        if let Some(Histogram::One(h)) = self.histograms.get_mut(name) {
            h.fill(x);
        }
    }

    pub fn fill_2d(&mut self, name: &str, x: f64, y: f64) {
        if let Some(Histogram::Two(h)) = self.histograms.get_mut(name) {
            h.fill(x, y);
        }
    }

    /// Merge another statistics bag into this one. Histograms present in
    /// both must share their binning; names only present in `other` are
    /// copied over.
    pub fn merge(&mut self, other: &Statistics) -> Result<(), StatsError> {
        for (name, hist) in &other.histograms {
            match self.histograms.get_mut(name) {
                Some(mine) => mine.merge(hist)?,
                None => {
                    self.histograms.insert(name.clone(), hist.clone());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn regular_axis_indexing() {
        let axis = Axis::regular(0.0, 10.0, 5);
        assert_eq!(axis.index(0.0), Ok(0));
        assert_eq!(axis.index(9.99), Ok(4));
        assert_eq!(axis.index(10.0), Err(true));
        assert_eq!(axis.index(-0.1), Err(false));
    }

    #[test]
    fn irregular_axis_indexing() {
        let axis = Axis::irregular(vec![0.0, 1.0, 10.0, 100.0]).unwrap();
        assert_eq!(axis.index(0.5), Ok(0));
        assert_eq!(axis.index(1.0), Ok(1));
        assert_eq!(axis.index(99.9), Ok(2));
        assert_eq!(axis.index(100.0), Err(true));
        assert!(Axis::irregular(vec![1.0, 1.0]).is_err());
    }

    #[test]
    fn log_axis_indexing() {
        let axis = Axis::log(1.0, 1000.0, 3).unwrap();
        assert_eq!(axis.index(5.0), Ok(0));
        assert_eq!(axis.index(50.0), Ok(1));
        assert_eq!(axis.index(500.0), Ok(2));
        assert_eq!(axis.index(0.5), Err(false));
        assert!(Axis::log(0.0, 10.0, 3).is_err());
    }

    #[test]
    fn histogram_fill_and_overflow() {
        let mut h = Histogram1D::new(Axis::regular(0.0, 1.0, 2));
        h.fill(0.25);
        h.fill(0.75);
        h.fill(0.75);
        h.fill(2.0);
        h.fill(-1.0);
        assert_abs_diff_eq!(h.bins[0], 1.0);
        assert_abs_diff_eq!(h.bins[1], 2.0);
        assert_abs_diff_eq!(h.overflow, 1.0);
        assert_abs_diff_eq!(h.underflow, 1.0);
    }

    #[test]
    fn merge_requires_matching_binning() {
        let mut a = Histogram1D::new(Axis::regular(0.0, 1.0, 2));
        let b = Histogram1D::new(Axis::regular(0.0, 1.0, 4));
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn merge_order_does_not_matter() {
        let values = [0.1, 0.4, 0.9, 0.4, 2.0, -0.3];
        let axis = Axis::regular(0.0, 1.0, 4);

        let mut a = Histogram1D::new(axis.clone());
        a.fill(0.7);
        let mut b = Histogram1D::new(axis);
        b.fill(0.3);
        b.fill(0.6);

        // Filling A with the sequence and then adding B...
        let mut left = a.clone();
        for v in values {
            left.fill(v);
        }
        left.merge(&b).unwrap();

        // ...matches filling a fresh copy of B and then adding A to it.
        let mut right = b.clone();
        for v in values {
            right.fill(v);
        }
        right.merge(&a).unwrap();

        for (x, y) in left.bins.iter().zip(&right.bins) {
            assert_abs_diff_eq!(x, y);
        }
        assert_abs_diff_eq!(left.underflow, right.underflow);
        assert_abs_diff_eq!(left.overflow, right.overflow);
    }

    #[test]
    fn histogram_2d_out_of_range_buckets() {
        let mut h = Histogram2D::new(Axis::regular(0.0, 1.0, 2), Axis::regular(0.0, 1.0, 2));
        h.fill(0.1, 0.1);
        h.fill(5.0, 0.1);
        h.fill(0.1, 5.0);
        h.fill(5.0, 5.0);
        assert_abs_diff_eq!(h.bins[0], 1.0);
        assert_abs_diff_eq!(h.out_x, 1.0);
        assert_abs_diff_eq!(h.out_y, 1.0);
        assert_abs_diff_eq!(h.out_both, 1.0);
    }

    #[test]
    fn statistics_merge_copies_new_names() {
        let mut a = Statistics::new();
        a.add_histogram("x", Histogram::One(Histogram1D::new(Axis::regular(0.0, 1.0, 2))));
        a.fill_1d("x", 0.1);

        let mut b = Statistics::new();
        b.add_histogram("x", Histogram::One(Histogram1D::new(Axis::regular(0.0, 1.0, 2))));
        b.add_histogram("y", Histogram::One(Histogram1D::new(Axis::regular(0.0, 1.0, 2))));
        b.fill_1d("x", 0.9);
        b.fill_1d("y", 0.5);

        a.merge(&b).unwrap();
        match &a.histograms["x"] {
            Histogram::One(h) => assert_abs_diff_eq!(h.sum(), 2.0),
            _ => unreachable!(),
        }
        assert!(a.histograms.contains_key("y"));
    }
}
