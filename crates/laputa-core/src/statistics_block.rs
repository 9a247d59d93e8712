//! Statistics Blocks
//!
//! A one to three dimensional float buffer shared between the batch that
//! owns the results and the simulation writing into it. Cloning a block
//! shares the storage; `copy` makes an independent one. Missing samples are
//! NaN and are skipped by every reduction.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::context::round_half_up;
use crate::error::{LaputaError, Result};

/// Sort tuning
pub mod block_constants {
    /// Buckets on each side of the midpoint in the approximate sort
    pub const SORT_BUCKETS: usize = 8;
    /// Rows with fewer finite samples than this over the bucket count use a plain sort
    pub const MIN_BUCKETED_SAMPLES: usize = 8;
    /// Half-spread below which a plain sort is used
    pub const MIN_SPREAD: f32 = 0.0001;
}

use block_constants::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn from_index(i: usize) -> Option<Axis> {
        match i {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatisticsBlock {
    data: Option<Arc<RwLock<Vec<f32>>>>,
    dims: usize,
    width: usize,
    height: usize,
    depth: usize,
    offset: [usize; 3],
}

impl StatisticsBlock {
    /// A three-dimensional block, uninitialised values set to NaN.
    pub fn allocate(width: usize, height: usize, depth: usize) -> Result<Self> {
        let n = width
            .checked_mul(height)
            .and_then(|wh| wh.checked_mul(depth))
            .ok_or(LaputaError::Allocation(usize::MAX))?;
        let mut data: Vec<f32> = Vec::new();
        data.try_reserve_exact(n)
            .map_err(|_| LaputaError::Allocation(n))?;
        data.resize(n, f32::NAN);
        Ok(Self {
            data: Some(Arc::new(RwLock::new(data))),
            dims: 3,
            width,
            height,
            depth,
            offset: [0; 3],
        })
    }

    pub fn allocate_1d(width: usize) -> Result<Self> {
        let mut b = Self::allocate(width, 1, 1)?;
        b.dims = 1;
        Ok(b)
    }

    pub fn allocate_2d(width: usize, height: usize) -> Result<Self> {
        let mut b = Self::allocate(width, height, 1)?;
        b.dims = 2;
        Ok(b)
    }

    fn from_vec(values: Vec<f32>, dims: usize, width: usize, height: usize, depth: usize) -> Self {
        debug_assert_eq!(values.len(), width * height * depth);
        Self {
            data: Some(Arc::new(RwLock::new(values))),
            dims,
            width,
            height,
            depth,
            offset: [0; 3],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.data.is_some()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn size(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
            Axis::Z => self.depth,
        }
    }

    /// Number of handles sharing this block's storage.
    pub fn ref_count(&self) -> usize {
        self.data.as_ref().map_or(0, Arc::strong_count)
    }

    /// Drops this handle. The storage goes when the last handle does.
    pub fn free(&mut self) {
        self.data = None;
    }

    /// Independent storage holding the same values.
    pub fn copy(&self) -> Self {
        let data = self
            .data
            .as_ref()
            .map(|d| Arc::new(RwLock::new(read(d).clone())));
        Self {
            data,
            ..self.clone_meta()
        }
    }

    fn clone_meta(&self) -> Self {
        Self {
            data: None,
            dims: self.dims,
            width: self.width,
            height: self.height,
            depth: self.depth,
            offset: self.offset,
        }
    }

    pub fn set_offset(&mut self, x: usize, y: usize, z: usize) {
        self.offset = [x, y, z];
    }

    pub fn offset(&self) -> [usize; 3] {
        self.offset
    }

    fn storage(&self) -> Result<&Arc<RwLock<Vec<f32>>>> {
        self.data.as_ref().ok_or(LaputaError::OutOfRange { index: 0, len: 0 })
    }

    /// Fills the block with NaN.
    pub fn clear(&self) {
        if let Some(d) = &self.data {
            write(d).iter_mut().for_each(|v| *v = f32::NAN);
        }
    }

    fn index_of(&self, x: usize, y: usize, z: usize) -> Result<usize> {
        let (x, y, z) = (x + self.offset[0], y + self.offset[1], z + self.offset[2]);
        for (i, len) in [(x, self.width), (y, self.height), (z, self.depth)] {
            if i >= len {
                debug_assert!(false, "block index {} out of range for {}", i, len);
                return Err(LaputaError::OutOfRange { index: i, len });
            }
        }
        Ok((z * self.height + y) * self.width + x)
    }

    /// Value at `(x, y, z)` after offsets. Unused coordinates are 0.
    pub fn get(&self, x: usize, y: usize, z: usize) -> Result<f32> {
        let i = self.index_of(x, y, z)?;
        Ok(read(self.storage()?)[i])
    }

    /// Writes a value, visible through every handle sharing the storage.
    pub fn set(&self, x: usize, y: usize, z: usize, v: f32) -> Result<()> {
        let i = self.index_of(x, y, z)?;
        write(self.storage()?)[i] = v;
        Ok(())
    }

    /// The raw values in storage order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.as_ref().map(|d| read(d).clone()).unwrap_or_default()
    }

    fn check_dims(&self, dimension: usize) -> Result<()> {
        if dimension >= self.dims.max(1) {
            debug_assert!(false, "dimension {} on a {}-d block", dimension, self.dims);
            return Err(LaputaError::InvalidDimension {
                dimension,
                dims: self.dims,
            });
        }
        Ok(())
    }

    /// Mean of the finite samples, NaN when there are none.
    pub fn average_all(&self) -> f64 {
        let Some(d) = &self.data else {
            return f64::NAN;
        };
        mean_of(read(d).iter().copied())
    }

    /// Averages away one axis. A 1-d block reduces to a single value.
    pub fn average(&self, axis: Axis) -> Result<Self> {
        self.check_dims(axis.index())?;
        let d = read(self.storage()?);
        let (w, h, depth) = (self.width, self.height, self.depth);
        let at = |x: usize, y: usize, z: usize| d[(z * h + y) * w + x];
        match (self.dims, axis) {
            (1, _) => Ok(Self::from_vec(vec![mean_of(d.iter().copied()) as f32], 1, 1, 1, 1)),
            (2, Axis::X) => {
                let out = (0..h)
                    .map(|y| mean_of((0..w).map(|x| at(x, y, 0))) as f32)
                    .collect();
                Ok(Self::from_vec(out, 1, h, 1, 1))
            }
            (2, _) => {
                let out = (0..w)
                    .map(|x| mean_of((0..h).map(|y| at(x, y, 0))) as f32)
                    .collect();
                Ok(Self::from_vec(out, 1, w, 1, 1))
            }
            (_, Axis::X) => {
                let mut out = Vec::with_capacity(h * depth);
                for z in 0..depth {
                    for y in 0..h {
                        out.push(mean_of((0..w).map(|x| at(x, y, z))) as f32);
                    }
                }
                Ok(Self::from_vec(out, 2, h, depth, 1))
            }
            (_, Axis::Y) => {
                let mut out = Vec::with_capacity(w * depth);
                for z in 0..depth {
                    for x in 0..w {
                        out.push(mean_of((0..h).map(|y| at(x, y, z))) as f32);
                    }
                }
                Ok(Self::from_vec(out, 2, w, depth, 1))
            }
            (_, Axis::Z) => {
                let mut out = Vec::with_capacity(w * h);
                for y in 0..h {
                    for x in 0..w {
                        out.push(mean_of((0..depth).map(|z| at(x, y, z))) as f32);
                    }
                }
                Ok(Self::from_vec(out, 2, w, h, 1))
            }
        }
    }

    /// Sorts every x row ascending with NaN last. Only the x axis is supported.
    pub fn sort(&self, axis: Axis) -> Result<()> {
        if axis != Axis::X {
            return Err(LaputaError::InvalidDimension {
                dimension: axis.index(),
                dims: self.dims,
            });
        }
        let mut d = write(self.storage()?);
        let w = self.width;
        if w == 0 {
            return Ok(());
        }
        for row in d.chunks_mut(w) {
            sort_row(row);
        }
        Ok(())
    }

    /// Copies the box `[x0, x1) x [y0, y1) x [z0, z1)` into a new block of
    /// the same dimensionality.
    pub fn extract(
        &self,
        (x0, x1): (usize, usize),
        (y0, y1): (usize, usize),
        (z0, z1): (usize, usize),
    ) -> Result<Self> {
        for (start, end, len) in [(x0, x1, self.width), (y0, y1, self.height), (z0, z1, self.depth)] {
            if end <= start || end > len {
                debug_assert!(false, "bad extract range {}..{} of {}", start, end, len);
                return Err(LaputaError::OutOfRange { index: end, len });
            }
        }
        let d = read(self.storage()?);
        let (w, h) = (self.width, self.height);
        let mut out = Vec::with_capacity((x1 - x0) * (y1 - y0) * (z1 - z0));
        for z in z0..z1 {
            for y in y0..y1 {
                let row = (z * h + y) * w;
                out.extend_from_slice(&d[row + x0..row + x1]);
            }
        }
        Ok(Self::from_vec(out, self.dims, x1 - x0, y1 - y0, z1 - z0))
    }

    /// Extracts `[start, end)` along one axis, keeping the others whole.
    pub fn extract_axis(&self, axis: Axis, start: usize, end: usize) -> Result<Self> {
        self.check_dims(axis.index())?;
        let (w, h, d) = (self.width, self.height, self.depth);
        match axis {
            Axis::X => self.extract((start, end), (0, h), (0, d)),
            Axis::Y => self.extract((0, w), (start, end), (0, d)),
            Axis::Z => self.extract((0, w), (0, h), (start, end)),
        }
    }

    /// Keeps the slice of each sorted x row between two percentiles of its
    /// finite samples. Sort the block first.
    pub fn extract_by_percentile(&self, axis: Axis, from: f64, to: f64) -> Result<Self> {
        if axis != Axis::X {
            return Err(LaputaError::InvalidDimension {
                dimension: axis.index(),
                dims: self.dims,
            });
        }
        let (w, h, depth) = (self.width, self.height, self.depth);
        let out_w = ((w as f64) * (to - from) / 100.0).ceil().max(0.0) as usize;
        let mut out = vec![f32::NAN; out_w * h * depth];
        let d = read(self.storage()?);
        for (r, row) in d.chunks(w.max(1)).enumerate().take(h * depth) {
            let n = row.iter().filter(|v| v.is_finite()).count() as f64;
            let first = (from * n / 100.0) as usize;
            let mut i = first;
            while (i as f64) < to * n / 100.0 && i < w && i - first < out_w {
                out[r * out_w + i - first] = row[i];
                i += 1;
            }
        }
        Ok(Self::from_vec(out, self.dims, out_w, h, depth))
    }

    /// For each y, the mean over x and z of the values inside `[lo, hi]`,
    /// with each end open or closed. NaN where nothing qualifies.
    pub fn partial_y_average(&self, lo: f32, hi: f32, include_lo: bool, include_hi: bool) -> Result<Self> {
        let d = read(self.storage()?);
        let (w, h, depth) = (self.width, self.height, self.depth);
        let inside = |v: f32| {
            (v > lo || (v == lo && include_lo)) && (v < hi || (v == hi && include_hi))
        };
        let out = (0..h)
            .map(|y| {
                let vals = (0..depth).flat_map(|z| {
                    let row = (z * h + y) * w;
                    d[row..row + w].iter().copied()
                });
                mean_of(vals.filter(|v| v.is_finite() && inside(*v))) as f32
            })
            .collect();
        Ok(Self::from_vec(out, 1, h, 1, 1))
    }

    /// Transposes a 2-d block when `x_axis` is Y, otherwise shares it.
    pub fn permute2(&self, x_axis: Axis) -> Result<Self> {
        if x_axis == Axis::X {
            return Ok(self.clone());
        }
        let d = read(self.storage()?);
        let (w, h) = (self.width, self.height);
        let mut out = Vec::with_capacity(w * h);
        for x in 0..w {
            for y in 0..h {
                out.push(d[y * w + x]);
            }
        }
        Ok(Self::from_vec(out, 2, h, w, 1))
    }

    /// Reorders the axes of a 3-d block: the new x runs along `x_axis`, and so on.
    pub fn permute3(&self, x_axis: Axis, y_axis: Axis, z_axis: Axis) -> Result<Self> {
        let (a, b, c) = (x_axis.index(), y_axis.index(), z_axis.index());
        if a == b || b == c || a == c {
            return Err(LaputaError::InvalidDimension {
                dimension: a.max(b).max(c),
                dims: self.dims,
            });
        }
        let sizes = [self.width, self.height, self.depth];
        let strides = [1, self.width, self.width * self.height];
        let (w, h, depth) = (sizes[a], sizes[b], sizes[c]);
        let d = read(self.storage()?);
        let mut out = Vec::with_capacity(w * h * depth);
        for k in 0..depth {
            for j in 0..h {
                for i in 0..w {
                    out.push(d[k * strides[c] + j * strides[b] + i * strides[a]]);
                }
            }
        }
        Ok(Self::from_vec(out, 3, w, h, depth))
    }
}

fn read(d: &RwLock<Vec<f32>>) -> RwLockReadGuard<'_, Vec<f32>> {
    d.read().unwrap_or_else(|e| e.into_inner())
}

fn write(d: &RwLock<Vec<f32>>) -> RwLockWriteGuard<'_, Vec<f32>> {
    d.write().unwrap_or_else(|e| e.into_inner())
}

fn mean_of(vals: impl Iterator<Item = f32>) -> f64 {
    let (sum, n) = vals
        .filter(|v| v.is_finite())
        .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
    if n == 0 {
        f64::NAN
    } else {
        sum / n as f64
    }
}

/// Approximate bucket sort around the midpoint of the range, with buckets
/// chosen by squared distance. Falls back to a plain sort for sparse or
/// narrow rows. NaNs go last.
fn sort_row(row: &mut [f32]) {
    let finite: Vec<f32> = row.iter().copied().filter(|v| v.is_finite()).collect();
    let nans = row.len() - finite.len();
    let (min, max) = finite
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let mid = (max + min) * 0.5;
    let half = max - mid;

    let sorted: Vec<f32> = if nans + MIN_BUCKETED_SAMPLES >= row.len() || !(half >= MIN_SPREAD) {
        let mut vals = finite;
        vals.sort_by(f32::total_cmp);
        vals
    } else {
        let scale = SORT_BUCKETS as f64 / (half as f64 * half as f64);
        let mut low = vec![Vec::new(); SORT_BUCKETS + 1];
        let mut high = vec![Vec::new(); SORT_BUCKETS + 1];
        for v in finite {
            let dist = (v - mid) as f64;
            let b = (round_half_up(dist * dist * scale).max(0) as usize).min(SORT_BUCKETS);
            if v >= mid {
                high[b].push(v);
            } else {
                low[b].push(v);
            }
        }
        let mut out = Vec::with_capacity(row.len());
        for bucket in low.iter_mut().rev() {
            bucket.sort_by(f32::total_cmp);
            out.append(bucket);
        }
        for bucket in high.iter_mut() {
            bucket.sort_by(f32::total_cmp);
            out.append(bucket);
        }
        out
    };

    let n = sorted.len();
    row[..n].copy_from_slice(&sorted);
    row[n..].iter_mut().for_each(|v| *v = f32::NAN);
}
