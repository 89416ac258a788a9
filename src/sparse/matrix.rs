//! Distributed sparse matrix (row-wise CSR blocks)
//!
//! Each rank stores its block of rows with *global* column indices.
//! Construction follows the preallocate / insert / assemble cycle:
//!
//! 1. count the nonzeros of each local row, split into columns owned by
//!    this rank (`d_nnz`) and by other ranks (`o_nnz`), see [`Preallocation`]
//! 2. insert values with [`DistMatrix::set_value`], which refuses any entry
//!    beyond the prediction
//! 3. [`DistMatrix::assemble`] (collective) sorts and compresses the rows
//!
//! Operations that need data of other ranks (mat-vec, transpose, mat-mat)
//! are collectives.
use super::{DistVector, Layout};
use crate::error::{Error, Result};
use crate::mpi::{any_rank, Communicator};
use std::collections::BTreeMap;

/// How [`DistMatrix::set_value`] treats an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Overwrite
    Insert,
    /// Accumulate
    Add,
}

/// Predicted number of nonzeros per local row
///
/// `d_nnz`: columns owned by the same rank as the row,
/// `o_nnz`: columns owned by other ranks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preallocation {
    /// Diagonal-block counts
    pub d_nnz: Vec<usize>,
    /// Off-diagonal-block counts
    pub o_nnz: Vec<usize>,
}

impl Preallocation {
    /// Zero counts for `local_rows` rows
    pub fn new(local_rows: usize) -> Self {
        Self {
            d_nnz: vec![0; local_rows],
            o_nnz: vec![0; local_rows],
        }
    }

    /// Count one nonzero in local row `i`
    pub fn count(&mut self, i: usize, col: usize, cols: &Layout) {
        if cols.is_local(col) {
            self.d_nnz[i] += 1;
        } else {
            self.o_nnz[i] += 1;
        }
    }

    /// Predicted nonzeros of local row `i`
    pub fn row_nnz(&self, i: usize) -> usize {
        self.d_nnz[i] + self.o_nnz[i]
    }

    /// Predicted nonzeros of all local rows
    pub fn total(&self) -> usize {
        self.d_nnz.iter().sum::<usize>() + self.o_nnz.iter().sum::<usize>()
    }
}

/// Sparse matrix distributed by rows
#[derive(Debug, Clone)]
pub struct DistMatrix {
    rows: Layout,
    cols: Layout,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    prealloc: Preallocation,
    d_fill: Vec<usize>,
    o_fill: Vec<usize>,
    assembled: bool,
}

impl DistMatrix {
    /// Allocate storage for exactly the predicted nonzeros
    ///
    /// # Errors
    /// Preallocation does not match the local row count
    pub fn with_preallocation(rows: &Layout, cols: &Layout, prealloc: Preallocation) -> Result<Self> {
        let n = rows.local_len();
        if prealloc.d_nnz.len() != n || prealloc.o_nnz.len() != n {
            return Err(Error::SizeMismatch {
                expected: n,
                found: prealloc.d_nnz.len(),
            });
        }
        let mut row_ptr = Vec::with_capacity(n + 1);
        row_ptr.push(0);
        for i in 0..n {
            row_ptr.push(row_ptr[i] + prealloc.row_nnz(i));
        }
        let nnz = row_ptr[n];
        Ok(Self {
            rows: rows.clone(),
            cols: cols.clone(),
            row_ptr,
            col_idx: vec![usize::MAX; nnz],
            values: vec![0.; nnz],
            prealloc,
            d_fill: vec![0; n],
            o_fill: vec![0; n],
            assembled: false,
        })
    }

    /// Build an assembled matrix from the entries of each local row
    ///
    /// Duplicate columns within a row are summed.
    pub fn from_row_entries(rows: &Layout, cols: &Layout, entries: Vec<Vec<(usize, f64)>>) -> Self {
        let n = rows.local_len();
        debug_assert!(entries.len() == n);
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        let mut prealloc = Preallocation::new(n);
        row_ptr.push(0);
        for (i, mut row) in entries.into_iter().enumerate() {
            row.sort_by_key(|&(c, _)| c);
            let mut last: Option<usize> = None;
            for (c, v) in row {
                if last == Some(c) {
                    if let Some(x) = values.last_mut() {
                        *x += v;
                    }
                } else {
                    col_idx.push(c);
                    values.push(v);
                    prealloc.count(i, c, cols);
                    last = Some(c);
                }
            }
            row_ptr.push(col_idx.len());
        }
        let d_fill = prealloc.d_nnz.clone();
        let o_fill = prealloc.o_nnz.clone();
        Self {
            rows: rows.clone(),
            cols: cols.clone(),
            row_ptr,
            col_idx,
            values,
            prealloc,
            d_fill,
            o_fill,
            assembled: true,
        }
    }

    /// Row distribution
    pub fn rows(&self) -> &Layout {
        &self.rows
    }

    /// Column distribution (decides the diagonal / off-diagonal split)
    pub fn cols(&self) -> &Layout {
        &self.cols
    }

    /// True after [`DistMatrix::assemble`]
    pub fn is_assembled(&self) -> bool {
        self.assembled
    }

    /// Predicted nonzero counts
    pub fn preallocation(&self) -> &Preallocation {
        &self.prealloc
    }

    /// Number of entries inserted into local row `i`
    pub fn row_fill(&self, i: usize) -> usize {
        self.d_fill[i] + self.o_fill[i]
    }

    /// Insert or add a single value
    ///
    /// # Errors
    /// - row not owned by this rank
    /// - column out of range
    /// - entry would exceed the predicted nonzeros of the row
    pub fn set_value(&mut self, row: usize, col: usize, value: f64, mode: InsertMode) -> Result<()> {
        if !self.rows.is_local(row) {
            return Err(Error::RemoteRow {
                row,
                rank: self.rows.rank(),
            });
        }
        if col >= self.cols.global_len() {
            return Err(Error::ColumnOutOfRange {
                col,
                size: self.cols.global_len(),
            });
        }
        let i = row - self.rows.start();
        let start = self.row_ptr[i];
        let filled = start + self.row_fill(i);
        if let Some(k) = self.col_idx[start..filled].iter().position(|&c| c == col) {
            match mode {
                InsertMode::Insert => self.values[start + k] = value,
                InsertMode::Add => self.values[start + k] += value,
            }
            return Ok(());
        }
        let is_diag = self.cols.is_local(col);
        let (fill, cap) = if is_diag {
            (self.d_fill[i], self.prealloc.d_nnz[i])
        } else {
            (self.o_fill[i], self.prealloc.o_nnz[i])
        };
        if self.assembled || fill >= cap {
            return Err(Error::PreallocationExceeded { row, col });
        }
        self.col_idx[filled] = col;
        self.values[filled] = value;
        if is_diag {
            self.d_fill[i] += 1;
        } else {
            self.o_fill[i] += 1;
        }
        Ok(())
    }

    /// Insert or add several values of one row
    ///
    /// # Errors
    /// See [`DistMatrix::set_value`]
    pub fn set_values(&mut self, row: usize, cols: &[usize], values: &[f64], mode: InsertMode) -> Result<()> {
        for (&c, &v) in cols.iter().zip(values.iter()) {
            self.set_value(row, c, v, mode)?;
        }
        Ok(())
    }

    /// Check that every local row holds exactly its predicted entries
    ///
    /// # Errors
    /// First row whose fill differs from its prediction
    pub fn check_filled(&self) -> Result<()> {
        for i in 0..self.rows.local_len() {
            let predicted = self.prealloc.row_nnz(i);
            let inserted = self.row_fill(i);
            if predicted != inserted {
                return Err(Error::StructureMismatch {
                    row: i + self.rows.start(),
                    predicted,
                    inserted,
                });
            }
        }
        Ok(())
    }

    /// Sort rows and drop unused slots (collective)
    ///
    /// # Errors
    /// Assembly failed on another rank
    pub fn assemble(&mut self, comm: &dyn Communicator) -> Result<()> {
        self.compress();
        if any_rank(comm, false) {
            return Err(Error::RemoteAssembly);
        }
        Ok(())
    }

    /// Like [`DistMatrix::assemble`], but every row must be filled exactly
    /// to its prediction on every rank (collective)
    ///
    /// # Errors
    /// Local structure mismatch, or a mismatch on another rank
    pub fn assemble_exact(&mut self, comm: &dyn Communicator) -> Result<()> {
        let local = self.check_filled();
        let failed = any_rank(comm, local.is_err());
        local?;
        if failed {
            return Err(Error::RemoteAssembly);
        }
        self.compress();
        Ok(())
    }

    fn compress(&mut self) {
        let n = self.rows.local_len();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(self.col_idx.len());
        let mut values = Vec::with_capacity(self.values.len());
        row_ptr.push(0);
        for i in 0..n {
            let start = self.row_ptr[i];
            let filled = start + self.row_fill(i);
            let mut row: Vec<(usize, f64)> = self.col_idx[start..filled]
                .iter()
                .copied()
                .zip(self.values[start..filled].iter().copied())
                .collect();
            row.sort_by_key(|&(c, _)| c);
            for (c, v) in row {
                col_idx.push(c);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.values = values;
        self.prealloc = Preallocation {
            d_nnz: self.d_fill.clone(),
            o_nnz: self.o_fill.clone(),
        };
        self.assembled = true;
    }

    /// Column indices and values of local row `i`
    pub fn row(&self, i: usize) -> (&[usize], &[f64]) {
        let start = self.row_ptr[i];
        let end = start + self.row_fill(i);
        (&self.col_idx[start..end], &self.values[start..end])
    }

    /// Entry (row, col), `None` if row is remote or entry is not stored
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if !self.rows.is_local(row) {
            return None;
        }
        let (cols, vals) = self.row(row - self.rows.start());
        cols.iter().position(|&c| c == col).map(|k| vals[k])
    }

    /// Stored entries on this rank
    pub fn local_nnz(&self) -> usize {
        (0..self.rows.local_len()).map(|i| self.row_fill(i)).sum()
    }

    /// Stored entries on all ranks (collective)
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn global_nnz(&self, comm: &dyn Communicator) -> usize {
        comm.all_reduce_sum(self.local_nnz() as f64).round() as usize
    }

    /// All local entries as (row, col, value), global indices
    pub fn triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::with_capacity(self.local_nnz());
        for i in 0..self.rows.local_len() {
            let (cols, vals) = self.row(i);
            for (&c, &v) in cols.iter().zip(vals) {
                out.push((i + self.rows.start(), c, v));
            }
        }
        out
    }

    /// Transpose (collective)
    ///
    /// Every rank publishes its entries, each rank keeps those whose column
    /// it owns. Stored zeros are kept, so the sparsity pattern is preserved.
    pub fn transpose(&self, comm: &dyn Communicator) -> Self {
        let triplets = self.triplets();
        let r: Vec<usize> = triplets.iter().map(|t| t.0).collect();
        let c: Vec<usize> = triplets.iter().map(|t| t.1).collect();
        let v: Vec<f64> = triplets.iter().map(|t| t.2).collect();
        let r = comm.all_gather_usize(&r);
        let c = comm.all_gather_usize(&c);
        let v = comm.all_gather_f64(&v);

        let rows = self.cols.clone();
        let cols = self.rows.clone();
        let mut entries = vec![Vec::new(); rows.local_len()];
        for ((&row, &col), &val) in r.iter().zip(c.iter()).zip(v.iter()) {
            if rows.is_local(col) {
                entries[col - rows.start()].push((row, val));
            }
        }
        Self::from_row_entries(&rows, &cols, entries)
    }

    /// Scale rows by `left` and columns by `right` (collective if `right`)
    ///
    /// # Errors
    /// Scaling vector does not match the matrix layout
    pub fn diagonal_scale(
        &mut self,
        comm: &dyn Communicator,
        left: Option<&DistVector>,
        right: Option<&DistVector>,
    ) -> Result<()> {
        if let Some(l) = left {
            if l.layout.global_len() != self.rows.global_len() {
                return Err(Error::SizeMismatch {
                    expected: self.rows.global_len(),
                    found: l.layout.global_len(),
                });
            }
            for i in 0..self.rows.local_len() {
                let s = l.v[i];
                let start = self.row_ptr[i];
                let end = start + self.row_fill(i);
                for x in &mut self.values[start..end] {
                    *x *= s;
                }
            }
        }
        if let Some(r) = right {
            if r.layout.global_len() != self.cols.global_len() {
                return Err(Error::SizeMismatch {
                    expected: self.cols.global_len(),
                    found: r.layout.global_len(),
                });
            }
            let rg = r.gather_all(comm);
            for i in 0..self.rows.local_len() {
                let start = self.row_ptr[i];
                let end = start + self.row_fill(i);
                for k in start..end {
                    self.values[k] *= rg[self.col_idx[k]];
                }
            }
        }
        Ok(())
    }

    /// Multiply all values by `a`
    pub fn scale(&mut self, a: f64) {
        for x in &mut self.values {
            *x *= a;
        }
    }

    /// Add `a` to every diagonal entry
    ///
    /// # Errors
    /// A local row has no stored diagonal entry
    pub fn shift_diagonal(&mut self, a: f64) -> Result<()> {
        for i in 0..self.rows.local_len() {
            let row = i + self.rows.start();
            let start = self.row_ptr[i];
            let end = start + self.row_fill(i);
            let k = self.col_idx[start..end]
                .iter()
                .position(|&c| c == row)
                .ok_or(Error::MissingDiagonal(row))?;
            self.values[start + k] += a;
        }
        Ok(())
    }

    /// Diagonal entries (zero where not stored)
    pub fn diagonal(&self) -> DistVector {
        let mut d = DistVector::zeros(&self.rows);
        for i in 0..self.rows.local_len() {
            let row = i + self.rows.start();
            let (cols, vals) = self.row(i);
            if let Some(k) = cols.iter().position(|&c| c == row) {
                d.v[i] = vals[k];
            }
        }
        d
    }

    /// Replace the given rows and columns by those of the identity scaled
    /// with `diag`. Every rank must pass the same list.
    ///
    /// # Errors
    /// A listed local row has no stored diagonal entry
    pub fn zero_rows_columns(&mut self, rows: &[usize], diag: f64) -> Result<()> {
        for i in 0..self.rows.local_len() {
            let row = i + self.rows.start();
            let zero_row = rows.contains(&row);
            let start = self.row_ptr[i];
            let end = start + self.row_fill(i);
            let mut has_diag = false;
            for k in start..end {
                let col = self.col_idx[k];
                if zero_row && col == row {
                    self.values[k] = diag;
                    has_diag = true;
                } else if zero_row || rows.contains(&col) {
                    self.values[k] = 0.;
                }
            }
            if zero_row && !has_diag {
                return Err(Error::MissingDiagonal(row));
            }
        }
        Ok(())
    }

    /// y = A x (collective)
    ///
    /// # Errors
    /// Layout of `x` does not match the columns
    pub fn mat_vec(&self, comm: &dyn Communicator, x: &DistVector) -> Result<DistVector> {
        let mut y = DistVector::zeros(&self.rows);
        self.mat_vec_into(comm, x, &mut y)?;
        Ok(y)
    }

    /// y = A x into an existing vector (collective)
    ///
    /// # Errors
    /// Layouts of `x` or `y` do not match
    pub fn mat_vec_into(&self, comm: &dyn Communicator, x: &DistVector, y: &mut DistVector) -> Result<()> {
        if x.layout.global_len() != self.cols.global_len() {
            return Err(Error::SizeMismatch {
                expected: self.cols.global_len(),
                found: x.layout.global_len(),
            });
        }
        if y.v.len() != self.rows.local_len() {
            return Err(Error::SizeMismatch {
                expected: self.rows.local_len(),
                found: y.v.len(),
            });
        }
        let xg = x.gather_all(comm);
        for i in 0..self.rows.local_len() {
            let (cols, vals) = self.row(i);
            y.v[i] = cols.iter().zip(vals).map(|(&c, &a)| a * xg[c]).sum();
        }
        Ok(())
    }

    /// C = A B (collective)
    ///
    /// All ranks replicate `B`, then each rank forms its own rows of `C`.
    ///
    /// # Errors
    /// Inner dimensions disagree
    pub fn mat_mat(&self, comm: &dyn Communicator, b: &Self) -> Result<Self> {
        if self.cols.global_len() != b.rows.global_len() {
            return Err(Error::SizeMismatch {
                expected: self.cols.global_len(),
                found: b.rows.global_len(),
            });
        }
        // replicate b
        let lens: Vec<usize> = (0..b.rows.local_len()).map(|i| b.row_fill(i)).collect();
        let triplets = b.triplets();
        let b_cols: Vec<usize> = triplets.iter().map(|t| t.1).collect();
        let b_vals: Vec<f64> = triplets.iter().map(|t| t.2).collect();
        let lens = comm.all_gather_usize(&lens);
        let b_cols = comm.all_gather_usize(&b_cols);
        let b_vals = comm.all_gather_f64(&b_vals);
        let mut b_ptr = Vec::with_capacity(lens.len() + 1);
        b_ptr.push(0);
        for l in &lens {
            b_ptr.push(b_ptr[b_ptr.len() - 1] + l);
        }

        let mut entries = Vec::with_capacity(self.rows.local_len());
        for i in 0..self.rows.local_len() {
            let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
            let (cols, vals) = self.row(i);
            for (&k, &a) in cols.iter().zip(vals) {
                for m in b_ptr[k]..b_ptr[k + 1] {
                    *acc.entry(b_cols[m]).or_insert(0.) += a * b_vals[m];
                }
            }
            entries.push(acc.into_iter().collect());
        }
        Ok(Self::from_row_entries(&self.rows, &b.cols, entries))
    }
}

/// Two-pass construction from one enumeration routine (collective)
///
/// `enumerate(i, emit)` must call `emit(col, value)` for every nonzero of
/// local row `i`. It runs twice: the first pass only counts, the second
/// inserts. Both passes see exactly the same entries, so the prediction can
/// only be violated by a non-deterministic `enumerate`, which is caught by
/// the exact assembly.
///
/// # Errors
/// Insertion or exact assembly failed
///
/// # Example
///```
/// use rustibm::mpi::Serial;
/// use rustibm::sparse::{assemble_two_pass, Layout};
/// let layout = Layout::from_counts(&[3], 0);
/// let a = assemble_two_pass(&Serial, &layout, &layout, |i, emit| {
///     emit(i, 2.);
///     if i > 0 {
///         emit(i - 1, -1.);
///     }
/// })
/// .unwrap();
/// assert_eq!(a.get(2, 1), Some(-1.));
/// assert_eq!(a.local_nnz(), 5);
///```
pub fn assemble_two_pass<F>(comm: &dyn Communicator, rows: &Layout, cols: &Layout, enumerate: F) -> Result<DistMatrix>
where
    F: Fn(usize, &mut dyn FnMut(usize, f64)),
{
    let n = rows.local_len();
    let mut prealloc = Preallocation::new(n);
    for i in 0..n {
        enumerate(i, &mut |col, _| prealloc.count(i, col, cols));
    }
    let mut mat = DistMatrix::with_preallocation(rows, cols, prealloc)?;
    let mut status = Ok(());
    for i in 0..n {
        let row = i + rows.start();
        enumerate(i, &mut |col, value| {
            if status.is_ok() {
                status = mat.set_value(row, col, value, InsertMode::Insert);
            }
        });
    }
    // keep ranks in step even if this one failed
    let failed = any_rank(comm, status.is_err());
    status?;
    if failed {
        return Err(Error::RemoteAssembly);
    }
    mat.assemble_exact(comm)?;
    Ok(mat)
}
