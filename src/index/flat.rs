use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Result, StoreError};
use crate::linalg::{squared_l2, validate_vector};
use crate::types::{Neighbor, VectorIndex};

const HEADER_SIZE: usize = 4 + 8;

/// Exact L2 index over rows stored back to back in one `Vec<f32>`.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatL2Index {
    dim: usize,
    rows: usize,
    values: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            rows: 0,
            values: Vec::new(),
        }
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dim;
        &self.values[start..start + self.dim]
    }

    /// Serialises as `dim: u32 | rows: u64 | rows * dim f32`, all little endian.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let dim: u32 = self
            .dim
            .try_into()
            .map_err(|_| StoreError::corrupt("index dim does not fit u32"))?;
        let mut out = Vec::with_capacity(HEADER_SIZE + self.values.len() * 4);
        out.extend_from_slice(&dim.to_le_bytes());
        out.extend_from_slice(&(self.rows as u64).to_le_bytes());
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        Ok(out)
    }

    pub fn decode(input: &[u8]) -> Result<Self> {
        if input.len() < HEADER_SIZE {
            return Err(StoreError::corrupt("index blob too small"));
        }
        let (header, body) = input.split_at(HEADER_SIZE);
        let mut dim_bytes = [0u8; 4];
        dim_bytes.copy_from_slice(&header[0..4]);
        let mut rows_bytes = [0u8; 8];
        rows_bytes.copy_from_slice(&header[4..12]);
        let dim = u32::from_le_bytes(dim_bytes) as usize;
        let rows = usize::try_from(u64::from_le_bytes(rows_bytes))
            .map_err(|_| StoreError::corrupt("index row count does not fit usize"))?;

        let expected = rows
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| StoreError::corrupt("index size overflow"))?;
        if body.len() != expected {
            return Err(StoreError::corrupt(format!(
                "index body is {} bytes, header implies {expected}",
                body.len()
            )));
        }
        let values: Vec<f32> = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if let Some(at) = values.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::corrupt(format!(
                "index row {} holds a non-finite value",
                at / dim.max(1)
            )));
        }
        Ok(Self { dim, rows, values })
    }
}

fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.position.cmp(&b.position))
}

/// Max-heap entry: the top of the heap is the worst candidate kept so far.
struct Ranked(Neighbor);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        rank(&self.0, &other.0).is_eq()
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        rank(&self.0, &other.0)
    }
}

impl VectorIndex for FlatL2Index {
    fn dim(&self) -> usize {
        self.dim
    }

    fn len(&self) -> usize {
        self.rows
    }

    fn append(&mut self, vector: &[f32]) -> Result<usize> {
        validate_vector(self.dim, vector)?;
        self.values.extend_from_slice(vector);
        self.rows += 1;
        Ok(self.rows - 1)
    }

    fn remove_rows(&mut self, positions: &[usize]) -> Result<()> {
        if let Some(&bad) = positions.iter().find(|&&p| p >= self.rows) {
            return Err(StoreError::PositionOutOfRange {
                position: bad,
                len: self.rows,
            });
        }
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        if positions.is_empty() {
            return Ok(());
        }

        let mut removed = positions.iter().copied().peekable();
        let mut write = 0usize;
        for read in 0..self.rows {
            if removed.peek() == Some(&read) {
                removed.next();
                continue;
            }
            if write != read {
                let src = read * self.dim;
                self.values.copy_within(src..src + self.dim, write * self.dim);
            }
            write += 1;
        }
        self.rows = write;
        self.values.truncate(write * self.dim);
        Ok(())
    }

    fn reconstruct(&self, position: usize) -> Option<&[f32]> {
        (position < self.rows).then(|| self.row(position))
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        validate_vector(self.dim, query)?;
        if k == 0 || self.rows == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(k.min(self.rows));
        for position in 0..self.rows {
            let n = Neighbor {
                position,
                distance: squared_l2(query, self.row(position)),
            };
            if heap.len() < k {
                heap.push(Ranked(n));
                continue;
            }
            let replace = heap
                .peek()
                .map(|worst| rank(&n, &worst.0).is_lt())
                .unwrap_or(true);
            if replace {
                let _ = heap.pop();
                heap.push(Ranked(n));
            }
        }
        let mut out: Vec<Neighbor> = heap.into_iter().map(|entry| entry.0).collect();
        out.sort_by(rank);
        Ok(out)
    }
}
