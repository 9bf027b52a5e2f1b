//! Block decomposition of a structured grid over a 3-D process grid.
//!
//! The global `nx × ny × nz` grid is cut into `npx × npy × npz` contiguous
//! blocks, one per rank. Along each axis the cells are split as evenly as
//! possible; the first `n % parts` process coordinates receive one extra
//! cell. Ranks are laid out with z fastest, `rank = (cx*npy + cy)*npz + cz`.
//!
//! The process-grid shape is chosen deterministically: among all ordered
//! factorizations of the process count that give every rank at least one
//! cell per axis, the one with the smallest total cut surface wins; ties go
//! to the most balanced triple, then to the lexicographically smallest.

use crate::config::GridSize;
use crate::domain::face::{Face, FaceSet};
use crate::error::KError;

/// This rank's view of the decomposition: local extents, global offset and
/// the rank owning the block across each face.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDecomposition {
    global: [usize; 3],
    procs: [usize; 3],
    coords: [usize; 3],
    local: [usize; 3],
    offset: [usize; 3],
    neighbors: [Option<usize>; 6],
    rank: usize,
}

/// Length and starting offset of block `coord` when `n` cells are split into `parts`.
pub fn split_axis(n: usize, parts: usize, coord: usize) -> (usize, usize) {
    let base = n / parts;
    let rem = n % parts;
    let len = base + usize::from(coord < rem);
    let offset = coord * base + coord.min(rem);
    (len, offset)
}

/// Factor `nprocs` into a process grid `[npx, npy, npz]` for `grid`.
pub fn factor_process_grid(grid: &GridSize, nprocs: usize) -> Result<[usize; 3], KError> {
    if nprocs == 0 {
        return Err(KError::Config("process count must be positive".into()));
    }
    let [nx, ny, nz] = grid.dims();
    let mut best: Option<([usize; 3], (usize, usize))> = None;
    for px in (1..=nprocs).filter(|d| nprocs % d == 0) {
        let rest = nprocs / px;
        for py in (1..=rest).filter(|d| rest % d == 0) {
            let pz = rest / py;
            if px > nx || py > ny || pz > nz {
                continue;
            }
            let surface = ny * nz * (px - 1) + nx * nz * (py - 1) + nx * ny * (pz - 1);
            let key = (surface, px.max(py).max(pz));
            // candidates arrive in lexicographic order, so strict < keeps the smallest triple on ties
            if best.is_none_or(|(_, k)| key < k) {
                best = Some(([px, py, pz], key));
            }
        }
    }
    best.map(|(p, _)| p).ok_or_else(|| {
        KError::Config(format!(
            "cannot distribute a [{nx} x {ny} x {nz}] grid over {nprocs} processes with at least one cell per process and axis"
        ))
    })
}

impl DomainDecomposition {
    /// Decomposition of `grid` over `nprocs` processes as seen by `rank`.
    pub fn new(grid: GridSize, nprocs: usize, rank: usize) -> Result<Self, KError> {
        grid.validate()?;
        let procs = factor_process_grid(&grid, nprocs)?;
        Self::with_process_grid(grid, procs, rank)
    }

    /// Decomposition over an explicit process grid.
    pub fn with_process_grid(grid: GridSize, procs: [usize; 3], rank: usize) -> Result<Self, KError> {
        grid.validate()?;
        let global = grid.dims();
        let nprocs: usize = procs.iter().product();
        if nprocs == 0 {
            return Err(KError::Config(format!("invalid process grid {procs:?}")));
        }
        if rank >= nprocs {
            return Err(KError::Config(format!("rank {rank} outside a process grid of {nprocs}")));
        }
        for axis in 0..3 {
            if procs[axis] > global[axis] {
                return Err(KError::Config(format!(
                    "axis {axis} has {} cells for {} processes; every process needs at least one",
                    global[axis], procs[axis]
                )));
            }
        }
        let coords = coords_in(procs, rank);
        let mut local = [0; 3];
        let mut offset = [0; 3];
        for axis in 0..3 {
            (local[axis], offset[axis]) = split_axis(global[axis], procs[axis], coords[axis]);
        }
        let mut neighbors = [None; 6];
        for face in Face::ALL {
            let axis = face.axis();
            let mut c = coords;
            if face.is_upper() {
                if c[axis] + 1 >= procs[axis] {
                    continue;
                }
                c[axis] += 1;
            } else {
                if c[axis] == 0 {
                    continue;
                }
                c[axis] -= 1;
            }
            neighbors[face.index()] = Some(rank_in(procs, c));
        }
        Ok(Self { global, procs, coords, local, offset, neighbors, rank })
    }

    /// Single-process decomposition covering the whole grid.
    pub fn serial(grid: GridSize) -> Result<Self, KError> {
        Self::with_process_grid(grid, [1, 1, 1], 0)
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn nprocs(&self) -> usize {
        self.procs.iter().product()
    }

    pub fn global_dims(&self) -> [usize; 3] {
        self.global
    }

    pub fn grid(&self) -> GridSize {
        GridSize { nx: self.global[0], ny: self.global[1], nz: self.global[2] }
    }

    pub fn process_dims(&self) -> [usize; 3] {
        self.procs
    }

    pub fn process_coords(&self) -> [usize; 3] {
        self.coords
    }

    /// `[nx_loc, ny_loc, nz_loc]`.
    pub fn local_dims(&self) -> [usize; 3] {
        self.local
    }

    /// Global coordinate of local cell `(0, 0, 0)`.
    pub fn offset(&self) -> [usize; 3] {
        self.offset
    }

    /// Number of owned cells.
    pub fn local_len(&self) -> usize {
        self.local.iter().product()
    }

    /// Rank across `face`, or `None` on the global boundary.
    pub fn neighbor(&self, face: Face) -> Option<usize> {
        self.neighbors[face.index()]
    }

    /// Faces of this block that lie on the global boundary.
    pub fn boundary_faces(&self) -> FaceSet {
        Face::ALL
            .into_iter()
            .filter(|f| self.neighbor(*f).is_none())
            .fold(FaceSet::empty(), |acc, f| acc | f.flag())
    }

    /// Linear storage index of local cell `(i, j, k)`, x fastest.
    #[inline]
    pub fn local_index(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.local[0] && j < self.local[1] && k < self.local[2]);
        (k * self.local[1] + j) * self.local[0] + i
    }

    /// Inverse of `local_index`.
    pub fn local_coords(&self, idx: usize) -> [usize; 3] {
        let [nx, ny, _] = self.local;
        [idx % nx, (idx / nx) % ny, idx / (nx * ny)]
    }

    pub fn local_to_global(&self, [i, j, k]: [usize; 3]) -> [usize; 3] {
        [self.offset[0] + i, self.offset[1] + j, self.offset[2] + k]
    }

    /// Local coordinates of global cell `g`, or `None` if another rank owns it.
    pub fn global_to_local(&self, g: [usize; 3]) -> Option<[usize; 3]> {
        let mut l = [0; 3];
        for axis in 0..3 {
            let rel = g[axis].checked_sub(self.offset[axis])?;
            if rel >= self.local[axis] {
                return None;
            }
            l[axis] = rel;
        }
        Some(l)
    }

    /// Physical coordinates on the unit cube of local cell `idx`.
    pub fn coordinates(&self, idx: usize) -> [f64; 3] {
        let g = self.local_to_global(self.local_coords(idx));
        let h = self.grid().spacing();
        [g[0] as f64 * h[0], g[1] as f64 * h[1], g[2] as f64 * h[2]]
    }

    /// Row-major index of global cell `g` in the full grid.
    pub fn global_index(&self, [gi, gj, gk]: [usize; 3]) -> usize {
        (gk * self.global[1] + gj) * self.global[0] + gi
    }

    pub fn rank_of(&self, coords: [usize; 3]) -> usize {
        rank_in(self.procs, coords)
    }

    pub fn coords_of(&self, rank: usize) -> [usize; 3] {
        coords_in(self.procs, rank)
    }

    /// The decomposition as seen by another rank of the same process grid.
    pub fn for_rank(&self, rank: usize) -> Result<Self, KError> {
        Self::with_process_grid(self.grid(), self.procs, rank)
    }
}

fn rank_in(procs: [usize; 3], [cx, cy, cz]: [usize; 3]) -> usize {
    (cx * procs[1] + cy) * procs[2] + cz
}

fn coords_in(procs: [usize; 3], rank: usize) -> [usize; 3] {
    let cz = rank % procs[2];
    let cy = (rank / procs[2]) % procs[1];
    let cx = rank / (procs[1] * procs[2]);
    [cx, cy, cz]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(nx: usize, ny: usize, nz: usize) -> GridSize {
        GridSize::new(nx, ny, nz).unwrap()
    }

    #[test]
    fn split_gives_remainder_to_first_blocks() {
        let parts: Vec<_> = (0..3).map(|c| split_axis(10, 3, c)).collect();
        assert_eq!(parts, vec![(4, 0), (3, 4), (3, 7)]);
        assert_eq!(split_axis(7, 1, 0), (7, 0));
    }

    #[test]
    fn factoring_prefers_small_cut_surface() {
        assert_eq!(factor_process_grid(&grid(16, 16, 16), 1).unwrap(), [1, 1, 1]);
        assert_eq!(factor_process_grid(&grid(16, 16, 16), 8).unwrap(), [2, 2, 2]);
        // long x axis: cut across x only
        assert_eq!(factor_process_grid(&grid(64, 4, 4), 4).unwrap(), [4, 1, 1]);
        // prime count on a cube: lexicographic tie-break
        assert_eq!(factor_process_grid(&grid(8, 8, 8), 3).unwrap(), [1, 1, 3]);
    }

    #[test]
    fn factoring_rejects_impossible_counts() {
        assert!(matches!(factor_process_grid(&grid(3, 3, 3), 0), Err(KError::Config(_))));
        // 29 is prime and larger than every axis
        assert!(matches!(factor_process_grid(&grid(5, 5, 5), 29), Err(KError::Config(_))));
        assert!(DomainDecomposition::new(grid(4, 4, 4), 2, 2).is_err());
    }

    #[test]
    fn index_mapping_round_trips() {
        let d = DomainDecomposition::with_process_grid(grid(7, 6, 5), [2, 2, 1], 3).unwrap();
        assert_eq!(d.process_coords(), [1, 1, 0]);
        assert_eq!(d.local_dims(), [3, 3, 5]);
        assert_eq!(d.offset(), [4, 3, 0]);
        let idx = d.local_index(2, 1, 4);
        assert_eq!(idx, 4 * 9 + 1 * 3 + 2);
        assert_eq!(d.local_coords(idx), [2, 1, 4]);
        assert_eq!(d.local_to_global([2, 1, 4]), [6, 4, 4]);
        assert_eq!(d.global_to_local([6, 4, 4]), Some([2, 1, 4]));
        assert_eq!(d.global_to_local([3, 4, 4]), None);
        assert_eq!(d.global_to_local([6, 6, 4]), None);
    }

    #[test]
    fn neighbors_follow_process_grid() {
        let d = DomainDecomposition::with_process_grid(grid(9, 9, 9), [3, 1, 2], 2).unwrap();
        assert_eq!(d.process_coords(), [1, 0, 0]);
        assert_eq!(d.neighbor(Face::XMinus), Some(0));
        assert_eq!(d.neighbor(Face::XPlus), Some(4));
        assert_eq!(d.neighbor(Face::YMinus), None);
        assert_eq!(d.neighbor(Face::YPlus), None);
        assert_eq!(d.neighbor(Face::ZMinus), None);
        assert_eq!(d.neighbor(Face::ZPlus), Some(3));
        assert_eq!(d.boundary_faces(), FaceSet::Y_AXIS | FaceSet::Z_MINUS);
    }

    #[test]
    fn serial_owns_everything() {
        let d = DomainDecomposition::serial(grid(3, 4, 5)).unwrap();
        assert_eq!(d.local_dims(), [3, 4, 5]);
        assert_eq!(d.offset(), [0, 0, 0]);
        assert_eq!(d.local_len(), 60);
        assert_eq!(d.boundary_faces(), FaceSet::all());
    }
}
