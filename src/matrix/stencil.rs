//! Matrix-free 7-point stencil operator.
//!
//! The operator is the constant-coefficient cross stencil
//!
//! ```text
//! (A u)[i,j,k] = c·u[i,j,k] + w·u[i-1,j,k] + e·u[i+1,j,k]
//!                           + s·u[i,j-1,k] + n·u[i,j+1,k]
//!                           + b·u[i,j,k-1] + t·u[i,j,k+1]
//! ```
//!
//! on this rank's block of the grid. Neighbor values come from the local
//! slice, from a ghost layer received from the rank across that face, or
//! are zero on the global boundary (Dirichlet data is folded into the
//! right-hand side by the caller).
//!
//! Ghost layers are stored face-plane by face-plane with the first in-plane
//! axis fastest: `(j, k)` for x-faces, `(i, k)` for y-faces, `(i, j)` for
//! z-faces.

use log::trace;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::config::GridSize;
use crate::core::traits::DistributedOperator;
use crate::domain::{DomainDecomposition, Face};
use crate::error::KError;
use crate::parallel::Comm;

/// The seven stencil weights. `e/w` act along x, `n/s` along y, `t/b` along z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StencilCoefficients {
    pub value_c: f64,
    pub value_n: f64,
    pub value_e: f64,
    pub value_s: f64,
    pub value_w: f64,
    pub value_t: f64,
    pub value_b: f64,
}

impl StencilCoefficients {
    /// Second-order Laplacian `-Δ` with spacing `1/(n-1)` per axis.
    pub fn laplace(grid: &GridSize) -> Self {
        let [dx, dy, dz] = grid.spacing();
        Self {
            value_c: 2.0 / (dx * dx) + 2.0 / (dy * dy) + 2.0 / (dz * dz),
            value_n: -1.0 / (dy * dy),
            value_e: -1.0 / (dx * dx),
            value_s: -1.0 / (dy * dy),
            value_w: -1.0 / (dx * dx),
            value_t: -1.0 / (dz * dz),
            value_b: -1.0 / (dz * dz),
        }
    }

    /// Weight of the neighbor across `face`.
    pub fn face(&self, face: Face) -> f64 {
        match face {
            Face::XMinus => self.value_w,
            Face::XPlus => self.value_e,
            Face::YMinus => self.value_s,
            Face::YPlus => self.value_n,
            Face::ZMinus => self.value_b,
            Face::ZPlus => self.value_t,
        }
    }

    /// Ellipticity: positive center, negative off-diagonals, pairwise symmetric.
    pub fn validate(&self) -> Result<(), KError> {
        if !(self.value_c > 0.0 && self.value_c.is_finite()) {
            return Err(KError::Config(format!("center coefficient must be positive, got {}", self.value_c)));
        }
        for face in Face::ALL {
            let v = self.face(face);
            if !(v < 0.0 && v.is_finite()) {
                return Err(KError::Config(format!("coefficient on face {face} must be negative, got {v}")));
            }
        }
        if self.value_e != self.value_w || self.value_n != self.value_s || self.value_t != self.value_b {
            return Err(KError::Config("opposite face coefficients differ; operator would not be symmetric".into()));
        }
        Ok(())
    }
}

/// Ghost layers received for one application; empty where there is no neighbor.
struct Halo {
    layers: [Vec<f64>; 6],
}

impl Halo {
    #[inline]
    fn get(&self, face: Face, pos: usize) -> f64 {
        self.layers[face.index()].get(pos).copied().unwrap_or(0.0)
    }
}

/// Constant-coefficient 7-point operator on a decomposed grid.
#[derive(Debug, Clone)]
pub struct StencilOperator {
    decomp: DomainDecomposition,
    coeffs: StencilCoefficients,
}

impl StencilOperator {
    pub fn new(decomp: DomainDecomposition, coeffs: StencilCoefficients) -> Result<Self, KError> {
        coeffs.validate()?;
        log::debug!(
            "stencil on rank {}: local {:?}, c = {:.6e}, e/w = {:.6e}, n/s = {:.6e}, t/b = {:.6e}",
            decomp.rank(),
            decomp.local_dims(),
            coeffs.value_c,
            coeffs.value_e,
            coeffs.value_n,
            coeffs.value_t
        );
        Ok(Self { decomp, coeffs })
    }

    /// 3-D Laplacian on the grid of `decomp`.
    pub fn laplace(decomp: DomainDecomposition) -> Self {
        let coeffs = StencilCoefficients::laplace(&decomp.grid());
        Self { decomp, coeffs }
    }

    pub fn decomposition(&self) -> &DomainDecomposition {
        &self.decomp
    }

    pub fn coefficients(&self) -> &StencilCoefficients {
        &self.coeffs
    }

    pub fn value_c(&self) -> f64 {
        self.coeffs.value_c
    }

    pub fn value_b(&self) -> f64 {
        self.coeffs.value_b
    }

    /// Linear index of local cell `(i, j, k)`.
    #[inline]
    pub fn index_c(&self, i: usize, j: usize, k: usize) -> usize {
        self.decomp.local_index(i, j, k)
    }

    /// Number of values in the ghost layer across `face`.
    pub fn layer_len(&self, face: Face) -> usize {
        let [nx, ny, nz] = self.decomp.local_dims();
        match face.axis() {
            0 => ny * nz,
            1 => nx * nz,
            _ => nx * ny,
        }
    }

    /// Copy this rank's outermost layer on `face` out of `x`.
    pub fn pack_layer(&self, face: Face, x: &[f64]) -> Vec<f64> {
        let [nx, ny, nz] = self.decomp.local_dims();
        let d = &self.decomp;
        let mut out = Vec::with_capacity(self.layer_len(face));
        match face {
            Face::XMinus | Face::XPlus => {
                let i = if face.is_upper() { nx - 1 } else { 0 };
                for k in 0..nz {
                    for j in 0..ny {
                        out.push(x[d.local_index(i, j, k)]);
                    }
                }
            }
            Face::YMinus | Face::YPlus => {
                let j = if face.is_upper() { ny - 1 } else { 0 };
                for k in 0..nz {
                    for i in 0..nx {
                        out.push(x[d.local_index(i, j, k)]);
                    }
                }
            }
            Face::ZMinus | Face::ZPlus => {
                let k = if face.is_upper() { nz - 1 } else { 0 };
                let start = d.local_index(0, 0, k);
                out.extend_from_slice(&x[start..start + nx * ny]);
            }
        }
        out
    }

    /// Exchange boundary layers with every live neighbor, in `Face::ALL` order.
    fn exchange_halos<C: Comm>(&self, comm: &C, x: &[f64]) -> Result<Halo, KError> {
        let mut layers: [Vec<f64>; 6] = Default::default();
        for face in Face::ALL {
            let Some(peer) = self.decomp.neighbor(face) else {
                continue;
            };
            let send = self.pack_layer(face, x);
            let mut recv = vec![0.0; send.len()];
            comm.exchange(peer, face, &send, &mut recv)?;
            trace!("rank {} received {} ghost values across {face} from rank {peer}", comm.rank(), recv.len());
            layers[face.index()] = recv;
        }
        Ok(Halo { layers })
    }

    /// 7-point sum for the plane of constant `k`; `out` is that plane of y.
    fn compute_plane(&self, k: usize, x: &[f64], halo: &Halo, out: &mut [f64]) {
        let [nx, ny, nz] = self.decomp.local_dims();
        let c = &self.coeffs;
        let plane = nx * ny;
        for j in 0..ny {
            for i in 0..nx {
                let idx = self.decomp.local_index(i, j, k);
                let w = if i > 0 { x[idx - 1] } else { halo.get(Face::XMinus, k * ny + j) };
                let e = if i + 1 < nx { x[idx + 1] } else { halo.get(Face::XPlus, k * ny + j) };
                let s = if j > 0 { x[idx - nx] } else { halo.get(Face::YMinus, k * nx + i) };
                let n = if j + 1 < ny { x[idx + nx] } else { halo.get(Face::YPlus, k * nx + i) };
                let b = if k > 0 { x[idx - plane] } else { halo.get(Face::ZMinus, j * nx + i) };
                let t = if k + 1 < nz { x[idx + plane] } else { halo.get(Face::ZPlus, j * nx + i) };
                out[j * nx + i] = c.value_c * x[idx]
                    + c.value_w * w
                    + c.value_e * e
                    + c.value_s * s
                    + c.value_n * n
                    + c.value_b * b
                    + c.value_t * t;
            }
        }
    }
}

impl DistributedOperator for StencilOperator {
    fn local_len(&self) -> usize {
        self.decomp.local_len()
    }

    fn apply<C: Comm>(&self, comm: &C, x: &[f64], y: &mut [f64]) -> Result<(), KError> {
        let n = self.decomp.local_len();
        if x.len() != n || y.len() != n {
            return Err(KError::Config(format!(
                "stencil apply on rank {}: input has {} values, output {}, block has {n}",
                self.decomp.rank(),
                x.len(),
                y.len()
            )));
        }
        let halo = self.exchange_halos(comm, x)?;
        let [nx, ny, _] = self.decomp.local_dims();
        #[cfg(feature = "rayon")]
        {
            y.par_chunks_mut(nx * ny)
                .enumerate()
                .for_each(|(k, out)| self.compute_plane(k, x, &halo, out));
        }
        #[cfg(not(feature = "rayon"))]
        {
            y.chunks_mut(nx * ny)
                .enumerate()
                .for_each(|(k, out)| self.compute_plane(k, x, &halo, out));
        }
        Ok(())
    }
}
