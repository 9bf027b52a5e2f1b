//! Dense assembly of the stencil operator on top of Faer.
//!
//! Only meant for small single-process grids: inspecting the operator,
//! checking symmetry, and direct solves that verify the iterative ones.

use faer::Mat;

use crate::domain::Face;
use crate::error::KError;
use crate::matrix::stencil::StencilOperator;

impl StencilOperator {
    /// Explicit `n × n` matrix of the operator, rows and columns in local linear order.
    ///
    /// Requires a decomposition with a single rank.
    pub fn assemble_dense(&self) -> Result<Mat<f64>, KError> {
        let d = self.decomposition();
        if d.nprocs() != 1 {
            return Err(KError::Unsupported("dense assembly of a multi-rank decomposition"));
        }
        let [nx, ny, nz] = d.local_dims();
        let n = d.local_len();
        let c = self.coefficients();
        let mut a = Mat::<f64>::zeros(n, n);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let row = d.local_index(i, j, k);
                    a[(row, row)] = c.value_c;
                    for face in Face::ALL {
                        let mut p = [i as isize, j as isize, k as isize];
                        p[face.axis()] += if face.is_upper() { 1 } else { -1 };
                        let inside = p.iter().zip([nx, ny, nz]).all(|(&q, m)| q >= 0 && (q as usize) < m);
                        if inside {
                            let col = d.local_index(p[0] as usize, p[1] as usize, p[2] as usize);
                            a[(row, col)] = c.face(face);
                        }
                    }
                }
            }
        }
        Ok(a)
    }
}
