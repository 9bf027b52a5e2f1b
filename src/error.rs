use thiserror::Error;

use crate::domain::Face;

// Unified error type for poisson-cg

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("communication error{}: {reason}", comm_context(.iteration, .face, .peer))]
    Communication {
        iteration: Option<usize>,
        face: Option<Face>,
        peer: Option<usize>,
        reason: String,
    },
    #[error("CG did not converge after {iterations} iterations (residual norm {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },
    #[error("CG breakdown at iteration {iteration}: p^T A p = {curvature:e} (operator not SPD or direction degenerate)")]
    Breakdown { iteration: usize, curvature: f64 },
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

fn comm_context(iteration: &Option<usize>, face: &Option<Face>, peer: &Option<usize>) -> String {
    let mut ctx = String::new();
    if let Some(i) = iteration {
        ctx.push_str(&format!(" at iteration {i}"));
    }
    if let Some(f) = face {
        ctx.push_str(&format!(" on face {f}"));
    }
    if let Some(p) = peer {
        ctx.push_str(&format!(" with rank {p}"));
    }
    ctx
}

impl KError {
    /// Communication failure with no face context (reductions, barriers).
    pub fn comm(reason: impl Into<String>) -> Self {
        KError::Communication { iteration: None, face: None, peer: None, reason: reason.into() }
    }

    /// Communication failure during a halo exchange with `peer` across `face`.
    pub fn halo(face: Face, peer: usize, reason: impl Into<String>) -> Self {
        KError::Communication { iteration: None, face: Some(face), peer: Some(peer), reason: reason.into() }
    }

    /// Attach the CG iteration number to a communication error; other kinds pass through.
    pub fn at_iteration(self, it: usize) -> Self {
        match self {
            KError::Communication { iteration: None, face, peer, reason } => {
                KError::Communication { iteration: Some(it), face, peer, reason }
            }
            other => other,
        }
    }

    /// True for the errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, KError::Config(_) | KError::Communication { .. } | KError::Unsupported(_))
    }
}
