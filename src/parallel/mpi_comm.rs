//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. One process is one rank; halo layers travel with a
//! combined send/receive per face and reductions use `MPI_Allreduce`. The implementation is only
//! available when the `mpi` feature is enabled.
//!
//! # Usage
//!
//! - `MpiComm::new()` initializes MPI and keeps the universe alive for as long as the communicator
//!   exists; MPI is finalized when it is dropped, so no collective may be issued after that.
//! - Message tags are face indices: a rank sends with the tag of its own face and expects the tag
//!   of the opposite face, so a layer can never be matched to the wrong side.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! #[cfg(feature = "mpi")]
//! {
//!     use poisson_cg::parallel::{Comm, MpiComm};
//!     let comm = MpiComm::new().unwrap();
//!     println!("Rank: {} / {}", comm.rank(), comm.size());
//!     comm.barrier().unwrap();
//! }
//! ```

#[cfg(feature = "mpi")]
use mpi::collective::SystemOperation;
#[cfg(feature = "mpi")]
use mpi::environment::Universe;
#[cfg(feature = "mpi")]
use mpi::topology::SimpleCommunicator;
#[cfg(feature = "mpi")]
use mpi::traits::*;

#[cfg(feature = "mpi")]
use crate::domain::Face;
#[cfg(feature = "mpi")]
use crate::error::KError;

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI world communicator, the rank of the current process, the total number of processes
/// and the universe guard that finalizes MPI on drop.
#[cfg(feature = "mpi")]
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
    // dropped last: finalizes MPI
    _universe: Universe,
}

#[cfg(feature = "mpi")]
impl MpiComm {
    /// Initializes MPI and constructs a new `MpiComm` instance.
    ///
    /// Fails with a configuration error if MPI was already initialized.
    pub fn new() -> Result<Self, KError> {
        let universe = mpi::initialize()
            .ok_or_else(|| KError::Config("MPI has already been initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { world, rank, size, _universe: universe })
    }
}

#[cfg(feature = "mpi")]
impl super::Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize { self.rank }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize { self.size }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) -> Result<(), KError> {
        self.world.barrier();
        Ok(())
    }

    /// Performs an element-wise sum across all processes.
    ///
    /// `MPI_Allreduce` may combine partial sums in a different order on each
    /// process, so the sum is formed once on rank 0 and broadcast; every rank
    /// then holds the same bits and takes the same CG branch. MPI's default
    /// error handler aborts the job on failure, so this never returns an error.
    fn all_reduce_into(&self, values: &mut [f64]) -> Result<(), KError> {
        let root = self.world.process_at_rank(0);
        let local = values.to_vec();
        if self.rank == 0 {
            root.reduce_into_root(&local[..], values, SystemOperation::sum());
        } else {
            root.reduce_into(&local[..], SystemOperation::sum());
        }
        root.broadcast_into(values);
        Ok(())
    }

    /// Exchanges one halo layer with `peer` using a combined send/receive.
    ///
    /// - `face`: this rank's face shared with `peer`; used as the send tag.
    /// - `send`: boundary layer of this rank on `face`.
    /// - `recv`: buffer for the peer's adjacent layer; its length must match the peer's message.
    fn exchange(&self, peer: usize, face: Face, send: &[f64], recv: &mut [f64]) -> Result<(), KError> {
        if peer >= self.size {
            return Err(KError::halo(face, peer, format!("no such rank in a world of {}", self.size)));
        }
        let process = self.world.process_at_rank(peer as i32);
        let status = mpi::point_to_point::send_receive_into_with_tags(
            send,
            &process,
            face.index() as i32,
            recv,
            &process,
            face.opposite().index() as i32,
        );
        let count = status.count(f64::equivalent_datatype()) as usize;
        if count != recv.len() {
            return Err(KError::halo(
                face,
                peer,
                format!("message size mismatch: got {count} values, expected {}", recv.len()),
            ));
        }
        Ok(())
    }

    /// Aborts every process of the job.
    fn abort(&self, code: i32) -> ! {
        log::error!("rank {} aborting MPI job with code {code}", self.rank);
        self.world.abort(code)
    }
}
