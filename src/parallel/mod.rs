//! Communication backends.
//!
//! Every rank of a run holds one communicator and must call the collective
//! operations (`barrier`, `all_reduce_into`, `all_reduce`) the same
//! number of times and in the same order as every other rank. Halo
//! `exchange` is pairwise: both ranks sharing a face call it once per
//! operator application, each naming the face from its own side.
//!
//! Global dot products live in [`crate::core::vector::dot`], which sums the
//! local terms in a fixed order before handing a single value to `all_reduce`.

use crate::domain::Face;
use crate::error::KError;

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self) -> Result<(), KError>;
    /// Element-wise global sum, result identical on every rank.
    fn all_reduce_into(&self, values: &mut [f64]) -> Result<(), KError>;
    /// Send `send` to `peer` across `face` and receive the peer's layer into `recv`.
    fn exchange(&self, peer: usize, face: Face, send: &[f64], recv: &mut [f64]) -> Result<(), KError>;
    /// Tear the whole run down after a fatal error.
    fn abort(&self, code: i32) -> !;

    fn all_reduce(&self, x: f64) -> Result<f64, KError> {
        let mut buf = [x];
        self.all_reduce_into(&mut buf)?;
        Ok(buf[0])
    }
}

impl<C: Comm + ?Sized> Comm for &C {
    fn rank(&self) -> usize {
        (**self).rank()
    }
    fn size(&self) -> usize {
        (**self).size()
    }
    fn barrier(&self) -> Result<(), KError> {
        (**self).barrier()
    }
    fn all_reduce_into(&self, values: &mut [f64]) -> Result<(), KError> {
        (**self).all_reduce_into(values)
    }
    fn exchange(&self, peer: usize, face: Face, send: &[f64], recv: &mut [f64]) -> Result<(), KError> {
        (**self).exchange(peer, face, send, recv)
    }
    fn abort(&self, code: i32) -> ! {
        (**self).abort(code)
    }
}

pub mod serial_comm;
pub use serial_comm::SerialComm;

pub mod thread_comm;
pub use thread_comm::{run_spmd, ThreadComm};

#[cfg(feature="mpi")]
pub mod mpi_comm;
#[cfg(feature="mpi")]
pub use mpi_comm::MpiComm;

/// Size the global rayon pool used for intra-rank loops.
///
/// `None` uses one thread per logical CPU divided evenly among `ranks_per_node`.
#[cfg(feature="rayon")]
pub fn init_thread_pool(threads: Option<usize>, ranks_per_node: usize) {
    let n = threads.unwrap_or_else(|| (num_cpus::get() / ranks_per_node.max(1)).max(1));
    if rayon::ThreadPoolBuilder::new().num_threads(n).build_global().is_err() {
        log::debug!("rayon global pool already initialized, keeping it");
    }
}

#[cfg(not(feature="rayon"))]
pub fn init_thread_pool(_threads: Option<usize>, _ranks_per_node: usize) {}

/// Runtime choice of backend for one rank of the driver.
pub enum UniverseComm {
    #[cfg(feature="mpi")]
    Mpi(MpiComm),
    Threads(ThreadComm),
    Serial(SerialComm),
}

impl Comm for UniverseComm {
    fn rank(&self) -> usize {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.rank(),
            UniverseComm::Threads(comm) => comm.rank(),
            UniverseComm::Serial(comm) => comm.rank(),
        }
    }
    fn size(&self) -> usize {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.size(),
            UniverseComm::Threads(comm) => comm.size(),
            UniverseComm::Serial(comm) => comm.size(),
        }
    }
    fn barrier(&self) -> Result<(), KError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.barrier(),
            UniverseComm::Threads(comm) => comm.barrier(),
            UniverseComm::Serial(comm) => comm.barrier(),
        }
    }
    fn all_reduce_into(&self, values: &mut [f64]) -> Result<(), KError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.all_reduce_into(values),
            UniverseComm::Threads(comm) => comm.all_reduce_into(values),
            UniverseComm::Serial(comm) => comm.all_reduce_into(values),
        }
    }
    fn exchange(&self, peer: usize, face: Face, send: &[f64], recv: &mut [f64]) -> Result<(), KError> {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.exchange(peer, face, send, recv),
            UniverseComm::Threads(comm) => comm.exchange(peer, face, send, recv),
            UniverseComm::Serial(comm) => comm.exchange(peer, face, send, recv),
        }
    }
    fn abort(&self, code: i32) -> ! {
        match self {
            #[cfg(feature="mpi")]
            UniverseComm::Mpi(comm) => comm.abort(code),
            UniverseComm::Threads(comm) => comm.abort(code),
            UniverseComm::Serial(comm) => comm.abort(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_dispatches_to_backend() {
        let serial = UniverseComm::Serial(SerialComm);
        assert_eq!((serial.rank(), serial.size()), (0, 1));
        assert_eq!(serial.all_reduce(2.5).unwrap(), 2.5);
        assert!(matches!(
            serial.exchange(1, Face::XPlus, &[1.0], &mut [0.0]),
            Err(KError::Communication { face: Some(Face::XPlus), .. })
        ));

        let sums = run_spmd(3, |comm| {
            let comm = UniverseComm::Threads(comm);
            comm.barrier().unwrap();
            (comm.size(), comm.all_reduce(comm.rank() as f64).unwrap())
        });
        assert_eq!(sums, vec![(3, 3.0); 3]);
    }

    #[test]
    fn references_forward_to_the_communicator() {
        let comm = SerialComm;
        let by_ref: &dyn Comm = &comm;
        assert_eq!(by_ref.all_reduce(4.0).unwrap(), 4.0);
        assert_eq!((&comm).size(), 1);
    }
}
