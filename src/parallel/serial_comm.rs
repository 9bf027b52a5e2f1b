// single-process communicator

use crate::domain::Face;
use crate::error::KError;

#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl SerialComm {
    pub fn new() -> Self {
        SerialComm
    }
}

impl super::Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) -> Result<(), KError> { Ok(()) }
    fn all_reduce_into(&self, _values: &mut [f64]) -> Result<(), KError> {
        Ok(()) // sum over one rank
    }
    fn exchange(&self, peer: usize, face: Face, _send: &[f64], _recv: &mut [f64]) -> Result<(), KError> {
        Err(KError::halo(face, peer, "serial communicator has no peers"))
    }
    fn abort(&self, code: i32) -> ! {
        std::process::exit(code)
    }
}
