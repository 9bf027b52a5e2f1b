//! In-process communicator: every rank is an OS thread.
//!
//! `ThreadComm::universe(n)` wires `n` handles together with one
//! `crossbeam_channel` per ordered pair of ranks. Sends never block;
//! receives wait for the matching message from the named peer, up to a
//! timeout. A rank that returns drops its senders, so peers still waiting
//! on it fail with a disconnect error instead of hanging.
//!
//! Messages carry their kind (halo face or reduction). Because every pair
//! of ranks talks over a FIFO channel and all ranks run the same program,
//! the next message from a peer must be the one this rank expects; anything
//! else is reported as a protocol error.

use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::domain::Face;
use crate::error::KError;

/// Default time a rank waits for a peer before declaring it unreachable.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
enum Packet {
    Halo { face: Face, data: Vec<f64> },
    Reduce(Vec<f64>),
}

impl Packet {
    fn kind(&self) -> String {
        match self {
            Packet::Halo { face, .. } => format!("halo layer for face {face}"),
            Packet::Reduce(_) => "reduction".to_string(),
        }
    }
}

pub struct ThreadComm {
    rank: usize,
    size: usize,
    /// `tx[peer]` delivers to `peer`.
    tx: Vec<Sender<Packet>>,
    /// `rx[peer]` yields what `peer` sent to this rank.
    rx: Vec<Receiver<Packet>>,
    timeout: Duration,
}

impl ThreadComm {
    /// Linked communicators for ranks `0..size`, in rank order.
    pub fn universe(size: usize) -> Vec<ThreadComm> {
        let mut tx: Vec<Vec<Option<Sender<Packet>>>> = (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut rx: Vec<Vec<Option<Receiver<Packet>>>> = (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for from in 0..size {
            for to in 0..size {
                let (s, r) = unbounded();
                tx[from][to] = Some(s);
                rx[to][from] = Some(r);
            }
        }
        tx.into_iter()
            .zip(rx)
            .enumerate()
            .map(|(rank, (t, r))| ThreadComm {
                rank,
                size,
                tx: t.into_iter().flatten().collect(),
                rx: r.into_iter().flatten().collect(),
                timeout: DEFAULT_TIMEOUT,
            })
            .collect()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn send(&self, peer: usize, packet: Packet) -> Result<(), String> {
        self.tx
            .get(peer)
            .ok_or_else(|| format!("rank {peer} does not exist in a universe of {}", self.size))?
            .send(packet)
            .map_err(|_| format!("rank {peer} has shut down"))
    }

    fn recv(&self, peer: usize) -> Result<Packet, String> {
        let rx = self
            .rx
            .get(peer)
            .ok_or_else(|| format!("rank {peer} does not exist in a universe of {}", self.size))?;
        rx.recv_timeout(self.timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => format!("timed out after {:?} waiting for rank {peer}", self.timeout),
            RecvTimeoutError::Disconnected => format!("rank {peer} has shut down"),
        })
    }
}

impl super::Comm for ThreadComm {
    fn rank(&self) -> usize { self.rank }
    fn size(&self) -> usize { self.size }

    fn barrier(&self) -> Result<(), KError> {
        self.all_reduce_into(&mut [])
    }

    fn all_reduce_into(&self, values: &mut [f64]) -> Result<(), KError> {
        if self.size == 1 {
            return Ok(());
        }
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            self.send(peer, Packet::Reduce(values.to_vec())).map_err(KError::comm)?;
        }
        // sum in rank order so that every rank gets bit-identical results
        let mut total = vec![0.0; values.len()];
        for peer in 0..self.size {
            if peer == self.rank {
                total.iter_mut().zip(values.iter()).for_each(|(t, v)| *t += v);
                continue;
            }
            match self.recv(peer).map_err(KError::comm)? {
                Packet::Reduce(part) if part.len() == values.len() => {
                    total.iter_mut().zip(&part).for_each(|(t, v)| *t += v);
                }
                Packet::Reduce(part) => {
                    return Err(KError::comm(format!(
                        "reduction size mismatch: rank {peer} sent {} values, expected {}",
                        part.len(),
                        values.len()
                    )));
                }
                other => {
                    return Err(KError::comm(format!(
                        "protocol mismatch: expected reduction from rank {peer}, got {}",
                        other.kind()
                    )));
                }
            }
        }
        values.copy_from_slice(&total);
        Ok(())
    }

    fn exchange(&self, peer: usize, face: Face, send: &[f64], recv: &mut [f64]) -> Result<(), KError> {
        if peer == self.rank {
            return Err(KError::halo(face, peer, "cannot exchange a halo with self"));
        }
        self.send(peer, Packet::Halo { face, data: send.to_vec() })
            .map_err(|e| KError::halo(face, peer, e))?;
        match self.recv(peer).map_err(|e| KError::halo(face, peer, e))? {
            Packet::Halo { face: theirs, data } if theirs == face.opposite() => {
                if data.len() != recv.len() {
                    return Err(KError::halo(
                        face,
                        peer,
                        format!("message size mismatch: got {} values, expected {}", data.len(), recv.len()),
                    ));
                }
                recv.copy_from_slice(&data);
                Ok(())
            }
            other => Err(KError::halo(
                face,
                peer,
                format!("protocol mismatch: expected halo layer for face {}, got {}", face.opposite(), other.kind()),
            )),
        }
    }

    fn abort(&self, code: i32) -> ! {
        log::error!("rank {} aborting the run with code {code}", self.rank);
        std::process::exit(code)
    }
}

/// Run `f` once per rank on `nprocs` scoped threads, SPMD style.
///
/// Returns the per-rank results in rank order. A panic on any rank is
/// re-raised on the caller after all threads have finished.
pub fn run_spmd<R, F>(nprocs: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(ThreadComm) -> R + Sync,
{
    let comms = ThreadComm::universe(nprocs);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                s.spawn(move || f(comm))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}
