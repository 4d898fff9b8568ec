//! Point-to-point message transport between ranks
//!
//! [`mesh`] connects `size` ranks with one unbounded channel per directed
//! pair, so a receive from a given source only ever observes that source's
//! traffic. Every message carries a [`MessageKind`] next to its payload and a
//! receive names the kind it expects.
//!
//! Sends and receives block with no timeout. A peer whose [`Endpoint`] was
//! dropped surfaces as [`TransferError::Disconnected`], which callers treat
//! as fatal.

use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

/// What a message carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Coordinator to worker: one segment plus halo
    SegmentTransfer,
    /// Worker to coordinator: per-shift partial sums
    ResultTransfer,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::SegmentTransfer => write!(f, "segment transfer"),
            MessageKind::ResultTransfer => write!(f, "result transfer"),
        }
    }
}

/// A message in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: MessageKind,
    pub source: usize,
    pub payload: Vec<f32>,
}

/// Errors raised by a send or receive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("rank {rank} cannot message itself")]
    SelfSend { rank: usize },

    #[error("rank {peer} is not part of a {size}-rank mesh")]
    UnknownPeer { peer: usize, size: usize },

    #[error("{kind} with rank {peer} failed: peer disconnected")]
    Disconnected { peer: usize, kind: MessageKind },

    #[error("expected {expected} from rank {peer}, received {actual}")]
    UnexpectedKind {
        peer: usize,
        expected: MessageKind,
        actual: MessageKind,
    },
}

/// One rank's view of the mesh
#[derive(Debug)]
pub struct Endpoint {
    rank: usize,
    outbound: Vec<Option<Sender<Envelope>>>,
    inbound: Vec<Option<Receiver<Envelope>>>,
}

impl Endpoint {
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the mesh
    pub fn size(&self) -> usize {
        self.outbound.len()
    }

    /// Send `payload` to `dst`, tagged with `kind`
    pub fn send(&self, dst: usize, kind: MessageKind, payload: Vec<f32>) -> Result<(), TransferError> {
        let link = self.link(&self.outbound, dst)?;
        link.send(Envelope {
            kind,
            source: self.rank,
            payload,
        })
        .map_err(|_| TransferError::Disconnected { peer: dst, kind })
    }

    /// Block until `src` sends a message, which must be of `kind`
    pub fn recv(&self, src: usize, kind: MessageKind) -> Result<Vec<f32>, TransferError> {
        let link = self.link(&self.inbound, src)?;
        let envelope = link
            .recv()
            .map_err(|_| TransferError::Disconnected { peer: src, kind })?;
        if envelope.kind != kind {
            return Err(TransferError::UnexpectedKind {
                peer: src,
                expected: kind,
                actual: envelope.kind,
            });
        }
        Ok(envelope.payload)
    }

    fn link<'a, L>(&self, links: &'a [Option<L>], peer: usize) -> Result<&'a L, TransferError> {
        if peer == self.rank {
            return Err(TransferError::SelfSend { rank: self.rank });
        }
        links
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(TransferError::UnknownPeer {
                peer,
                size: links.len(),
            })
    }
}

/// Connect `size` ranks pairwise and return their endpoints in rank order
pub fn mesh(size: usize) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = (0..size)
        .map(|rank| Endpoint {
            rank,
            outbound: (0..size).map(|_| None).collect(),
            inbound: (0..size).map(|_| None).collect(),
        })
        .collect();

    for src in 0..size {
        for dst in 0..size {
            if src == dst {
                continue;
            }
            let (tx, rx) = unbounded();
            endpoints[src].outbound[dst] = Some(tx);
            endpoints[dst].inbound[src] = Some(rx);
        }
    }

    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_send_and_receive() {
        let mut endpoints = mesh(2);
        let worker = endpoints.pop().unwrap();
        let coordinator = endpoints.pop().unwrap();

        coordinator
            .send(1, MessageKind::SegmentTransfer, vec![1.0, 2.0])
            .unwrap();
        let payload = worker.recv(0, MessageKind::SegmentTransfer).unwrap();
        assert_eq!(payload, vec![1.0, 2.0]);
    }

    #[test]
    fn test_receive_matches_source() {
        let endpoints = mesh(3);

        endpoints[2]
            .send(0, MessageKind::ResultTransfer, vec![2.0])
            .unwrap();
        endpoints[1]
            .send(0, MessageKind::ResultTransfer, vec![1.0])
            .unwrap();

        // Rank 2 sent first, but a receive from rank 1 sees only rank 1
        assert_eq!(
            endpoints[0].recv(1, MessageKind::ResultTransfer).unwrap(),
            vec![1.0]
        );
        assert_eq!(
            endpoints[0].recv(2, MessageKind::ResultTransfer).unwrap(),
            vec![2.0]
        );
    }

    #[test]
    fn test_blocking_receive_across_threads() {
        let mut endpoints = mesh(2);
        let worker = endpoints.pop().unwrap();
        let coordinator = endpoints.pop().unwrap();

        let handle = thread::spawn(move || {
            let segment = worker.recv(0, MessageKind::SegmentTransfer).unwrap();
            let total: f32 = segment.iter().sum();
            worker
                .send(0, MessageKind::ResultTransfer, vec![total])
                .unwrap();
        });

        coordinator
            .send(1, MessageKind::SegmentTransfer, vec![1.0, 2.0, 3.0])
            .unwrap();
        let result = coordinator.recv(1, MessageKind::ResultTransfer).unwrap();
        handle.join().unwrap();

        assert_eq!(result, vec![6.0]);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let endpoints = mesh(2);
        endpoints[1]
            .send(0, MessageKind::SegmentTransfer, vec![])
            .unwrap();

        assert_eq!(
            endpoints[0].recv(1, MessageKind::ResultTransfer),
            Err(TransferError::UnexpectedKind {
                peer: 1,
                expected: MessageKind::ResultTransfer,
                actual: MessageKind::SegmentTransfer,
            })
        );
    }

    #[test]
    fn test_dropped_peer_disconnects() {
        let mut endpoints = mesh(2);
        let worker = endpoints.pop().unwrap();
        let coordinator = endpoints.pop().unwrap();
        drop(worker);

        assert_eq!(
            coordinator.send(1, MessageKind::SegmentTransfer, vec![1.0]),
            Err(TransferError::Disconnected {
                peer: 1,
                kind: MessageKind::SegmentTransfer
            })
        );
        assert_eq!(
            coordinator.recv(1, MessageKind::ResultTransfer),
            Err(TransferError::Disconnected {
                peer: 1,
                kind: MessageKind::ResultTransfer
            })
        );
    }

    #[test]
    fn test_self_and_unknown_peers() {
        let endpoints = mesh(2);

        assert_eq!(
            endpoints[0].send(0, MessageKind::SegmentTransfer, vec![]),
            Err(TransferError::SelfSend { rank: 0 })
        );
        assert_eq!(
            endpoints[0].recv(5, MessageKind::ResultTransfer),
            Err(TransferError::UnknownPeer { peer: 5, size: 2 })
        );
        assert_eq!(endpoints[1].size(), 2);
        assert_eq!(endpoints[1].rank(), 1);
    }
}
