//! Thin façade over the hosting parallel runtime's collective broadcast.
//!
//! The only collective this subsystem needs is "broadcast an integer from
//! one rank to all ranks, blocking until complete" — it fences the
//! directory-creation step of a save. The trait is injected into
//! collections so serial runs and unit tests can use [`NoComm`] or the
//! in-process [`LocalComm`] instead of a real MPI world.

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Blocking collective-broadcast interface (minimal by design).
pub trait Communicator: Send + Sync {
    /// This process's index within the group.
    fn rank(&self) -> usize;
    /// Total number of ranks in the group.
    fn size(&self) -> usize;
    /// Broadcast `value` from `root` to every rank; blocks until the
    /// root's value is available on the calling rank. Ranks other than
    /// `root` ignore their own `value` argument.
    fn broadcast_int(&self, value: i32, root: usize) -> i32;
}

/// No-op comm for single-process runs and pure serial unit tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn broadcast_int(&self, value: i32, _root: usize) -> i32 {
        value
    }
}

// --- LocalComm: intra-process / multi-thread ---

// Broadcast slots keyed by (world, epoch). Values are never removed: every
// rank of the world must be able to read a slot, and worlds are short-lived
// test fixtures.
type Key = (u64, u64);

static BCAST_SLOTS: Lazy<DashMap<Key, i32>> = Lazy::new(DashMap::new);
static NEXT_WORLD: AtomicU64 = AtomicU64::new(0);

/// In-process communicator: one handle per simulated rank, all sharing a
/// global mailbox. Intended for tests that drive several ranks from
/// threads of one process.
#[derive(Debug)]
pub struct LocalComm {
    world: u64,
    rank: usize,
    size: usize,
    epoch: AtomicU64,
}

impl LocalComm {
    /// Create the handles for a world of `size` ranks, index = rank.
    pub fn world(size: usize) -> Vec<Arc<LocalComm>> {
        let world = NEXT_WORLD.fetch_add(1, Relaxed);
        (0..size)
            .map(|rank| {
                Arc::new(LocalComm {
                    world,
                    rank,
                    size,
                    epoch: AtomicU64::new(0),
                })
            })
            .collect()
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn broadcast_int(&self, value: i32, root: usize) -> i32 {
        // Ranks advance their epoch in lockstep: a collective is a
        // collective, every rank calls it the same number of times.
        let epoch = self.epoch.fetch_add(1, Relaxed);
        let key = (self.world, epoch);
        if self.rank == root {
            BCAST_SLOTS.insert(key, value);
            value
        } else {
            loop {
                if let Some(v) = BCAST_SLOTS.get(&key) {
                    return *v;
                }
                std::thread::yield_now();
            }
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::Communicator;
    use mpi::collective::Root;
    use mpi::environment::Universe;
    use mpi::topology::{Communicator as _, SimpleCommunicator};

    /// MPI-backed communicator over `MPI_COMM_WORLD`.
    pub struct MpiComm {
        #[allow(dead_code)]
        universe: Universe,
        world: SimpleCommunicator,
    }

    impl MpiComm {
        /// Initialize MPI and wrap the world communicator.
        ///
        /// # Panics
        /// Panics if MPI was already initialized.
        pub fn new() -> Self {
            let universe = mpi::initialize().expect("MPI already initialized");
            let world = universe.world();
            Self { universe, world }
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.world.rank() as usize
        }

        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn broadcast_int(&self, value: i32, root: usize) -> i32 {
            let mut buf = value;
            self.world
                .process_at_rank(root as i32)
                .broadcast_into(&mut buf);
            buf
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
