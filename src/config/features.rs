//! Build capabilities.
//!
//! The library recognizes a fixed set of build switches. Most of them map onto Cargo
//! features of this crate; the direct-solver and external ordering backends are never
//! compiled in here and always report as absent.

use bitflags::bitflags;
use std::fmt;

/// Bytes per cache line; `Vector` and `Matrix` storage is aligned and padded to it.
pub const CACHE_LINE: usize = 64;
/// Minimal alignment of scalar data handed to external kernels.
pub const DATA_ALIGNMENT: usize = 16;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BuildFeatures: u32 {
        const DEBUG        = 0b0_0000_0001;
        const PROFILE      = 0b0_0000_0010;
        /// data-parallel loops inside a rank
        const PARALLEL     = 0b0_0000_0100;
        const MPI          = 0b0_0000_1000;
        /// one-sided / extended point-to-point
        const MPI3         = 0b0_0001_0000;
        const DIRECT       = 0b0_0010_0000;
        const DIRECT_ALT   = 0b0_0100_0000;
        const ORDERING     = 0b0_1000_0000;
        const ORDERING_ALT = 0b1_0000_0000;
    }
}

impl BuildFeatures {
    /// Capabilities compiled into this build.
    pub fn current() -> Self {
        // dense LU is always built in
        let mut f = BuildFeatures::DIRECT;
        if cfg!(debug_assertions) {
            f |= BuildFeatures::DEBUG;
        }
        if cfg!(feature = "profile") {
            f |= BuildFeatures::PROFILE;
        }
        if cfg!(feature = "rayon") {
            f |= BuildFeatures::PARALLEL;
        }
        if cfg!(feature = "mpi") {
            f |= BuildFeatures::MPI;
        }
        f
    }

    /// At most one direct solver and one ordering backend may be active.
    pub fn is_consistent(self) -> bool {
        let direct = self & (BuildFeatures::DIRECT | BuildFeatures::DIRECT_ALT);
        let ordering = self & (BuildFeatures::ORDERING | BuildFeatures::ORDERING_ALT);
        direct.bits().count_ones() <= 1 && ordering.bits().count_ones() <= 1
    }
}

impl fmt::Display for BuildFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}
