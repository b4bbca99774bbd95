//! Solver pipeline selection.
//!
//! - [`ksp_context`]: `KspContext`, which builds a Krylov method and its
//!   preconditioner from [`SolverOptions`](crate::config::SolverOptions), optionally
//!   equilibrates the system, and solves.
//! - [`pc_context`]: `PcContext`, the owned preconditioner chosen by [`PcKind`].
//!
//! Both kinds parse from the lowercase names used on driver command lines.

use std::fmt;
use std::str::FromStr;

use crate::error::ElaiError;

pub mod ksp_context;
pub mod pc_context;

pub use ksp_context::KspContext;
pub use pc_context::PcContext;

/// Krylov and stationary methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolverKind {
    /// Conjugate Gradient (Hermitian positive definite)
    Cg,
    BiCgStab,
    BiCgSafe,
    /// Restarted GMRES, right preconditioned
    Gmres,
    Jacobi,
    /// SOR / Gauss-Seidel
    Sor,
}

impl SolverKind {
    pub const ALL: [SolverKind; 6] = [
        SolverKind::Cg,
        SolverKind::BiCgStab,
        SolverKind::BiCgSafe,
        SolverKind::Gmres,
        SolverKind::Jacobi,
        SolverKind::Sor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Cg => "cg",
            SolverKind::BiCgStab => "bicgstab",
            SolverKind::BiCgSafe => "bicgsafe",
            SolverKind::Gmres => "gmres",
            SolverKind::Jacobi => "jacobi",
            SolverKind::Sor => "sor",
        }
    }
}

impl FromStr for SolverKind {
    type Err = ElaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        SolverKind::ALL
            .into_iter()
            .find(|k| k.name() == key)
            .ok_or_else(|| ElaiError::UnknownSolver(s.to_string()))
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Preconditioners a context can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PcKind {
    #[default]
    None,
    Jacobi,
    Sor,
    /// Incomplete Cholesky with fill level
    Ic,
    /// Incomplete LU with fill level and drop threshold
    Ilu,
}

impl PcKind {
    pub const ALL: [PcKind; 5] = [PcKind::None, PcKind::Jacobi, PcKind::Sor, PcKind::Ic, PcKind::Ilu];

    pub fn name(self) -> &'static str {
        match self {
            PcKind::None => "none",
            PcKind::Jacobi => "jacobi",
            PcKind::Sor => "sor",
            PcKind::Ic => "ic",
            PcKind::Ilu => "ilu",
        }
    }
}

impl FromStr for PcKind {
    type Err = ElaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Ok(PcKind::None);
        }
        PcKind::ALL
            .into_iter()
            .find(|k| k.name() == key)
            .ok_or_else(|| ElaiError::UnknownPreconditioner(s.to_string()))
    }
}

impl fmt::Display for PcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for k in SolverKind::ALL {
            assert_eq!(k.to_string().parse::<SolverKind>().unwrap(), k);
        }
        for k in PcKind::ALL {
            assert_eq!(k.to_string().parse::<PcKind>().unwrap(), k);
        }
        assert_eq!(" BiCGSafe ".parse::<SolverKind>().unwrap(), SolverKind::BiCgSafe);
        assert_eq!("".parse::<PcKind>().unwrap(), PcKind::None);
    }

    #[test]
    fn unknown_names_are_errors() {
        assert!(matches!("qmr".parse::<SolverKind>(), Err(ElaiError::UnknownSolver(n)) if n == "qmr"));
        assert!(matches!("amg".parse::<PcKind>(), Err(ElaiError::UnknownPreconditioner(_))));
    }
}
