//! Runtime options for building a solver pipeline.
//!
//! `SolverOptions` gathers what a driver would otherwise keep in process-wide state:
//! the Krylov method, the preconditioner, thresholds, fill level and equilibration.
//! It is handed explicitly to [`crate::context::KspContext`].

use crate::context::{PcKind, SolverKind};
use crate::error::{ElaiError, Result};

/// Solver pipeline options.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// Krylov method
    pub method: SolverKind,
    /// Preconditioner applied inside the Krylov iteration
    pub pc: PcKind,
    /// Relative residual threshold
    pub rel_thres: f64,
    /// Absolute residual threshold
    pub abs_thres: f64,
    /// Iteration cap; `None` keeps the method's own default
    pub iter_max: Option<usize>,
    /// Krylov subspace size before a GMRES restart
    pub restart: usize,
    /// Fill level for IC/ILU
    pub fill_level: usize,
    /// Drop threshold for ILU
    pub drop_thres: f64,
    /// Relaxation factor for SOR
    pub omega: f64,
    /// Equilibrate rows and columns before solving
    pub scaled: bool,
    /// Stop equilibrating once row and column maxima are this close to one
    pub scale_thres: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: SolverKind::Cg,
            pc: PcKind::None,
            rel_thres: 1e-12,
            abs_thres: 1e-30,
            iter_max: None,
            restart: 50,
            fill_level: 0,
            drop_thres: 0.0,
            omega: 1.0,
            scaled: false,
            scale_thres: 1e-3,
        }
    }
}

impl SolverOptions {
    pub fn new(method: SolverKind) -> Self {
        Self { method, ..Self::default() }
    }

    /// Parse method and preconditioner names, e.g. `("bicgstab", "ilu")`.
    pub fn parse(method: &str, pc: &str) -> Result<Self> {
        let method = method.parse::<SolverKind>()?;
        let pc = pc.parse::<PcKind>()?;
        Ok(Self { method, pc, ..Self::default() })
    }

    pub fn with_pc(mut self, pc: PcKind) -> Self { self.pc = pc; self }
    pub fn with_rel_thres(mut self, t: f64) -> Self { self.rel_thres = t; self }
    pub fn with_abs_thres(mut self, t: f64) -> Self { self.abs_thres = t; self }
    pub fn with_iter_max(mut self, n: usize) -> Self { self.iter_max = Some(n); self }
    pub fn with_restart(mut self, n: usize) -> Self { self.restart = n; self }
    pub fn with_fill_level(mut self, lv: usize) -> Self { self.fill_level = lv; self }
    pub fn with_drop_thres(mut self, t: f64) -> Self { self.drop_thres = t; self }
    pub fn with_omega(mut self, w: f64) -> Self { self.omega = w; self }
    pub fn with_scaling(mut self, on: bool) -> Self { self.scaled = on; self }
    pub fn with_scale_thres(mut self, t: f64) -> Self { self.scale_thres = t; self }
}

/// Size the global rayon pool. `threads == 0` uses the number of logical cores.
#[cfg(feature = "rayon")]
pub fn init_thread_pool(threads: usize) -> Result<()> {
    let n = if threads == 0 { num_cpus::get() } else { threads };
    rayon::ThreadPoolBuilder::new()
        .num_threads(n)
        .build_global()
        .map_err(|e| ElaiError::Comm(e.to_string()))?;
    log::debug!("rayon pool initialized with {} threads", n);
    Ok(())
}

#[cfg(not(feature = "rayon"))]
pub fn init_thread_pool(_threads: usize) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_names() {
        let opt = SolverOptions::parse("gmres", "ilu").unwrap();
        assert_eq!(opt.method, SolverKind::Gmres);
        assert_eq!(opt.pc, PcKind::Ilu);
        assert_eq!(opt.restart, 50);
    }

    #[test]
    fn parse_rejects_unknown_method() {
        assert!(matches!(
            SolverOptions::parse("minres", "none"),
            Err(ElaiError::UnknownSolver(_))
        ));
    }
}
