//! Distributed solves on in-process ranks.
//!
//! A global system is built from a plain matrix, split by a [`Subjugator`] into one
//! colored block per rank, and solved with the ghost exchange of each block's
//! function. Answers are glued back together and compared with the serial solve.

use approx::assert_abs_diff_eq;
use elai::core::Vector;
use elai::domain::{EntireFunction, LinearFunction, LinearOperator, Subjugator};
use elai::matrix::Matrix;
use elai::parallel::{Comm, ThreadComm};
use elai::preconditioner::Ilu;
use elai::solver::{BiCgStab, Cg, Gmres, LinearSolver};
use elai::topology::{generate, Element, Family, PackedElement as P, SetNeighbour, Space};

type Op = LinearOperator<P, SetNeighbour<P>, f64>;
type Fun = LinearFunction<P, f64>;

/// Tridiagonal matrix with `lower`, `diag`, `upper` bands.
fn bands(n: usize, lower: f64, diag: f64, upper: f64) -> Matrix<f64> {
    let mut t = Vec::new();
    for i in 0..n {
        t.push((i, i, diag));
        if i > 0 {
            t.push((i, i - 1, lower));
        }
        if i + 1 < n {
            t.push((i, i + 1, upper));
        }
    }
    Matrix::from_triplets(n, n, &t)
}

fn global_system(a: Matrix<f64>) -> (Op, Fun) {
    let n = a.m();
    let (base, topo) = generate::<P, SetNeighbour<P>, f64>(&a);
    let rhs: Vec<f64> = (0..n).map(|i| 1.0 + (i % 3) as f64).collect();
    let op = Op::from_parts(base.clone(), base.clone(), topo, a);
    (op, Fun::with_values(base, &rhs))
}

fn serial_solution(op: &Op, b: &Fun) -> Vector<f64> {
    let mut s = Gmres::new(op.action(), b.vector(), None, None);
    let mut x = Vector::new(b.dim());
    assert!(s.solve(&mut x));
    x
}

/// The local block of rank `r`: operator, right-hand side and a zero unknown.
fn local_block(op: &Op, b: &Fun, subj: &Subjugator<'_, P, SetNeighbour<P>>, r: u32) -> (Op, Fun, Fun) {
    let sub = subj.subspace(r);
    let fam = subj.subfamily(r, &sub);
    let mut a = Op::square(sub.clone(), fam);
    a.reflect_in_colored(op, subj);
    let mut v = Fun::new(sub.clone());
    v.reflect_in_colored(b, subj);
    (a, v, Fun::new(sub))
}

/// Which solver a rank runs on its block.
#[derive(Clone, Copy)]
enum Method {
    Cg,
    BiCgStab,
    GmresIlu,
}

fn solve_on_ranks(op: &Op, b: &Fun, ranks: usize, method: Method) -> Vec<Fun> {
    let palette: Vec<u32> = (0..ranks as u32).collect();
    ThreadComm::run(ranks, |c| {
        let subj = Subjugator::new(op.dom(), op.topo(), &palette);
        let (a, v, mut u) = local_block(op, b, &subj, c.rank() as u32);
        let coh = u.coherence(&c);
        let converged = match method {
            Method::Cg => {
                let mut s = Cg::new(a.action(), v.vector(), None, Some(&coh));
                s.ksp_mut().set_iter_max(200);
                s.solve(u.vector_mut())
            }
            Method::BiCgStab => {
                let mut s = BiCgStab::new(a.action(), v.vector(), None, Some(&coh));
                s.ksp_mut().set_iter_max(200);
                s.solve(u.vector_mut())
            }
            Method::GmresIlu => {
                let mut ilu = Ilu::new(a.action(), 0, 0.0, false);
                ilu.factor();
                let mut s = Gmres::new(a.action(), v.vector(), Some(&ilu), Some(&coh));
                s.ksp_mut().set_iter_max(50);
                s.solve(u.vector_mut())
            }
        };
        assert!(converged, "rank {} did not converge", c.rank());
        u
    })
}

/// Glue the governed values of each rank's unknown back onto the global space.
fn gather(b: &Fun, locals: &[Fun], ranks: usize) -> Fun {
    let palette: Vec<u32> = (0..ranks as u32).collect();
    let tau = Family::<P, SetNeighbour<P>>::from_space(b.dom());
    let subj = Subjugator::new(b.dom(), &tau, &palette);
    let mut x = Fun::new(b.dom().clone());
    for u in locals {
        x.reflect_colored(u, &subj);
    }
    x
}

/// Distributed CG on a symmetric matrix reproduces the serial answer.
#[test]
fn cg_on_two_ranks_matches_serial() {
    let (op, b) = global_system(bands(12, -1.0, 2.5, -1.0));
    let serial = serial_solution(&op, &b);
    let locals = solve_on_ranks(&op, &b, 2, Method::Cg);
    let x = gather(&b, &locals, 2);
    for (u, v) in x.vector().iter().zip(serial.iter()) {
        assert_abs_diff_eq!(*u, *v, epsilon = 1e-9);
    }
}

/// Ghost slots end up holding the owner's value after the solve.
#[test]
fn ghosts_agree_with_owners() {
    let (op, b) = global_system(bands(9, -1.0, 3.0, -0.5));
    let locals = solve_on_ranks(&op, &b, 3, Method::BiCgStab);
    for u in &locals {
        for (inner, outer) in u.dom().ghosts() {
            let owner = &locals[outer.color() as usize];
            assert_abs_diff_eq!(u.get(inner), owner.get(outer), epsilon = 1e-12);
        }
    }
    let serial = serial_solution(&op, &b);
    let x = gather(&b, &locals, 3);
    for (u, v) in x.vector().iter().zip(serial.iter()) {
        assert_abs_diff_eq!(*u, *v, epsilon = 1e-9);
    }
}

/// Locally factored ILU blocks precondition a distributed GMRES.
#[test]
fn gmres_with_local_ilu() {
    let (op, b) = global_system(bands(16, -1.5, 4.0, -0.5));
    let serial = serial_solution(&op, &b);
    let locals = solve_on_ranks(&op, &b, 2, Method::GmresIlu);
    let x = gather(&b, &locals, 2);
    for (u, v) in x.vector().iter().zip(serial.iter()) {
        assert_abs_diff_eq!(*u, *v, epsilon = 1e-9);
    }
}

/// Per-rank pieces assemble into the serial solution without a communicator.
#[test]
fn entire_function_reassembles_pieces() {
    let (op, b) = global_system(bands(10, -1.0, 2.5, -1.0));
    let serial = serial_solution(&op, &b);
    let locals = solve_on_ranks(&op, &b, 2, Method::Cg);

    // pieces carry their own colors; rename back to the global color 0
    let renamed: Vec<Fun> = locals
        .iter()
        .map(|u| {
            let mut s = Space::new();
            for (e, _) in u.dom().iter().filter(|(e, _)| u.dom().governs(e)) {
                s.join(P::new(e.index(), 0));
            }
            let mut f = Fun::new(s);
            for (e, _) in u.dom().iter().filter(|(e, _)| u.dom().governs(e)) {
                *f.entry_mut(&P::new(e.index(), 0)) = u.get(e);
            }
            f
        })
        .collect();
    let mut entire = EntireFunction::new();
    for f in &renamed {
        entire.join(f);
    }
    let x = entire.assemble();
    assert_eq!(x.dim(), 10);
    for i in 0..10u32 {
        assert_abs_diff_eq!(x.get(&P::new(i, 0)), serial[i as usize], epsilon = 1e-9);
    }
}

/// Global norms through a coherence agree on every rank.
#[test]
fn residual_norm_is_global() {
    let (op, b) = global_system(bands(8, -1.0, 2.0, -1.0));
    let serial = b.vector().norm();
    let norms = ThreadComm::run(2, |c| {
        let subj = Subjugator::new(op.dom(), op.topo(), &[0, 1]);
        let (a, v, _) = local_block(&op, &b, &subj, c.rank() as u32);
        let coh = v.coherence(&c);
        let s = Cg::new(a.action(), v.vector(), None, Some(&coh));
        s.ksp().fix_norm(v.vector())
    });
    for n in norms {
        assert_abs_diff_eq!(n, serial, epsilon = 1e-12);
    }
}
