use criterion::{Criterion, black_box, criterion_group, criterion_main};
use elai::core::Vector;
use elai::matrix::Matrix;
use elai::preconditioner::{Ic, Ilu};
use elai::solver::{BiCgStab, Cg, Gmres, LinearSolver};

/// Five-point Laplacian on a k x k grid.
fn poisson_2d(k: usize) -> Matrix<f64> {
    let n = k * k;
    let mut t = Vec::with_capacity(5 * n);
    for i in 0..k {
        for j in 0..k {
            let r = i * k + j;
            t.push((r, r, 4.0));
            if i > 0 {
                t.push((r, r - k, -1.0));
            }
            if i + 1 < k {
                t.push((r, r + k, -1.0));
            }
            if j > 0 {
                t.push((r, r - 1, -1.0));
            }
            if j + 1 < k {
                t.push((r, r + 1, -1.0));
            }
        }
    }
    Matrix::from_triplets(n, n, &t)
}

fn bench_krylov(c: &mut Criterion) {
    let a = poisson_2d(48);
    let n = a.m();
    let b = Vector::from_slice(&vec![1.0; n]);

    let mut ic = Ic::new(&a, 0);
    ic.factor();
    c.bench_function("cg + ic(0)", |ben| {
        ben.iter(|| {
            let mut x = Vector::new(n);
            let mut s = Cg::new(&a, &b, Some(&ic), None);
            s.ksp_mut().set_iter_max(n);
            black_box(s.solve(&mut x))
        })
    });

    let mut ilu = Ilu::new(&a, 1, 0.0, false);
    ilu.factor();
    c.bench_function("bicgstab + ilu(1)", |ben| {
        ben.iter(|| {
            let mut x = Vector::new(n);
            black_box(BiCgStab::new(&a, &b, Some(&ilu), None).solve(&mut x))
        })
    });

    c.bench_function("gmres(50)", |ben| {
        ben.iter(|| {
            let mut x = Vector::new(n);
            let mut s = Gmres::new(&a, &b, None, None);
            s.ksp_mut().set_iter_max(200);
            black_box(s.solve(&mut x))
        })
    });
}

criterion_group!(benches, bench_krylov);
criterion_main!(benches);
