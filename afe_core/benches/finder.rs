use afe_core::{ParallelBracketFinder, ScalarBracketFinder, Strategy};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// Saturating linear response, the shape a clamped ADC baseline has.
fn response(root: f64, x: u8) -> f64 {
    (16.0 * (root - f64::from(x))).clamp(-2048.0, 2047.0)
}

fn run_scalar(strategy: Strategy, root: f64) -> u8 {
    let f = |x| response(root, x);
    let Ok(mut finder) = ScalarBracketFinder::new(strategy, 0, 255, f(0), f(255)) else {
        return 0;
    };
    let mut x = finder.first_step();
    loop {
        let (next, done) = finder.next_step(f(x));
        x = next;
        if done {
            return x;
        }
    }
}

fn run_parallel(strategy: Strategy, roots: &[f64]) -> Vec<u8> {
    let eval = |xs: &[u8]| -> Vec<f64> {
        xs.iter()
            .zip(roots)
            .map(|(x, r)| response(*r, *x))
            .collect()
    };
    let a = vec![0u8; roots.len()];
    let b = vec![255u8; roots.len()];
    let Ok(mut finder) = ParallelBracketFinder::new(strategy, &a, &b, &eval(&a), &eval(&b)) else {
        return Vec::new();
    };
    let mut xs = finder.first_step();
    loop {
        let Ok((next, done)) = finder.next_step(&eval(&xs)) else {
            return xs;
        };
        xs = next;
        if done.iter().all(|d| *d) {
            return xs;
        }
    }
}

fn bench_scalar(c: &mut Criterion) {
    for strategy in [Strategy::Bisection, Strategy::Secant] {
        c.bench_function(&format!("scalar_{strategy}"), |b| {
            b.iter(|| {
                for root in [3.2, 77.7, 128.0, 201.4, 250.9] {
                    black_box(run_scalar(strategy, black_box(root)));
                }
            })
        });
    }
}

fn bench_parallel(c: &mut Criterion) {
    let roots: Vec<f64> = (0..8).map(|i| 10.0 + 29.5 * f64::from(i)).collect();
    for strategy in [Strategy::Bisection, Strategy::Secant] {
        c.bench_function(&format!("parallel8_{strategy}"), |b| {
            b.iter_batched(
                || roots.clone(),
                |r| black_box(run_parallel(strategy, &r)),
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, bench_scalar, bench_parallel);
criterion_main!(benches);
