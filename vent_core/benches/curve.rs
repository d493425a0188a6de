use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use vent_core::AdaptiveCurve;

fn bench_curve(c: &mut Criterion) {
    let mut curve = AdaptiveCurve::new(&[(0, 0), (10_000, 65_535)], 10, 100, 64).unwrap();
    for i in 1..60 {
        curve.add_point(i * 160, i * 1_000, true);
    }

    c.bench_function("curve_value_at", |b| {
        let mut x = 0;
        b.iter(|| {
            x = (x + 37) % 10_000;
            black_box(curve.value_at(x))
        });
    });

    c.bench_function("curve_add_point_evicting", |b| {
        let mut i = 0i32;
        b.iter(|| {
            i = (i + 1) % 9_000;
            let mut c = curve.clone();
            c.add_point(500 + i, 1 + i * 7 % 65_000, true);
            black_box(c.len())
        });
    });
}

criterion_group!(benches, bench_curve);
criterion_main!(benches);
