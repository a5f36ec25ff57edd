#[macro_use]
extern crate criterion;
extern crate mandelround;
extern crate num;

use criterion::Criterion;
use mandelround::escape::{escape_time, render_single};
use mandelround::ViewBounds;
use num::Complex;

fn interior_point(c: &mut Criterion) {
    c.bench_function("escape_time interior 1000", |b| {
        b.iter(|| escape_time(Complex::new(-0.1, 0.1), 1000))
    });
}

fn default_view(c: &mut Criterion) {
    c.bench_function("render_single 160x120 default", |b| {
        b.iter(|| render_single(&ViewBounds::DEFAULT, 160, 120, 1000))
    });
}

criterion_group!(benches, interior_point, default_view);
criterion_main!(benches);
