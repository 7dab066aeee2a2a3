//! Spectral extraction benchmark: one flow window → log-power frames.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use flowwave::features::SpectralExtractor;
use flowwave::intake::PacketMetadata;
use std::net::Ipv4Addr;

fn make_window(n: usize) -> Vec<PacketMetadata> {
    (0..n)
        .map(|i| {
            PacketMetadata::new(
                Ipv4Addr::new(10, 0, 0, 1),
                if i % 3 == 0 { 17 } else { 6 },
                (64 + (i * 37) % 1400) as u16,
                1.0 + i as f64 * 1e-4,
            )
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let mut g = c.benchmark_group("spectral_extract");
    for n_fft in [16, 50, 128] {
        let ex = SpectralExtractor::new(n_fft);
        let window = make_window(20 * n_fft);
        g.bench_function(format!("n_fft_{}", n_fft).as_str(), |b| {
            b.iter(|| black_box(ex.extract(black_box(&window))))
        });
    }
    g.finish();
}

criterion_group!(benches, bench_extract);
criterion_main!(benches);
