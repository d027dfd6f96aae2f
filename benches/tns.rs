use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lc3_dsp_core::block::Block32;
use lc3_dsp_core::tns::{analyze, apply_encode};

fn synthetic_spectrum(len: usize) -> Block32 {
    let m: Vec<i32> = (0..len).map(|i| ((i as f64 * 0.05).sin() * 1_000_000.0) as i32).collect();
    Block32::new(m, 0)
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("tns_analyze");
    for &(num_bins, bandwidth_index, frame_dms) in &[(160usize, 2u8, 50u32), (320, 4, 100), (480, 4, 100)] {
        let spectrum = synthetic_spectrum(num_bins);
        group.bench_with_input(BenchmarkId::from_parameter(num_bins), &spectrum, |b, spectrum| {
            b.iter(|| analyze(black_box(spectrum), bandwidth_index, frame_dms, None));
        });
    }
    group.finish();
}

fn bench_apply_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("tns_apply_encode");
    for &num_bins in &[160usize, 320, 480] {
        let spectrum = synthetic_spectrum(num_bins);
        let params = analyze(&spectrum, 4, 100, None);
        group.bench_with_input(BenchmarkId::from_parameter(num_bins), &(spectrum, params), |b, (spectrum, params)| {
            b.iter(|| {
                let mut s = spectrum.clone();
                apply_encode(black_box(&mut s), params);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analyze, bench_apply_encode);
criterion_main!(benches);
