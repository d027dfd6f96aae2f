use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lc3_dsp_core::block::Block16;
use lc3_dsp_core::mdct::{analyze, synthesize, OverlapMemory};

fn tone(block_len: usize, freq_hz: f64, sample_rate_hz: f64) -> Vec<i16> {
    (0..block_len)
        .map(|i| (8000.0 * (2.0 * std::f64::consts::PI * freq_hz * i as f64 / sample_rate_hz).sin()) as i16)
        .collect()
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("mdct_analyze");
    for &block_len in &[80usize, 160, 240, 320, 480] {
        let doubled: Vec<i16> = tone(block_len * 2, 440.0, 16000.0);
        group.bench_with_input(BenchmarkId::from_parameter(block_len), &block_len, |b, &block_len| {
            b.iter(|| analyze(Block16::new(doubled.clone(), 0), black_box(block_len)));
        });
    }
    group.finish();
}

fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("mdct_synthesize");
    for &block_len in &[80usize, 160, 240, 320, 480] {
        let doubled = tone(block_len * 2, 440.0, 16000.0);
        let spectrum = analyze(Block16::new(doubled, 0), block_len).spectrum;
        group.bench_with_input(BenchmarkId::from_parameter(block_len), &block_len, |b, &block_len| {
            let mut overlap = OverlapMemory::new(block_len / 2);
            b.iter(|| synthesize(black_box(&spectrum), &mut overlap, block_len, block_len));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_analyze, bench_synthesize);
criterion_main!(benches);
