//! Benchmarks for scroll detection and planning.
//!
//! Performance budgets:
//! - Full-screen scroll decision: < 50µs for 120x40
//! - Unchanged region short-circuit: dominated by hashing
//! - No-match worst case: O(height²) comparisons, still < 200µs for 200x60
//!
//! Run with: cargo bench -p csrkit-render --bench smart_csr_bench

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use csrkit_render::buffer::Buffer;
use csrkit_render::cell::{Cell, PackedRgba};
use csrkit_render::{
    CapabilityContext, ScrollCaps, ScrollDirection, SmartCsr, detect_scroll_operation, hash_line,
    scroll_sequence,
};
use std::hint::black_box;

const SIZES: [(u16, u16); 3] = [(80, 24), (120, 40), (200, 60)];

fn screen(width: u16, height: u16, first: usize) -> Buffer {
    let mut buf = Buffer::new(width, height);
    let accent = Cell::default().with_fg(PackedRgba::rgb(120, 200, 255));
    for y in 0..height {
        let n = first + usize::from(y);
        let style = if n % 5 == 0 { accent } else { Cell::default() };
        buf.put_str(1, y, &format!("{n:06} GET /api/items?page={n} 200 OK"), style);
    }
    buf
}

// =============================================================================
// Full pipeline
// =============================================================================

fn bench_scroll(c: &mut Criterion) {
    let mut group = c.benchmark_group("smart_csr/scroll");
    let smart = SmartCsr::default();

    for (w, h) in SIZES {
        group.throughput(Throughput::Elements(u64::from(w) * u64::from(h)));
        let ctx = CapabilityContext::new(w, h, ScrollCaps::CSR).unwrap();
        let old = screen(w, h, 0);

        let scrolled = screen(w, h, 3);
        group.bench_with_input(
            BenchmarkId::new("up_3", format!("{w}x{h}")),
            &(&old, &scrolled),
            |b, (old, new)| b.iter(|| black_box(smart.scroll(&ctx, *old, *new, 0, h))),
        );

        group.bench_with_input(
            BenchmarkId::new("unchanged", format!("{w}x{h}")),
            &old,
            |b, old| b.iter(|| black_box(smart.scroll(&ctx, old, old, 0, h))),
        );

        let unrelated = screen(w, h, 100_000);
        group.bench_with_input(
            BenchmarkId::new("no_match", format!("{w}x{h}")),
            &(&old, &unrelated),
            |b, (old, new)| b.iter(|| black_box(smart.scroll(&ctx, *old, *new, 0, h))),
        );
    }

    group.finish();
}

// =============================================================================
// Detection on precomputed hashes
// =============================================================================

fn bench_detect(c: &mut Criterion) {
    let mut group = c.benchmark_group("smart_csr/detect");

    for h in [24u16, 40, 60] {
        let old: Vec<_> = (0..h)
            .map(|i| hash_line(format!("row {i}").as_bytes()))
            .collect();
        let down: Vec<_> = (0..h)
            .map(|i| hash_line(format!("row {}", i32::from(i) - 2).as_bytes()))
            .collect();
        group.bench_with_input(BenchmarkId::new("down_2", h), &h, |b, &h| {
            b.iter(|| black_box(detect_scroll_operation(&old, &down, 0, h)))
        });
    }

    group.finish();
}

fn bench_scroll_sequence(c: &mut Criterion) {
    let ctx = CapabilityContext::new(120, 40, ScrollCaps::CSR).unwrap();
    c.bench_function("smart_csr/scroll_sequence", |b| {
        b.iter(|| {
            black_box(scroll_sequence(
                &ctx,
                black_box(5),
                black_box(35),
                black_box(3),
                ScrollDirection::Up,
            ))
        })
    });
}

criterion_group!(benches, bench_scroll, bench_detect, bench_scroll_sequence);
criterion_main!(benches);
