//! Performance benchmarks for the clip server hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::runtime::Runtime;

use lofi_radio::{
    ClipDelivery, ClipGenerator, ClipOrchestrator, DEFAULT_PROMPTS, GeneratorResult,
    MemoryClipStore, PromptCatalog, SlotIndex, SlotPicker,
};

/// Returns a fixed payload instantly
struct StaticGenerator(Bytes);

#[async_trait]
impl ClipGenerator for StaticGenerator {
    async fn generate(&self, _prompt: &str) -> GeneratorResult<Bytes> {
        Ok(self.0.clone())
    }
}

fn warm_orchestrator(rt: &Runtime, clip_size: usize) -> Arc<ClipOrchestrator> {
    let orchestrator = Arc::new(ClipOrchestrator::new(
        Arc::new(MemoryClipStore::new(64)),
        Arc::new(StaticGenerator(Bytes::from(vec![0u8; clip_size]))),
        Arc::new(PromptCatalog::from_prompts(DEFAULT_PROMPTS)),
        Duration::from_secs(3600),
    ));
    rt.block_on(async {
        for slot in 0..DEFAULT_PROMPTS.len() {
            let _ = orchestrator.acquire(SlotIndex::new(slot)).await;
        }
    });
    orchestrator
}

/// Benchmark cache-hit acquisition for several clip sizes
fn bench_cached_acquire(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cached_acquire");
    group.measurement_time(Duration::from_secs(5));

    for size in [64 * 1024, 512 * 1024, 2 * 1024 * 1024] {
        let orchestrator = warm_orchestrator(&rt, size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &orchestrator, |b, o| {
            b.to_async(&rt)
                .iter(|| async { black_box(o.acquire(SlotIndex::new(2)).await) });
        });
    }

    group.finish();
}

/// Benchmark a full delivery with an exclusion, cache warm
fn bench_delivery(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let delivery = ClipDelivery::new(warm_orchestrator(&rt, 256 * 1024));

    c.bench_function("deliver_with_exclude", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(delivery.deliver(Some(SlotIndex::new(0))).await)
        });
    });
}

/// Benchmark the anti-repeat slot draw
fn bench_slot_picker(c: &mut Criterion) {
    let picker = SlotPicker::new(DEFAULT_PROMPTS.len());
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("slot_pick", |b| {
        b.iter(|| picker.pick(black_box(Some(SlotIndex::new(3))), &mut rng));
    });
}

criterion_group!(benches, bench_cached_acquire, bench_delivery, bench_slot_picker);
criterion_main!(benches);
