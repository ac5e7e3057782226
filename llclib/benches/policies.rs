use criterion::{criterion_group, criterion_main, Criterion};
use llclib::config::CacheConfig;
use llclib::simulator::Simulator;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

const RECORDS: usize = 100_000;

/// Synthesises a trace of line-sized accesses over a 16MiB footprint, which
/// comfortably exceeds the benched cache and keeps every policy busy evicting
fn synthesise_trace(records: usize, seed: u64) -> Vec<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(records * 40);
    for _ in 0..records {
        let pc = rng.next_u64() & 0xFFFF_FFFF;
        let paddr = rng.next_u64() % (1 << 24);
        let access_type = rng.next_u32() % 4;
        out.extend_from_slice(format!("00 {access_type:02X} {pc:016X} {paddr:016X}\n").as_bytes());
    }
    out
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let trace = synthesise_trace(RECORDS, 17);
    for policy in ["lru", "random", "contestant"] {
        let config: CacheConfig = serde_json::from_str(&format!(
            r#"{{"name": "llc", "line_size": 64, "num_sets": 1024, "associativity": 16, "policy": "{policy}", "seed": 1}}"#
        ))
        .unwrap();
        c.bench_function(&format!("{RECORDS} accesses, {policy}"), |b| {
            let mut simulator = Simulator::new(&config).unwrap();
            b.iter(|| {
                simulator.simulate(&trace).unwrap();
            });
        });
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);
