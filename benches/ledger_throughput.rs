//! Cache line ledger throughput benchmark
//!
//! Traces run to hundreds of millions of lines, so `record_access` is the
//! hot path of every analysis.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench ledger_throughput
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use falseshare::config::AnalysisConfig;
use falseshare::ledger::CacheLineLedger;
use falseshare::pipeline;

/// Threads hammering neighbouring counters, like a padded-vs-unpadded benchmark
fn synthetic_accesses(n: u64, threads: u64) -> Vec<(bool, u64, u64, u64)> {
    (0..n)
        .map(|i| {
            let tid = i % threads;
            (i % 2 == 1, 0x601040 + tid * 4, 4, tid)
        })
        .collect()
}

fn synthetic_trace(n: u64, threads: u64) -> String {
    let mut trace = String::from("#\n# Memory Access Trace Generated By Pin\n#\n");
    for (is_write, addr, size, tid) in synthetic_accesses(n, threads) {
        let rw = if is_write { 'W' } else { 'R' };
        trace.push_str(&format!("0x401136: {} {:#x} {} {} 0x0\n", rw, addr, size, tid));
    }
    trace.push_str("#eof\n");
    trace
}

fn bench_record_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_access");

    for threads in [2u64, 4, 8] {
        let accesses = synthetic_accesses(10_000, threads);
        group.throughput(Throughput::Elements(accesses.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(threads), &accesses, |b, accesses| {
            b.iter(|| {
                let mut ledger = CacheLineLedger::new(64);
                let mut conflicts = 0usize;
                for &(is_write, addr, size, tid) in accesses {
                    conflicts += ledger.record_access(is_write, addr, size, tid).len();
                }
                black_box(conflicts)
            });
        });
    }

    group.finish();
}

fn bench_detect_trace(c: &mut Criterion) {
    let trace = synthetic_trace(10_000, 4);
    let config = AnalysisConfig::default();

    let mut group = c.benchmark_group("detect");
    group.throughput(Throughput::Bytes(trace.len() as u64));
    group.bench_function("parse_and_detect_10k", |b| {
        b.iter(|| {
            let mut conflicts = 0u64;
            let stats = pipeline::detect(trace.as_bytes(), &config, |_| conflicts += 1).unwrap();
            black_box((stats, conflicts))
        });
    });
    group.finish();
}

criterion_group!(benches, bench_record_access, bench_detect_trace);
criterion_main!(benches);
