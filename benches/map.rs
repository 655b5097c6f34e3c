//! Map get/set benchmarks.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use shmap::map::IntIntMap;
use shmap::memory::HeapSegment;

const CAPACITY: usize = 4096;

fn map_at_load(load_percent: usize) -> IntIntMap {
    let segment = HeapSegment::new(8 + 16 * CAPACITY).unwrap();
    let map = IntIntMap::new(segment, None).unwrap();
    for key in 0..(CAPACITY * load_percent / 100) as i64 {
        map.set(key, key).unwrap();
    }
    map
}

fn bench_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_hit");

    for load in [25, 50, 90] {
        let map = map_at_load(load);
        let probe_key = (CAPACITY * load / 200) as i64;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(load), &map, |b, map| {
            b.iter(|| map.get(std::hint::black_box(probe_key)).unwrap());
        });
    }

    group.finish();
}

fn bench_get_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_miss");

    for load in [25, 50, 90] {
        let map = map_at_load(load);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(load), &map, |b, map| {
            b.iter(|| map.get(std::hint::black_box(-7)).unwrap());
        });
    }

    group.finish();
}

fn bench_set_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_update");

    for load in [25, 50, 90] {
        let map = map_at_load(load);
        let probe_key = (CAPACITY * load / 200) as i64;

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(load), &map, |b, map| {
            let mut value = 0i64;
            b.iter(|| {
                value = value.wrapping_add(1);
                map.set(std::hint::black_box(probe_key), value).unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get_hit, bench_get_miss, bench_set_update);
criterion_main!(benches);
