use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use packed_hashtable::{Handle, PackedHashTable, PackedHashTableRl, RemoveWhen};
use std::collections::HashMap;
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

#[derive(Clone, Copy, Default)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
    lifetime: f32,
}

fn particle(seed: u64) -> Particle {
    let f = (seed % 1000) as f32;
    Particle {
        position: [f, -f, 0.0],
        velocity: [1.0, 0.5, 0.25],
        lifetime: (seed % 7) as f32,
    }
}

fn integrate(p: &mut Particle) {
    for (x, v) in p.position.iter_mut().zip(p.velocity) {
        *x += v * 0.016;
    }
    p.lifetime -= 0.016;
}

fn bench_add_100k(c: &mut Criterion) {
    c.bench_function("packed::add_fresh_100k", |b| {
        b.iter_batched(
            PackedHashTable::<u64, Particle>::new,
            |mut t| {
                for x in lcg(1).take(100_000) {
                    t.add(x, particle(x));
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    c.bench_function("packed::find_hit_10k_on_100k", |b| {
        let keys: Vec<u64> = lcg(7).take(100_000).collect();
        let t: PackedHashTable<u64, Particle> = keys.iter().map(|&k| (k, particle(k))).collect();
        // Precompute 10k random query keys using LCG
        let n = keys.len();
        let mut s = 0x9e3779b97f4a7c15u64;
        let queries: Vec<u64> = (0..10_000)
            .map(|_| {
                s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                keys[(s as usize) % n]
            })
            .collect();
        b.iter(|| {
            for k in &queries {
                black_box(t.get(k));
            }
        })
    });
}

fn bench_handle_access_10k(c: &mut Criterion) {
    c.bench_function("packed::handle_access_integrate_10k", |b| {
        b.iter_batched(
            || {
                let mut t: PackedHashTable<u64, Particle> = PackedHashTable::new();
                let handles: Vec<Handle> = lcg(123)
                    .take(100_000)
                    .filter_map(|x| t.add(x, particle(x)).0.handle(&t))
                    .collect();
                let n = handles.len();
                let mut s = 0x9e3779b97f4a7c15u64;
                let targets: Vec<Handle> = (0..10_000)
                    .map(|_| {
                        s = s.wrapping_mul(2862933555777941757).wrapping_add(3037000493);
                        handles[(s as usize) % n]
                    })
                    .collect();
                (t, targets)
            },
            |(mut t, targets)| {
                for h in targets {
                    t.call_handle_mut(h, integrate);
                }
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });
}

// Dense iteration is the reason the table exists; compare against walking
// the values of a std HashMap holding the same entries.
fn bench_value_iteration(c: &mut Criterion) {
    let entries: Vec<(u64, Particle)> = lcg(999).take(100_000).map(|x| (x, particle(x))).collect();

    c.bench_function("packed::values_mut_integrate_100k", |b| {
        let mut t: PackedHashTable<u64, Particle> = entries.iter().copied().collect();
        b.iter(|| {
            for p in t.values_mut() {
                integrate(p);
            }
            black_box(t.as_slice().len())
        })
    });

    c.bench_function("std::values_mut_integrate_100k", |b| {
        let mut m: HashMap<u64, Particle> = entries.iter().copied().collect();
        b.iter(|| {
            for p in m.values_mut() {
                integrate(p);
            }
            black_box(m.len())
        })
    });
}

fn bench_sort_and_remove_when(c: &mut Criterion) {
    c.bench_function("packed::sort_by_key_100k", |b| {
        b.iter_batched(
            || -> PackedHashTableRl<u64, Particle> {
                lcg(4242).take(100_000).map(|x| (x, particle(x))).collect()
            },
            |mut t| {
                let keys: Vec<u64> = (0..t.len())
                    .map(|pos| t.key_from_index(pos).copied().unwrap_or_default())
                    .collect();
                t.sort_by(|l, r| keys[l].cmp(&keys[r]));
                black_box(t)
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("packed::remove_when_expired_100k", |b| {
        b.iter_batched(
            || -> PackedHashTableRl<u64, Particle> {
                lcg(77).take(100_000).map(|x| (x, particle(x))).collect()
            },
            |mut t| {
                let removed = t.remove_when(|p| p.lifetime < 1.0);
                black_box((t, removed))
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_build;
    config = bench_config();
    targets = bench_add_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_find_hit_10k,
              bench_handle_access_10k,
              bench_value_iteration,
              bench_sort_and_remove_when
}
criterion_main!(benches_build, benches_ops);
