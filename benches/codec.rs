use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use crs256::{decode, encode, Block, BlockMut, Params};

const CONFIGS: &[(usize, usize, usize)] = &[(100, 30, 1296), (16, 4, 4096), (8, 2, 65536)];

fn patterned_blocks(count: usize, block_bytes: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            (0..block_bytes)
                .map(|j| ((i * block_bytes + j) % 256) as u8)
                .collect()
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for &(k, m, block_bytes) in CONFIGS {
        let params = Params::new(k, m, block_bytes).unwrap();
        let originals = patterned_blocks(k, block_bytes);
        let blocks: Vec<Block> = originals
            .iter()
            .enumerate()
            .map(|(i, data)| Block::new(i as u8, data))
            .collect();
        let mut recovery = vec![0u8; m * block_bytes];

        group.throughput(Throughput::Bytes((k * block_bytes) as u64));
        group.bench_function(BenchmarkId::from_parameter(format!("k{k}_m{m}_{block_bytes}B")), |b| {
            b.iter(|| encode(&params, &blocks, &mut recovery).unwrap())
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    for &(k, m, block_bytes) in CONFIGS {
        let params = Params::new(k, m, block_bytes).unwrap();
        let originals = patterned_blocks(k, block_bytes);
        let blocks: Vec<Block> = originals
            .iter()
            .enumerate()
            .map(|(i, data)| Block::new(i as u8, data))
            .collect();
        let mut recovery = vec![0u8; m * block_bytes];
        encode(&params, &blocks, &mut recovery).unwrap();

        // Worst case: every recovery slot in use.
        let losses = m.min(k);
        let setup = || -> Vec<(u8, Vec<u8>)> {
            (0..k)
                .map(|i| {
                    if i < losses {
                        (
                            params.recovery_block_index(i),
                            recovery[i * block_bytes..(i + 1) * block_bytes].to_vec(),
                        )
                    } else {
                        (i as u8, originals[i].clone())
                    }
                })
                .collect()
        };

        group.throughput(Throughput::Bytes((k * block_bytes) as u64));
        group.bench_function(BenchmarkId::from_parameter(format!("k{k}_m{m}_{block_bytes}B")), |b| {
            b.iter_batched(
                setup,
                |mut buffers| {
                    let mut incoming: Vec<BlockMut> = buffers
                        .iter_mut()
                        .map(|(index, data)| BlockMut::new(*index, data))
                        .collect();
                    decode(&params, &mut incoming).unwrap();
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
