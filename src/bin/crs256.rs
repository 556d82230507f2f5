//! Demo and measurement harness: encode random data, erase blocks,
//! decode, verify, and time the codec.

use std::time::Instant;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crs256::{decode, encode, Block, BlockMut, Params};

#[derive(Parser)]
#[command(name = "crs256", about = "Cauchy Reed-Solomon erasure codec demo", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure encode and decode throughput.
    Bench {
        #[arg(long, default_value_t = 100)]
        originals: usize,
        #[arg(long, default_value_t = 30)]
        recoveries: usize,
        #[arg(long, default_value_t = 1296)]
        block_bytes: usize,
        #[arg(long, default_value_t = 1000)]
        trials: usize,
    },
    /// Encode random data, erase random blocks, decode, and verify.
    Recover {
        #[arg(long, default_value_t = 8)]
        originals: usize,
        #[arg(long, default_value_t = 4)]
        recoveries: usize,
        #[arg(long, default_value_t = 1024)]
        block_bytes: usize,
        /// How many original blocks to erase; defaults to one per recovery.
        #[arg(long)]
        losses: Option<usize>,
        #[arg(long, default_value_t = 0xc0ffee)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    crs256::init().context("codec initialization")?;
    info!(kernel = crs256::active_kernel(), "codec ready");

    match Cli::parse().command {
        Command::Bench {
            originals,
            recoveries,
            block_bytes,
            trials,
        } => bench(originals, recoveries, block_bytes, trials),
        Command::Recover {
            originals,
            recoveries,
            block_bytes,
            losses,
            seed,
        } => recover(originals, recoveries, block_bytes, losses, seed),
    }
}

fn random_blocks(rng: &mut StdRng, count: usize, block_bytes: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|_| {
            let mut block = vec![0u8; block_bytes];
            rng.fill_bytes(&mut block);
            block
        })
        .collect()
}

fn bench(k: usize, m: usize, block_bytes: usize, trials: usize) -> Result<()> {
    let params = Params::new(k, m, block_bytes)?;
    let mut rng = StdRng::seed_from_u64(0x5eed);

    let originals = random_blocks(&mut rng, k, block_bytes);
    let blocks: Vec<Block> = originals
        .iter()
        .enumerate()
        .map(|(i, data)| Block::new(i as u8, data))
        .collect();
    let mut recovery = vec![0u8; m * block_bytes];

    let started = Instant::now();
    for _ in 0..trials {
        encode(&params, &blocks, &mut recovery)?;
    }
    let encode_us = started.elapsed().as_micros() as f64 / trials as f64;
    let payload = (k * block_bytes) as f64;
    println!(
        "encode (k={k}, m={m}, {block_bytes} B/block): {encode_us:.2} us/call, {:.2} MB/s",
        payload / encode_us
    );

    // Worst-case loss pattern: the first min(m, k) originals replaced by
    // recovery blocks, forcing the full LDU solve every trial.
    let losses = m.min(k);
    let started = Instant::now();
    for _ in 0..trials {
        let mut buffers: Vec<Vec<u8>> = (0..k)
            .map(|i| {
                if i < losses {
                    recovery[i * block_bytes..(i + 1) * block_bytes].to_vec()
                } else {
                    originals[i].clone()
                }
            })
            .collect();
        let mut incoming: Vec<BlockMut> = buffers
            .iter_mut()
            .enumerate()
            .map(|(i, data)| {
                let index = if i < losses {
                    params.recovery_block_index(i)
                } else {
                    i as u8
                };
                BlockMut::new(index, data)
            })
            .collect();
        decode(&params, &mut incoming)?;
    }
    let decode_us = started.elapsed().as_micros() as f64 / trials as f64;
    println!(
        "decode ({losses} erasures): {decode_us:.2} us/call, {:.2} MB/s",
        payload / decode_us
    );
    Ok(())
}

fn recover(k: usize, m: usize, block_bytes: usize, losses: Option<usize>, seed: u64) -> Result<()> {
    let params = Params::new(k, m, block_bytes)?;
    let losses = losses.unwrap_or(m.min(k));
    if losses > m.min(k) {
        bail!("cannot erase {losses} blocks with {m} recoveries over {k} originals");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let originals = random_blocks(&mut rng, k, block_bytes);
    let blocks: Vec<Block> = originals
        .iter()
        .enumerate()
        .map(|(i, data)| Block::new(i as u8, data))
        .collect();
    let mut recovery = vec![0u8; m * block_bytes];
    encode(&params, &blocks, &mut recovery)?;

    let mut lost: Vec<usize> = (0..k).collect();
    lost.shuffle(&mut rng);
    lost.truncate(losses);
    lost.sort_unstable();

    let mut used: Vec<usize> = (0..m).collect();
    used.shuffle(&mut rng);
    used.truncate(losses);

    info!(?lost, recovery = ?used, "erasing original blocks");

    let mut substitutes = used.iter();
    let mut buffers: Vec<(u8, Vec<u8>)> = Vec::with_capacity(k);
    for i in 0..k {
        if lost.binary_search(&i).is_ok() {
            let &j = substitutes.next().expect("one recovery per loss");
            buffers.push((
                params.recovery_block_index(j),
                recovery[j * block_bytes..(j + 1) * block_bytes].to_vec(),
            ));
        } else {
            buffers.push((i as u8, originals[i].clone()));
        }
    }
    let mut incoming: Vec<BlockMut> = buffers
        .iter_mut()
        .map(|(index, data)| BlockMut::new(*index, data))
        .collect();

    let started = Instant::now();
    decode(&params, &mut incoming)?;
    let elapsed = started.elapsed();

    let mut seen = vec![false; k];
    for block in &incoming {
        let idx = block.index as usize;
        ensure!(idx < k, "index {idx} out of range after decode");
        ensure!(!seen[idx], "position {idx} recovered twice");
        seen[idx] = true;
        ensure!(
            block.data[..] == originals[idx][..],
            "block {idx} corrupt after decode"
        );
    }

    info!(elapsed_us = elapsed.as_micros() as u64, "decode verified");
    println!("recovered {losses} of {k} blocks OK ({block_bytes} bytes each)");
    Ok(())
}
