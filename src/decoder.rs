//! Erasure recovery.
//!
//! The decoder receives exactly `original_count` blocks, any mix of
//! surviving originals and recovery blocks. Recovery buffers are solved in
//! place: after a successful call each descriptor's `index` names the
//! logical original position its buffer now holds. Descriptors are not
//! reordered, so callers locate recovered data by scanning indices.

use crate::bulk::{div_assign, muladd_into, xor_into};
use crate::matrix::{cauchy_element, factor_cauchy_ldu};
use crate::{BlockMut, Error, Gf256, Params};

/// Solver scratch kept on the stack before falling back to the heap.
/// Covers every system up to 45 simultaneous erasures.
const SCRATCH_STACK_BYTES: usize = 2048;

/// A surviving original block and its logical row.
struct Survivor<'s> {
    row: u8,
    data: &'s [u8],
}

/// A recovery block standing in for a lost original. `x` is its matrix
/// row; `index` is written back once the buffer holds recovered data.
struct Erased<'s> {
    x: u8,
    data: &'s mut [u8],
    index: &'s mut u8,
}

/// Reconstruct all original data in place.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if the array or a buffer does not match the
///   parameter geometry.
/// - [`Error::MalformedInput`] on a duplicate block index or an index
///   outside `[0, original_count + recovery_count)`.
/// - [`Error::OutOfMemory`] if heap scratch for a large system cannot be
///   allocated.
pub fn decode(params: &Params, blocks: &mut [BlockMut<'_>]) -> Result<(), Error> {
    let k = params.original_count();
    if blocks.len() != k {
        return Err(Error::InvalidInput);
    }
    if blocks.iter().any(|b| b.data.len() != params.block_bytes()) {
        return Err(Error::InvalidInput);
    }

    let total = k + params.recovery_count();
    let mut present = [false; 256];
    for block in blocks.iter() {
        let idx = block.index as usize;
        if idx >= total || present[idx] {
            return Err(Error::MalformedInput);
        }
        present[idx] = true;
    }

    // One original block: whatever arrived carries its bytes verbatim.
    if k == 1 {
        blocks[0].index = 0;
        return Ok(());
    }

    let mut survivors: Vec<Survivor<'_>> = Vec::new();
    let mut erased: Vec<Erased<'_>> = Vec::new();
    for block in blocks.iter_mut() {
        if (block.index as usize) < k {
            survivors.push(Survivor {
                row: block.index,
                data: &*block.data,
            });
        } else {
            erased.push(Erased {
                x: block.index,
                data: &mut *block.data,
                index: &mut block.index,
            });
        }
    }

    let r = erased.len();
    if r == 0 {
        return Ok(());
    }

    // Missing original positions, ascending; slot t of `erased` solves for
    // position ys[t].
    let ys: Vec<u8> = (0..k).filter(|&i| !present[i]).map(|i| i as u8).collect();
    debug_assert_eq!(ys.len(), r);

    // With a single recovery row defined, that row is the all-ones parity:
    // the missing block is the XOR of everything that arrived.
    if params.recovery_count() == 1 {
        let out = &mut erased[0];
        for s in &survivors {
            xor_into(out.data, s.data);
        }
        *out.index = ys[0];
        return Ok(());
    }

    let x_0 = k as u8;

    // Strip the surviving originals' contribution from every recovery row,
    // leaving each row a combination of only the unknown blocks.
    for s in &survivors {
        for rec in erased.iter_mut() {
            muladd_into(rec.data, s.data, cauchy_element(rec.x, x_0, s.row));
        }
    }

    let needed = r * r;
    let mut stack = [0u8; SCRATCH_STACK_BYTES];
    let mut heap: Vec<u8> = Vec::new();
    let scratch = if needed <= SCRATCH_STACK_BYTES {
        &mut stack[..needed]
    } else {
        heap.try_reserve_exact(needed)
            .map_err(|_| Error::OutOfMemory)?;
        heap.resize(needed, 0);
        heap.as_mut_slice()
    };

    let xs: Vec<u8> = erased.iter().map(|e| e.x).collect();
    let factors = factor_cauchy_ldu(&xs, &ys, x_0, scratch);

    // Forward substitution: fold each solved column into the rows below.
    let mut at = 0;
    for t in 0..r - 1 {
        let (solved, pending) = erased.split_at_mut(t + 1);
        let pivot = &*solved[t].data;
        for rec in pending.iter_mut() {
            muladd_into(rec.data, pivot, Gf256(factors.lower[at]));
            at += 1;
        }
    }

    // Diagonal: normalize each row and claim its recovered position.
    for (t, rec) in erased.iter_mut().enumerate() {
        div_assign(rec.data, Gf256(factors.diag[t]));
        *rec.index = ys[t];
    }

    // Back substitution, consuming the packed upper triangle in storage
    // order (columns descending, rows descending).
    let mut at = 0;
    for t in (1..r).rev() {
        let (pending, solved) = erased.split_at_mut(t);
        let pivot = &*solved[0].data;
        for rec in pending.iter_mut().rev() {
            muladd_into(rec.data, pivot, Gf256(factors.upper[at]));
            at += 1;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode, Block};

    #[test]
    fn rejects_wrong_block_count() {
        let p = Params::new(3, 2, 4).unwrap();
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        let mut blocks = [BlockMut::new(0, &mut a), BlockMut::new(1, &mut b)];
        assert_eq!(decode(&p, &mut blocks), Err(Error::InvalidInput));
    }

    #[test]
    fn rejects_duplicate_index() {
        let p = Params::new(2, 2, 4).unwrap();
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        let mut blocks = [BlockMut::new(0, &mut a), BlockMut::new(0, &mut b)];
        assert_eq!(decode(&p, &mut blocks), Err(Error::MalformedInput));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let p = Params::new(2, 2, 4).unwrap();
        let mut a = [0u8; 4];
        let mut b = [0u8; 4];
        // 2 + 2 blocks exist, so index 4 names nothing.
        let mut blocks = [BlockMut::new(0, &mut a), BlockMut::new(4, &mut b)];
        assert_eq!(decode(&p, &mut blocks), Err(Error::MalformedInput));
    }

    #[test]
    fn nothing_missing_is_a_no_op() {
        let p = Params::new(2, 1, 4).unwrap();
        let mut a = [1u8, 2, 3, 4];
        let mut b = [5u8, 6, 7, 8];
        let mut blocks = [BlockMut::new(0, &mut a), BlockMut::new(1, &mut b)];
        decode(&p, &mut blocks).unwrap();
        drop(blocks);
        assert_eq!(a, [1, 2, 3, 4]);
        assert_eq!(b, [5, 6, 7, 8]);
    }

    #[test]
    fn parity_fast_path_even_and_odd_survivors() {
        // The m = 1 shortcut XORs all survivors into the recovery block;
        // exercise both parities of the survivor count.
        for k in [3usize, 4] {
            let p = Params::new(k, 1, 8).unwrap();
            let originals: Vec<Vec<u8>> = (0..k)
                .map(|i| (0..8).map(|j| (i * 31 + j * 7) as u8).collect())
                .collect();
            let blocks: Vec<Block> = originals
                .iter()
                .enumerate()
                .map(|(i, d)| Block::new(i as u8, d))
                .collect();
            let mut recovery = vec![0u8; 8];
            encode(&p, &blocks, &mut recovery).unwrap();

            // Lose original 1, stand the parity block in for it.
            let mut bufs: Vec<Vec<u8>> = (0..k)
                .map(|i| if i == 1 { recovery.clone() } else { originals[i].clone() })
                .collect();
            let mut decode_blocks: Vec<BlockMut> = bufs
                .iter_mut()
                .enumerate()
                .map(|(i, d)| BlockMut::new(if i == 1 { k as u8 } else { i as u8 }, d))
                .collect();
            decode(&p, &mut decode_blocks).unwrap();
            assert_eq!(decode_blocks[1].index, 1, "k={k}");
            drop(decode_blocks);
            assert_eq!(bufs[1], originals[1], "k={k}");
        }
    }
}
