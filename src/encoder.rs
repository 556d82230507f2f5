//! Recovery-block production.

use crate::bulk::{mul_into, muladd_into, xor_into, xor_set_into};
use crate::matrix::cauchy_element;
use crate::{Block, Error, Params};

/// Produce the recovery block with ordinal `recovery_index` into `output`.
///
/// `originals` must hold all `original_count` blocks in logical order and
/// `output` must be exactly `block_bytes` long; [`encode`] is the
/// validated entry point that drives this for every ordinal.
pub fn encode_block(
    params: &Params,
    originals: &[Block<'_>],
    recovery_index: usize,
    output: &mut [u8],
) {
    debug_assert_eq!(originals.len(), params.original_count());
    debug_assert_eq!(output.len(), params.block_bytes());
    debug_assert!(recovery_index < params.recovery_count());

    // A single original degenerates to repetition: every matrix row
    // collapses to 1, so each recovery block is a copy.
    if params.original_count() == 1 {
        output.copy_from_slice(originals[0].data);
        return;
    }

    // Row 0 of the normalized matrix is all ones: plain parity.
    if recovery_index == 0 {
        xor_set_into(output, originals[0].data, originals[1].data);
        for block in &originals[2..] {
            xor_into(output, block.data);
        }
        return;
    }

    let x_0 = params.original_count() as u8;
    let x_i = params.recovery_block_index(recovery_index);

    mul_into(output, originals[0].data, cauchy_element(x_i, x_0, 0));
    for (j, block) in originals.iter().enumerate().skip(1) {
        muladd_into(output, block.data, cauchy_element(x_i, x_0, j as u8));
    }
}

/// Encode all `recovery_count` recovery blocks into `recovery_out`,
/// concatenated in ordinal order.
///
/// # Errors
///
/// [`Error::InvalidInput`] if the block array or any buffer does not match
/// the parameter geometry.
pub fn encode(
    params: &Params,
    originals: &[Block<'_>],
    recovery_out: &mut [u8],
) -> Result<(), Error> {
    if originals.len() != params.original_count() {
        return Err(Error::InvalidInput);
    }
    if recovery_out.len() != params.recovery_count() * params.block_bytes() {
        return Err(Error::InvalidInput);
    }
    if originals.iter().any(|b| b.data.len() != params.block_bytes()) {
        return Err(Error::InvalidInput);
    }

    for (ordinal, chunk) in recovery_out
        .chunks_exact_mut(params.block_bytes())
        .enumerate()
    {
        encode_block(params, originals, ordinal, chunk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(k: usize, m: usize, bytes: usize) -> Params {
        Params::new(k, m, bytes).unwrap()
    }

    #[test]
    fn first_recovery_is_parity() {
        let p = params(3, 2, 4);
        let data = [[0x11u8, 0x22, 0x33, 0x44], [0x55, 0x66, 0x77, 0x88], [0x99, 0xaa, 0xbb, 0xcc]];
        let blocks: Vec<Block> = data
            .iter()
            .enumerate()
            .map(|(i, d)| Block::new(i as u8, d))
            .collect();

        let mut recovery = vec![0u8; 8];
        encode(&p, &blocks, &mut recovery).unwrap();
        assert_eq!(&recovery[..4], &[0xdd, 0xee, 0xff, 0x00]);
    }

    #[test]
    fn single_original_repeats() {
        let p = params(1, 3, 8);
        let data: Vec<u8> = (0..8).collect();
        let blocks = [Block::new(0, &data)];

        let mut recovery = vec![0u8; 24];
        encode(&p, &blocks, &mut recovery).unwrap();
        for chunk in recovery.chunks_exact(8) {
            assert_eq!(chunk, &data[..]);
        }
    }

    #[test]
    fn two_originals_one_recovery() {
        // Smallest configuration that takes the parity unroll; the single
        // recovery block must be written exactly once.
        let p = params(2, 1, 4);
        let a = [1u8, 2, 3, 4];
        let b = [5u8, 6, 7, 8];
        let blocks = [Block::new(0, &a), Block::new(1, &b)];

        let mut recovery = vec![0u8; 4];
        encode(&p, &blocks, &mut recovery).unwrap();
        assert_eq!(recovery, vec![4u8, 4, 4, 12]);
    }

    #[test]
    fn rejects_wrong_geometry() {
        let p = params(2, 1, 4);
        let a = [0u8; 4];
        let b = [0u8; 4];

        let mut recovery = vec![0u8; 4];
        let short = [Block::new(0, &a)];
        assert_eq!(encode(&p, &short, &mut recovery), Err(Error::InvalidInput));

        let blocks = [Block::new(0, &a), Block::new(1, &b)];
        let mut wrong = vec![0u8; 3];
        assert_eq!(encode(&p, &blocks, &mut wrong), Err(Error::InvalidInput));

        let odd = [0u8; 3];
        let mismatched = [Block::new(0, &a), Block::new(1, &odd)];
        assert_eq!(encode(&p, &mismatched, &mut recovery), Err(Error::InvalidInput));
    }
}
