//! The normalized Cauchy generator matrix and its LDU factorization.
//!
//! With `x_0 = k`, `x_i = k + i` for recovery row `i` and `y_j = j` for
//! original column `j`, the generator is
//!
//! ```text
//! G[i][j] = (y_j + x_0) / (x_i + y_j)
//! ```
//!
//! in GF(256). Dividing each column by its first-row element makes row 0
//! all ones, so the first recovery block is plain XOR parity. The `x` and
//! `y` sets never intersect (`y < k <= x`), which keeps every denominator
//! non-zero and every square submatrix invertible.

use crate::bulk::{div_assign, mul_assign};
use crate::gf::Gf256;

/// Element `G[i][j]` of the normalized Cauchy matrix.
///
/// Returns 1 whenever `x_i == x_0`; callers unroll that row into plain
/// XOR instead of calling this.
#[inline]
pub(crate) fn cauchy_element(x_i: u8, x_0: u8, y_j: u8) -> Gf256 {
    (Gf256(y_j) + Gf256(x_0)) / (Gf256(x_i) + Gf256(y_j))
}

/// Packed LDU factors of an `r x r` Cauchy submatrix, borrowed from the
/// caller's scratch buffer.
///
/// `lower` holds the strictly-lower triangle column-major, columns
/// ascending and rows top-down within a column — the order forward
/// substitution consumes it. `upper` holds the strictly-upper triangle
/// column-major with columns *descending* and rows descending within a
/// column — the order back substitution consumes it. Both triangles have
/// an implicit unit diagonal; the diagonal factors of `L` and `U` are
/// folded into `diag`.
pub(crate) struct LduFactors<'a> {
    pub(crate) upper: &'a [u8],
    pub(crate) diag: &'a [u8],
    pub(crate) lower: &'a [u8],
}

/// Position of `U[t][s]` (`t < s`) inside the packed upper triangle.
#[inline]
fn upper_slot(n: usize, t: usize, s: usize) -> usize {
    n * (n - 1) / 2 - s * (s + 1) / 2 + (s - 1 - t)
}

/// Factor the submatrix selecting recovery rows `x` and erasure columns
/// `y` into `L * D * U`, written into `scratch` (`n * n` bytes) as
/// `[upper | diag | lower]`.
///
/// Schur-type direct Cauchy factorization, algorithm 2.5 of Boros,
/// Kailath, Olshevsky, "Pivoting and Backward Stability of Fast Algorithms
/// for Solving Cauchy Linear Equations", with the triangle diagonals
/// folded into `D` so substitution needs one multiply per element.
pub(crate) fn factor_cauchy_ldu<'a>(
    x: &[u8],
    y: &[u8],
    x_0: u8,
    scratch: &'a mut [u8],
) -> LduFactors<'a> {
    let n = x.len();
    debug_assert!(n >= 1);
    debug_assert_eq!(n, y.len());
    debug_assert_eq!(scratch.len(), n * n);

    let triangle = n * (n - 1) / 2;
    let (upper, rest) = scratch.split_at_mut(triangle);
    let (diag, lower) = rest.split_at_mut(n);

    // Generator vectors of the Schur recurrence.
    let mut g = [Gf256(1); 256];
    let mut b = [Gf256(1); 256];

    // One row of U is staged contiguously so the pivot division can run
    // as a bulk op before the row is scattered into the packed layout.
    let mut row_u = [0u8; 256];
    let mut l_at = 0;

    for t in 0..n.saturating_sub(1) {
        let x_t = Gf256(x[t]);
        let y_t = Gf256(y[t]);

        let d_tt = x_t + y_t;
        let l_tt = g[t] / d_tt;
        let u_tt = b[t] / d_tt * (Gf256(x_0) + y_t);
        diag[t] = (d_tt * l_tt * u_tt).0;

        let width = n - t - 1;
        for s in t + 1..n {
            let x_s = Gf256(x[s]);
            let y_s = Gf256(y[s]);

            lower[l_at + s - t - 1] = (g[s] / (x_s + y_t)).0;
            row_u[s - t - 1] = (b[s] / (x_t + y_s)).0;

            g[s] = g[s] * (x_s + x_t) / (x_s + y_t);
            b[s] = b[s] * (y_s + y_t) / (y_s + x_t);
        }

        div_assign(&mut lower[l_at..l_at + width], l_tt);
        div_assign(&mut row_u[..width], u_tt);
        l_at += width;

        for s in t + 1..n {
            upper[upper_slot(n, t, s)] = row_u[s - t - 1];
        }
    }

    // Undo the column normalization: scale column s of U by (x_0 + y_s).
    // Column s occupies the next s packed entries, columns descending.
    let mut u_at = 0;
    for s in (1..n).rev() {
        mul_assign(&mut upper[u_at..u_at + s], Gf256(x_0) + Gf256(y[s]));
        u_at += s;
    }

    let x_last = Gf256(x[n - 1]);
    let y_last = Gf256(y[n - 1]);
    diag[n - 1] = (g[n - 1] * b[n - 1] * (Gf256(x_0) + y_last) / (x_last + y_last)).0;

    LduFactors { upper, diag, lower }
}
