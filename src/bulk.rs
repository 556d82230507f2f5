//! Bulk GF(256) operations over byte buffers.
//!
//! Buffers are treated as vectors over the field. The XOR forms work on
//! machine words; the multiply forms go through a kernel table selected
//! once per process from detected CPU features. The scalar kernels are the
//! reference semantics, the SIMD kernels must match them byte for byte.

use std::sync::OnceLock;

use crate::gf::Gf256;

/// The multiply kernels installed for this process.
///
/// Selected by [`kernels`] on first use: AVX2, then SSSE3 on x86-64, NEON
/// on aarch64, table-lookup scalar otherwise.
pub(crate) struct Kernels {
    pub(crate) name: &'static str,
    mul: fn(&mut [u8], &[u8], u8),
    mul_assign: fn(&mut [u8], u8),
    muladd: fn(&mut [u8], &[u8], u8),
}

pub(crate) fn kernels() -> &'static Kernels {
    static SELECTED: OnceLock<Kernels> = OnceLock::new();
    SELECTED.get_or_init(select)
}

fn select() -> Kernels {
    #[cfg(all(feature = "simd", target_arch = "x86_64"))]
    {
        if is_x86_feature_detected!("avx2") {
            return Kernels {
                name: "avx2",
                mul: x86::mul_avx2,
                mul_assign: x86::mul_assign_avx2,
                muladd: x86::muladd_avx2,
            };
        }
        if is_x86_feature_detected!("ssse3") {
            return Kernels {
                name: "ssse3",
                mul: x86::mul_ssse3,
                mul_assign: x86::mul_assign_ssse3,
                muladd: x86::muladd_ssse3,
            };
        }
    }

    #[cfg(all(feature = "simd", target_arch = "aarch64"))]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return Kernels {
                name: "neon",
                mul: neon::mul,
                mul_assign: neon::mul_assign,
                muladd: neon::muladd,
            };
        }
    }

    Kernels {
        name: "scalar",
        mul: scalar::mul,
        mul_assign: scalar::mul_assign,
        muladd: scalar::muladd,
    }
}

/// `dst[i] ^= src[i]`.
pub(crate) fn xor_into(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    let words = dst.len() / 8;
    for i in 0..words {
        let at = i * 8;
        let d = u64::from_ne_bytes(dst[at..at + 8].try_into().unwrap());
        let s = u64::from_ne_bytes(src[at..at + 8].try_into().unwrap());
        dst[at..at + 8].copy_from_slice(&(d ^ s).to_ne_bytes());
    }
    for i in words * 8..dst.len() {
        dst[i] ^= src[i];
    }
}

/// `dst[i] = a[i] ^ b[i]`.
pub(crate) fn xor_set_into(dst: &mut [u8], a: &[u8], b: &[u8]) {
    debug_assert_eq!(dst.len(), a.len());
    debug_assert_eq!(dst.len(), b.len());
    let words = dst.len() / 8;
    for i in 0..words {
        let at = i * 8;
        let lhs = u64::from_ne_bytes(a[at..at + 8].try_into().unwrap());
        let rhs = u64::from_ne_bytes(b[at..at + 8].try_into().unwrap());
        dst[at..at + 8].copy_from_slice(&(lhs ^ rhs).to_ne_bytes());
    }
    for i in words * 8..dst.len() {
        dst[i] = a[i] ^ b[i];
    }
}

/// `dst[i] = c * src[i]`. Buffers must be disjoint.
pub(crate) fn mul_into(dst: &mut [u8], src: &[u8], c: Gf256) {
    debug_assert_eq!(dst.len(), src.len());
    if c.0 == 0 {
        dst.fill(0);
        return;
    }
    if c.0 == 1 {
        dst.copy_from_slice(src);
        return;
    }
    (kernels().mul)(dst, src, c.0)
}

/// `dst[i] = c * dst[i]`, the aliased form of `mul_into`.
pub(crate) fn mul_assign(dst: &mut [u8], c: Gf256) {
    if c.0 == 0 {
        dst.fill(0);
        return;
    }
    if c.0 == 1 {
        return;
    }
    (kernels().mul_assign)(dst, c.0)
}

/// `dst[i] ^= c * src[i]`.
pub(crate) fn muladd_into(dst: &mut [u8], src: &[u8], c: Gf256) {
    debug_assert_eq!(dst.len(), src.len());
    if c.0 == 0 {
        return;
    }
    if c.0 == 1 {
        xor_into(dst, src);
        return;
    }
    (kernels().muladd)(dst, src, c.0)
}

/// `dst[i] = dst[i] / c`. `c` must be non-zero.
pub(crate) fn div_assign(dst: &mut [u8], c: Gf256) {
    debug_assert_ne!(c.0, 0);
    mul_assign(dst, Gf256(1) / c)
}

mod scalar {
    use crate::gf::GF_PRODUCT;

    pub(super) fn mul(dst: &mut [u8], src: &[u8], c: u8) {
        let row = GF_PRODUCT.row(c);
        for (d, &s) in dst.iter_mut().zip(src) {
            *d = row[s as usize];
        }
    }

    pub(super) fn mul_assign(dst: &mut [u8], c: u8) {
        let row = GF_PRODUCT.row(c);
        for d in dst.iter_mut() {
            *d = row[*d as usize];
        }
    }

    pub(super) fn muladd(dst: &mut [u8], src: &[u8], c: u8) {
        let row = GF_PRODUCT.row(c);
        for (d, &s) in dst.iter_mut().zip(src) {
            *d ^= row[s as usize];
        }
    }
}

#[cfg(all(feature = "simd", target_arch = "x86_64"))]
mod x86 {
    use std::arch::x86_64::*;

    use crate::gf::{GF_NIBBLE, GF_PRODUCT};

    #[inline(always)]
    unsafe fn tables_128(c: u8) -> (__m128i, __m128i, __m128i) {
        let lo = _mm_loadu_si128(GF_NIBBLE.lo[c as usize].as_ptr() as *const __m128i);
        let hi = _mm_loadu_si128(GF_NIBBLE.hi[c as usize].as_ptr() as *const __m128i);
        (lo, hi, _mm_set1_epi8(0x0f))
    }

    /// Multiply 16 bytes by the coefficient behind `lo`/`hi` via pshufb.
    #[inline(always)]
    unsafe fn mul16(src: *const u8, lo: __m128i, hi: __m128i, mask: __m128i) -> __m128i {
        let data = _mm_loadu_si128(src as *const __m128i);
        let lo_out = _mm_shuffle_epi8(lo, _mm_and_si128(data, mask));
        let hi_out = _mm_shuffle_epi8(hi, _mm_and_si128(_mm_srli_epi64(data, 4), mask));
        _mm_xor_si128(lo_out, hi_out)
    }

    #[inline(always)]
    unsafe fn tables_256(c: u8) -> (__m256i, __m256i, __m256i) {
        let lo = _mm_loadu_si128(GF_NIBBLE.lo[c as usize].as_ptr() as *const __m128i);
        let hi = _mm_loadu_si128(GF_NIBBLE.hi[c as usize].as_ptr() as *const __m128i);
        (
            _mm256_broadcastsi128_si256(lo),
            _mm256_broadcastsi128_si256(hi),
            _mm256_set1_epi8(0x0f),
        )
    }

    #[inline(always)]
    unsafe fn mul32(src: *const u8, lo: __m256i, hi: __m256i, mask: __m256i) -> __m256i {
        let data = _mm256_loadu_si256(src as *const __m256i);
        let lo_out = _mm256_shuffle_epi8(lo, _mm256_and_si256(data, mask));
        let hi_out = _mm256_shuffle_epi8(hi, _mm256_and_si256(_mm256_srli_epi64(data, 4), mask));
        _mm256_xor_si256(lo_out, hi_out)
    }

    fn mul_tail(dst: &mut [u8], src: &[u8], c: u8, from: usize) {
        let row = GF_PRODUCT.row(c);
        for i in from..dst.len() {
            dst[i] = row[src[i] as usize];
        }
    }

    fn muladd_tail(dst: &mut [u8], src: &[u8], c: u8, from: usize) {
        let row = GF_PRODUCT.row(c);
        for i in from..dst.len() {
            dst[i] ^= row[src[i] as usize];
        }
    }

    fn mul_assign_tail(dst: &mut [u8], c: u8, from: usize) {
        let row = GF_PRODUCT.row(c);
        for i in from..dst.len() {
            dst[i] = row[dst[i] as usize];
        }
    }

    #[target_feature(enable = "ssse3")]
    unsafe fn mul_ssse3_body(dst: &mut [u8], src: &[u8], c: u8) {
        let (lo, hi, mask) = tables_128(c);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            let out = mul16(src.as_ptr().add(at), lo, hi, mask);
            _mm_storeu_si128(dst.as_mut_ptr().add(at) as *mut __m128i, out);
        }
        mul_tail(dst, src, c, lanes * 16);
    }

    #[target_feature(enable = "ssse3")]
    unsafe fn muladd_ssse3_body(dst: &mut [u8], src: &[u8], c: u8) {
        let (lo, hi, mask) = tables_128(c);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            let product = mul16(src.as_ptr().add(at), lo, hi, mask);
            let current = _mm_loadu_si128(dst.as_ptr().add(at) as *const __m128i);
            _mm_storeu_si128(
                dst.as_mut_ptr().add(at) as *mut __m128i,
                _mm_xor_si128(current, product),
            );
        }
        muladd_tail(dst, src, c, lanes * 16);
    }

    #[target_feature(enable = "ssse3")]
    unsafe fn mul_assign_ssse3_body(dst: &mut [u8], c: u8) {
        let (lo, hi, mask) = tables_128(c);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            let out = mul16(dst.as_ptr().add(at), lo, hi, mask);
            _mm_storeu_si128(dst.as_mut_ptr().add(at) as *mut __m128i, out);
        }
        mul_assign_tail(dst, c, lanes * 16);
    }

    #[target_feature(enable = "avx2")]
    unsafe fn mul_avx2_body(dst: &mut [u8], src: &[u8], c: u8) {
        let (lo, hi, mask) = tables_256(c);
        let lanes = dst.len() / 32;
        for i in 0..lanes {
            let at = i * 32;
            let out = mul32(src.as_ptr().add(at), lo, hi, mask);
            _mm256_storeu_si256(dst.as_mut_ptr().add(at) as *mut __m256i, out);
        }
        mul_tail(dst, src, c, lanes * 32);
    }

    #[target_feature(enable = "avx2")]
    unsafe fn muladd_avx2_body(dst: &mut [u8], src: &[u8], c: u8) {
        let (lo, hi, mask) = tables_256(c);
        let lanes = dst.len() / 32;
        for i in 0..lanes {
            let at = i * 32;
            let product = mul32(src.as_ptr().add(at), lo, hi, mask);
            let current = _mm256_loadu_si256(dst.as_ptr().add(at) as *const __m256i);
            _mm256_storeu_si256(
                dst.as_mut_ptr().add(at) as *mut __m256i,
                _mm256_xor_si256(current, product),
            );
        }
        muladd_tail(dst, src, c, lanes * 32);
    }

    #[target_feature(enable = "avx2")]
    unsafe fn mul_assign_avx2_body(dst: &mut [u8], c: u8) {
        let (lo, hi, mask) = tables_256(c);
        let lanes = dst.len() / 32;
        for i in 0..lanes {
            let at = i * 32;
            let out = mul32(dst.as_ptr().add(at), lo, hi, mask);
            _mm256_storeu_si256(dst.as_mut_ptr().add(at) as *mut __m256i, out);
        }
        mul_assign_tail(dst, c, lanes * 32);
    }

    // Safe entry points for the kernel table. Callers reach these only
    // through `select`, which has already verified the CPU feature.

    pub(super) fn mul_ssse3(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { mul_ssse3_body(dst, src, c) }
    }

    pub(super) fn muladd_ssse3(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { muladd_ssse3_body(dst, src, c) }
    }

    pub(super) fn mul_assign_ssse3(dst: &mut [u8], c: u8) {
        unsafe { mul_assign_ssse3_body(dst, c) }
    }

    pub(super) fn mul_avx2(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { mul_avx2_body(dst, src, c) }
    }

    pub(super) fn muladd_avx2(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { muladd_avx2_body(dst, src, c) }
    }

    pub(super) fn mul_assign_avx2(dst: &mut [u8], c: u8) {
        unsafe { mul_assign_avx2_body(dst, c) }
    }
}

#[cfg(all(feature = "simd", target_arch = "aarch64"))]
mod neon {
    use std::arch::aarch64::*;

    use crate::gf::{GF_NIBBLE, GF_PRODUCT};

    /// Multiply 16 bytes by the coefficient behind `lo`/`hi` via vtbl.
    #[inline(always)]
    unsafe fn mul16(src: *const u8, lo: uint8x16_t, hi: uint8x16_t, mask: uint8x16_t) -> uint8x16_t {
        let data = vld1q_u8(src);
        let lo_out = vqtbl1q_u8(lo, vandq_u8(data, mask));
        let hi_out = vqtbl1q_u8(hi, vandq_u8(vshrq_n_u8(data, 4), mask));
        veorq_u8(lo_out, hi_out)
    }

    #[target_feature(enable = "neon")]
    unsafe fn mul_body(dst: &mut [u8], src: &[u8], c: u8) {
        let lo = vld1q_u8(GF_NIBBLE.lo[c as usize].as_ptr());
        let hi = vld1q_u8(GF_NIBBLE.hi[c as usize].as_ptr());
        let mask = vdupq_n_u8(0x0f);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            vst1q_u8(dst.as_mut_ptr().add(at), mul16(src.as_ptr().add(at), lo, hi, mask));
        }
        let row = GF_PRODUCT.row(c);
        for i in lanes * 16..dst.len() {
            dst[i] = row[src[i] as usize];
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn muladd_body(dst: &mut [u8], src: &[u8], c: u8) {
        let lo = vld1q_u8(GF_NIBBLE.lo[c as usize].as_ptr());
        let hi = vld1q_u8(GF_NIBBLE.hi[c as usize].as_ptr());
        let mask = vdupq_n_u8(0x0f);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            let product = mul16(src.as_ptr().add(at), lo, hi, mask);
            let current = vld1q_u8(dst.as_ptr().add(at));
            vst1q_u8(dst.as_mut_ptr().add(at), veorq_u8(current, product));
        }
        let row = GF_PRODUCT.row(c);
        for i in lanes * 16..dst.len() {
            dst[i] ^= row[src[i] as usize];
        }
    }

    #[target_feature(enable = "neon")]
    unsafe fn mul_assign_body(dst: &mut [u8], c: u8) {
        let lo = vld1q_u8(GF_NIBBLE.lo[c as usize].as_ptr());
        let hi = vld1q_u8(GF_NIBBLE.hi[c as usize].as_ptr());
        let mask = vdupq_n_u8(0x0f);
        let lanes = dst.len() / 16;
        for i in 0..lanes {
            let at = i * 16;
            vst1q_u8(dst.as_mut_ptr().add(at), mul16(dst.as_ptr().add(at), lo, hi, mask));
        }
        let row = GF_PRODUCT.row(c);
        for i in lanes * 16..dst.len() {
            dst[i] = row[dst[i] as usize];
        }
    }

    pub(super) fn mul(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { mul_body(dst, src, c) }
    }

    pub(super) fn muladd(dst: &mut [u8], src: &[u8], c: u8) {
        unsafe { muladd_body(dst, src, c) }
    }

    pub(super) fn mul_assign(dst: &mut [u8], c: u8) {
        unsafe { mul_assign_body(dst, c) }
    }
}
