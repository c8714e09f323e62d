//! Residual plane packing: the low `S` bits of every source byte bypass the
//! dictionary and travel as a dense bit plane.
//!
//! Eight consecutive source bytes are treated as one little-endian `u64` and
//! their low `S` bits are gathered into `S` contiguous output bytes. On
//! x86-64 with BMI2 this is a single `pext`/`pdep` per group; everywhere
//! else a mask-and-shift loop produces the identical layout.

/// Per-byte low-bit mask replicated across all eight lanes.
#[inline]
fn lane_mask(shift: usize) -> u64 {
    0x0101_0101_0101_0101u64 * ((1u64 << shift) - 1)
}

#[inline]
fn pext_portable(value: u64, shift: usize) -> u64 {
    let low = (1u64 << shift) - 1;
    let mut packed = 0u64;
    for lane in 0..8 {
        packed |= ((value >> (lane * 8)) & low) << (lane * shift);
    }
    packed
}

#[inline]
fn pdep_portable(packed: u64, shift: usize) -> u64 {
    let low = (1u64 << shift) - 1;
    let mut value = 0u64;
    for lane in 0..8 {
        value |= ((packed >> (lane * shift)) & low) << (lane * 8);
    }
    value
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "bmi2")]
unsafe fn extract_plane_bmi2(src: &[u8], shift: usize, dst: &mut [u8]) {
    let mask = lane_mask(shift);
    for (chunk, out) in src.chunks_exact(8).zip(dst.chunks_exact_mut(shift)) {
        let value = u64::from_le_bytes(chunk.try_into().unwrap());
        let packed = std::arch::x86_64::_pext_u64(value, mask);
        out.copy_from_slice(&packed.to_le_bytes()[..shift]);
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "bmi2")]
unsafe fn deposit_plane_bmi2(plane: &[u8], shift: usize, dst: &mut [u8]) {
    let mask = lane_mask(shift);
    for (bytes, out) in plane.chunks_exact(shift).zip(dst.chunks_exact_mut(8)) {
        let mut packed = [0u8; 8];
        packed[..shift].copy_from_slice(bytes);
        let value = std::arch::x86_64::_pdep_u64(u64::from_le_bytes(packed), mask);
        let merged = u64::from_le_bytes(out.try_into().unwrap()) | value;
        out.copy_from_slice(&merged.to_le_bytes());
    }
}

fn extract_plane_generic(src: &[u8], shift: usize, dst: &mut [u8]) {
    for (chunk, out) in src.chunks_exact(8).zip(dst.chunks_exact_mut(shift)) {
        let value = u64::from_le_bytes(chunk.try_into().unwrap());
        let packed = pext_portable(value, shift);
        out.copy_from_slice(&packed.to_le_bytes()[..shift]);
    }
}

fn deposit_plane_generic(plane: &[u8], shift: usize, dst: &mut [u8]) {
    for (bytes, out) in plane.chunks_exact(shift).zip(dst.chunks_exact_mut(8)) {
        let mut packed = [0u8; 8];
        packed[..shift].copy_from_slice(bytes);
        let value = pdep_portable(u64::from_le_bytes(packed), shift);
        let merged = u64::from_le_bytes(out.try_into().unwrap()) | value;
        out.copy_from_slice(&merged.to_le_bytes());
    }
}

/// Packs the low `shift` bits of `src` (length a multiple of 8) into
/// `dst`, which must hold `src.len() * shift / 8` bytes.
pub(crate) fn extract_plane(src: &[u8], shift: usize, dst: &mut [u8]) {
    debug_assert_eq!(src.len() % 8, 0);
    debug_assert_eq!(dst.len(), src.len() * shift / 8);
    if shift == 0 {
        return;
    }
    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("bmi2") {
        // SAFETY: the runtime check guarantees bmi2 is present.
        unsafe { extract_plane_bmi2(src, shift, dst) };
        return;
    }
    extract_plane_generic(src, shift, dst);
}

/// Merges a packed plane back into the low `shift` bits of `dst` (length a
/// multiple of 8), whose low bits must still be zero from decoding.
pub(crate) fn deposit_plane(plane: &[u8], shift: usize, dst: &mut [u8]) {
    debug_assert_eq!(dst.len() % 8, 0);
    debug_assert_eq!(plane.len(), dst.len() * shift / 8);
    if shift == 0 {
        return;
    }
    #[cfg(target_arch = "x86_64")]
    if std::arch::is_x86_feature_detected!("bmi2") {
        // SAFETY: the runtime check guarantees bmi2 is present.
        unsafe { deposit_plane_bmi2(plane, shift, dst) };
        return;
    }
    deposit_plane_generic(plane, shift, dst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plane_length_matches_shift() {
        let src: Vec<u8> = (0..64).collect();
        for shift in 0..8 {
            let mut plane = vec![0u8; src.len() * shift / 8];
            extract_plane(&src, shift, &mut plane);
            let mut back: Vec<u8> = src.iter().map(|b| b & (0xffu8 << shift)).collect();
            deposit_plane(&plane, shift, &mut back);
            assert_eq!(back, src, "shift {shift}");
        }
    }

    proptest! {
        #[test]
        fn portable_kernels_invert(value: u64, shift in 1usize..8) {
            let masked = value & lane_mask(shift);
            prop_assert_eq!(pdep_portable(pext_portable(value, shift), shift), masked);
        }

        #[cfg(target_arch = "x86_64")]
        #[test]
        fn portable_matches_bmi2(value: u64, shift in 1usize..8) {
            if std::arch::is_x86_feature_detected!("bmi2") {
                let mask = lane_mask(shift);
                let hw = unsafe { std::arch::x86_64::_pext_u64(value, mask) };
                prop_assert_eq!(pext_portable(value, shift), hw);
                let packed = pext_portable(value, shift);
                let hw = unsafe { std::arch::x86_64::_pdep_u64(packed, mask) };
                prop_assert_eq!(pdep_portable(packed, shift), hw);
            }
        }
    }
}
