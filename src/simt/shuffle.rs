//! Warp shuffles for values wider than one exchange word

use bytemuck::Pod;

use super::ThreadCtx;

/// Widest value a shuffle can move, in 32-bit words
const MAX_WORDS: usize = 8;

/// Exchange `value` with the lane at XOR-distance `lane_mask`.
///
/// The value is split into 32-bit words, each word is exchanged on its own
/// and the words are reassembled, so the result is bit-identical to moving
/// the value whole. Trailing bytes of a value whose size is not a multiple
/// of four ride in the last word.
pub fn shuffle_xor<T: Pod>(ctx: &ThreadCtx<'_>, value: T, lane_mask: usize) -> T {
    let bytes = bytemuck::bytes_of(&value);
    let n_words = bytes.len().div_ceil(4);
    assert!(
        n_words <= MAX_WORDS,
        "shuffle of {} bytes exceeds {} words",
        bytes.len(),
        MAX_WORDS
    );

    let mut words = [0u32; MAX_WORDS];
    bytemuck::bytes_of_mut(&mut words)[..bytes.len()].copy_from_slice(bytes);
    for word in &mut words[..n_words] {
        *word = ctx.shfl_xor_word(*word, lane_mask);
    }
    bytemuck::pod_read_unaligned(&bytemuck::bytes_of(&words)[..bytes.len()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simt::{launch, LaunchConfig};
    use crate::types::Complex64;
    use std::sync::Mutex;

    fn lane_values<T: Pod + Send>(make: impl Fn(usize) -> T + Sync, lane_mask: usize) -> Vec<T> {
        let config = LaunchConfig::new(1, 32).unwrap();
        let out: Vec<Mutex<Option<T>>> = (0..32).map(|_| Mutex::new(None)).collect();
        launch(config, || (), |ctx, _| {
            let got = shuffle_xor(ctx, make(ctx.lane_id()), lane_mask);
            *out[ctx.lane_id()].lock().unwrap() = Some(got);
        });
        out.into_iter()
            .map(|slot| slot.into_inner().unwrap().unwrap())
            .collect()
    }

    #[test]
    fn test_shuffle_f64_is_bit_exact() {
        let make = |lane: usize| f64::from_bits(0x7ff8_0000_dead_0000 | lane as u64);
        let got = lane_values(make, 4);
        for (lane, value) in got.iter().enumerate() {
            assert_eq!(value.to_bits(), make(lane ^ 4).to_bits());
        }
    }

    #[test]
    fn test_shuffle_complex128_moves_both_halves() {
        let make = |lane: usize| Complex64::new(lane as f64, -(lane as f64) - 0.5);
        let got = lane_values(make, 16);
        for (lane, value) in got.iter().enumerate() {
            assert_eq!(*value, make(lane ^ 16));
        }
    }

    #[test]
    fn test_shuffle_odd_width_value() {
        let make = |lane: usize| [lane as u8, 0xAB, (lane * 3) as u8];
        let got = lane_values(make, 2);
        for (lane, value) in got.iter().enumerate() {
            assert_eq!(*value, make(lane ^ 2));
        }
    }
}
