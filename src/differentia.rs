use rand::Rng;
use serde::{Deserialize, Serialize};

/// A differentia value: the random fingerprint assigned to each stratum.
///
/// Stored as a `u64` with only the lower `bit_width` bits meaningful. The
/// value is masked on construction, so equality of two differentiae drawn at
/// the same width is plain integer equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Differentia(u64);

impl Differentia {
    /// Create a new differentia, masking to `bit_width` lower bits.
    ///
    /// # Panics (debug only)
    /// Panics if `bit_width` is 0 or greater than 64.
    #[inline]
    pub fn new(value: u64, bit_width: u8) -> Self {
        debug_assert!(
            (1..=64).contains(&bit_width),
            "bit_width must be in 1..=64, got {}",
            bit_width
        );
        Self(value & Self::mask(bit_width))
    }

    /// Draw a differentia uniformly from `[0, 2^bit_width)`.
    #[inline]
    pub fn sample<R: Rng + ?Sized>(bit_width: u8, rng: &mut R) -> Self {
        Self(rng.gen_range(0..=Self::mask(bit_width)))
    }

    /// Bit mask for the given width: the lower `bit_width` bits set.
    #[inline]
    pub fn mask(bit_width: u8) -> u64 {
        if bit_width >= 64 {
            u64::MAX
        } else {
            (1u64 << bit_width) - 1
        }
    }

    /// Whether `self` fits in `bit_width` bits.
    #[inline]
    pub fn fits(self, bit_width: u8) -> bool {
        self.0 & !Self::mask(bit_width) == 0
    }

    /// Raw u64 value (already masked to bit_width on construction).
    #[inline]
    pub fn value(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn mask_boundaries() {
        assert_eq!(Differentia::mask(1), 1);
        assert_eq!(Differentia::mask(8), 0xFF);
        assert_eq!(Differentia::mask(32), 0xFFFF_FFFF);
        assert_eq!(Differentia::mask(63), (1u64 << 63) - 1);
        assert_eq!(Differentia::mask(64), u64::MAX);
    }

    #[test]
    fn new_masks_correctly() {
        assert_eq!(Differentia::new(0xDEAD_BEEF_CAFE_BABE, 8).value(), 0xBE);
        assert_eq!(Differentia::new(0xDEAD_BEEF_CAFE_BABE, 1).value(), 0);
        assert_eq!(Differentia::new(u64::MAX, 64).value(), u64::MAX);
        assert_eq!(Differentia::new(0xFF, 4).value(), 0xF);
    }

    #[test]
    fn sample_stays_in_range() {
        let mut rng = SmallRng::seed_from_u64(7);
        for bit_width in [1u8, 3, 8, 31, 63, 64] {
            for _ in 0..200 {
                let d = Differentia::sample(bit_width, &mut rng);
                assert!(d.fits(bit_width), "{d:?} exceeds {bit_width} bits");
            }
        }
    }

    #[test]
    fn one_bit_sampling_hits_both_values() {
        let mut rng = SmallRng::seed_from_u64(1);
        let ones = (0..1000)
            .filter(|_| Differentia::sample(1, &mut rng).value() == 1)
            .count();
        assert!((350..650).contains(&ones), "ones={ones}");
    }

    #[test]
    fn serializes_as_bare_integer() {
        let d = Differentia::new(42, 64);
        assert_eq!(serde_json::to_string(&d).unwrap(), "42");
        let back: Differentia = serde_json::from_str("42").unwrap();
        assert_eq!(back, d);
    }
}
