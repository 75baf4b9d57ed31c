//! Fixed-size override sets keyed by dense field enums.

use std::fmt;
use std::marker::PhantomData;

/// A field enum whose variants map onto `0..COUNT`.
pub trait DenseField: Copy {
    /// Number of variants; at most 64.
    const COUNT: u32;

    /// Position of this field in `0..COUNT`.
    fn ordinal(self) -> u32;

    /// Field at `ordinal`, if any.
    fn from_ordinal(ordinal: u32) -> Option<Self>;
}

/// Set of fields, stored as one `u64`.
///
/// Used for "which fields does this component override" membership.
pub struct FieldSet<F> {
    bits: u64,
    _field: PhantomData<fn() -> F>,
}

impl<F: DenseField> FieldSet<F> {
    /// The empty set.
    pub const fn empty() -> Self {
        Self {
            bits: 0,
            _field: PhantomData,
        }
    }

    /// The set of every field.
    pub fn all() -> Self {
        Self::from_bits(u64::MAX)
    }

    /// Builds a set from raw bits, dropping bits past `F::COUNT`.
    pub fn from_bits(bits: u64) -> Self {
        let mask = if F::COUNT >= 64 { u64::MAX } else { (1u64 << F::COUNT) - 1 };
        Self {
            bits: bits & mask,
            _field: PhantomData,
        }
    }

    /// Returns the raw bits.
    pub fn bits(&self) -> u64 {
        self.bits
    }

    #[inline]
    pub fn contains(&self, field: F) -> bool {
        self.bits & (1 << field.ordinal()) != 0
    }

    #[inline]
    pub fn insert(&mut self, field: F) {
        self.bits |= 1 << field.ordinal();
    }

    #[inline]
    pub fn remove(&mut self, field: F) {
        self.bits &= !(1 << field.ordinal());
    }

    pub fn set(&mut self, field: F, on: bool) {
        if on {
            self.insert(field);
        } else {
            self.remove(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Iterates the members in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = F> + '_ {
        (0..F::COUNT)
            .filter(|i| self.bits & (1 << i) != 0)
            .filter_map(F::from_ordinal)
    }
}

impl<F: DenseField> FromIterator<F> for FieldSet<F> {
    fn from_iter<I: IntoIterator<Item = F>>(iter: I) -> Self {
        let mut set = Self::empty();
        for field in iter {
            set.insert(field);
        }
        set
    }
}

impl<F> Clone for FieldSet<F> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<F> Copy for FieldSet<F> {}

impl<F> PartialEq for FieldSet<F> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<F> Eq for FieldSet<F> {}

impl<F> Default for FieldSet<F> {
    fn default() -> Self {
        Self {
            bits: 0,
            _field: PhantomData,
        }
    }
}

impl<F: DenseField + fmt::Debug> fmt::Debug for FieldSet<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Field {
        A,
        B,
        C,
    }

    impl DenseField for Field {
        const COUNT: u32 = 3;

        fn ordinal(self) -> u32 {
            self as u32
        }

        fn from_ordinal(ordinal: u32) -> Option<Self> {
            match ordinal {
                0 => Some(Field::A),
                1 => Some(Field::B),
                2 => Some(Field::C),
                _ => None,
            }
        }
    }

    #[test]
    fn test_membership() {
        let mut set = FieldSet::<Field>::empty();
        assert!(set.is_empty());
        set.insert(Field::B);
        assert!(set.contains(Field::B));
        assert!(!set.contains(Field::A));
        set.set(Field::A, true);
        set.remove(Field::B);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Field::A]);
    }

    #[test]
    fn test_from_bits_masks_unknown_fields() {
        let set = FieldSet::<Field>::from_bits(0b1111_0110);
        assert_eq!(set.bits(), 0b110);
        assert_eq!(set.len(), 2);
        assert_eq!(FieldSet::<Field>::all().len(), 3);
    }

    #[test]
    fn test_collect() {
        let set: FieldSet<Field> = [Field::C, Field::A].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Field::A, Field::C]);
    }
}
