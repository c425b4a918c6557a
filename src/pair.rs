//! A pair that takes no room for stateless members.
//!
//! Rust already gives zero-sized types a size of zero, so no base-class tricks are needed: a field of a unit
//! struct (a stateless deleter, a marker) simply disappears from the layout. `CompressedPair` names that
//! guarantee so that [`UniquePtr`](crate::UniquePtr) can document and rely on it.

/// Two values stored side by side. A zero-sized `F` or `S` adds nothing to the size of the pair.
///
/// ```
/// use shptr::{CompressedPair, DefaultDelete};
/// use std::mem::size_of;
///
/// assert_eq!(size_of::<CompressedPair<usize, DefaultDelete>>(), size_of::<usize>());
/// assert_eq!(size_of::<CompressedPair<(), DefaultDelete>>(), 0);
///
/// let mut pair = CompressedPair::new(1, String::from("two"));
/// *pair.first_mut() += 1;
/// pair.second_mut().push('!');
/// assert_eq!(pair.into_inner(), (2, String::from("two!")));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressedPair<F, S> {
    first: F,
    second: S,
}

impl<F, S> CompressedPair<F, S> {
    #[inline]
    pub const fn new(first: F, second: S) -> Self {
        CompressedPair { first, second }
    }

    #[inline]
    pub fn first(&self) -> &F {
        &self.first
    }

    #[inline]
    pub fn first_mut(&mut self) -> &mut F {
        &mut self.first
    }

    #[inline]
    pub fn second(&self) -> &S {
        &self.second
    }

    #[inline]
    pub fn second_mut(&mut self) -> &mut S {
        &mut self.second
    }

    /// Splits the pair back into its members.
    #[inline]
    pub fn into_inner(self) -> (F, S) {
        (self.first, self.second)
    }
}
