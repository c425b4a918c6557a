//! `shptr` provides reference-counted smart pointers built around an explicit control block.
//!
//! `SharedPtr<T>` is an owning handle. It stores a pointer to a control block (holding a strong and a weak count)
//! next to an independently stored value pointer. Keeping the two apart is what makes aliasing possible: a
//! `SharedPtr` may point at a field of the managed object (or at anything else the caller vouches for) while the
//! block keeps the whole object alive.
//!
//! Control blocks come in two flavours:
//! - a colocated block, where the value lives inside the block and both share one allocation
//!   ([`make_shared`], [`SharedPtr::new`], [`SharedPtr::new_cyclic`]);
//! - an external block, which adopts a value that was allocated elsewhere and disposes of it with a [`Deleter`]
//!   ([`SharedPtr::from_box`], [`SharedPtr::from_raw`], [`SharedPtr::from_raw_with_deleter`]).
//!
//! `WeakPtr<T>` is a non-owning observer. It never keeps the value alive, only the block, so that
//! [`WeakPtr::use_count`] and [`WeakPtr::expired`] keep answering after the value is gone.
//! It cannot be dereferenced and must be promoted with [`WeakPtr::lock`] (empty on expiry) or
//! `SharedPtr::try_from(&weak)` (a [`BadWeakPtr`] error on expiry).
//!
//! A type that embeds a [`WeakThis`] slot and implements [`EnableSharedFromThis`] can hand out owning handles to
//! itself. The slot is filled by the `*_enabled` constructors the first time shared ownership is established.
//!
//! The crate also carries the simpler pointers that share its vocabulary: [`UniquePtr`] (exclusive ownership with
//! a pluggable [`Deleter`] packed next to the pointer in a [`CompressedPair`]) and [`IntrusivePtr`] (the count
//! lives inside the pointee).
//!
//! All counters are plain `Cell<usize>`s. None of the reference-counted pointers implement [`Send`] or [`Sync`],
//! so the compiler keeps every ownership group on a single thread.
//!
//! ```
//! use shptr::{make_shared, SharedPtr, WeakPtr};
//!
//! let p1 = SharedPtr::from_box(Box::new(5));
//! let p2 = p1.clone();
//! assert_eq!(SharedPtr::use_count(&p1), 2);
//! drop(p1);
//! assert_eq!(*p2, 5);
//!
//! let weak = SharedPtr::downgrade(&p2);
//! drop(p2);
//! assert!(WeakPtr::expired(&weak));
//! assert!(SharedPtr::is_null(&WeakPtr::lock(&weak)));
//!
//! let colocated = make_shared(String::from("shared"));
//! assert_eq!(colocated.len(), 6);
//! ```

#[cfg(feature = "log")]
macro_rules! trace_block {
    ($($arg:tt)+) => {
        log::trace!(target: "shptr::block", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! trace_block {
    ($($arg:tt)+) => {};
}

#[cfg(feature = "log")]
macro_rules! debug_enable {
    ($($arg:tt)+) => {
        log::debug!(target: "shptr::enable", $($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! debug_enable {
    ($($arg:tt)+) => {};
}

mod block;
pub mod enable;
pub mod error;
pub mod intrusive;
pub mod pair;
pub mod shared;
pub mod unique;
pub mod weak;

pub use crate::enable::{make_shared_enabled, EnableSharedFromThis, WeakThis};
pub use crate::error::BadWeakPtr;
pub use crate::intrusive::{make_intrusive, IntrusivePtr, RefCounted, RefCounter, SimpleCounter};
pub use crate::pair::CompressedPair;
pub use crate::shared::{make_shared, SharedPtr};
pub use crate::unique::{DefaultDelete, Deleter, UniquePtr};
pub use crate::weak::WeakPtr;

#[cfg(test)]
mod tests;
