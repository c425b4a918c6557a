//! Shared-from-this: letting a managed object hand out owning pointers to itself.
//!
//! A type opts in by embedding a [`WeakThis<Self>`] slot and implementing [`EnableSharedFromThis`]. The slot is
//! written by the constructors in this module the moment shared ownership of the object is first established;
//! afterwards [`EnableSharedFromThis::shared_from_this`] rebuilds an owning [`SharedPtr`] from it.
//!
//! ```
//! use shptr::{make_shared_enabled, EnableSharedFromThis, SharedPtr, WeakThis};
//!
//! struct Session {
//!     id: u32,
//!     this: WeakThis<Session>,
//! }
//!
//! impl EnableSharedFromThis for Session {
//!     fn weak_this(&self) -> &WeakThis<Self> {
//!         &self.this
//!     }
//! }
//!
//! let session = make_shared_enabled(Session { id: 7, this: WeakThis::new() });
//! let again = session.shared_from_this();
//! assert_eq!(again.id, 7);
//! assert!(again == session);
//! assert_eq!(SharedPtr::use_count(&session), 2);
//! ```

use std::{cell::Cell, fmt::Debug};

use crate::{shared::SharedPtr, weak::WeakPtr};

/// The back-reference slot of a self-referencing type. Empty until an `*_enabled` constructor links it.
///
/// Cloning gives an empty slot: a copy of an object is a different object, with no owner yet.
pub struct WeakThis<T: ?Sized> {
    slot: Cell<WeakPtr<T>>,
}

impl<T: ?Sized> WeakThis<T> {
    #[inline]
    pub const fn new() -> Self {
        WeakThis {
            slot: Cell::new(WeakPtr::new()),
        }
    }

    /// A copy of the stored `WeakPtr`.
    pub fn get(&self) -> WeakPtr<T> {
        let weak = self.slot.take();
        let copy = weak.clone();
        self.slot.set(weak);
        copy
    }

    /// Whether the slot currently observes a live owner.
    pub fn is_linked(&self) -> bool {
        let weak = self.slot.take();
        let linked = !WeakPtr::expired(&weak);
        self.slot.set(weak);
        linked
    }

    /// Points the slot at `owner`'s block, unless it already observes a live owner.
    fn link(&self, owner: &SharedPtr<T>) {
        if SharedPtr::use_count(owner) == 0 || self.is_linked() {
            return;
        }
        let stale = self.slot.replace(SharedPtr::downgrade(owner));
        drop(stale);
    }
}

impl<T: ?Sized> Default for WeakThis<T> {
    fn default() -> Self {
        WeakThis::new()
    }
}

impl<T: ?Sized> Clone for WeakThis<T> {
    fn clone(&self) -> Self {
        WeakThis::new()
    }
}

impl<T: ?Sized> Debug for WeakThis<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(WeakThis)")
    }
}

/// Implemented by types that can produce owning pointers to themselves.
///
/// Only the `*_enabled` constructors (and [`SharedPtr::enable_shared_from_this`]) link the slot. A value put behind
/// a plain [`SharedPtr::new`] or [`SharedPtr::from_box`] stays unlinked and `shared_from_this` gives an empty
/// pointer; with the `log` feature this is reported at debug level under the `shptr::enable` target.
pub trait EnableSharedFromThis {
    /// The slot embedded in the value.
    fn weak_this(&self) -> &WeakThis<Self>;

    /// An owning pointer to `self`. Empty if `self` was never linked to an owner (it was not built through an
    /// `*_enabled` constructor) or if its owner is already gone.
    fn shared_from_this(&self) -> SharedPtr<Self> {
        let weak = self.weak_this().get();
        if WeakPtr::weak_count(&weak) == 0 {
            debug_enable!("shared_from_this on a value whose WeakThis slot was never linked to an owner");
        }
        WeakPtr::lock(&weak)
    }

    /// A weak pointer to `self`. Expired under the same conditions as [`EnableSharedFromThis::shared_from_this`]
    /// is empty.
    fn weak_from_this(&self) -> WeakPtr<Self> {
        self.weak_this().get()
    }
}

/// [`make_shared`](crate::make_shared) for self-referencing types: the value lives in a colocated block and its
/// [`WeakThis`] slot is linked before the pointer is returned.
#[inline]
pub fn make_shared_enabled<T: EnableSharedFromThis>(value: T) -> SharedPtr<T> {
    SharedPtr::new_enabled(value)
}

impl<T: EnableSharedFromThis> SharedPtr<T> {
    /// [`SharedPtr::new`], then [`SharedPtr::enable_shared_from_this`].
    #[inline]
    pub fn new_enabled(value: T) -> Self {
        let this = SharedPtr::new(value);
        SharedPtr::enable_shared_from_this(&this);
        this
    }
}

impl<T: ?Sized + EnableSharedFromThis> SharedPtr<T> {
    /// Links the [`WeakThis`] slot of the pointed-to value to this pointer's block. Does nothing if the pointer is
    /// empty or does not own anything, and nothing if the slot already observes a live owner, so the first owner
    /// wins.
    pub fn enable_shared_from_this(this: &Self) {
        if let Some(value) = SharedPtr::get(this) {
            value.weak_this().link(this);
        }
    }

    /// [`SharedPtr::from_box`], then [`SharedPtr::enable_shared_from_this`].
    #[inline]
    pub fn from_box_enabled(value: Box<T>) -> Self {
        let this = SharedPtr::from_box(value);
        SharedPtr::enable_shared_from_this(&this);
        this
    }

    /// [`SharedPtr::from_raw`], then [`SharedPtr::enable_shared_from_this`].
    ///
    /// # Safety
    /// Same contract as [`SharedPtr::from_raw`].
    #[inline]
    pub unsafe fn from_raw_enabled(ptr: *mut T) -> Self {
        let this = SharedPtr::from_raw(ptr);
        SharedPtr::enable_shared_from_this(&this);
        this
    }

    /// [`SharedPtr::aliasing`], then [`SharedPtr::enable_shared_from_this`].
    ///
    /// # Safety
    /// Same contract as [`SharedPtr::aliasing`].
    #[inline]
    pub unsafe fn aliasing_enabled<U: ?Sized>(other: &SharedPtr<U>, ptr: *const T) -> Self {
        let this = SharedPtr::aliasing(other, ptr);
        SharedPtr::enable_shared_from_this(&this);
        this
    }

    /// [`SharedPtr::reset_with`], then [`SharedPtr::enable_shared_from_this`].
    #[inline]
    pub fn reset_with_enabled(this: &mut Self, value: Box<T>) {
        *this = SharedPtr::from_box_enabled(value);
    }
}
