use std::{fmt::Debug, mem, ptr::NonNull};

use crate::{
    block::BlockHeader,
    shared::{addr_of, SharedPtr},
};

/// `WeakPtr<T>` is a non-owning reference to the value of a [`SharedPtr<T>`]. It is used to prevent cyclic references
/// which cause memory to never be freed. `WeakPtr<T>` does not keep the value alive (which can be dropped), it only
/// keeps the control block alive, so that [`WeakPtr::use_count`] and [`WeakPtr::expired`] stay answerable.
/// `WeakPtr<T>` cannot access the value directly and must be promoted to a `SharedPtr<T>` to do so:
/// - [`WeakPtr::lock`] returns an empty `SharedPtr` once the value is gone;
/// - `SharedPtr::try_from(&weak)` fails with [`BadWeakPtr`](crate::BadWeakPtr) instead.
///
/// One use case of a `WeakPtr<T>` is a tree: parents own their children through `SharedPtr`s, children refer to
/// their parent through a `WeakPtr`.
///
/// To prevent name clashes, `WeakPtr<T>`'s functions are associated.
///
/// ```
/// use shptr::{SharedPtr, WeakPtr};
///
/// let shared = SharedPtr::new(100);
/// let weak = SharedPtr::downgrade(&shared);
/// let promoted = WeakPtr::lock(&weak);
/// assert_eq!(*promoted, 100);
///
/// drop(shared);
/// drop(promoted);
/// assert!(WeakPtr::expired(&weak));
/// assert!(SharedPtr::is_null(&WeakPtr::lock(&weak)));
/// ```
pub struct WeakPtr<T: ?Sized> {
    block: Option<NonNull<BlockHeader>>,
    ptr: Option<NonNull<T>>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// A `WeakPtr` observing nothing. It is expired from the start.
    #[inline]
    pub const fn new() -> Self {
        WeakPtr {
            block: None,
            ptr: None,
        }
    }

    /// Wraps parts whose weak unit has already been accounted for.
    ///
    /// # Safety
    /// If `block` is present the caller must own one weak unit of it.
    #[inline]
    pub(crate) unsafe fn from_parts(block: Option<NonNull<BlockHeader>>, ptr: Option<NonNull<T>>) -> Self {
        WeakPtr { block, ptr }
    }

    #[inline]
    fn header(&self) -> Option<&BlockHeader> {
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    /// Create a `SharedPtr<T>` from a `WeakPtr<T>`. Because `WeakPtr<T>` does not own the value, it might have been
    /// dropped already. If it has, a `None` is returned. Otherwise the strong count goes up by one.
    ///
    /// ```
    /// use shptr::{SharedPtr, WeakPtr};
    ///
    /// let shared = SharedPtr::new(100i32);
    /// let weak = SharedPtr::downgrade(&shared);
    /// let promoted = WeakPtr::upgrade(&weak).expect("Value was dropped");
    /// assert_eq!(SharedPtr::use_count(&promoted), 2);
    /// ```
    #[inline]
    pub fn upgrade(this: &Self) -> Option<SharedPtr<T>> {
        let header = this.header()?;
        if !header.try_inc_strong() {
            return None;
        }
        Some(unsafe { SharedPtr::from_parts(this.block, this.ptr) })
    }

    /// Promote to a `SharedPtr<T>`, or get an empty one if the value is gone. Never fails.
    #[inline]
    pub fn lock(this: &Self) -> SharedPtr<T> {
        Self::upgrade(this).unwrap_or_else(SharedPtr::null)
    }

    /// Return the strong count of the observed block, zero if there is none.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.header().map_or(0, BlockHeader::strong)
    }

    /// Return the weak count of the observed block, this `WeakPtr` included. Zero if there is no block.
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.header().map_or(0, BlockHeader::weak)
    }

    /// Whether the value is gone (or was never there).
    ///
    /// ```
    /// use shptr::{SharedPtr, WeakPtr};
    ///
    /// assert!(WeakPtr::<i32>::expired(&WeakPtr::new()));
    ///
    /// let shared = SharedPtr::new(1);
    /// let weak = SharedPtr::downgrade(&shared);
    /// assert!(!WeakPtr::expired(&weak));
    /// drop(shared);
    /// assert!(WeakPtr::expired(&weak));
    /// assert_eq!(WeakPtr::use_count(&weak), 0);
    /// ```
    #[inline]
    pub fn expired(this: &Self) -> bool {
        Self::use_count(this) == 0
    }

    /// Checks if `this` and `other` observe the same block.
    #[inline]
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &WeakPtr<U>) -> bool {
        this.block == other.block
    }

    /// Stops observing, leaving `this` empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(mem::replace(this, WeakPtr::new()));
    }

    /// Exchanges the contents of two `WeakPtr`s. No count changes.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    /// Makes `this` observe what `other` observes. A no-op when both already hold the same value pointer in the
    /// same block.
    pub fn assign(this: &mut Self, other: &Self) {
        if this.block == other.block && addr_of(this.ptr) == addr_of(other.ptr) {
            return;
        }
        *this = other.clone();
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.ptr = None;
            unsafe { BlockHeader::dec_weak(block) };
        }
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    /// Clone a `WeakPtr<T>` (increment the weak count).
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared = SharedPtr::new(100);
    /// let weak1 = SharedPtr::downgrade(&shared);
    /// let _weak2 = weak1.clone();
    /// assert_eq!(SharedPtr::weak_count(&shared), 2);
    /// ```
    #[inline]
    fn clone(&self) -> Self {
        if let Some(header) = self.header() {
            header.inc_weak();
        }
        WeakPtr {
            block: self.block,
            ptr: self.ptr,
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    #[inline]
    fn default() -> Self {
        WeakPtr::new()
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    /// Equivalent to [`SharedPtr::downgrade`].
    fn from(shared: &SharedPtr<T>) -> Self {
        SharedPtr::downgrade(shared)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<WeakPtr<U>> for WeakPtr<T> {
    /// Two `WeakPtr`s are equal when they observe the same block through the same value pointer.
    #[inline]
    fn eq(&self, other: &WeakPtr<U>) -> bool {
        self.block == other.block && addr_of(self.ptr) == addr_of(other.ptr)
    }
}

impl<T: ?Sized> Eq for WeakPtr<T> {}

impl<T: ?Sized> Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "(WeakPtr)")
    }
}
