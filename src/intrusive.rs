//! Intrusive reference counting: the count lives inside the pointee, so there is no control block, one allocation
//! per object, and a raw pointer to a counted object can always be turned back into an owning pointer.
//! There are no weak pointers in this family.

use std::{
    cell::Cell,
    fmt::Debug,
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::block::MAX_REFCOUNT;

/// The counter embedded in a [`RefCounted`] type. It must start at zero.
pub trait RefCounter {
    /// Increments and returns the new count.
    fn inc_ref(&self) -> usize;
    /// Decrements and returns the new count.
    fn dec_ref(&self) -> usize;
    fn ref_count(&self) -> usize;
}

/// A plain, single-threaded counter.
#[derive(Debug, Default)]
pub struct SimpleCounter {
    count: Cell<usize>,
}

impl SimpleCounter {
    pub const fn new() -> Self {
        SimpleCounter { count: Cell::new(0) }
    }
}

impl Clone for SimpleCounter {
    /// A copy of a counted object is a new object with no owners: the clone starts at zero.
    fn clone(&self) -> Self {
        SimpleCounter::new()
    }
}

impl RefCounter for SimpleCounter {
    #[inline]
    fn inc_ref(&self) -> usize {
        let count = self.count.get() + 1;
        if count > MAX_REFCOUNT {
            panic!("Overflow of maximum intrusive reference count.");
        }
        self.count.set(count);
        count
    }

    #[inline]
    fn dec_ref(&self) -> usize {
        debug_assert!(self.count.get() > 0);
        let count = self.count.get() - 1;
        self.count.set(count);
        count
    }

    #[inline]
    fn ref_count(&self) -> usize {
        self.count.get()
    }
}

/// A type carrying its own reference count.
///
/// ```
/// use shptr::{make_intrusive, IntrusivePtr, RefCounted, SimpleCounter};
///
/// struct Texture {
///     id: u32,
///     refs: SimpleCounter,
/// }
///
/// impl RefCounted for Texture {
///     type Counter = SimpleCounter;
///
///     fn counter(&self) -> &SimpleCounter {
///         &self.refs
///     }
/// }
///
/// let texture = make_intrusive(Texture { id: 3, refs: SimpleCounter::new() });
/// let raw = IntrusivePtr::as_ptr(&texture);
/// let readopted = unsafe { IntrusivePtr::from_raw(raw) };
/// assert_eq!(IntrusivePtr::use_count(&texture), 2);
/// assert_eq!(readopted.id, 3);
/// ```
pub trait RefCounted: Sized {
    type Counter: RefCounter;

    fn counter(&self) -> &Self::Counter;

    fn ref_count(&self) -> usize {
        self.counter().ref_count()
    }

    /// Frees an object whose count dropped to zero. Reclaims a `Box` unless overridden.
    ///
    /// # Safety
    /// `this` must be the sole remaining reference to a live object allocated the way this method expects.
    unsafe fn destroy(this: NonNull<Self>) {
        drop(Box::from_raw(this.as_ptr()));
    }
}

/// An owning pointer to a [`RefCounted`] object. Cloning and dropping adjust the count stored in the object itself.
///
/// To prevent name clashes, `IntrusivePtr<T>`'s functions are associated.
pub struct IntrusivePtr<T: RefCounted> {
    ptr: Option<NonNull<T>>,
    phantom: PhantomData<T>,
}

/// Boxes `value` and takes the first reference to it.
#[inline]
pub fn make_intrusive<T: RefCounted>(value: T) -> IntrusivePtr<T> {
    IntrusivePtr::new(value)
}

impl<T: RefCounted> IntrusivePtr<T> {
    #[inline]
    pub const fn null() -> Self {
        IntrusivePtr {
            ptr: None,
            phantom: PhantomData,
        }
    }

    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    #[inline]
    pub fn from_box(value: Box<T>) -> Self {
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Takes a new reference to the object behind `ptr`, incrementing its count. `ptr` may be fresh (count zero)
    /// or come from another `IntrusivePtr`, in which case both share the count. Null gives an empty pointer.
    ///
    /// # Safety
    /// `ptr` must be null or point to a live object that [`RefCounted::destroy`] can free.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let ptr = NonNull::new(ptr);
        if let Some(ptr) = ptr {
            ptr.as_ref().counter().inc_ref();
        }
        IntrusivePtr {
            ptr,
            phantom: PhantomData,
        }
    }

    /// Releases the reference, leaving `this` empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(mem::replace(this, IntrusivePtr::null()));
    }

    /// Takes a reference to `ptr`, then releases the previous one. Resetting to the pointer already held keeps
    /// the object alive.
    ///
    /// # Safety
    /// Same contract as [`IntrusivePtr::from_raw`].
    #[inline]
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        *this = Self::from_raw(ptr);
    }

    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// The raw pointer, null if empty. The reference stays with `this`.
    #[inline]
    pub fn as_ptr(this: &Self) -> *mut T {
        this.ptr.map_or(ptr::null_mut(), NonNull::as_ptr)
    }

    /// The count stored in the object, zero if empty.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        Self::get(this).map_or(0, |value| value.counter().ref_count())
    }

    #[inline]
    pub fn is_null(this: &Self) -> bool {
        this.ptr.is_none()
    }
}

impl<T: RefCounted> Drop for IntrusivePtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            unsafe {
                if ptr.as_ref().counter().dec_ref() == 0 {
                    T::destroy(ptr);
                }
            }
        }
    }
}

impl<T: RefCounted> Clone for IntrusivePtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        if let Some(value) = IntrusivePtr::get(self) {
            value.counter().inc_ref();
        }
        IntrusivePtr {
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<T: RefCounted> Deref for IntrusivePtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match IntrusivePtr::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty IntrusivePtr"),
        }
    }
}

impl<T: RefCounted> Default for IntrusivePtr<T> {
    fn default() -> Self {
        IntrusivePtr::null()
    }
}

impl<T: RefCounted> PartialEq for IntrusivePtr<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: RefCounted> Eq for IntrusivePtr<T> {}

impl<T: RefCounted + Debug> Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match IntrusivePtr::get(self) {
            Some(value) => Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}
