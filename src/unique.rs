use std::{
    fmt::{Debug, Display, Pointer},
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::{Deref, DerefMut, Index, IndexMut},
    ptr::{self, NonNull},
};

use crate::pair::CompressedPair;

/// The disposal action run when a [`UniquePtr`] (or an external control block of a
/// [`SharedPtr`](crate::SharedPtr)) gives up its value.
///
/// Any `FnMut(NonNull<T>)` closure is a deleter.
pub trait Deleter<T: ?Sized> {
    /// Disposes of the value behind `ptr`.
    ///
    /// # Safety
    /// `ptr` must point to a live value owned by the caller, which is not used again afterwards.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Reclaims values that were allocated with [`Box`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

impl<T: ?Sized, F: FnMut(NonNull<T>)> Deleter<T> for F {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// `UniquePtr<T, D>` is a single-owner heap pointer. The value is disposed of by the deleter `D` exactly once:
/// when the pointer is dropped, reset or overwritten. It can also be empty.
///
/// The pointer and the deleter are kept in a [`CompressedPair`], so a stateless deleter such as
/// [`DefaultDelete`] makes a `UniquePtr<T>` exactly one pointer wide.
///
/// To prevent name clashes with the methods of `T`, `UniquePtr<T, D>`'s functions are associated.
///
/// ```
/// use shptr::UniquePtr;
///
/// let mut unique = UniquePtr::new(100);
/// *unique += 1;
/// assert_eq!(*unique, 101);
///
/// UniquePtr::reset(&mut unique);
/// assert!(UniquePtr::is_null(&unique));
/// ```
///
/// With a custom deleter:
/// ```
/// use std::cell::Cell;
/// use std::ptr::NonNull;
/// use shptr::UniquePtr;
///
/// let deleted = Cell::new(0);
/// let counting_delete = |ptr: NonNull<i32>| {
///     deleted.set(deleted.get() + 1);
///     drop(unsafe { Box::from_raw(ptr.as_ptr()) });
/// };
/// let raw = Box::into_raw(Box::new(7));
/// let unique = unsafe { UniquePtr::from_raw_with_deleter(raw, counting_delete) };
/// drop(unique);
/// assert_eq!(deleted.get(), 1);
/// ```
pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    data: CompressedPair<Option<NonNull<T>>, D>,
    phantom: PhantomData<T>,
}

unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniquePtr<T, D> {}
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniquePtr<T, D> {}

impl<T> UniquePtr<T> {
    /// Moves `value` to the heap.
    #[inline]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }

    /// Gets the raw pointer, null if the `UniquePtr` is empty. Ownership stays with the `UniquePtr`.
    #[inline]
    pub fn as_ptr(this: &Self) -> *mut T {
        this.data.first().map_or(ptr::null_mut(), NonNull::as_ptr)
    }
}

impl<T: ?Sized> UniquePtr<T> {
    /// Takes over a boxed value.
    ///
    /// ```
    /// use shptr::UniquePtr;
    ///
    /// let slice: Box<[u8]> = vec![1, 2, 3].into_boxed_slice();
    /// let unique = UniquePtr::from_box(slice);
    /// assert_eq!(unique[1], 2);
    /// ```
    #[inline]
    pub fn from_box(value: Box<T>) -> Self {
        UniquePtr {
            data: CompressedPair::new(Some(NonNull::from(Box::leak(value))), DefaultDelete),
            phantom: PhantomData,
        }
    }

    /// Disposes of the current value and takes over `value`.
    #[inline]
    pub fn replace(this: &mut Self, value: Box<T>) {
        unsafe { Self::reset_raw(this, Box::into_raw(value)) }
    }

    /// Gives the value back as a `Box`, or `None` if the `UniquePtr` is empty.
    #[inline]
    pub fn into_box(mut this: Self) -> Option<Box<T>> {
        Self::release(&mut this).map(|ptr| unsafe { Box::from_raw(ptr.as_ptr()) })
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    /// An empty `UniquePtr`.
    #[inline]
    pub fn null() -> Self
    where
        D: Default,
    {
        UniquePtr {
            data: CompressedPair::new(None, D::default()),
            phantom: PhantomData,
        }
    }

    /// Takes ownership of `ptr`, which will be disposed of with a default-constructed `D`.
    /// A null `ptr` gives an empty `UniquePtr`.
    ///
    /// # Safety
    /// `ptr` must be null or valid for `D` to delete, and must not be owned by anything else.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self
    where
        D: Default,
    {
        Self::from_raw_with_deleter(ptr, D::default())
    }

    /// Takes ownership of `ptr`, which will be disposed of with `deleter`.
    ///
    /// # Safety
    /// `ptr` must be null or valid for `deleter` to delete, and must not be owned by anything else.
    #[inline]
    pub unsafe fn from_raw_with_deleter(ptr: *mut T, deleter: D) -> Self {
        UniquePtr {
            data: CompressedPair::new(NonNull::new(ptr), deleter),
            phantom: PhantomData,
        }
    }

    /// Gives up ownership without disposing of the value. The `UniquePtr` is left empty.
    ///
    /// ```
    /// use shptr::UniquePtr;
    ///
    /// let mut unique = UniquePtr::new(String::from("kept"));
    /// let raw = UniquePtr::release(&mut unique).unwrap();
    /// assert!(UniquePtr::is_null(&unique));
    /// let value = unsafe { Box::from_raw(raw.as_ptr()) };
    /// assert_eq!(*value, "kept");
    /// ```
    #[inline]
    pub fn release(this: &mut Self) -> Option<NonNull<T>> {
        this.data.first_mut().take()
    }

    /// Disposes of the current value, if any, and leaves the `UniquePtr` empty.
    #[inline]
    pub fn reset(this: &mut Self) {
        if let Some(old) = Self::release(this) {
            unsafe { this.data.second_mut().delete(old) };
        }
    }

    /// Installs `ptr`, then disposes of the previous value, if any.
    ///
    /// # Safety
    /// Same contract as [`UniquePtr::from_raw_with_deleter`] for the current deleter.
    pub unsafe fn reset_raw(this: &mut Self, ptr: *mut T) {
        let old = mem::replace(this.data.first_mut(), NonNull::new(ptr));
        if let Some(old) = old {
            if Some(old) != *this.data.first() {
                this.data.second_mut().delete(old);
            }
        }
    }

    /// Exchanges the values and the deleters of two `UniquePtr`s.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.data.first().map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        this.data.first().map(|ptr| unsafe { &mut *ptr.as_ptr() })
    }

    #[inline]
    pub fn get_deleter(this: &Self) -> &D {
        this.data.second()
    }

    #[inline]
    pub fn get_deleter_mut(this: &mut Self) -> &mut D {
        this.data.second_mut()
    }

    #[inline]
    pub fn is_null(this: &Self) -> bool {
        this.data.first().is_none()
    }

    /// Splits the `UniquePtr` into its pointer and its deleter without running the deleter.
    pub(crate) fn into_raw_parts(this: Self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(this);
        let data = unsafe { ptr::read(&this.data) };
        data.into_inner()
    }
}

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    #[inline]
    fn drop(&mut self) {
        Self::reset(self);
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniquePtr<T, D> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        match UniquePtr::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty UniquePtr"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        match UniquePtr::get_mut(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty UniquePtr"),
        }
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for UniquePtr<[T], D> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &(**self)[index]
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for UniquePtr<[T], D> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut (**self)[index]
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    fn default() -> Self {
        UniquePtr::null()
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        UniquePtr::from_box(value)
    }
}

impl<T: ?Sized + Debug, D: Deleter<T>> Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match UniquePtr::get(self) {
            Some(value) => Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + Display, D: Deleter<T>> Display for UniquePtr<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match UniquePtr::get(self) {
            Some(value) => Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> Pointer for UniquePtr<T, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let addr = self.data.first().map_or(ptr::null(), |ptr| ptr.cast::<u8>().as_ptr() as *const u8);
        Pointer::fmt(&addr, f)
    }
}
