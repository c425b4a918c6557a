use std::{
    borrow::Borrow,
    fmt::{Debug, Display, Pointer},
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem,
    ops::Deref,
    pin::Pin,
    ptr::{self, NonNull},
};

use crate::{
    block::{BlockHeader, ColocatedBlock, ExternalBlock},
    error::BadWeakPtr,
    unique::{DefaultDelete, Deleter, UniquePtr},
    weak::WeakPtr,
};

/// `SharedPtr<T>` is an owning, reference-counted pointer. It is a pair of a control block, which keeps the strong
/// and weak counts of one ownership group, and a value pointer, which is what the `SharedPtr` dereferences to.
///
/// Usually the value pointer is the managed object itself. The aliasing constructors ([`SharedPtr::aliasing`],
/// [`SharedPtr::project`]) pair an existing block with some other pointer, typically a field of the managed object:
/// the field stays reachable for as long as the aliasing `SharedPtr` lives, because the block keeps the whole
/// object alive.
///
/// A `SharedPtr` may be empty ([`SharedPtr::null`], after [`SharedPtr::reset`] or [`SharedPtr::take`]).
/// Dereferencing an empty `SharedPtr` panics; [`SharedPtr::get`] is the non-panicking route.
///
/// ## Clone behavior
/// Cloning increments the strong count of the block. Moving a `SharedPtr` leaves the counts untouched.
///
/// ## Drop behavior
/// Dropping decrements the strong count. The last strong handle destroys the value; the block itself is freed once
/// the weak count is zero as well.
///
/// ## Equality
/// Two `SharedPtr`s are equal when their value pointers hold the same address, whatever blocks they belong to.
/// [`SharedPtr::owner_eq`] compares the blocks instead.
///
/// ## Breaking reference cycles with `WeakPtr<T>`
/// A cycle of `SharedPtr`s is never freed. Store a [`WeakPtr`] in one direction instead; see [`WeakPtr`].
///
/// To prevent name clashes, `SharedPtr<T>`'s functions are associated.
///
/// ```
/// use shptr::SharedPtr;
///
/// let p1 = SharedPtr::from_box(Box::new(5));
/// assert_eq!(SharedPtr::use_count(&p1), 1);
/// let p2 = p1.clone();
/// assert_eq!(SharedPtr::use_count(&p2), 2);
/// assert!(p1 == p2);
/// ```
pub struct SharedPtr<T: ?Sized> {
    block: Option<NonNull<BlockHeader>>,
    ptr: Option<NonNull<T>>,
    phantom: PhantomData<T>,
}

/// Creates a `SharedPtr<T>` whose value lives in the same allocation as its control block.
///
/// ```
/// use shptr::{make_shared, SharedPtr};
///
/// let shared = make_shared(vec![1, 2, 3]);
/// assert_eq!(shared.len(), 3);
/// assert_eq!(SharedPtr::use_count(&shared), 1);
/// ```
#[inline]
pub fn make_shared<T>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

#[inline]
pub(crate) fn addr_of<T: ?Sized>(ptr: Option<NonNull<T>>) -> *const u8 {
    ptr.map_or(ptr::null(), |ptr| ptr.cast::<u8>().as_ptr() as *const u8)
}

impl<T> SharedPtr<T> {
    /// Creates a new `SharedPtr<T>` in a colocated block: one allocation for the counts and the value.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared = SharedPtr::new(100);
    /// assert_eq!(*shared, 100);
    /// ```
    #[inline]
    pub fn new(value: T) -> Self {
        let block = ColocatedBlock::allocate(value);
        unsafe {
            let ptr = ColocatedBlock::value_ptr(block);
            Self::from_parts(Some(ColocatedBlock::header(block)), Some(ptr))
        }
    }

    /// Creates a new cyclic `SharedPtr<T>`. `data_fn` receives a `WeakPtr<T>` to the allocation being built, so
    /// that `T` can store a pointer to itself. The `WeakPtr` cannot be promoted until `data_fn` has returned.
    ///
    /// ```
    /// use shptr::{SharedPtr, WeakPtr};
    ///
    /// struct Node {
    ///     me: WeakPtr<Node>,
    /// }
    ///
    /// let node = SharedPtr::new_cyclic(|me| {
    ///     assert!(WeakPtr::expired(me));
    ///     Node { me: me.clone() }
    /// });
    /// let again = WeakPtr::lock(&node.me);
    /// assert!(again == node);
    /// assert_eq!(SharedPtr::use_count(&node), 2);
    /// ```
    pub fn new_cyclic<F>(data_fn: F) -> Self
    where
        F: FnOnce(&WeakPtr<T>) -> T,
    {
        let block = ColocatedBlock::<T>::allocate_uninit();
        let header = ColocatedBlock::header(block);
        let ptr = unsafe { ColocatedBlock::value_ptr(block) };

        // Owns the weak unit the block was allocated with. If `data_fn` panics, dropping it frees the block
        // without touching the uninitialised value.
        let weak: WeakPtr<T> = unsafe { WeakPtr::from_parts(Some(header), Some(ptr)) };
        let data = data_fn(&weak);

        unsafe {
            ptr.as_ptr().write(data);
            header.as_ref().inc_strong();
        }
        drop(weak);

        unsafe { Self::from_parts(Some(header), Some(ptr)) }
    }

    /// Creates a new `Pin<SharedPtr<T>>`. The value lives inside its control block and never moves.
    #[inline]
    pub fn pin(value: T) -> Pin<SharedPtr<T>> {
        unsafe { Pin::new_unchecked(SharedPtr::new(value)) }
    }

    /// Gets the raw value pointer, null if the `SharedPtr` is empty.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared = SharedPtr::new(100);
    /// assert_eq!(SharedPtr::as_ptr(&shared), &*shared as *const i32);
    /// assert!(SharedPtr::as_ptr(&SharedPtr::<i32>::null()).is_null());
    /// ```
    #[inline]
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.map_or(ptr::null(), |ptr| ptr.as_ptr() as *const T)
    }
}

impl<T: ?Sized> SharedPtr<T> {
    /// An empty `SharedPtr`: no block, no value, a use count of zero.
    #[inline]
    pub const fn null() -> Self {
        SharedPtr {
            block: None,
            ptr: None,
            phantom: PhantomData,
        }
    }

    /// Wraps parts whose strong unit has already been accounted for.
    ///
    /// # Safety
    /// If `block` is present the caller must own one strong unit of it, and `ptr` must stay valid while that
    /// block's strong count is positive.
    #[inline]
    pub(crate) unsafe fn from_parts(block: Option<NonNull<BlockHeader>>, ptr: Option<NonNull<T>>) -> Self {
        SharedPtr {
            block,
            ptr,
            phantom: PhantomData,
        }
    }

    #[inline]
    fn header(&self) -> Option<&BlockHeader> {
        self.block.map(|block| unsafe { &*block.as_ptr() })
    }

    /// Takes over a boxed value. The box becomes the value of a new external control block.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared: SharedPtr<[i32]> = SharedPtr::from_box(vec![1, 2, 3].into_boxed_slice());
    /// assert_eq!(&*shared, &[1, 2, 3]);
    /// ```
    #[inline]
    pub fn from_box(value: Box<T>) -> Self {
        let ptr = NonNull::from(Box::leak(value));
        let block = ExternalBlock::allocate(ptr, DefaultDelete);
        unsafe { Self::from_parts(Some(block), Some(ptr)) }
    }

    /// Takes ownership of a pointer obtained from [`Box::into_raw`]. A null `ptr` gives an empty `SharedPtr`.
    ///
    /// # Safety
    /// `ptr` must be null or come from `Box::into_raw`, and must not be owned by anything else.
    #[inline]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        Self::from_raw_with_deleter(ptr, DefaultDelete)
    }

    /// Takes ownership of `ptr`; `deleter` disposes of it once the last strong handle is gone.
    /// A null `ptr` gives an empty `SharedPtr` and `deleter` is dropped without being called.
    ///
    /// # Safety
    /// `ptr` must be null or valid for `deleter` to delete, and must not be owned by anything else.
    pub unsafe fn from_raw_with_deleter<D: Deleter<T>>(ptr: *mut T, deleter: D) -> Self {
        match NonNull::new(ptr) {
            Some(ptr) => {
                let block = ExternalBlock::allocate(ptr, deleter);
                Self::from_parts(Some(block), Some(ptr))
            }
            None => Self::null(),
        }
    }

    /// Shares the control block of `other` but points at `ptr`. The strong count of `other`'s block goes up by one
    /// if there is a block; `other` may be empty, in which case the result points at `ptr` without owning anything.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as the returned `SharedPtr` (and its clones) can dereference it, which
    /// usually means it points into the object managed by `other`.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// struct Pair {
    ///     left: i32,
    ///     right: i32,
    /// }
    ///
    /// let pair = SharedPtr::new(Pair { left: 1, right: 2 });
    /// let right = unsafe { SharedPtr::aliasing(&pair, &pair.right) };
    /// assert_eq!(*right, 2);
    /// assert_eq!(SharedPtr::use_count(&pair), 2);
    /// ```
    #[inline]
    pub unsafe fn aliasing<U: ?Sized>(other: &SharedPtr<U>, ptr: *const T) -> Self {
        if let Some(header) = other.header() {
            header.inc_strong();
        }
        Self::from_parts(other.block, NonNull::new(ptr as *mut T))
    }

    /// Safe aliasing: shares the control block of `this` and points at whatever `f` borrows from the value.
    /// An empty `this` gives an empty result without calling `f`.
    ///
    /// Also the way to get a `SharedPtr<dyn Trait>` out of a `SharedPtr<T>`.
    ///
    /// `T` must not borrow anything: a reference stored inside the value could be handed out by `f` and would
    /// not be kept alive by the block.
    ///
    /// ```compile_fail
    /// use shptr::SharedPtr;
    ///
    /// let text = String::from("borrowed");
    /// let outer = SharedPtr::new(text.as_str());
    /// let escaped = SharedPtr::project(&outer, |r| *r);
    /// drop(outer);
    /// drop(text);
    /// assert_eq!(&*escaped, "borrowed");
    /// ```
    ///
    /// ```
    /// use std::fmt::Display;
    /// use shptr::SharedPtr;
    ///
    /// let tuple = SharedPtr::new((String::from("name"), 42));
    /// let number: SharedPtr<dyn Display> = SharedPtr::project(&tuple, |t| &t.1 as &dyn Display);
    /// assert_eq!(number.to_string(), "42");
    /// drop(tuple);
    /// assert_eq!(SharedPtr::use_count(&number), 1);
    /// ```
    pub fn project<U: ?Sized, F>(this: &Self, f: F) -> SharedPtr<U>
    where
        T: 'static,
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        match SharedPtr::get(this) {
            Some(value) => {
                let target: *const U = f(value);
                unsafe { SharedPtr::aliasing(this, target) }
            }
            None => SharedPtr::null(),
        }
    }

    /// Create a `WeakPtr<T>` from a `SharedPtr<T>`. This increments the weak count.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared = SharedPtr::new(100);
    /// let _weak = SharedPtr::downgrade(&shared);
    /// assert_eq!(SharedPtr::weak_count(&shared), 1);
    /// ```
    #[inline]
    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        if let Some(header) = this.header() {
            header.inc_weak();
        }
        unsafe { WeakPtr::from_parts(this.block, this.ptr) }
    }

    /// Gets a reference to the value, or `None` if the `SharedPtr` is empty.
    #[inline]
    pub fn get(this: &Self) -> Option<&T> {
        this.ptr.map(|ptr| unsafe { &*ptr.as_ptr() })
    }

    /// Gets a `&mut` reference to the managed value when this is the only handle to its block: no other
    /// `SharedPtr`, no [`WeakPtr`]. Returns [`None`] otherwise, and for aliasing views, which may point at memory
    /// the block does not own.
    ///
    /// A value holding a [`WeakThis`](crate::WeakThis) slot always has a weak handle to itself, so this returns
    /// `None` for it.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let mut shared = SharedPtr::new(100);
    /// *SharedPtr::get_mut(&mut shared).unwrap() = 300;
    /// assert_eq!(*shared, 300);
    ///
    /// let _other = shared.clone();
    /// assert!(SharedPtr::get_mut(&mut shared).is_none());
    /// ```
    #[inline]
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let unique = this.header().is_some_and(|header| {
            header.strong() == 1 && header.weak() == 0 && header.value_addr() == addr_of(this.ptr)
        });
        if unique {
            this.ptr.map(|ptr| unsafe { &mut *ptr.as_ptr() })
        } else {
            None
        }
    }

    /// Return the strong count of the block: how many `SharedPtr`s share it. Zero for an empty `SharedPtr`.
    #[inline]
    pub fn use_count(this: &Self) -> usize {
        this.header().map_or(0, BlockHeader::strong)
    }

    /// Return the weak count of the block: how many `WeakPtr`s observe it.
    #[inline]
    pub fn weak_count(this: &Self) -> usize {
        this.header().map_or(0, BlockHeader::weak)
    }

    /// Whether the value pointer is null.
    #[inline]
    pub fn is_null(this: &Self) -> bool {
        this.ptr.is_none()
    }

    /// Checks if `this` and `other` belong to the same ownership group, regardless of what they point at.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let pair = SharedPtr::new((1, 2));
    /// let first = SharedPtr::project(&pair, |p| &p.0);
    /// assert!(SharedPtr::owner_eq(&pair, &first));
    /// assert!(!SharedPtr::owner_eq(&pair, &SharedPtr::new((1, 2))));
    /// ```
    #[inline]
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &SharedPtr<U>) -> bool {
        this.block == other.block
    }

    /// Releases ownership, leaving `this` empty.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let mut shared = SharedPtr::new(1);
    /// SharedPtr::reset(&mut shared);
    /// assert!(SharedPtr::is_null(&shared));
    /// assert_eq!(SharedPtr::use_count(&shared), 0);
    /// ```
    #[inline]
    pub fn reset(this: &mut Self) {
        drop(Self::take(this));
    }

    /// Releases ownership and takes over `value` in a new external block.
    #[inline]
    pub fn reset_with(this: &mut Self, value: Box<T>) {
        *this = SharedPtr::from_box(value);
    }

    /// Moves the contents out, leaving `this` empty. No count changes.
    #[inline]
    pub fn take(this: &mut Self) -> Self {
        mem::replace(this, SharedPtr::null())
    }

    /// Exchanges the contents of two `SharedPtr`s. No count changes.
    #[inline]
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    /// Makes `this` share `other`'s ownership. A no-op when both already hold the same value pointer in the
    /// same block.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let a = SharedPtr::new(1);
    /// let mut b = SharedPtr::new(2);
    /// SharedPtr::assign(&mut b, &a);
    /// assert_eq!(*b, 1);
    /// assert_eq!(SharedPtr::use_count(&a), 2);
    /// ```
    pub fn assign(this: &mut Self, other: &Self) {
        if Self::same_handle(this, other) {
            return;
        }
        *this = other.clone();
    }

    /// Moves `other`'s ownership into `this`. When both already hold the same value pointer in the same block,
    /// `this` is left as is and `other` is dropped.
    pub fn assign_from(this: &mut Self, other: Self) {
        if Self::same_handle(this, &other) {
            return;
        }
        *this = other;
    }

    #[inline]
    fn same_handle(this: &Self, other: &Self) -> bool {
        this.block == other.block && addr_of(this.ptr) == addr_of(other.ptr)
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    /// Get an immutable reference to the value. Panics if the `SharedPtr` is empty.
    /// ```
    /// use shptr::SharedPtr;
    /// use std::ops::Deref;
    ///
    /// let shared = SharedPtr::new(100i32);
    /// assert_eq!(*shared, 100i32);
    /// assert_eq!(shared.deref(), &100i32);
    /// ```
    #[inline]
    fn deref(&self) -> &T {
        match SharedPtr::get(self) {
            Some(value) => value,
            None => panic!("dereferenced an empty SharedPtr"),
        }
    }
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    #[inline]
    fn drop(&mut self) {
        if let Some(block) = self.block.take() {
            self.ptr = None;
            unsafe { BlockHeader::dec_strong(block) };
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    /// Clone a `SharedPtr<T>` (increment the strong count).
    /// It will panic if the strong count overflows.
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let shared = SharedPtr::new(100);
    /// let _shared2 = shared.clone();
    /// assert_eq!(SharedPtr::use_count(&shared), 2);
    /// ```
    #[inline]
    fn clone(&self) -> Self {
        if let Some(header) = self.header() {
            header.inc_strong();
        }
        SharedPtr {
            block: self.block,
            ptr: self.ptr,
            phantom: PhantomData,
        }
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    #[inline]
    fn default() -> Self {
        SharedPtr::null()
    }
}

impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = BadWeakPtr;

    /// Promote a `WeakPtr<T>`, failing with [`BadWeakPtr`] if the value is gone.
    /// [`WeakPtr::lock`] is the non-failing alternative.
    fn try_from(weak: &WeakPtr<T>) -> Result<Self, BadWeakPtr> {
        WeakPtr::upgrade(weak).ok_or(BadWeakPtr)
    }
}

impl<T: ?Sized> AsRef<T> for SharedPtr<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: ?Sized> Borrow<T> for SharedPtr<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized + Display> Display for SharedPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match SharedPtr::get(self) {
            Some(value) => Display::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized + Debug> Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match SharedPtr::get(self) {
            Some(value) => Debug::fmt(value, f),
            None => f.write_str("null"),
        }
    }
}

impl<T: ?Sized> Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Pointer::fmt(&addr_of(self.ptr), f)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedPtr<T> {
    /// Equivalent to [`SharedPtr::from_box`].
    fn from(value: Box<T>) -> Self {
        SharedPtr::from_box(value)
    }
}

impl<T: ?Sized, D: Deleter<T>> From<UniquePtr<T, D>> for SharedPtr<T> {
    /// Moves the value and the deleter of a `UniquePtr` into a new external block.
    /// An empty `UniquePtr` gives an empty `SharedPtr`.
    ///
    /// ```
    /// use shptr::{SharedPtr, UniquePtr};
    ///
    /// let unique = UniquePtr::new(String::from("moved"));
    /// let shared: SharedPtr<String> = SharedPtr::from(unique);
    /// assert_eq!(*shared, "moved");
    /// ```
    fn from(value: UniquePtr<T, D>) -> Self {
        let (ptr, deleter) = UniquePtr::into_raw_parts(value);
        match ptr {
            Some(ptr) => unsafe { SharedPtr::from_raw_with_deleter(ptr.as_ptr(), deleter) },
            None => SharedPtr::null(),
        }
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedPtr<U>> for SharedPtr<T> {
    /// Compares value pointer addresses.
    ///
    /// ```
    /// use shptr::SharedPtr;
    ///
    /// let a = SharedPtr::new(100);
    /// let b = SharedPtr::new(100);
    /// assert!(a == a.clone());
    /// assert!(a != b);
    /// ```
    #[inline]
    fn eq(&self, other: &SharedPtr<U>) -> bool {
        addr_of(self.ptr) == addr_of(other.ptr)
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> Hash for SharedPtr<T> {
    /// Hashes the value pointer address, consistent with `PartialEq`.
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        addr_of(self.ptr).hash(state);
    }
}
