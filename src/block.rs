//! Control blocks.
//!
//! Every ownership group has exactly one block. The block starts with a [`BlockHeader`] holding the strong and
//! weak counts plus two function pointers supplied by the concrete variant: one that disposes of the managed
//! value and one that frees the block itself. Handles only ever see the type-erased header, so a
//! `SharedPtr<U>` can share the block of a `SharedPtr<T>` (aliasing) without knowing what the block manages.

use std::{
    cell::Cell,
    mem::MaybeUninit,
    ptr::{self, addr_of_mut, NonNull},
};

use crate::unique::Deleter;

pub(crate) const MAX_REFCOUNT: usize = (isize::MAX) as usize;

/// The counting state shared by all variants. Must be the first field of every `#[repr(C)]` block.
#[repr(C)]
pub(crate) struct BlockHeader {
    strong: Cell<usize>,
    weak: Cell<usize>,
    /// Address of the managed value, set once the block is in place.
    value: *const u8,
    dispose_value: unsafe fn(NonNull<BlockHeader>),
    deallocate: unsafe fn(NonNull<BlockHeader>),
}

/// A concrete block layout. The header takes care of the counting; implementors only say how the value goes
/// away and how the block memory goes away.
pub(crate) trait ControlBlock: Sized {
    /// Destroys the managed value. The block stays allocated.
    ///
    /// # Safety
    /// `this` must point to a live block whose value has been initialised and not yet disposed.
    unsafe fn dispose_value(this: NonNull<Self>);

    /// Frees the block.
    ///
    /// # Safety
    /// `this` must come from `Box::leak` and the value must already be disposed (or never initialised).
    unsafe fn deallocate(this: NonNull<Self>) {
        drop(Box::from_raw(this.as_ptr()));
    }
}

unsafe fn dispose_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    B::dispose_value(header.cast());
}

unsafe fn deallocate_erased<B: ControlBlock>(header: NonNull<BlockHeader>) {
    B::deallocate(header.cast());
}

impl BlockHeader {
    fn new<B: ControlBlock>(strong: usize, weak: usize) -> Self {
        BlockHeader {
            strong: Cell::new(strong),
            weak: Cell::new(weak),
            value: ptr::null(),
            dispose_value: dispose_erased::<B>,
            deallocate: deallocate_erased::<B>,
        }
    }

    #[inline]
    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    #[inline]
    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    /// The address of the value this block manages. Aliasing handles may point elsewhere.
    #[inline]
    pub(crate) fn value_addr(&self) -> *const u8 {
        self.value
    }

    #[inline]
    pub(crate) fn inc_strong(&self) {
        let strong = self.strong.get() + 1;
        if strong > MAX_REFCOUNT {
            panic!("Overflow of maximum strong reference count.");
        }
        self.strong.set(strong);
    }

    /// Increments the strong count unless the value is already gone.
    #[inline]
    pub(crate) fn try_inc_strong(&self) -> bool {
        if self.strong.get() == 0 {
            return false;
        }
        self.inc_strong();
        true
    }

    #[inline]
    pub(crate) fn inc_weak(&self) {
        let weak = self.weak.get() + 1;
        if weak > MAX_REFCOUNT {
            panic!("Overflow of maximum weak reference count.");
        }
        self.weak.set(weak);
    }

    /// Drops one strong unit. The last one disposes of the value, and frees the block too if no weak
    /// handle is left.
    ///
    /// # Safety
    /// `this` must point to a live block and the caller must own the strong unit being released.
    pub(crate) unsafe fn dec_strong(this: NonNull<Self>) {
        let header = this.as_ref();
        debug_assert!(header.strong.get() > 0);
        let strong = header.strong.get() - 1;
        header.strong.set(strong);
        if strong != 0 {
            return;
        }

        // The value may own weak handles to its own block (a `WeakThis` slot, a parent link...).
        // Hold one weak unit for the duration of the disposal so none of them can free the block under us.
        header.weak.set(header.weak.get() + 1);
        let dispose_value = header.dispose_value;
        dispose_value(this);
        trace_block!("disposed value of control block {:p}", this);

        Self::dec_weak(this);
    }

    /// Drops one weak unit, freeing the block once both counts are zero.
    ///
    /// # Safety
    /// `this` must point to a live block and the caller must own the weak unit being released.
    pub(crate) unsafe fn dec_weak(this: NonNull<Self>) {
        let header = this.as_ref();
        debug_assert!(header.weak.get() > 0);
        let weak = header.weak.get() - 1;
        header.weak.set(weak);
        if weak != 0 || header.strong.get() != 0 {
            return;
        }

        let deallocate = header.deallocate;
        trace_block!("deallocating control block {:p}", this);
        deallocate(this);
    }
}

/// Block and value in a single allocation.
#[repr(C)]
pub(crate) struct ColocatedBlock<T> {
    header: BlockHeader,
    value: MaybeUninit<T>,
}

impl<T> ColocatedBlock<T> {
    /// Allocates a block owning `value`, with a strong count of one.
    pub(crate) fn allocate(value: T) -> NonNull<Self> {
        let block = Self::place(BlockHeader::new::<Self>(1, 0), MaybeUninit::new(value));
        trace_block!("allocated colocated control block {:p}", block);
        block
    }

    /// Allocates a block with no value yet. The strong count is zero and the caller owns the single weak unit;
    /// the value must be written through [`ColocatedBlock::value_ptr`] before the strong count is raised.
    pub(crate) fn allocate_uninit() -> NonNull<Self> {
        let block = Self::place(BlockHeader::new::<Self>(0, 1), MaybeUninit::uninit());
        trace_block!("allocated uninitialised colocated control block {:p}", block);
        block
    }

    fn place(header: BlockHeader, value: MaybeUninit<T>) -> NonNull<Self> {
        let block = Box::leak(Box::new(ColocatedBlock { header, value }));
        block.header.value = block.value.as_ptr().cast::<u8>();
        NonNull::from(block)
    }

    #[inline]
    pub(crate) fn header(this: NonNull<Self>) -> NonNull<BlockHeader> {
        this.cast()
    }

    /// # Safety
    /// `this` must point to a live block.
    #[inline]
    pub(crate) unsafe fn value_ptr(this: NonNull<Self>) -> NonNull<T> {
        NonNull::new_unchecked(addr_of_mut!((*this.as_ptr()).value).cast::<T>())
    }
}

impl<T> ControlBlock for ColocatedBlock<T> {
    unsafe fn dispose_value(this: NonNull<Self>) {
        ptr::drop_in_place(Self::value_ptr(this).as_ptr());
    }
}

/// Block adopting a value that lives in its own allocation.
#[repr(C)]
pub(crate) struct ExternalBlock<T: ?Sized, D: Deleter<T>> {
    header: BlockHeader,
    ptr: NonNull<T>,
    deleter: D,
}

impl<T: ?Sized, D: Deleter<T>> ExternalBlock<T, D> {
    /// Allocates a block taking over `ptr`, with a strong count of one. `deleter` runs once the last strong
    /// handle is gone.
    pub(crate) fn allocate(ptr: NonNull<T>, deleter: D) -> NonNull<BlockHeader> {
        let mut header = BlockHeader::new::<Self>(1, 0);
        header.value = ptr.cast::<u8>().as_ptr();
        let block = NonNull::from(Box::leak(Box::new(ExternalBlock { header, ptr, deleter })));
        trace_block!("allocated external control block {:p}", block);
        block.cast()
    }
}

impl<T: ?Sized, D: Deleter<T>> ControlBlock for ExternalBlock<T, D> {
    unsafe fn dispose_value(this: NonNull<Self>) {
        let block = this.as_ptr();
        let ptr = (*block).ptr;
        let deleter = &mut *addr_of_mut!((*block).deleter);
        deleter.delete(ptr);
    }
}
