use std::{
    cell::Cell,
    mem::size_of,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    ptr::NonNull,
    rc::Rc,
};

use crate::{
    make_intrusive, make_shared, make_shared_enabled, BadWeakPtr, CompressedPair, DefaultDelete,
    EnableSharedFromThis, IntrusivePtr, RefCounted, SharedPtr, SimpleCounter, UniquePtr, WeakPtr, WeakThis,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Counts how many times it has been dropped.
struct Probe {
    drops: Rc<Cell<usize>>,
}

impl Probe {
    fn new() -> (Probe, Rc<Cell<usize>>) {
        let drops = Rc::new(Cell::new(0));
        (
            Probe {
                drops: drops.clone(),
            },
            drops,
        )
    }
}

impl Drop for Probe {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Data {
    string: String,
    int: i32,
}

#[test]
fn test_raw_pointer_scenario() {
    init_logging();
    let mut p1 = unsafe { SharedPtr::from_raw(Box::into_raw(Box::new(5))) };
    assert_eq!(SharedPtr::use_count(&p1), 1);

    let mut p2 = p1.clone();
    assert_eq!(SharedPtr::use_count(&p1), 2);
    assert_eq!(SharedPtr::use_count(&p2), 2);

    SharedPtr::reset(&mut p1);
    assert_eq!(SharedPtr::use_count(&p2), 1);
    assert_eq!(*p2, 5);

    let weak = SharedPtr::downgrade(&p2);
    SharedPtr::reset(&mut p2);
    assert!(WeakPtr::expired(&weak));
    assert!(SharedPtr::is_null(&WeakPtr::lock(&weak)));
}

#[test]
fn test_factory_round_trip() {
    let direct = Data {
        string: String::from("This is data."),
        int: 123,
    };
    let shared = make_shared(direct.clone());
    assert_eq!(*shared, direct);
    assert_eq!(shared.int, 123);
    assert_eq!(format!("{:?}", shared), format!("{:?}", direct));
}

#[test]
fn test_null_pointer() {
    let empty: SharedPtr<i32> = SharedPtr::null();
    assert!(SharedPtr::is_null(&empty));
    assert_eq!(SharedPtr::use_count(&empty), 0);
    assert!(SharedPtr::get(&empty).is_none());
    assert_eq!(format!("{:?}", empty), "null");
    assert!(empty == SharedPtr::<i32>::default());

    let weak = SharedPtr::downgrade(&empty);
    assert!(WeakPtr::expired(&weak));
    assert_eq!(WeakPtr::weak_count(&weak), 0);
}

#[test]
#[should_panic(expected = "dereferenced an empty SharedPtr")]
fn test_null_deref_panics() {
    let empty: SharedPtr<i32> = SharedPtr::null();
    assert_eq!(*empty, 0);
}

#[test]
fn test_counts_follow_handles() {
    let (probe, drops) = Probe::new();
    let a = SharedPtr::new(probe);
    let b = a.clone();
    let c = b.clone();
    assert_eq!(SharedPtr::use_count(&a), 3);

    let w1 = SharedPtr::downgrade(&a);
    let w2 = w1.clone();
    let w3 = WeakPtr::from(&c);
    assert_eq!(SharedPtr::weak_count(&a), 3);
    assert_eq!(WeakPtr::use_count(&w1), 3);

    drop(b);
    assert_eq!(SharedPtr::use_count(&c), 2);
    drop(w2);
    assert_eq!(WeakPtr::weak_count(&w3), 2);

    let moved = c;
    assert_eq!(SharedPtr::use_count(&moved), 2);

    drop(a);
    assert_eq!(drops.get(), 0);
    drop(moved);
    assert_eq!(drops.get(), 1);
    assert!(WeakPtr::expired(&w1));
    assert_eq!(WeakPtr::weak_count(&w1), 2);
}

#[test]
fn test_value_dies_before_block() {
    let (probe, drops) = Probe::new();
    let shared = SharedPtr::from_box(Box::new(probe));
    let weak = SharedPtr::downgrade(&shared);
    drop(shared);
    assert_eq!(drops.get(), 1);
    assert!(WeakPtr::expired(&weak));
    assert_eq!(WeakPtr::use_count(&weak), 0);
    assert!(WeakPtr::upgrade(&weak).is_none());
    drop(weak);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_try_from_expired_weak() {
    let shared = SharedPtr::new(String::from("alive"));
    let weak = SharedPtr::downgrade(&shared);

    let promoted: SharedPtr<String> = SharedPtr::try_from(&weak).unwrap();
    assert_eq!(*promoted, "alive");
    assert_eq!(SharedPtr::use_count(&shared), 2);

    drop(shared);
    drop(promoted);
    let err = SharedPtr::<String>::try_from(&weak).unwrap_err();
    assert_eq!(err, BadWeakPtr);
    assert_eq!(err.to_string(), "bad weak pointer: the managed value has expired");
    assert!(SharedPtr::<i32>::try_from(&WeakPtr::new()).is_err());
}

struct Outer {
    name: String,
    inner: Inner,
    _probe: Probe,
}

struct Inner {
    value: i32,
}

#[test]
fn test_aliasing_keeps_parent_alive() {
    let (probe, drops) = Probe::new();
    let outer = SharedPtr::new(Outer {
        name: String::from("outer"),
        inner: Inner { value: 7 },
        _probe: probe,
    });

    let inner = unsafe { SharedPtr::aliasing(&outer, &outer.inner) };
    assert_eq!(SharedPtr::as_ptr(&inner), &outer.inner as *const Inner);
    assert_eq!(SharedPtr::use_count(&inner), SharedPtr::use_count(&outer));
    assert_eq!(SharedPtr::use_count(&outer), 2);
    assert!(SharedPtr::owner_eq(&inner, &outer));

    drop(outer);
    assert_eq!(drops.get(), 0);
    assert_eq!(inner.value, 7);
    assert_eq!(SharedPtr::use_count(&inner), 1);

    drop(inner);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_project_and_equality() {
    let outer = SharedPtr::new(Outer {
        name: String::from("projected"),
        inner: Inner { value: 1 },
        _probe: Probe::new().0,
    });
    let name = SharedPtr::project(&outer, |o| o.name.as_str());
    assert_eq!(&*name, "projected");

    let a = SharedPtr::project(&outer, |o| &o.inner);
    let b = SharedPtr::project(&outer, |o| &o.inner);
    assert!(a == b);
    assert_eq!(SharedPtr::use_count(&outer), 4);

    let empty: SharedPtr<Outer> = SharedPtr::null();
    assert!(SharedPtr::is_null(&SharedPtr::project(&empty, |o| &o.inner)));
}

#[test]
fn test_aliasing_an_empty_pointer() {
    let local = 42;
    let empty: SharedPtr<String> = SharedPtr::null();
    let view = unsafe { SharedPtr::aliasing(&empty, &local) };
    assert!(!SharedPtr::is_null(&view));
    assert_eq!(SharedPtr::use_count(&view), 0);
    assert_eq!(*view, 42);
}

trait Shape {
    fn area(&self) -> f64;
}

struct Square(f64);

impl Shape for Square {
    fn area(&self) -> f64 {
        self.0 * self.0
    }
}

#[test]
fn test_project_to_trait_object() {
    let square = SharedPtr::new(Square(3.0));
    let shape: SharedPtr<dyn Shape> = SharedPtr::project(&square, |s| s as &dyn Shape);
    assert_eq!(shape.area(), 9.0);
    assert!(shape == square);
    drop(square);
    assert_eq!(shape.area(), 9.0);
}

#[test]
fn test_assign() {
    let a = SharedPtr::new(1);
    let mut b = SharedPtr::new(2);
    let b_weak = SharedPtr::downgrade(&b);

    SharedPtr::assign(&mut b, &a);
    assert_eq!(*b, 1);
    assert_eq!(SharedPtr::use_count(&a), 2);
    assert!(WeakPtr::expired(&b_weak));

    // Same value pointer, same block: nothing happens.
    let before = b.clone();
    SharedPtr::assign(&mut b, &before);
    assert_eq!(SharedPtr::use_count(&a), 3);
    SharedPtr::assign_from(&mut b, before);
    assert_eq!(SharedPtr::use_count(&a), 2);
    assert!(SharedPtr::owner_eq(&a, &b));
}

#[test]
fn test_assign_pointer_equal_from_another_block() {
    let value = 5;
    let first = SharedPtr::new(String::from("first"));
    let second = SharedPtr::new(String::from("second"));

    let mut from_first = unsafe { SharedPtr::aliasing(&first, &value) };
    let from_second = unsafe { SharedPtr::aliasing(&second, &value) };
    assert!(from_first == from_second);
    assert!(!SharedPtr::owner_eq(&from_first, &from_second));

    SharedPtr::assign(&mut from_first, &from_second);
    assert!(SharedPtr::owner_eq(&from_first, &second));
    assert_eq!(SharedPtr::use_count(&first), 1);
    assert_eq!(SharedPtr::use_count(&second), 3);
}

#[test]
fn test_reset_take_swap() {
    let (old, old_drops) = Probe::new();
    let (new, new_drops) = Probe::new();

    let mut shared = SharedPtr::new(old);
    SharedPtr::reset_with(&mut shared, Box::new(new));
    assert_eq!(old_drops.get(), 1);
    assert_eq!(SharedPtr::use_count(&shared), 1);

    let taken = SharedPtr::take(&mut shared);
    assert!(SharedPtr::is_null(&shared));
    assert_eq!(SharedPtr::use_count(&taken), 1);

    let mut left = SharedPtr::new(1);
    let mut right = SharedPtr::new(2);
    SharedPtr::swap(&mut left, &mut right);
    assert_eq!((*left, *right), (2, 1));

    drop(taken);
    assert_eq!(new_drops.get(), 1);
}

#[test]
fn test_get_mut() {
    let mut shared = SharedPtr::new(Data {
        string: String::from("This is data."),
        int: 123,
    });
    SharedPtr::get_mut(&mut shared).unwrap().string = String::from("This is also data");
    assert_eq!(shared.string, "This is also data");

    let weak = SharedPtr::downgrade(&shared);
    assert!(SharedPtr::get_mut(&mut shared).is_none());
    drop(weak);
    assert!(SharedPtr::get_mut(&mut shared).is_some());
}

#[test]
fn test_custom_deleter_runs_once() {
    let deleted = Rc::new(Cell::new(0));
    let counter = deleted.clone();
    let deleter = move |ptr: NonNull<i32>| {
        counter.set(counter.get() + 1);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    };

    let shared = unsafe { SharedPtr::from_raw_with_deleter(Box::into_raw(Box::new(9)), deleter) };
    let copy = shared.clone();
    let weak = SharedPtr::downgrade(&copy);
    drop(shared);
    assert_eq!(deleted.get(), 0);
    drop(copy);
    assert_eq!(deleted.get(), 1);
    drop(weak);
    assert_eq!(deleted.get(), 1);
}

#[test]
fn test_null_raw_pointer() {
    let shared: SharedPtr<i32> = unsafe { SharedPtr::from_raw(std::ptr::null_mut()) };
    assert!(SharedPtr::is_null(&shared));
    assert_eq!(SharedPtr::use_count(&shared), 0);
}

#[test]
fn test_from_unique() {
    let deleted = Rc::new(Cell::new(0));
    let counter = deleted.clone();
    let deleter = move |ptr: NonNull<String>| {
        counter.set(counter.get() + 1);
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    };
    let raw = Box::into_raw(Box::new(String::from("unique")));
    let unique = unsafe { UniquePtr::from_raw_with_deleter(raw, deleter) };

    let shared: SharedPtr<String> = SharedPtr::from(unique);
    assert_eq!(*shared, "unique");
    assert_eq!(deleted.get(), 0);
    drop(shared);
    assert_eq!(deleted.get(), 1);

    let empty: UniquePtr<i32> = UniquePtr::null();
    assert!(SharedPtr::is_null(&SharedPtr::<i32>::from(empty)));
}

#[test]
fn test_new_cyclic() {
    struct Node {
        me: WeakPtr<Node>,
        value: i32,
    }

    let node = SharedPtr::new_cyclic(|me| {
        assert!(WeakPtr::expired(me));
        assert!(SharedPtr::is_null(&WeakPtr::lock(me)));
        Node {
            me: me.clone(),
            value: 3,
        }
    });
    assert_eq!(SharedPtr::use_count(&node), 1);
    assert_eq!(SharedPtr::weak_count(&node), 1);
    assert_eq!(WeakPtr::lock(&node.me).value, 3);
}

#[test]
fn test_new_cyclic_panic_frees_block() {
    let (probe, drops) = Probe::new();
    let mut escaped: Option<WeakPtr<Probe>> = None;

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        SharedPtr::new_cyclic(|me| {
            escaped = Some(me.clone());
            if drops.get() == 0 {
                panic!("construction failed");
            }
            probe
        })
    }));
    assert!(result.is_err());

    // The closure's captured probe went away with the unwind; the block never held a value to drop.
    assert_eq!(drops.get(), 1);
    let escaped = escaped.unwrap();
    assert!(WeakPtr::expired(&escaped));
    assert_eq!(WeakPtr::use_count(&escaped), 0);
    assert_eq!(WeakPtr::weak_count(&escaped), 1);
    assert!(SharedPtr::is_null(&WeakPtr::lock(&escaped)));
    drop(escaped);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_pin() {
    let (probe, drops) = Probe::new();
    let pinned = SharedPtr::pin(probe);
    let address = &*pinned as *const Probe;

    let copy = pinned.clone();
    assert_eq!(&*copy as *const Probe, address);
    let moved = pinned;
    assert_eq!(&*moved as *const Probe, address);

    let inner = Pin::into_inner(copy);
    assert_eq!(SharedPtr::use_count(&inner), 2);
    assert_eq!(SharedPtr::as_ptr(&inner), address);
    drop(inner);
    drop(moved);
    assert_eq!(drops.get(), 1);
}

static FROZEN: i32 = 7;

#[test]
fn test_get_mut_refuses_views() {
    let mut view = SharedPtr::project(&SharedPtr::new(()), |_| &FROZEN);
    assert_eq!(SharedPtr::use_count(&view), 1);
    assert!(SharedPtr::get_mut(&mut view).is_none());
    assert_eq!(*view, 7);

    let outer = SharedPtr::new(Outer {
        name: String::from("view"),
        inner: Inner { value: 2 },
        _probe: Probe::new().0,
    });
    let mut inner = SharedPtr::project(&outer, |o| &o.inner);
    drop(outer);
    assert_eq!(SharedPtr::use_count(&inner), 1);
    assert!(SharedPtr::get_mut(&mut inner).is_none());

    let mut whole = SharedPtr::project(&SharedPtr::from_box(Box::new(5)), |v| v);
    *SharedPtr::get_mut(&mut whole).unwrap() = 6;
    assert_eq!(*whole, 6);
}

struct Widget {
    id: u32,
    this: WeakThis<Widget>,
    _probe: Probe,
}

impl Widget {
    fn new(id: u32) -> (Widget, Rc<Cell<usize>>) {
        let (probe, drops) = Probe::new();
        (
            Widget {
                id,
                this: WeakThis::new(),
                _probe: probe,
            },
            drops,
        )
    }
}

impl EnableSharedFromThis for Widget {
    fn weak_this(&self) -> &WeakThis<Self> {
        &self.this
    }
}

#[test]
fn test_shared_from_this_factory() {
    init_logging();
    let (widget, drops) = Widget::new(1);
    let owner = make_shared_enabled(widget);

    let again = owner.shared_from_this();
    assert_eq!(SharedPtr::use_count(&again), SharedPtr::use_count(&owner));
    assert_eq!(SharedPtr::as_ptr(&again), &*owner as *const Widget);
    assert!(owner.this.is_linked());

    drop(again);
    drop(owner);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_shared_from_this_boxed() {
    let (widget, drops) = Widget::new(2);
    let owner = SharedPtr::from_box_enabled(Box::new(widget));
    let weak = owner.weak_from_this();
    assert!(WeakPtr::owner_eq(&weak, &SharedPtr::downgrade(&owner)));
    assert_eq!(WeakPtr::lock(&weak).id, 2);

    drop(owner);
    assert_eq!(drops.get(), 1);
    assert!(WeakPtr::expired(&weak));
}

#[test]
fn test_shared_from_this_raw() {
    let (widget, drops) = Widget::new(3);
    let owner = unsafe { SharedPtr::from_raw_enabled(Box::into_raw(Box::new(widget))) };
    assert_eq!(owner.shared_from_this().id, 3);
    drop(owner);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_shared_from_this_without_owner() {
    init_logging();
    let (widget, _drops) = Widget::new(4);
    assert!(SharedPtr::is_null(&widget.shared_from_this()));
    assert!(WeakPtr::expired(&widget.weak_from_this()));

    // Plain constructors do not link the slot.
    let owner = SharedPtr::new(widget);
    assert!(!owner.this.is_linked());
    assert!(SharedPtr::is_null(&owner.shared_from_this()));
    SharedPtr::enable_shared_from_this(&owner);
    assert!(owner.this.is_linked());
    assert!(!SharedPtr::is_null(&owner.shared_from_this()));
}

#[test]
fn test_shared_from_this_first_owner_wins() {
    struct Holder {
        widget: Widget,
    }

    let (widget, drops) = Widget::new(5);
    let first = make_shared_enabled(widget);
    let holder = SharedPtr::new(Holder {
        widget: Widget::new(6).0,
    });

    // A second owner path onto an already linked object leaves the slot alone.
    let alias = unsafe { SharedPtr::aliasing_enabled(&holder, &*first) };
    assert!(SharedPtr::owner_eq(&first.shared_from_this(), &first));
    assert!(!SharedPtr::owner_eq(&first.shared_from_this(), &alias));

    // An unlinked member gets linked to the block that owns its parent.
    let member = unsafe { SharedPtr::aliasing_enabled(&holder, &holder.widget) };
    assert!(SharedPtr::owner_eq(&member.shared_from_this(), &holder));

    drop(alias);
    drop(first);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_weak_this_clone_is_unlinked() {
    let (widget, _drops) = Widget::new(7);
    let owner = make_shared_enabled(widget);
    let copy = owner.this.clone();
    assert!(!copy.is_linked());
    assert!(owner.this.is_linked());
}

#[test]
fn test_self_reference_alone_keeps_nothing_alive() {
    let (widget, drops) = Widget::new(8);
    let owner = make_shared_enabled(widget);
    assert_eq!(SharedPtr::weak_count(&owner), 1);
    let observer = SharedPtr::downgrade(&owner);
    drop(owner);
    assert_eq!(drops.get(), 1);
    assert_eq!(WeakPtr::weak_count(&observer), 1);
}

#[test]
fn test_weak_assign_reset_swap() {
    let a = SharedPtr::new(1);
    let b = SharedPtr::new(2);
    let mut wa = SharedPtr::downgrade(&a);
    let mut wb = SharedPtr::downgrade(&b);

    WeakPtr::swap(&mut wa, &mut wb);
    assert_eq!(*WeakPtr::lock(&wa), 2);

    WeakPtr::assign(&mut wa, &wb);
    assert!(wa == wb);
    assert_eq!(SharedPtr::weak_count(&a), 2);
    assert_eq!(SharedPtr::weak_count(&b), 0);

    WeakPtr::reset(&mut wa);
    assert!(WeakPtr::expired(&wa));
    assert_eq!(SharedPtr::weak_count(&a), 1);
}

#[test]
fn test_tree_with_parent_links() {
    struct TreeNode {
        parent: WeakPtr<TreeNode>,
        children: std::cell::RefCell<Vec<SharedPtr<TreeNode>>>,
        _probe: Probe,
    }

    let (probe, root_drops) = Probe::new();
    let root = SharedPtr::new(TreeNode {
        parent: WeakPtr::new(),
        children: Default::default(),
        _probe: probe,
    });
    let (probe, child_drops) = Probe::new();
    let child = SharedPtr::new(TreeNode {
        parent: SharedPtr::downgrade(&root),
        children: Default::default(),
        _probe: probe,
    });
    root.children.borrow_mut().push(child.clone());
    assert!(WeakPtr::lock(&child.parent) == root);
    assert!(WeakPtr::expired(&root.parent));

    drop(root);
    assert_eq!(root_drops.get(), 1);
    assert_eq!(child_drops.get(), 0);
    assert!(WeakPtr::expired(&child.parent));
    drop(child);
    assert_eq!(child_drops.get(), 1);
}

#[test]
fn test_unique_ptr() {
    let (probe, drops) = Probe::new();
    let mut unique = UniquePtr::new(probe);
    assert!(!UniquePtr::is_null(&unique));

    let (replacement, replacement_drops) = Probe::new();
    UniquePtr::replace(&mut unique, Box::new(replacement));
    assert_eq!(drops.get(), 1);

    let released = UniquePtr::release(&mut unique).unwrap();
    assert!(UniquePtr::is_null(&unique));
    drop(unique);
    assert_eq!(replacement_drops.get(), 0);

    let mut readopted: UniquePtr<Probe> = unsafe { UniquePtr::from_raw(released.as_ptr()) };
    UniquePtr::reset(&mut readopted);
    assert_eq!(replacement_drops.get(), 1);
    UniquePtr::reset(&mut readopted);
    assert_eq!(replacement_drops.get(), 1);
}

#[test]
fn test_unique_ptr_reset_raw_same_pointer() {
    let (probe, drops) = Probe::new();
    let mut unique = UniquePtr::new(probe);
    let raw = UniquePtr::as_ptr(&unique);
    unsafe { UniquePtr::reset_raw(&mut unique, raw) };
    assert_eq!(drops.get(), 0);
    drop(unique);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_unique_ptr_swap_moves_deleters() {
    let log = Rc::new(Cell::new(0));
    let tag = |bit: usize| {
        let log = log.clone();
        move |ptr: NonNull<i32>| {
            log.set(log.get() | bit);
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    };

    let mut a = unsafe { UniquePtr::from_raw_with_deleter(Box::into_raw(Box::new(1)), tag(1)) };
    let mut b = unsafe { UniquePtr::from_raw_with_deleter(Box::into_raw(Box::new(2)), tag(2)) };
    UniquePtr::swap(&mut a, &mut b);
    assert_eq!((*a, *b), (2, 1));

    drop(a);
    assert_eq!(log.get(), 2);
    drop(b);
    assert_eq!(log.get(), 3);
}

#[test]
fn test_unique_slice() {
    let mut slice = UniquePtr::from_box(vec![1, 2, 3].into_boxed_slice());
    slice[0] = 10;
    assert_eq!(slice[0], 10);
    assert_eq!(slice.len(), 3);
    let back = UniquePtr::into_box(slice).unwrap();
    assert_eq!(&*back, &[10, 2, 3]);
}

#[test]
#[should_panic(expected = "dereferenced an empty UniquePtr")]
fn test_unique_null_deref_panics() {
    let empty: UniquePtr<i32> = UniquePtr::null();
    assert_eq!(*empty, 0);
}

#[test]
fn test_compressed_pair_elides_stateless_members() {
    assert_eq!(size_of::<CompressedPair<u64, DefaultDelete>>(), size_of::<u64>());
    assert_eq!(size_of::<CompressedPair<DefaultDelete, u64>>(), size_of::<u64>());
    assert_eq!(size_of::<CompressedPair<(), DefaultDelete>>(), 0);
    assert_eq!(size_of::<UniquePtr<u64>>(), size_of::<*mut u64>());
    assert_eq!(size_of::<CompressedPair<u32, u32>>(), 2 * size_of::<u32>());

    let pair = CompressedPair::new(1u8, DefaultDelete);
    assert_eq!(*pair.first(), 1);
    assert_eq!(*pair.second(), DefaultDelete);
}

struct Counted {
    refs: SimpleCounter,
    _probe: Probe,
}

impl RefCounted for Counted {
    type Counter = SimpleCounter;

    fn counter(&self) -> &SimpleCounter {
        &self.refs
    }
}

fn counted() -> (Counted, Rc<Cell<usize>>) {
    let (probe, drops) = Probe::new();
    (
        Counted {
            refs: SimpleCounter::new(),
            _probe: probe,
        },
        drops,
    )
}

#[test]
fn test_intrusive_counts() {
    let (value, drops) = counted();
    let a = make_intrusive(value);
    assert_eq!(IntrusivePtr::use_count(&a), 1);

    let b = a.clone();
    let c = unsafe { IntrusivePtr::from_raw(IntrusivePtr::as_ptr(&a)) };
    assert_eq!(IntrusivePtr::use_count(&b), 3);
    assert!(a == c);

    drop(a);
    drop(b);
    assert_eq!(drops.get(), 0);
    drop(c);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_intrusive_reset() {
    let (value, drops) = counted();
    let mut ptr = IntrusivePtr::new(value);
    let raw = IntrusivePtr::as_ptr(&ptr);
    unsafe { IntrusivePtr::reset_raw(&mut ptr, raw) };
    assert_eq!(drops.get(), 0);
    assert_eq!(IntrusivePtr::use_count(&ptr), 1);

    let mut other = IntrusivePtr::null();
    IntrusivePtr::swap(&mut ptr, &mut other);
    assert!(IntrusivePtr::is_null(&ptr));
    IntrusivePtr::reset(&mut other);
    assert_eq!(drops.get(), 1);
    assert_eq!(IntrusivePtr::use_count(&other), 0);
}

#[test]
fn test_intrusive_custom_destroy() {
    thread_local! {
        static DESTROYED: Cell<usize> = const { Cell::new(0) };
    }

    struct Pooled {
        refs: SimpleCounter,
    }

    impl RefCounted for Pooled {
        type Counter = SimpleCounter;

        fn counter(&self) -> &SimpleCounter {
            &self.refs
        }

        unsafe fn destroy(this: NonNull<Self>) {
            DESTROYED.with(|d| d.set(d.get() + 1));
            drop(Box::from_raw(this.as_ptr()));
        }
    }

    let ptr = IntrusivePtr::new(Pooled {
        refs: SimpleCounter::new(),
    });
    drop(ptr.clone());
    assert_eq!(DESTROYED.with(Cell::get), 0);
    drop(ptr);
    assert_eq!(DESTROYED.with(Cell::get), 1);
}
