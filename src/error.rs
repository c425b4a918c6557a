use thiserror::Error;

/// Returned by `SharedPtr::try_from(&weak)` when the weak pointer has expired.
///
/// ```
/// use shptr::{make_shared, BadWeakPtr, SharedPtr};
///
/// let shared = make_shared(1);
/// let weak = SharedPtr::downgrade(&shared);
/// drop(shared);
/// assert_eq!(SharedPtr::<i32>::try_from(&weak).unwrap_err(), BadWeakPtr);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("bad weak pointer: the managed value has expired")]
pub struct BadWeakPtr;
