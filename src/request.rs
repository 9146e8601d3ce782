//! Request pool: a fixed-capacity table of handles to asynchronous
//! operations, polled to completion by `wait`/`test`.
//!
//! A request is reserved with a completion predicate, polled by repeatedly
//! calling [`CompletionPredicate::evaluate`] until it returns `true` or a
//! deadline passes, and then released back to the pool. The pool never
//! grows: `MAX_REQUESTS` slots are allocated once and recycled.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::REQUEST_POLL_INTERVAL;
use crate::error::Status;
use crate::limits::MAX_REQUESTS;

/// Something a request can finish doing. Implementations wrap the actual
/// I/O (a send, a receive, an availability check) and report whether it has
/// completed and, if so, how large the resulting transfer was.
pub trait CompletionPredicate: Send {
    /// Advances the underlying operation by one step and reports whether it
    /// has completed. Called repeatedly by `wait`/`test` until it returns
    /// `true` or the caller's deadline expires.
    fn evaluate(&mut self) -> bool;

    /// Size, in bytes, of the data transferred once the operation has
    /// completed. Meaningless before `evaluate` has returned `true`.
    fn size_on_completion(&self) -> usize {
        0
    }
}

/// Opaque handle to a reserved request slot. `RequestHandle::NULL` denotes
/// no request, mirroring the original API's `MCAPI_NULL` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHandle(usize);

impl RequestHandle {
    /// The null handle: never returned by a successful reservation.
    pub const NULL: RequestHandle = RequestHandle(usize::MAX);

    pub fn is_null(self) -> bool {
        self == RequestHandle::NULL
    }
}

enum Slot {
    Free,
    InUse(Option<Box<dyn CompletionPredicate>>),
}

/// Fixed-capacity table of in-flight requests, guarded by a single mutex —
/// the same coarse-grained locking the endpoint table uses, since requests
/// are reserved and released far less often than channel traffic flows.
pub struct RequestPool {
    slots: Mutex<Vec<Slot>>,
}

impl RequestPool {
    pub fn new() -> Self {
        let mut slots = Vec::with_capacity(MAX_REQUESTS);
        slots.resize_with(MAX_REQUESTS, || Slot::Free);
        RequestPool {
            slots: Mutex::new(slots),
        }
    }

    /// Reserves a free slot, storing `predicate` (which may be `None`, the
    /// "in-use slot with no predicate" state exercised by
    /// `wait_fail_req_null` in the original test suite). Returns
    /// [`RequestHandle::NULL`] if the pool is exhausted.
    pub fn reserve(&self, predicate: Option<Box<dyn CompletionPredicate>>) -> RequestHandle {
        let mut slots = self.slots.lock().expect("request pool mutex poisoned");
        for (index, slot) in slots.iter_mut().enumerate() {
            if matches!(slot, Slot::Free) {
                *slot = Slot::InUse(predicate);
                return RequestHandle(index);
            }
        }
        RequestHandle::NULL
    }

    /// Returns a slot to the pool unconditionally. Safe to call on an
    /// already-free or out-of-range handle; both are no-ops.
    pub fn release(&self, handle: RequestHandle) {
        if handle.is_null() {
            return;
        }
        let mut slots = self.slots.lock().expect("request pool mutex poisoned");
        if let Some(slot) = slots.get_mut(handle.0) {
            *slot = Slot::Free;
        }
    }

    /// Polls `handle` once, matching `mcapi_test`'s non-blocking semantics.
    ///
    /// Returns `(Status::Success, size)` and releases the slot if the
    /// predicate just completed; `Status::Pending` if it has not;
    /// `Status::RequestInvalid` if the handle is null, out of range, free,
    /// or reserved with no predicate (in which case the slot is released,
    /// per the decision that a request nobody can ever complete must not
    /// leak the slot forever).
    pub fn test(&self, handle: RequestHandle) -> (Status, usize) {
        if handle.is_null() {
            return (Status::RequestInvalid, 0);
        }
        let mut slots = self.slots.lock().expect("request pool mutex poisoned");
        let Some(slot) = slots.get_mut(handle.0) else {
            return (Status::RequestInvalid, 0);
        };
        match slot {
            Slot::Free => (Status::RequestInvalid, 0),
            Slot::InUse(None) => {
                *slot = Slot::Free;
                (Status::RequestInvalid, 0)
            }
            Slot::InUse(Some(predicate)) => {
                if predicate.evaluate() {
                    let size = predicate.size_on_completion();
                    *slot = Slot::Free;
                    (Status::Success, size)
                } else {
                    (Status::Pending, 0)
                }
            }
        }
    }

    /// Polls `handle` at [`POLL_INTERVAL`] cadence until it completes or
    /// `timeout` elapses, measured against wall-clock time via
    /// [`Instant`] rather than a poll-count budget.
    ///
    /// Returns `(Status::Success, size)` on completion, `Status::Timeout` if
    /// the deadline passes first (the slot is released either way), or
    /// `Status::RequestInvalid` for a null/free/predicate-less handle.
    pub fn wait(&self, handle: RequestHandle, timeout: Option<Duration>) -> (Status, usize) {
        let start = Instant::now();
        loop {
            let (status, size) = self.test(handle);
            match status {
                Status::Success | Status::RequestInvalid => return (status, size),
                Status::Pending => {}
                _ => unreachable!("test() only returns Success, Pending, or RequestInvalid"),
            }

            if let Some(timeout) = timeout {
                if start.elapsed() >= timeout {
                    self.release(handle);
                    return (Status::Timeout, 0);
                }
            }
            std::thread::sleep(REQUEST_POLL_INTERVAL);
        }
    }

    /// Frees every reserved slot unconditionally. Called from
    /// [`crate::node::finalize`], per the spec's requirement that finalizing
    /// a node clears its request pool rather than leaving stale predicates
    /// behind for the next `initialize`.
    pub fn clear(&self) {
        let mut slots = self.slots.lock().expect("request pool mutex poisoned");
        for slot in slots.iter_mut() {
            *slot = Slot::Free;
        }
    }
}

impl Default for RequestPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrue;
    impl CompletionPredicate for AlwaysTrue {
        fn evaluate(&mut self) -> bool {
            true
        }
        fn size_on_completion(&self) -> usize {
            42
        }
    }

    struct AlwaysFalse;
    impl CompletionPredicate for AlwaysFalse {
        fn evaluate(&mut self) -> bool {
            false
        }
    }

    struct TrueAfterN(u32, u32);
    impl CompletionPredicate for TrueAfterN {
        fn evaluate(&mut self) -> bool {
            self.0 += 1;
            self.0 >= self.1
        }
    }

    #[test]
    fn reserve_and_release_recycles_slots() {
        let pool = RequestPool::new();
        let mut handles = Vec::new();
        for _ in 0..MAX_REQUESTS {
            let h = pool.reserve(Some(Box::new(AlwaysFalse)));
            assert!(!h.is_null());
            handles.push(h);
        }
        assert!(pool.reserve(Some(Box::new(AlwaysFalse))).is_null());

        for h in handles {
            pool.release(h);
        }

        for _ in 0..MAX_REQUESTS {
            assert!(!pool.reserve(Some(Box::new(AlwaysFalse))).is_null());
        }
    }

    #[test]
    fn wait_on_null_predicate_reports_invalid_and_frees_slot() {
        let pool = RequestPool::new();
        let handle = pool.reserve(None);
        assert!(!handle.is_null());
        let (status, _) = pool.wait(handle, Some(Duration::from_millis(50)));
        assert_eq!(status, Status::RequestInvalid);

        // slot was released, so the pool can still fill back up to capacity
        let mut refilled = 0;
        while !pool.reserve(Some(Box::new(AlwaysFalse))).is_null() {
            refilled += 1;
        }
        assert_eq!(refilled, MAX_REQUESTS);
    }

    #[test]
    fn test_on_null_handle_is_invalid() {
        let pool = RequestPool::new();
        let (status, _) = pool.test(RequestHandle::NULL);
        assert_eq!(status, Status::RequestInvalid);
    }

    #[test]
    fn test_reports_pending_then_success() {
        let pool = RequestPool::new();
        let handle = pool.reserve(Some(Box::new(AlwaysFalse)));
        let (status, _) = pool.test(handle);
        assert_eq!(status, Status::Pending);
    }

    #[test]
    fn wait_succeeds_immediately() {
        let pool = RequestPool::new();
        let handle = pool.reserve(Some(Box::new(AlwaysTrue)));
        let (status, size) = pool.wait(handle, Some(Duration::from_millis(0)));
        assert_eq!(status, Status::Success);
        assert_eq!(size, 42);
    }

    #[test]
    fn wait_times_out_on_a_predicate_that_never_completes() {
        let pool = RequestPool::new();
        let handle = pool.reserve(Some(Box::new(AlwaysFalse)));
        let start = Instant::now();
        let (status, _) = pool.wait(handle, Some(Duration::from_millis(30)));
        assert_eq!(status, Status::Timeout);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn wait_succeeds_after_several_polls() {
        let pool = RequestPool::new();
        let handle = pool.reserve(Some(Box::new(TrueAfterN(0, 5))));
        let (status, _) = pool.wait(handle, Some(Duration::from_millis(500)));
        assert_eq!(status, Status::Success);
    }

    #[test]
    fn wait_stress_exhausts_completes_and_refills_the_pool() {
        let pool = RequestPool::new();
        let mut handles = Vec::new();
        for _ in 0..MAX_REQUESTS {
            let h = pool.reserve(Some(Box::new(AlwaysTrue)));
            assert!(!h.is_null());
            handles.push(h);
        }
        assert!(pool.reserve(Some(Box::new(AlwaysTrue))).is_null());

        for h in handles {
            let (status, size) = pool.wait(h, Some(Duration::from_millis(50)));
            assert_eq!(status, Status::Success);
            assert_eq!(size, 42);
        }

        for _ in 0..MAX_REQUESTS {
            assert!(!pool.reserve(Some(Box::new(AlwaysTrue))).is_null());
        }
        assert!(pool.reserve(Some(Box::new(AlwaysTrue))).is_null());
    }
}
