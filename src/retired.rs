//! Type-erased bookkeeping for deferred destruction.

/// A pointer whose destruction has been deferred.
///
/// The deleter is monomorphized at [`Retired::new`] time so the reclaimer
/// can free heterogeneous nodes from a single bucket.
pub(crate) struct Retired {
    ptr: *mut (),
    deleter: unsafe fn(*mut ()),
}

impl Retired {
    /// Erase `ptr` behind a deleter that reconstitutes and drops the box.
    ///
    /// `ptr` must originate from `Box::into_raw`; the caller gives up
    /// ownership here.
    pub(crate) fn new<T>(ptr: *mut T) -> Retired {
        unsafe fn deleter<T>(ptr: *mut ()) {
            // SAFETY: `ptr` was produced by `Box::into_raw::<T>` and the
            // reclaimer runs each deleter exactly once.
            unsafe { drop(Box::from_raw(ptr as *mut T)) };
        }
        Retired {
            ptr: ptr as *mut (),
            deleter: deleter::<T>,
        }
    }

    /// Run the deleter, consuming the entry.
    ///
    /// # Safety
    ///
    /// No thread may still hold a reference into the pointee. The
    /// reclaimer only calls this once the retiring epoch is two
    /// generations behind the global epoch, or under proven exclusive
    /// access.
    pub(crate) unsafe fn reclaim(self) {
        unsafe { (self.deleter)(self.ptr) }
    }
}

// SAFETY: the entry is an owning pointer; the retire/reclaim protocol
// hands it between threads without shared access to the pointee.
unsafe impl Send for Retired {}
