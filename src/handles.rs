//! Opaque Handle Bridge
//!
//! Keeps host-side objects alive while a pointer-sized token for them
//! circulates through foreign code. Objects live in a slab; a handle packs
//! the slot index and the slot's generation, so freeing a slot invalidates
//! every token ever issued for it. Stale, duplicate and forged tokens are
//! rejected without side effects.

use std::any::Any;
use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

const HALF_BITS: u32 = usize::BITS / 2;
const LOW_MASK: usize = (1 << HALF_BITS) - 1;

/// Highest slot count a handle can address
const MAX_SLOTS: usize = LOW_MASK - 1;

/// Opaque, non-zero token for one bridged object
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    fn pack(index: usize, generation: usize) -> Option<Self> {
        NonZeroUsize::new((generation << HALF_BITS) | (index + 1)).map(Handle)
    }

    /// `None` for tokens with an empty index half.
    fn index(self) -> Option<usize> {
        (self.0.get() & LOW_MASK).checked_sub(1)
    }

    fn generation(self) -> usize {
        self.0.get() >> HALF_BITS
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Handle)
    }

    pub fn into_raw(self) -> usize {
        self.0.get()
    }

    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        Self::from_raw(ptr as usize)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.get() as *mut c_void
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:#x})", self.0.get())
    }
}

struct Slot {
    generation: usize,
    value: Option<Box<dyn Any + Send + Sync>>,
}

#[derive(Default)]
struct Slab {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
}

impl Slab {
    fn slot(&self, handle: Handle) -> Option<&Slot> {
        let slot = self.slots.get(handle.index()?)?;
        (slot.generation == handle.generation() && slot.value.is_some()).then_some(slot)
    }
}

/// Slab of bridged objects
#[derive(Default)]
pub struct HandleBridge {
    slab: Mutex<Slab>,
}

impl HandleBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `value` and return a handle for it.
    ///
    /// Returns `None` only when every addressable slot is in use.
    pub fn allocate<T: Any + Send + Sync>(&self, value: T) -> Option<Handle> {
        let mut slab = self.slab.lock();
        let index = match slab.free.pop() {
            Some(index) => index,
            None if slab.slots.len() < MAX_SLOTS => {
                slab.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                slab.slots.len() - 1
            }
            None => return None,
        };
        let slot = &mut slab.slots[index];
        slot.value = Some(Box::new(value));
        let handle = Handle::pack(index, slot.generation);
        slab.live += 1;
        handle
    }

    /// Borrow the object behind `handle`.
    ///
    /// `None` if the handle is not live or the object is not a `T`. The
    /// bridge is locked while `f` runs.
    pub fn with<T: Any, R>(&self, handle: Handle, f: impl FnOnce(&T) -> R) -> Option<R> {
        let slab = self.slab.lock();
        let value = slab.slot(handle)?.value.as_ref()?;
        value.downcast_ref::<T>().map(f)
    }

    /// Release the object behind `handle`. Returns `false`, and does nothing,
    /// if the handle is not live.
    pub fn free(&self, handle: Handle) -> bool {
        let released = {
            let mut slab = self.slab.lock();
            if slab.slot(handle).is_none() {
                return false;
            }
            let Some(index) = handle.index() else {
                return false;
            };
            let slot = &mut slab.slots[index];
            let value = slot.value.take();
            slot.generation = (slot.generation + 1) & LOW_MASK;
            slab.free.push(index);
            slab.live -= 1;
            value
        };
        // Dropped outside the lock
        drop(released);
        true
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.slab.lock().slot(handle).is_some()
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.slab.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Object allocated by the boundary-level `allocate_handle`: one
/// pointer-sized user-data cell foreign code may fill in.
#[derive(Debug, Default)]
pub struct HostObject {
    data: AtomicUsize,
}

impl HostObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&self, data: *mut c_void) {
        self.data.store(data as usize, Ordering::Release);
    }

    pub fn data(&self) -> *mut c_void {
        self.data.load(Ordering::Acquire) as *mut c_void
    }
}

static BRIDGE: Lazy<HandleBridge> = Lazy::new(HandleBridge::new);

/// The process-wide handle bridge
pub fn bridge() -> &'static HandleBridge {
    &BRIDGE
}
