//! Thread control block, attributes, and lifecycle states.

use std::sync::Mutex;

use crate::arch::Context;
use crate::pool::{PoolInner, ThreadFn};

/// Default stack size for each thread (64KB), used as the allocation
/// unit when an attribute set leaves the stack size unspecified.
pub const STACK_SIZE: usize = 64 * 1024;

/// Smallest stack the pool will provision. Requested sizes below this
/// are rounded up: the initial frame's reserved words plus the wrapper
/// and scheduler frames need room before the thread body ever runs, and
/// a stack smaller than the frame it must hold writes outside its own
/// allocation.
pub const MIN_STACK_SIZE: usize = 4 * 1024;

/// Thread identity, unique for the lifetime of the pool.
///
/// Assigned monotonically at creation and never reused, even after the
/// thread's slot has been reaped. Wrap-around is outside the contract.
pub type ThreadId = u8;

/// Lifecycle state of a thread.
///
/// All transitions are voluntary; there is no preemption. `Zombie` is
/// terminal: no operation moves a thread out of it or alters its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Eligible to run, not currently executing.
    Runnable,
    /// Currently executing. At most one thread per pool is in this state.
    Running,
    /// Function body has returned; result is final.
    Zombie,
}

/// Creation attributes for a thread.
///
/// A zero field means "use the default", matching the original contract
/// where an absent attribute falls back to the configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadAttr {
    /// Requested stack size in bytes.
    pub stacksize: usize,
    /// Reserved result-size hint. Passed through unused by the scheduler.
    pub res_size: usize,
}

impl Default for ThreadAttr {
    fn default() -> Self {
        ThreadAttr {
            stacksize: STACK_SIZE,
            res_size: 0,
        }
    }
}

impl ThreadAttr {
    /// Resolve zero fields to the configured defaults and clamp the
    /// stack size to [`MIN_STACK_SIZE`].
    pub(crate) fn resolved(self) -> ThreadAttr {
        ThreadAttr {
            stacksize: if self.stacksize == 0 {
                STACK_SIZE
            } else {
                self.stacksize.max(MIN_STACK_SIZE)
            },
            res_size: self.res_size,
        }
    }
}

/// A thread control block.
///
/// Owns its context record and stack exclusively; neither is ever shared
/// with another block. Stored by value in the pool's registry, so its
/// address is stable from the moment it lands in a slot until the slot
/// is reaped.
pub(crate) struct Tcb {
    pub(crate) tid: ThreadId,
    pub(crate) state: ThreadState,
    pub(crate) func: ThreadFn,
    pub(crate) arg: usize,
    /// Written at most once, by the thread's own wrapper.
    pub(crate) result: usize,
    /// Attribute set the thread was created with.
    #[allow(dead_code)]
    pub(crate) attr: ThreadAttr,
    pub(crate) context: Context,
    /// Keeps the stack allocation alive for the thread's lifetime.
    stack: Vec<u8>,
    /// Guards transitions into `Running`.
    pub(crate) lock: Mutex<()>,
    /// Back-pointer to the owning pool, for the start-up wrapper.
    pub(crate) pool: *mut PoolInner,
}

impl Tcb {
    /// Control block for a regular thread. The context record stays
    /// zeroed until [`Tcb::init_context`] points it at the wrapper.
    pub(crate) fn new(
        tid: ThreadId,
        func: ThreadFn,
        arg: usize,
        attr: ThreadAttr,
        pool: *mut PoolInner,
    ) -> Self {
        Tcb {
            tid,
            state: ThreadState::Runnable,
            func,
            arg,
            result: 0,
            attr,
            context: Context::default(),
            stack: vec![0u8; attr.stacksize],
            lock: Mutex::new(()),
            pool,
        }
    }

    /// Control block for the slot-0 bootstrap thread.
    ///
    /// It runs on the embedding caller's OS stack, and its context record
    /// is captured by the self-switch during creation rather than by
    /// wrapper setup, so no stack is allocated.
    pub(crate) fn bootstrap(
        tid: ThreadId,
        func: ThreadFn,
        arg: usize,
        attr: ThreadAttr,
        pool: *mut PoolInner,
    ) -> Self {
        Tcb {
            tid,
            state: ThreadState::Running,
            func,
            arg,
            result: 0,
            attr,
            context: Context::default(),
            stack: Vec::new(),
            lock: Mutex::new(()),
            pool,
        }
    }

    /// Point the context record at the start shim.
    ///
    /// Must be called after the block has reached its final address in
    /// the registry: `tcb` is read back from the stack word on first
    /// entry.
    pub(crate) fn init_context(&mut self, entry: usize, tcb: *mut Tcb) {
        // Stack grows downward; align the top to 16 bytes (required by ABI).
        let stack_top = (self.stack.as_ptr() as usize + self.stack.len()) & !0xF;
        self.context = Context::new(stack_top, entry, tcb as u64);
    }
}
