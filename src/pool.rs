//! Fixed-capacity cooperative thread pool: registry, scheduler, and the
//! lifecycle API (create / yield / join / identify).
//!
//! # Example
//!
//! ```no_run
//! use uthread::{PoolHandle, ThreadPool};
//!
//! fn worker(pool: PoolHandle, arg: usize) -> usize {
//!     pool.yield_now().unwrap();
//!     arg * 2
//! }
//!
//! let mut pool = ThreadPool::new();
//! // The first create registers the caller itself as the slot-0 thread.
//! pool.create(None, |_, _| 0, 0).unwrap();
//! let tid = pool.create(None, worker, 21).unwrap();
//! while !pool.all_finished() {
//!     pool.yield_now().unwrap();
//! }
//! let mut buf = [0u8; 8];
//! pool.join(tid, Some(&mut buf)).unwrap();
//! assert_eq!(usize::from_ne_bytes(buf), 42);
//! ```

use log::{debug, trace};

use crate::arch::{Context, context_switch, thread_start};
use crate::error::PoolError;
use crate::tcb::{Tcb, ThreadAttr, ThreadId, ThreadState};

/// Default number of registry slots in a pool.
pub const MAX_THREADS: usize = 16;

/// Signature of a thread's body: the opaque pointer-sized argument in,
/// the pointer-sized result out. The [`PoolHandle`] gives the body access
/// to the lifecycle operations of the pool that runs it.
pub type ThreadFn = fn(pool: PoolHandle, arg: usize) -> usize;

/// Pool state shared between the owning handle and running threads.
///
/// Lives behind a `Box` so its address survives moves of the owning
/// [`ThreadPool`]; control blocks carry a raw pointer back here for the
/// start-up wrapper.
pub(crate) struct PoolInner {
    /// Registry: fixed-size table of live control blocks, indexed by
    /// slot. Slot 0 is reserved for the bootstrap thread.
    slots: Vec<Option<Tcb>>,
    /// Slot index of the Running thread, if any.
    current: Option<usize>,
    /// Next identity to hand out.
    next_tid: ThreadId,
    /// Raised when the scheduler finds nothing runnable, cleared when a
    /// runnable thread is created.
    all_finished: bool,
}

impl PoolInner {
    fn new(capacity: usize) -> Self {
        let mut slots = Vec::new();
        slots.resize_with(capacity, || None);
        PoolInner {
            slots,
            current: None,
            next_tid: 0,
            all_finished: false,
        }
    }

    fn alloc_tid(&mut self) -> ThreadId {
        let tid = self.next_tid;
        // Identity wrap-around is outside the contract.
        self.next_tid = self.next_tid.wrapping_add(1);
        tid
    }

    fn slot_by_tid(&self, tid: ThreadId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|t| t.tid == tid))
    }

    pub(crate) fn create(
        &mut self,
        attr: Option<ThreadAttr>,
        func: ThreadFn,
        arg: usize,
    ) -> Result<ThreadId, PoolError> {
        let attr = attr.unwrap_or_default().resolved();
        let pool = self as *mut PoolInner;

        if self.slots[0].is_none() {
            // First create ever: the caller itself becomes the slot-0
            // bootstrap thread. The self-switch stores the live register
            // state into the new context record, so later switches back
            // to slot 0 resume inside the embedding code.
            let tid = self.alloc_tid();
            debug!("create: registering bootstrap thread {tid}");
            self.slots[0] = Some(Tcb::bootstrap(tid, func, arg, attr, pool));
            self.current = Some(0);
            let ctx: *mut Context = &mut self
                .slots[0]
                .as_mut()
                .expect("bootstrap slot just filled")
                .context;
            unsafe { context_switch(ctx, ctx) };
            // Kick the scheduler once so the pool starts scheduled.
            self.yield_now()?;
            return Ok(tid);
        }

        // First empty slot wins; slot 0 is never handed out again.
        let Some(idx) = self
            .slots
            .iter()
            .skip(1)
            .position(|s| s.is_none())
            .map(|i| i + 1)
        else {
            debug!("create: no free slot (capacity {})", self.slots.len());
            return Err(PoolError::CapacityExhausted);
        };

        let tid = self.alloc_tid();
        debug!(
            "create: thread {tid} in slot {idx}, {} byte stack",
            attr.stacksize
        );
        self.slots[idx] = Some(Tcb::new(tid, func, arg, attr, pool));
        // The wrapper finds the control block through this pointer, so
        // the context is set up only once the block sits in its final slot.
        let slot = self.slots[idx].as_mut().expect("slot just filled");
        let tcb = slot as *mut Tcb;
        slot.init_context(thread_start as usize, tcb);
        self.all_finished = false;
        Ok(tid)
    }

    pub(crate) fn yield_now(&mut self) -> Result<(), PoolError> {
        let Some(cur) = self.current else {
            debug!("yield: no current thread");
            return Err(PoolError::NoCurrentThread);
        };
        let t = self.slots[cur].as_mut().expect("current slot is empty");
        trace!("yield: thread {} leaving the cpu", t.tid);
        if t.state != ThreadState::Zombie {
            t.state = ThreadState::Runnable;
        }
        self.schedule();
        Ok(())
    }

    /// Pick the next thread and switch to it.
    ///
    /// Linear scan of the registry from slot 0, skipping empty slots and
    /// the current slot; the first Runnable occupant wins. The scan
    /// restarts from slot 0 every time, so the tie-break is positional
    /// rather than strict round-robin. With no candidate, control falls
    /// back to the slot-0 thread and the all-finished flag is raised.
    fn schedule(&mut self) {
        let cur = self.current.expect("schedule called with no current thread");
        let cur_ctx: *mut Context = &mut self
            .slots[cur]
            .as_mut()
            .expect("current slot is empty")
            .context;

        let next = self
            .slots
            .iter()
            .enumerate()
            .find_map(|(idx, slot)| match slot {
                Some(t) if idx != cur && t.state == ThreadState::Runnable => Some(idx),
                _ => None,
            });

        let target = match next {
            Some(idx) => idx,
            None => {
                trace!("sched: nothing runnable, falling back to slot 0");
                self.all_finished = true;
                0
            }
        };

        let t = self.slots[target].as_mut().expect("selected slot is empty");
        trace!("sched: switching to thread {} in slot {target}", t.tid);
        {
            // The lock brackets only the transition into Running. Holding
            // it across the switch would leave it taken forever when a
            // zombie's final yield never resumes.
            let _guard = t.lock.lock().unwrap();
            t.state = ThreadState::Running;
        }
        let next_ctx: *const Context = &t.context;
        self.current = Some(target);
        // Returns when this thread is switched back in. A fresh target
        // enters the wrapper instead; a zombie caller never resumes.
        unsafe { context_switch(cur_ctx, next_ctx) };
    }

    pub(crate) fn join(
        &self,
        tid: ThreadId,
        status: Option<&mut [u8]>,
    ) -> Result<(), PoolError> {
        let Some(idx) = self.slot_by_tid(tid) else {
            debug!("join: thread {tid} not found");
            return Err(PoolError::NotFound(tid));
        };
        let t = self.slots[idx].as_ref().expect("slot checked above");
        if let Some(buf) = status {
            // The result slot is one machine word; the copy is capped there.
            let bytes = t.result.to_ne_bytes();
            let n = buf.len().min(bytes.len());
            buf[..n].copy_from_slice(&bytes[..n]);
            trace!("join: copied {n} result bytes from thread {tid}");
        }
        Ok(())
    }

    pub(crate) fn whoami(&self) -> Option<ThreadId> {
        self.current
            .map(|idx| self.slots[idx].as_ref().expect("current slot is empty").tid)
    }

    pub(crate) fn state(&self, tid: ThreadId) -> Result<ThreadState, PoolError> {
        self.slot_by_tid(tid)
            .map(|idx| self.slots[idx].as_ref().expect("slot checked above").state)
            .ok_or(PoolError::NotFound(tid))
    }

    pub(crate) fn reap(&mut self, tid: ThreadId) -> Result<usize, PoolError> {
        let Some(idx) = self.slot_by_tid(tid) else {
            return Err(PoolError::NotFound(tid));
        };
        let state = self.slots[idx].as_ref().expect("slot checked above").state;
        if state != ThreadState::Zombie {
            return Err(PoolError::NotFinished(tid));
        }
        let t = self.slots[idx].take().expect("slot checked above");
        debug!("reap: freeing thread {tid} from slot {idx}");
        Ok(t.result)
    }

    pub(crate) fn all_finished(&self) -> bool {
        self.all_finished
    }
}

/// Start-up wrapper: the first Rust code executed inside a fresh thread.
///
/// Entered through the per-arch start shim, which reads the control-block
/// reference from the reserved word at the top of the stack and passes it
/// here as the argument. Runs the thread's function, records the result,
/// marks the block Zombie, and hands the cpu back. Never returns.
pub(crate) extern "C" fn thread_main(tcb: *mut Tcb) {
    unsafe {
        let pool = (*tcb).pool;
        trace!("wrapper: thread {} entering its body", (*tcb).tid);
        let result = ((*tcb).func)(PoolHandle { inner: pool }, (*tcb).arg);
        (*tcb).result = result;
        (*tcb).state = ThreadState::Zombie;
        trace!("wrapper: thread {} finished", (*tcb).tid);
        if (*tcb).tid != 0 {
            // Final voluntary yield; control never comes back here.
            let _ = (*pool).yield_now();
        }
    }
    unreachable!("thread wrapper resumed after its final switch");
}

/// Owning handle to a cooperative thread pool.
///
/// All lifecycle operations go through this object or through the
/// [`PoolHandle`] passed to thread functions; no process-wide state is
/// involved, so independent pools can coexist.
///
/// The first [`create`](ThreadPool::create) call registers the *calling*
/// OS context as the slot-0 bootstrap thread; every later create sets up
/// a fresh stack that enters the start-up wrapper on its first switch.
pub struct ThreadPool {
    inner: Box<PoolInner>,
}

impl ThreadPool {
    /// Pool with the default capacity of [`MAX_THREADS`] slots.
    pub fn new() -> Self {
        Self::with_capacity(MAX_THREADS)
    }

    /// Pool with a fixed capacity of `capacity` slots.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; the bootstrap thread needs a slot.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity >= 1, "a pool needs at least the bootstrap slot");
        ThreadPool {
            inner: Box::new(PoolInner::new(capacity)),
        }
    }

    /// Create a thread and return its identity.
    ///
    /// `attr` falls back to the defaults for any zero field. The very
    /// first call registers the caller as the bootstrap thread (state
    /// Running, immediate yield so scheduling begins); `func` and `arg`
    /// are stored but the bootstrap body is the caller itself. Later
    /// calls place the thread, Runnable, into the first empty slot.
    ///
    /// Fails with [`PoolError::CapacityExhausted`] when every slot is
    /// occupied; the registry is left untouched.
    pub fn create(
        &mut self,
        attr: Option<ThreadAttr>,
        func: ThreadFn,
        arg: usize,
    ) -> Result<ThreadId, PoolError> {
        self.inner.create(attr, func, arg)
    }

    /// Give up the cpu until the scheduler picks this thread again.
    ///
    /// Demotes the current thread to Runnable (unless it is a Zombie)
    /// and switches to the next candidate. Fails with
    /// [`PoolError::NoCurrentThread`] before the bootstrap create.
    pub fn yield_now(&mut self) -> Result<(), PoolError> {
        self.inner.yield_now()
    }

    /// Copy a thread's result into `status`.
    ///
    /// Copies `min(status.len(), size_of::<usize>())` bytes of the result
    /// slot. Does not wait for the thread to finish: the slot reads as
    /// zero until the thread's function has returned. Poll
    /// [`state`](ThreadPool::state) first for completion.
    pub fn join(&self, tid: ThreadId, status: Option<&mut [u8]>) -> Result<(), PoolError> {
        self.inner.join(tid, status)
    }

    /// Identity of the current thread, or `None` when no thread is
    /// current (before the bootstrap create).
    pub fn whoami(&self) -> Option<ThreadId> {
        self.inner.whoami()
    }

    /// Lifecycle state of the thread with identity `tid`.
    pub fn state(&self, tid: ThreadId) -> Result<ThreadState, PoolError> {
        self.inner.state(tid)
    }

    /// Reclaim a Zombie thread's slot and return its result.
    ///
    /// The identity becomes unknown afterwards and the slot is free for
    /// reuse. Fails with [`PoolError::NotFinished`] while the thread has
    /// not reached its terminal state.
    pub fn reap(&mut self, tid: ThreadId) -> Result<usize, PoolError> {
        self.inner.reap(tid)
    }

    /// True when the last scheduling attempt found nothing runnable.
    /// Cleared whenever a runnable thread is created.
    pub fn all_finished(&self) -> bool {
        self.inner.all_finished()
    }

    /// Number of registry slots.
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    /// Pool context in the form passed to thread functions.
    pub fn handle(&mut self) -> PoolHandle {
        PoolHandle {
            inner: &mut *self.inner,
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Pool context passed to every thread function.
///
/// A copyable view of the pool that owns the calling thread, created by
/// the runtime (or by [`ThreadPool::handle`]). Valid for as long as the
/// pool itself; it must not be stashed beyond the pool's lifetime.
#[derive(Debug, Clone, Copy)]
pub struct PoolHandle {
    inner: *mut PoolInner,
}

impl PoolHandle {
    /// Same as [`ThreadPool::create`].
    pub fn create(
        &self,
        attr: Option<ThreadAttr>,
        func: ThreadFn,
        arg: usize,
    ) -> Result<ThreadId, PoolError> {
        unsafe { (*self.inner).create(attr, func, arg) }
    }

    /// Same as [`ThreadPool::yield_now`].
    pub fn yield_now(&self) -> Result<(), PoolError> {
        unsafe { (*self.inner).yield_now() }
    }

    /// Same as [`ThreadPool::join`].
    pub fn join(&self, tid: ThreadId, status: Option<&mut [u8]>) -> Result<(), PoolError> {
        unsafe { (*self.inner).join(tid, status) }
    }

    /// Same as [`ThreadPool::whoami`].
    pub fn whoami(&self) -> Option<ThreadId> {
        unsafe { (*self.inner).whoami() }
    }

    /// Same as [`ThreadPool::state`].
    pub fn state(&self, tid: ThreadId) -> Result<ThreadState, PoolError> {
        unsafe { (*self.inner).state(tid) }
    }

    /// Same as [`ThreadPool::all_finished`].
    pub fn all_finished(&self) -> bool {
        unsafe { (*self.inner).all_finished() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_switch_restores_the_saved_state() {
        // Saving into and loading from the same record must come straight
        // back; this is the mechanism that establishes the bootstrap
        // thread's context.
        let mut ctx = Context::default();
        let ctx: *mut Context = &mut ctx;
        unsafe { context_switch(ctx, ctx) };
    }

    #[test]
    fn fresh_pool_has_no_current_thread() {
        let pool = ThreadPool::with_capacity(4);
        assert_eq!(pool.whoami(), None);
        assert_eq!(pool.capacity(), 4);
        assert!(!pool.all_finished());
    }

    #[test]
    #[should_panic(expected = "bootstrap slot")]
    fn zero_capacity_is_rejected() {
        let _ = ThreadPool::with_capacity(0);
    }
}
