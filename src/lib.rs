//! Cooperative, non-preemptive user-level threads.
//!
//! A fixed-capacity pool of threads shares one OS thread and hands the
//! cpu around voluntarily at explicit yield points; there is no
//! preemption, no priorities, and no cross-core parallelism. The
//! interesting machinery is the context switch: each thread's
//! callee-saved register state lives in a [`Context`] record, and
//! [`context_switch`] moves the single flow of control between records
//! without kernel involvement.
//!
//! The first [`ThreadPool::create`] call registers the caller itself as
//! the slot-0 bootstrap thread. Further creates set up fresh stacks that
//! enter a start-up wrapper on their first switch; the wrapper runs the
//! thread's function, records its result for [`ThreadPool::join`], and
//! yields one last time. A thread that never yields starves all others —
//! that is the contract, not a bug.
//!
//! # Example
//!
//! ```no_run
//! use uthread::{PoolHandle, ThreadPool};
//!
//! fn worker(pool: PoolHandle, arg: usize) -> usize {
//!     println!("worker got {arg}");
//!     pool.yield_now().unwrap();
//!     arg * 2
//! }
//!
//! let mut pool = ThreadPool::new();
//! pool.create(None, |_, _| 0, 0).unwrap();
//! let tid = pool.create(None, worker, 21).unwrap();
//! while !pool.all_finished() {
//!     pool.yield_now().unwrap();
//! }
//! let mut buf = [0u8; 8];
//! pool.join(tid, Some(&mut buf)).unwrap();
//! assert_eq!(usize::from_ne_bytes(buf), 42);
//! ```

mod arch;
mod error;
mod pool;
mod tcb;

pub use arch::{Context, context_switch};
pub use error::PoolError;
pub use pool::{MAX_THREADS, PoolHandle, ThreadFn, ThreadPool};
pub use tcb::{MIN_STACK_SIZE, STACK_SIZE, ThreadAttr, ThreadId, ThreadState};
