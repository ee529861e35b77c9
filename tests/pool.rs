//! End-to-end tests for the cooperative thread pool.
//!
//! Every test builds its own pool on its own OS thread, so the cases are
//! independent even though each pool serializes its threads internally.

use std::cell::RefCell;

use uthread::{PoolError, PoolHandle, ThreadAttr, ThreadPool, ThreadState};

/// Bootstrap body. Never invoked: the slot-0 thread is the test itself.
fn idle_main(_pool: PoolHandle, _arg: usize) -> usize {
    0
}

fn return_42(_pool: PoolHandle, _arg: usize) -> usize {
    42
}

fn double(_pool: PoolHandle, arg: usize) -> usize {
    arg * 2
}

fn wait_for_zombie(pool: &mut ThreadPool, tid: u8) {
    while pool.state(tid).unwrap() != ThreadState::Zombie {
        pool.yield_now().unwrap();
    }
}

#[test]
fn result_round_trips_through_join() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, return_42, 0).unwrap();
    wait_for_zombie(&mut pool, t1);

    let mut buf = [0u8; 4];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(u32::from_ne_bytes(buf), 42);
}

#[test]
fn argument_reaches_the_thread_function() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, double, 21).unwrap();
    wait_for_zombie(&mut pool, t1);

    let mut buf = [0u8; 8];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(usize::from_ne_bytes(buf), 42);
}

#[test]
fn idle_pool_reports_all_finished() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    // The bootstrap create's immediate yield already scanned the registry
    // and found nothing runnable.
    assert!(pool.all_finished());
    assert_eq!(pool.whoami(), Some(0));

    // An explicit yield takes the fallback path back to slot 0.
    pool.yield_now().unwrap();
    assert!(pool.all_finished());
    assert_eq!(pool.whoami(), Some(0));
    assert_eq!(pool.state(0).unwrap(), ThreadState::Running);

    // The handle form of the API sees the same pool.
    let handle = pool.handle();
    assert_eq!(handle.whoami(), Some(0));
    assert!(handle.all_finished());
}

fn yield_once_tagged(pool: PoolHandle, arg: usize) -> usize {
    let order = unsafe { &*(arg as *const RefCell<Vec<u8>>) };
    order.borrow_mut().push(b'a');
    pool.yield_now().unwrap();
    order.borrow_mut().push(b'A');
    0
}

fn tag_b(_pool: PoolHandle, arg: usize) -> usize {
    let order = unsafe { &*(arg as *const RefCell<Vec<u8>>) };
    order.borrow_mut().push(b'b');
    0
}

#[test]
fn yielding_thread_is_not_reselected_immediately() {
    let order = RefCell::new(Vec::new());
    let arg = &order as *const RefCell<Vec<u8>> as usize;

    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, yield_once_tagged, arg).unwrap();
    let t2 = pool.create(None, tag_b, arg).unwrap();

    // First yield runs T1 up to its yield; the scan then hands control to
    // the next runnable occupied slot (slot 0, this thread), not back to
    // T1.
    pool.yield_now().unwrap();
    order.borrow_mut().push(b'M');

    wait_for_zombie(&mut pool, t1);
    wait_for_zombie(&mut pool, t2);
    assert_eq!(order.borrow().as_slice(), b"aMAb");
}

#[test]
fn join_unknown_identity_leaves_buffer_untouched() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();

    let mut buf = [0xAAu8; 8];
    assert_eq!(pool.join(99, Some(&mut buf)), Err(PoolError::NotFound(99)));
    assert_eq!(buf, [0xAAu8; 8]);
}

#[test]
fn capacity_exhaustion_is_reported_and_harmless() {
    let mut pool = ThreadPool::with_capacity(3);
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, return_42, 0).unwrap();
    let t2 = pool.create(None, return_42, 0).unwrap();

    assert_eq!(
        pool.create(None, return_42, 0),
        Err(PoolError::CapacityExhausted)
    );
    // Registry unchanged: the existing threads still stand, and the
    // failed create consumed no identity.
    assert_eq!(pool.state(t1).unwrap(), ThreadState::Runnable);
    assert_eq!(pool.state(t2).unwrap(), ThreadState::Runnable);

    while !pool.all_finished() {
        pool.yield_now().unwrap();
    }
    // Zombies still occupy their slots until reaped.
    assert_eq!(
        pool.create(None, return_42, 0),
        Err(PoolError::CapacityExhausted)
    );
    pool.reap(t1).unwrap();
    let t3 = pool.create(None, return_42, 0).unwrap();
    assert_eq!(t3, 3);
}

#[test]
fn identities_are_unique_and_monotonic() {
    let mut pool = ThreadPool::new();
    let t0 = pool.create(None, idle_main, 0).unwrap();
    let a = pool.create(None, return_42, 0).unwrap();
    let b = pool.create(None, return_42, 0).unwrap();
    assert_eq!((t0, a, b), (0, 1, 2));

    while !pool.all_finished() {
        pool.yield_now().unwrap();
    }
    pool.reap(a).unwrap();
    // Reusing slot 1 does not reuse the identity.
    let c = pool.create(None, return_42, 0).unwrap();
    assert_eq!(c, 3);
}

fn observe_states(pool: PoolHandle, _arg: usize) -> usize {
    let me = pool.whoami().unwrap();
    assert_eq!(pool.state(me).unwrap(), ThreadState::Running);
    assert_eq!(pool.state(0).unwrap(), ThreadState::Runnable);
    me as usize
}

#[test]
fn exactly_one_thread_runs_at_a_time() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    assert_eq!(pool.state(0).unwrap(), ThreadState::Running);

    let t1 = pool.create(None, observe_states, 0).unwrap();
    assert_eq!(pool.state(0).unwrap(), ThreadState::Running);
    assert_eq!(pool.state(t1).unwrap(), ThreadState::Runnable);

    wait_for_zombie(&mut pool, t1);
    assert_eq!(pool.state(0).unwrap(), ThreadState::Running);

    let mut buf = [0u8; 1];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(buf[0], t1);
}

#[test]
fn zombie_state_and_result_are_final() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, return_42, 0).unwrap();
    wait_for_zombie(&mut pool, t1);

    for _ in 0..3 {
        pool.yield_now().unwrap();
        assert_eq!(pool.state(t1).unwrap(), ThreadState::Zombie);
        let mut buf = [0u8; 8];
        pool.join(t1, Some(&mut buf)).unwrap();
        assert_eq!(usize::from_ne_bytes(buf), 42);
    }
}

#[test]
fn reap_frees_the_slot_and_returns_the_result() {
    let mut pool = ThreadPool::with_capacity(2);
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, return_42, 0).unwrap();

    assert_eq!(pool.reap(t1), Err(PoolError::NotFinished(t1)));
    wait_for_zombie(&mut pool, t1);

    assert_eq!(pool.reap(t1), Ok(42));
    assert_eq!(pool.join(t1, None), Err(PoolError::NotFound(t1)));
    assert_eq!(pool.reap(t1), Err(PoolError::NotFound(t1)));

    // The slot is free again.
    pool.create(None, return_42, 0).unwrap();
}

fn spawn_child(pool: PoolHandle, _arg: usize) -> usize {
    let child = pool.create(None, return_42, 0).unwrap();
    child as usize
}

#[test]
fn threads_can_spawn_through_the_handle() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let t1 = pool.create(None, spawn_child, 0).unwrap();

    while !pool.all_finished() {
        pool.yield_now().unwrap();
    }

    let mut buf = [0u8; 1];
    pool.join(t1, Some(&mut buf)).unwrap();
    let child = buf[0];
    assert_eq!(pool.state(child).unwrap(), ThreadState::Zombie);

    let mut rbuf = [0u8; 4];
    pool.join(child, Some(&mut rbuf)).unwrap();
    assert_eq!(u32::from_ne_bytes(rbuf), 42);
}

fn stack_hog(pool: PoolHandle, _arg: usize) -> usize {
    let mut big = [0u8; 32 * 1024];
    big[0] = 1;
    big[big.len() - 1] = 2;
    pool.yield_now().unwrap();
    (big[0] + big[big.len() - 1]) as usize
}

#[test]
fn custom_stack_size_is_honored() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    let attr = ThreadAttr {
        stacksize: 256 * 1024,
        res_size: 8,
    };
    let t1 = pool.create(Some(attr), stack_hog, 0).unwrap();
    wait_for_zombie(&mut pool, t1);

    let mut buf = [0u8; 1];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(buf[0], 3);
}

#[test]
fn tiny_stack_request_is_rounded_up_and_runs() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();

    // A 16-byte stack cannot even hold the initial frame; the pool must
    // provision at least MIN_STACK_SIZE instead of writing outside the
    // allocation.
    let attr = ThreadAttr {
        stacksize: 16,
        res_size: 0,
    };
    let t1 = pool.create(Some(attr), return_42, 0).unwrap();
    wait_for_zombie(&mut pool, t1);

    let mut buf = [0u8; 4];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(u32::from_ne_bytes(buf), 42);
    assert_eq!(pool.reap(t1), Ok(42));
}

#[test]
fn yield_without_bootstrap_fails() {
    let mut pool = ThreadPool::new();
    assert_eq!(pool.yield_now(), Err(PoolError::NoCurrentThread));
    assert_eq!(pool.whoami(), None);
}

fn whoami_through_handle(pool: PoolHandle, _arg: usize) -> usize {
    pool.whoami().unwrap() as usize
}

#[test]
fn whoami_identifies_the_running_thread() {
    let mut pool = ThreadPool::new();
    pool.create(None, idle_main, 0).unwrap();
    assert_eq!(pool.whoami(), Some(0));

    let t1 = pool.create(None, whoami_through_handle, 0).unwrap();
    let t2 = pool.create(None, whoami_through_handle, 0).unwrap();
    wait_for_zombie(&mut pool, t1);
    wait_for_zombie(&mut pool, t2);

    let mut buf = [0u8; 1];
    pool.join(t1, Some(&mut buf)).unwrap();
    assert_eq!(buf[0], t1);
    pool.join(t2, Some(&mut buf)).unwrap();
    assert_eq!(buf[0], t2);
}
