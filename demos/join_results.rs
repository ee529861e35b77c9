//! Spawn a batch of workers, wait for them, and collect their results.

use uthread::{PoolHandle, ThreadPool, ThreadState};

fn square(pool: PoolHandle, arg: usize) -> usize {
    // Give everyone else a turn before finishing.
    pool.yield_now().unwrap();
    arg * arg
}

fn main() {
    let mut pool = ThreadPool::new();
    pool.create(None, |_, _| 0, 0).unwrap();

    let tids: Vec<_> = (1..=5)
        .map(|n| pool.create(None, square, n).unwrap())
        .collect();

    for &tid in &tids {
        while pool.state(tid).unwrap() != ThreadState::Zombie {
            pool.yield_now().unwrap();
        }
        let mut buf = [0u8; 8];
        pool.join(tid, Some(&mut buf)).unwrap();
        println!("thread {tid} returned {}", usize::from_ne_bytes(buf));
    }

    // Reclaim the slots once the results are consumed.
    for &tid in &tids {
        pool.reap(tid).unwrap();
    }
    println!("reaped {} threads", tids.len());
}
