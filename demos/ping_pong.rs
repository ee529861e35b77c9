//! Two threads handing the cpu back and forth.

use uthread::{PoolHandle, ThreadPool};

fn ping(pool: PoolHandle, rounds: usize) -> usize {
    for i in 0..rounds {
        println!("ping {i}");
        pool.yield_now().unwrap();
    }
    rounds
}

fn pong(pool: PoolHandle, rounds: usize) -> usize {
    for i in 0..rounds {
        println!("pong {i}");
        pool.yield_now().unwrap();
    }
    rounds
}

fn main() {
    let mut pool = ThreadPool::new();
    pool.create(None, |_, _| 0, 0).unwrap();
    pool.create(None, ping, 3).unwrap();
    pool.create(None, pong, 3).unwrap();

    while !pool.all_finished() {
        pool.yield_now().unwrap();
    }
    println!("all threads finished");
}
