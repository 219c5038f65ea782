//! A randomized multi-peer merge fuzzer.
//!
//! Each peer appends runs under its own agent id (so public identities stay
//! globally unique), then random pairs of peers sync both ways. After every
//! sync the pair must agree on public heads and known changes, and every
//! structural invariant must still hold.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::prelude::*;

use crate::CausalGraph;

fn choose_2<'a, T>(arr: &'a mut [T], rng: &mut SmallRng) -> (&'a mut T, &'a mut T) {
    loop {
        let a_idx = rng.gen_range(0..arr.len());
        let b_idx = rng.gen_range(0..arr.len());

        if a_idx != b_idx {
            let (a_idx, b_idx) = if a_idx < b_idx { (a_idx, b_idx) } else { (b_idx, a_idx) };
            let (start, end) = arr.split_at_mut(b_idx);
            return (&mut start[a_idx], &mut end[0]);
        }
    }
}

fn fuzz_cg(seed: u64, verbose: bool) {
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut cgs = [CausalGraph::new(), CausalGraph::new(), CausalGraph::new()];
    let agents = ["a", "b", "c"];

    for i in 0..50 {
        if verbose {
            println!("\n\ni {}", i);
        }

        // Generate some operations.
        for _ in 0..3 {
            let idx = rng.gen_range(0..cgs.len());
            let cg = &mut cgs[idx];

            let agent = cg.get_or_create_agent_id(agents[idx]);
            let num = rng.gen_range(1..4);
            cg.assign_local_op(agent, num);
        }

        // And sync 2 random peers.
        let (a, b) = choose_2(&mut cgs, &mut rng);
        a.merge_graph(b).unwrap();
        b.merge_graph(a).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.summarize(), b.summarize());
        a.dbg_check(true);
        b.dbg_check(true);
    }

    for cg in &cgs {
        cg.dbg_check(true);
    }
}

#[test]
fn fuzz_cg_once() {
    fuzz_cg(123, true);
}

#[test]
fn fuzz_cg_seeds() {
    for seed in 0..30 {
        fuzz_cg(seed, false);
    }
}

/// Prints its seed when dropped during a panic, so crashes are reproducible.
struct Seed(u64);

impl Drop for Seed {
    fn drop(&mut self) {
        if std::thread::panicking() {
            eprintln!("*** CRASHED ON SEED {} ***", self.0);
            drop(std::io::stderr().flush());
        }
    }
}

#[test]
#[ignore]
fn fuzz_cg_forever() {
    let num_threads: usize = std::thread::available_parallelism().unwrap().into();
    let is_error = Arc::new(AtomicBool::new(false));
    let mut threads = vec![];

    for t in 0..num_threads {
        let is_error = is_error.clone();
        let is_error2 = is_error.clone();
        threads.push(std::thread::spawn(move || {
            let orig_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                is_error2.store(true, Ordering::Relaxed);
                orig_hook(info);
            }));

            let chunk_size = u64::MAX / (num_threads as u64);
            let seed_start = chunk_size * t as u64;
            for seed_n in seed_start.. {
                if seed_n % 1000 == 0 {
                    println!("iteration {}", seed_n);
                }
                let seed = Seed(seed_n);
                fuzz_cg(seed.0, false);
                if is_error.load(Ordering::Relaxed) {
                    break;
                }
            }
        }));
    }

    for t in threads {
        t.join().unwrap();
    }
}
