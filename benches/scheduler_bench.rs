//! Overhead of the cooperative time-slice yield discipline itself, isolated
//! from operator work, at varying yield frequencies (§4.6, §5).

use std::cell::RefCell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use zero_ivm::error::EngineError;
use zero_ivm::scheduler::{run_with_yields, Clock};

/// A clock driven by a shared counter the step closure advances, avoiding an
/// overlapping-borrow between the closure and the `&mut dyn Clock` argument.
struct SharedClock {
    now: Rc<RefCell<u64>>,
}

impl Clock for SharedClock {
    fn now_ms(&self) -> u64 {
        *self.now.borrow()
    }

    fn should_yield(&mut self, _elapsed_ms: u64) -> Result<bool, EngineError> {
        Ok(false)
    }
}

fn bench_run_with_yields(c: &mut Criterion) {
    let mut group = c.benchmark_group("run_with_yields");
    for (n, threshold_ms) in [(1_000usize, 250u64), (1_000, 25), (10_000, 250)] {
        let label = format!("{n}items_{threshold_ms}ms_threshold");
        group.bench_with_input(BenchmarkId::from_parameter(label), &(n, threshold_ms), |b, &(n, threshold_ms)| {
            b.iter(|| {
                let now = Rc::new(RefCell::new(0u64));
                let mut clock = SharedClock { now: now.clone() };
                let items: Vec<u64> = (0..n as u64).collect();
                let yields = run_with_yields(items, threshold_ms, &mut clock, 10, |_item| {
                    *now.borrow_mut() += 10;
                    Ok(())
                })
                .unwrap();
                black_box(yields);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_run_with_yields);
criterion_main!(benches);
