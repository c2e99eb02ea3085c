use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Execution Unit Identity
// ============================================================================
//
// Ownership checks compare execution units, not OS threads: pooled
// schedulers reuse threads across actors, so a thread id outlives the unit
// that created a handle.
//
// Each actor loop enters a fresh unit for its whole run and restores the
// previous one on exit. Code running outside any actor loop (the caller of
// `run`, plain threads) gets one unit per thread, assigned on first use.
//
// ============================================================================

static NEXT_UNIT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Unit currently executing on this thread
    static CURRENT_UNIT: Cell<Option<UnitId>> = const { Cell::new(None) };
}

/// Identity of one execution unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct UnitId(u64);

impl UnitId {
    fn fresh() -> Self {
        UnitId(NEXT_UNIT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Unit executing on the calling thread
pub(crate) fn current() -> UnitId {
    CURRENT_UNIT.with(|slot| match slot.get() {
        Some(unit) => unit,
        None => {
            let unit = UnitId::fresh();
            slot.set(Some(unit));
            unit
        }
    })
}

/// Marks the calling thread as running a new unit until dropped
pub(crate) struct UnitGuard {
    previous: Option<UnitId>,
}

pub(crate) fn enter() -> UnitGuard {
    let previous = CURRENT_UNIT.with(|slot| slot.replace(Some(UnitId::fresh())));
    UnitGuard { previous }
}

impl Drop for UnitGuard {
    fn drop(&mut self) {
        CURRENT_UNIT.with(|slot| slot.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_is_stable_on_one_thread() {
        assert_eq!(current(), current());
    }

    #[test]
    fn test_threads_get_distinct_units() {
        let here = current();
        let there = std::thread::spawn(current).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_enter_scopes_a_fresh_unit() {
        let outer = current();
        let first = {
            let _unit = enter();
            current()
        };
        let second = {
            let _unit = enter();
            current()
        };

        assert_ne!(first, outer);
        assert_ne!(second, outer);
        assert_ne!(first, second);
        assert_eq!(current(), outer);
    }
}
