//! Post-flush scheduler - Deferred callback queue for settled-tree work.
//!
//! Reactive effects run synchronously when a dependency changes, which means
//! observers can fire while the tree for the current pass is only partially
//! updated. Work that must see the fully-settled tree (template ref
//! assignment and clearing in particular) is queued here and drained once
//! per logical update cycle via [`flush_post_cbs`].
//!
//! Ordering guarantees:
//! - Lower priority numbers run earlier.
//! - Jobs with equal priority run in submission order.
//! - Jobs queued while a flush is running are drained in the same flush.

use std::cell::RefCell;

/// A deferred job.
struct PostFlushJob {
    priority: i32,
    seq: u64,
    run: Box<dyn FnOnce()>,
}

thread_local! {
    /// Pending jobs, unsorted until flush.
    static QUEUE: RefCell<Vec<PostFlushJob>> = const { RefCell::new(Vec::new()) };

    /// Monotonic submission counter for stable ordering within a priority.
    static SEQ: RefCell<u64> = const { RefCell::new(0) };
}

/// Queue a job to run on the next post-render flush.
///
/// Lower `priority` runs earlier. Equal priorities preserve submission order.
pub fn queue_post_flush_cb(job: impl FnOnce() + 'static, priority: i32) {
    let seq = SEQ.with(|seq| {
        let mut seq = seq.borrow_mut();
        let current = *seq;
        *seq += 1;
        current
    });
    QUEUE.with(|queue| {
        queue.borrow_mut().push(PostFlushJob {
            priority,
            seq,
            run: Box::new(job),
        });
    });
}

/// Drain the post-flush queue.
///
/// Called once per logical update cycle by the host. Jobs queued by running
/// jobs are picked up before the flush returns.
pub fn flush_post_cbs() {
    loop {
        let mut jobs = QUEUE.with(|queue| queue.borrow_mut().split_off(0));
        if jobs.is_empty() {
            break;
        }
        jobs.sort_by_key(|job| (job.priority, job.seq));
        for job in jobs {
            (job.run)();
        }
    }
}

/// Number of jobs currently pending (before any flush).
pub fn pending_post_cbs() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Reset scheduler state (for testing).
pub fn reset_scheduler() {
    QUEUE.with(|queue| queue.borrow_mut().clear());
    SEQ.with(|seq| *seq.borrow_mut() = 0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_priority_ordering() {
        reset_scheduler();

        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        queue_post_flush_cb(move || o.borrow_mut().push("default"), 0);
        let o = order.clone();
        queue_post_flush_cb(move || o.borrow_mut().push("early"), -1);

        flush_post_cbs();

        assert_eq!(
            *order.borrow(),
            vec!["early", "default"],
            "lower priority number should run first"
        );
    }

    #[test]
    fn test_stable_order_within_priority() {
        reset_scheduler();

        let order: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        for i in 0..5 {
            let o = order.clone();
            queue_post_flush_cb(move || o.borrow_mut().push(i), 0);
        }

        flush_post_cbs();

        assert_eq!(
            *order.borrow(),
            vec![0, 1, 2, 3, 4],
            "equal priorities should run in submission order"
        );
    }

    #[test]
    fn test_jobs_queued_during_flush_run_in_same_flush() {
        reset_scheduler();

        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let o = order.clone();
        queue_post_flush_cb(
            move || {
                o.borrow_mut().push("outer");
                let o2 = o.clone();
                queue_post_flush_cb(move || o2.borrow_mut().push("inner"), 0);
            },
            0,
        );

        flush_post_cbs();

        assert_eq!(*order.borrow(), vec!["outer", "inner"]);
        assert_eq!(pending_post_cbs(), 0, "flush should leave the queue empty");
    }

    #[test]
    fn test_reset_clears_pending() {
        reset_scheduler();

        queue_post_flush_cb(|| panic!("should never run"), 0);
        assert_eq!(pending_post_cbs(), 1);

        reset_scheduler();
        assert_eq!(pending_post_cbs(), 0);
        flush_post_cbs();
    }
}
