//! Cooperative time slicing.
//!
//! Long computations implement [`Resumable`]: an explicit state machine whose
//! [`step`](Resumable::step) performs exactly one outer-loop iteration (one
//! triangle, one edge, one mesh pair). A [`TimeSlicer`] runs steps until its
//! [`TimeBudget`] is spent and then hands control back. Suspension happens
//! only between steps, so every snapshot handed to a progress callback is
//! consistent.
//!
//! Three ways to drive a computation:
//!
//! - [`run_to_completion`] blocks until done.
//! - [`TimeSlicer::run_with_progress`] blocks, reporting progress after every
//!   slice.
//! - [`Drive`] is a [`Future`] that runs one slice per poll and checks a
//!   [`CancelToken`] before each resume.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

/// Largest progress value reported before completion.
const MAX_PARTIAL_PROGRESS: f64 = 0.999;

/// Result of one [`Resumable::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// More work remains.
    Continue,
    /// The computation is finished; [`Resumable::finish`] may be called.
    Done,
}

/// A computation that can be advanced one iteration at a time.
pub trait Resumable {
    /// Final result.
    type Output;
    /// Live partial result handed to progress callbacks.
    type Snapshot: ?Sized;

    /// Perform one outer-loop iteration.
    fn step(&mut self) -> Step;

    /// Fraction complete in `[0, 1]`.
    fn progress(&self) -> f64;

    /// Consistent view of the partial result.
    fn snapshot(&self) -> &Self::Snapshot;

    /// Consume the computation into its output.
    fn finish(self) -> Self::Output;
}

/// Wall-clock budget for one resume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeBudget {
    /// Run until done.
    Unbounded,
    /// Yield once this many milliseconds have elapsed.
    Millis(f64),
}

impl TimeBudget {
    fn is_spent(self, elapsed: Duration) -> bool {
        match self {
            TimeBudget::Unbounded => false,
            TimeBudget::Millis(ms) => elapsed.as_secs_f64() * 1000.0 >= ms,
        }
    }
}

/// Outcome of [`TimeSlicer::resume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    /// The budget ran out; call `resume` again.
    Yielded,
    /// The computation is finished.
    Complete,
}

/// Runs a [`Resumable`] in budgeted slices.
pub struct TimeSlicer<R> {
    task: R,
    budget: TimeBudget,
    complete: bool,
    progress: f64,
}

impl<R: Resumable> TimeSlicer<R> {
    /// Wrap a computation.
    pub fn new(task: R, budget: TimeBudget) -> Self {
        Self {
            task,
            budget,
            complete: false,
            progress: 0.0,
        }
    }

    /// Run steps until the budget is spent or the computation finishes.
    ///
    /// At least one step runs per call, so a zero budget still makes progress.
    pub fn resume(&mut self) -> SliceStatus {
        if self.complete {
            return SliceStatus::Complete;
        }
        let start = Instant::now();
        loop {
            if self.task.step() == Step::Done {
                self.complete = true;
                self.progress = 1.0;
                return SliceStatus::Complete;
            }
            if self.budget.is_spent(start.elapsed()) {
                let current = self.task.progress().clamp(0.0, MAX_PARTIAL_PROGRESS);
                self.progress = self.progress.max(current);
                return SliceStatus::Yielded;
            }
        }
    }

    /// True once the computation has finished.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Non-decreasing progress; `1.0` only once complete.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &R::Snapshot {
        self.task.snapshot()
    }

    /// Run the remaining steps and return the output.
    pub fn into_output(mut self) -> R::Output {
        while !self.complete {
            self.budget = TimeBudget::Unbounded;
            self.resume();
        }
        self.task.finish()
    }

    /// Run to completion, calling `on_progress` after every slice.
    ///
    /// The callback sees strictly partial values (below 1) after each yield
    /// and exactly one `1.0` at completion.
    pub fn run_with_progress<F>(mut self, mut on_progress: F) -> R::Output
    where
        F: FnMut(f64, &R::Snapshot),
    {
        while self.resume() == SliceStatus::Yielded {
            on_progress(self.progress, self.task.snapshot());
        }
        on_progress(1.0, self.task.snapshot());
        self.task.finish()
    }
}

/// Run a computation to completion without yielding.
pub fn run_to_completion<R: Resumable>(task: R) -> R::Output {
    TimeSlicer::new(task, TimeBudget::Unbounded).into_output()
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How an asynchronous run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion<T> {
    /// The computation finished.
    Finished(T),
    /// Cancellation was observed before a resume.
    Aborted,
}

impl<T> Completion<T> {
    /// The output, if finished.
    pub fn finished(self) -> Option<T> {
        match self {
            Completion::Finished(value) => Some(value),
            Completion::Aborted => None,
        }
    }

    /// True if the run was cancelled.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Completion::Aborted)
    }
}

/// Future that drives a [`Resumable`] one time slice per poll.
///
/// After each partial slice it reports progress and wakes itself, so an
/// executor interleaves it with other work. Cancellation is checked before
/// every resume; once observed, the future resolves to
/// [`Completion::Aborted`] without running further steps or calling the
/// progress callback.
///
/// # Panics
///
/// Like any other future, a `Drive` must not be polled again once it has
/// returned [`Poll::Ready`]; doing so panics.
pub struct Drive<R, F> {
    slicer: Option<TimeSlicer<R>>,
    cancel: CancelToken,
    on_progress: F,
}

/// Create a [`Drive`] future.
pub fn drive<R, F>(task: R, budget: TimeBudget, cancel: CancelToken, on_progress: F) -> Drive<R, F>
where
    R: Resumable,
    F: FnMut(f64, &R::Snapshot),
{
    Drive {
        slicer: Some(TimeSlicer::new(task, budget)),
        cancel,
        on_progress,
    }
}

impl<R, F> Future for Drive<R, F>
where
    R: Resumable + Unpin,
    F: FnMut(f64, &R::Snapshot) + Unpin,
{
    type Output = Completion<R::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(mut slicer) = this.slicer.take() else {
            panic!("`Drive` polled after completion");
        };
        if this.cancel.is_cancelled() {
            return Poll::Ready(Completion::Aborted);
        }

        match slicer.resume() {
            SliceStatus::Yielded => {
                (this.on_progress)(slicer.progress(), slicer.snapshot());
                this.slicer = Some(slicer);
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            SliceStatus::Complete => {
                (this.on_progress)(1.0, slicer.snapshot());
                Poll::Ready(Completion::Finished(slicer.into_output()))
            }
        }
    }
}
