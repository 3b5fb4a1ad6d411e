//! Local task spawning and deferred callbacks.
//!
//! The controller runs on a single thread: the browser event loop, or a tokio
//! `LocalSet` natively. Neither executor requires `Send`.

use futures_util::future::{abortable, AbortHandle};
use std::future::Future;
use std::time::Duration;

pub trait Runtime: Clone + 'static {
    type Sleep: Future<Output = ()> + 'static;

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static;

    fn sleep(&self, duration: Duration) -> Self::Sleep;
}

/// A scheduled callback. Dropping the handle does not cancel it.
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Prevents the callback from running if it has not run yet.
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// Runs `callback` once after `delay`.
pub fn schedule<R, F>(runtime: &R, delay: Duration, callback: F) -> TimerHandle
where
    R: Runtime,
    F: FnOnce() + 'static,
{
    let sleep = runtime.sleep(delay);
    let (task, abort) = abortable(async move {
        sleep.await;
        callback();
    });
    runtime.spawn(async move {
        let _ = task.await;
    });
    TimerHandle { abort }
}

/// Spawns onto the current tokio `LocalSet`. Panics when used outside one.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRuntime;

#[cfg(not(target_arch = "wasm32"))]
impl Runtime for TokioRuntime {
    type Sleep = tokio::time::Sleep;

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> tokio::time::Sleep {
        tokio::time::sleep(duration)
    }
}

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserRuntime;

#[cfg(target_arch = "wasm32")]
impl Runtime for BrowserRuntime {
    type Sleep = gloo_timers::future::TimeoutFuture;

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> gloo_timers::future::TimeoutFuture {
        gloo_timers::future::sleep(duration)
    }
}
