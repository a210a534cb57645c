//! Stream throttling utilities

use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{Instant, Sleep, sleep_until};

/// Extension trait to add throttling to any Stream
pub trait ThrottleExt: Stream {
    /// Throttle the stream to emit at most once per interval
    ///
    /// Uses "latest-wins" semantics - if multiple items arrive
    /// during an interval, only the latest is emitted. The last item before
    /// the source ends is always emitted.
    fn throttle(self, duration: Duration) -> Throttle<Self, fn(&Self::Item) -> bool>
    where
        Self: Sized,
    {
        Throttle::new(self, duration, never::<Self::Item> as fn(&Self::Item) -> bool)
    }

    /// Like [`throttle`](ThrottleExt::throttle), but items matching
    /// `immediate` bypass the interval and are never coalesced away.
    fn throttle_with<F>(self, duration: Duration, immediate: F) -> Throttle<Self, F>
    where
        Self: Sized,
        F: FnMut(&Self::Item) -> bool,
    {
        Throttle::new(self, duration, immediate)
    }
}

impl<T: Stream> ThrottleExt for T {}

fn never<T>(_: &T) -> bool {
    false
}

pin_project! {
    /// A stream combinator that throttles emission rate
    pub struct Throttle<S: Stream, F> {
        #[pin]
        stream: S,
        delay: Pin<Box<Sleep>>,
        period: Duration,
        pending: Option<S::Item>,
        immediate: F,
        done: bool,
    }
}

impl<S: Stream, F> Throttle<S, F>
where
    F: FnMut(&S::Item) -> bool,
{
    /// Create a new throttled stream. The first item is emitted without delay.
    pub fn new(stream: S, period: Duration, immediate: F) -> Self {
        Self {
            stream,
            delay: Box::pin(sleep_until(Instant::now())),
            period,
            pending: None,
            immediate,
            done: false,
        }
    }
}

impl<S: Stream, F> Stream for Throttle<S, F>
where
    F: FnMut(&S::Item) -> bool,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        // Drain everything available, keeping only the latest
        while !*this.done {
            match this.stream.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    if (this.immediate)(&item) {
                        *this.pending = None;
                        this.delay.as_mut().reset(Instant::now() + *this.period);
                        return Poll::Ready(Some(item));
                    }
                    *this.pending = Some(item);
                }
                Poll::Ready(None) => *this.done = true,
                Poll::Pending => break,
            }
        }

        if *this.done {
            return Poll::Ready(this.pending.take());
        }

        if this.pending.is_some() && this.delay.as_mut().poll(cx).is_ready() {
            this.delay.as_mut().reset(Instant::now() + *this.period);
            return Poll::Ready(this.pending.take());
        }

        Poll::Pending
    }
}
