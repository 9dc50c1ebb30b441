//! Periodic refresh driver.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Runs a refresh on a cadence and hands results to its owner.
///
/// The timer belongs to the owner: stopping or dropping the poller cancels the
/// task, so nothing is delivered after the owning surface is gone.
pub struct Poller<T> {
  rx: mpsc::UnboundedReceiver<T>,
  handle: JoinHandle<()>,
}

impl<T: Send + 'static> Poller<T> {
  /// Start polling. The first tick fires immediately, each later one
  /// `period` after the previous refresh completed.
  pub fn spawn<F, Fut>(period: Duration, mut tick: F) -> Self
  where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
      loop {
        let value = tick().await;
        if tx.send(value).is_err() {
          break;
        }
        // Counted from completion: the refresh just restarted the TTL and
        // throttle windows
        tokio::time::sleep(period).await;
      }
    });

    Self { rx, handle }
  }

  /// Receive the next refresh result
  pub async fn next(&mut self) -> Option<T> {
    self.rx.recv().await
  }

  /// Cancel the timer.
  pub fn stop(&mut self) {
    self.handle.abort();
    self.rx.close();
  }
}

impl<T> Drop for Poller<T> {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn counting_poller(period: Duration) -> (Poller<usize>, Arc<AtomicUsize>) {
    let ticks = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ticks);
    let poller = Poller::spawn(period, move || {
      let counter = Arc::clone(&counter);
      async move { counter.fetch_add(1, Ordering::SeqCst) + 1 }
    });
    (poller, ticks)
  }

  #[tokio::test(start_paused = true)]
  async fn test_ticks_arrive_in_order() {
    let (mut poller, _) = counting_poller(Duration::from_secs(60));
    assert_eq!(poller.next().await, Some(1));
    assert_eq!(poller.next().await, Some(2));
    assert_eq!(poller.next().await, Some(3));
  }

  #[tokio::test(start_paused = true)]
  async fn test_period_counts_from_completion() {
    let started = tokio::time::Instant::now();
    let mut poller = Poller::spawn(Duration::from_secs(60), move || async move {
      tokio::time::sleep(Duration::from_secs(5)).await;
      started.elapsed()
    });

    assert_eq!(poller.next().await, Some(Duration::from_secs(5)));
    assert_eq!(poller.next().await, Some(Duration::from_secs(70)));
    assert_eq!(poller.next().await, Some(Duration::from_secs(135)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_stop_cancels_timer() {
    let (mut poller, ticks) = counting_poller(Duration::from_secs(60));
    poller.next().await;
    poller.next().await;

    poller.stop();
    tokio::task::yield_now().await;
    let seen = ticks.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
  }

  #[tokio::test(start_paused = true)]
  async fn test_drop_cancels_timer() {
    let (mut poller, ticks) = counting_poller(Duration::from_secs(60));
    poller.next().await;
    drop(poller);
    tokio::task::yield_now().await;
    let seen = ticks.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), seen);
  }
}
