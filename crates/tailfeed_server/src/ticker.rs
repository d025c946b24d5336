//! Keepalive ticker.

use crate::sink::EventSink;
use std::time::Duration;
use tailfeed_protocol::WireEvent;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Emits `ticker` events on a fixed period, independent of log activity.
///
/// The first tick fires one full period after start and carries counter
/// 0. The ticker stops when its token is cancelled or the sink closes;
/// a closed sink also cancels the token so the rest of the session
/// notices the disconnect.
#[derive(Debug, Clone, Copy)]
pub struct KeepaliveTicker {
    period: Duration,
}

impl KeepaliveTicker {
    /// Creates a ticker with the given period.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Returns the tick period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the ticker task. Resolves to the number of ticks delivered.
    pub fn spawn(self, sink: EventSink, token: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(sink, token))
    }

    async fn run(self, sink: EventSink, token: CancellationToken) -> u64 {
        let mut interval = time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if sink.send(WireEvent::ticker(tick)).await.is_err() {
                        tracing::debug!(tick, "keepalive sink closed");
                        token.cancel();
                        break;
                    }
                    tick += 1;
                }
            }
        }
        tick
    }
}
