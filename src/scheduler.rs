use crate::prelude::*;

use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

/// One-shot timers the bridge can ask for. At most one of each kind is pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    DiscoveryRetry,
    RequestAll,
}

/// `Fired` carries the generation handed out by `schedule`, so a fire from a replaced
/// timer can be told apart from the current one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelData {
    Fired(Timer, u64),
    Shutdown,
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    channels: Channels,
    generation: u64,
    pending: HashMap<Timer, Pending>,
}

impl Scheduler {
    pub fn new(channels: Channels) -> Self {
        Self {
            channels,
            generation: 0,
            pending: HashMap::new(),
        }
    }

    /// Fires `timer` after `delay`, replacing any pending timer of the same kind.
    pub fn schedule(&mut self, timer: Timer, delay: Duration) {
        let sender = self.channels.timers.clone();
        self.generation += 1;
        let generation = self.generation;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(ChannelData::Fired(timer, generation)).is_err() {
                warn!("timer {:?} fired with nobody listening", timer);
            }
        });

        if let Some(previous) = self.pending.insert(timer, Pending { generation, handle }) {
            previous.handle.abort();
        }
        debug!("scheduled {:?} #{} in {:?}", timer, generation, delay);
    }

    /// Accounts for a fire event. Returns false for a timer that was replaced or cancelled
    /// after it fired; the pending replacement is kept.
    pub fn fired(&mut self, timer: Timer, generation: u64) -> bool {
        match self.pending.get(&timer) {
            Some(pending) if pending.generation == generation => {
                self.pending.remove(&timer);
                true
            }
            _ => {
                debug!("ignoring stale {:?} #{}", timer, generation);
                false
            }
        }
    }

    pub fn is_pending(&self, timer: Timer) -> bool {
        self.pending
            .get(&timer)
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn cancel_all(&mut self) {
        for (timer, pending) in self.pending.drain() {
            debug!("cancelling {:?}", timer);
            pending.handle.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_pending_timer() {
        let channels = Channels::new();
        let mut receiver = channels.timers.subscribe();
        let mut scheduler = Scheduler::new(channels);

        scheduler.schedule(Timer::DiscoveryRetry, Duration::from_secs(10));
        scheduler.schedule(Timer::DiscoveryRetry, Duration::from_secs(20));

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(receiver.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(
            receiver.recv().await.unwrap(),
            ChannelData::Fired(Timer::DiscoveryRetry, 2)
        );
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn queued_fire_does_not_forget_replacement() {
        let channels = Channels::new();
        let mut receiver = channels.timers.subscribe();
        let mut scheduler = Scheduler::new(channels);

        scheduler.schedule(Timer::RequestAll, Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        // the first fire is still queued when the timer is rescheduled
        scheduler.schedule(Timer::RequestAll, Duration::from_secs(60));
        let ChannelData::Fired(timer, generation) = receiver.recv().await.unwrap() else {
            panic!("expected a fire event");
        };
        assert!(!scheduler.fired(timer, generation));
        assert!(scheduler.is_pending(Timer::RequestAll));

        scheduler.cancel_all();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(receiver.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_stops_everything() {
        let channels = Channels::new();
        let mut receiver = channels.timers.subscribe();
        let mut scheduler = Scheduler::new(channels);

        scheduler.schedule(Timer::DiscoveryRetry, Duration::from_secs(10));
        scheduler.schedule(Timer::RequestAll, Duration::from_secs(10));
        scheduler.cancel_all();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(receiver.try_recv().is_err());
        assert!(!scheduler.is_pending(Timer::RequestAll));
    }
}
