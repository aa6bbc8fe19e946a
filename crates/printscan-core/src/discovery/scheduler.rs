//! Periodic discovery rounds over every local interface.
//!
//! The scheduler owns the repeating timer and the channel set. Channels are built
//! lazily on the first round after start. A stop or a failed channel clears them,
//! so interface changes only take effect when the set is rebuilt.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::net::{BindStrategy, BroadcastChannel, ChannelSet, InboundDatagram, InterfaceSource};
use crate::protocol::{parse_advertisement, DeviceAdvertisement};
use crate::registry::{DeviceRegistry, RegistryBridge};

/// Outcome of one discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundReport {
    /// Channels open during the round
    pub channels: usize,
    /// Probes that left successfully
    pub probes_sent: usize,
}

#[derive(Default)]
struct SchedulerState {
    timer: Option<JoinHandle<()>>,
    channels: ChannelSet,
    receivers: Vec<JoinHandle<()>>,
}

impl SchedulerState {
    fn teardown(&mut self) {
        self.channels.abort_all();
        for receiver in self.receivers.drain(..) {
            receiver.abort();
        }
    }
}

/// Parse a reply and keep it only if it advertises `product_identity`.
///
/// Malformed payloads and other models are expected noise and yield `None`.
pub fn accept_advertisement(payload: &[u8], product_identity: &str) -> Option<DeviceAdvertisement> {
    match parse_advertisement(payload) {
        Ok(adv) if adv.matches_model(product_identity) => Some(adv),
        Ok(adv) => {
            trace!("Ignoring {} with model {:?}", adv.device_id, adv.model());
            None
        }
        Err(e) => {
            trace!("Ignoring datagram: {}", e);
            None
        }
    }
}

/// Drives discovery: timer, channels, and the hand-off of replies to the registry.
pub struct DiscoveryScheduler {
    config: DiscoveryConfig,
    strategy: BindStrategy,
    interfaces: Arc<dyn InterfaceSource>,
    bridge: Arc<RegistryBridge>,
    state: Mutex<SchedulerState>,
}

impl DiscoveryScheduler {
    pub fn new(
        config: DiscoveryConfig,
        interfaces: Arc<dyn InterfaceSource>,
        registry: Arc<dyn DeviceRegistry>,
    ) -> Arc<Self> {
        let strategy = BindStrategy::resolve(config.bind_mode, config.discovery_port);
        debug!("Discovery bind strategy: {:?}", strategy);

        Arc::new(Self {
            config,
            strategy,
            interfaces,
            bridge: Arc::new(RegistryBridge::new(registry)),
            state: Mutex::new(SchedulerState::default()),
        })
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Start the repeating timer. Does nothing if it is already running.
    ///
    /// The first timed round fires one interval after start; use
    /// [`trigger_immediate`](Self::trigger_immediate) to probe right away.
    pub async fn start(self: &Arc<Self>) {
        let mut state = self.state.lock().await;
        if state.timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let period = self.config.probe_interval();
        let scheduler = Arc::downgrade(self);
        state.timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(scheduler) = scheduler.upgrade() else {
                    break;
                };
                if let Err(e) = scheduler.discover_round().await {
                    warn!("Discovery round failed: {}", e);
                }
            }
        }));

        info!(
            "Discovery of {} devices started (every {}s).",
            self.config.product_identity, self.config.probe_interval_secs
        );
    }

    /// Cancel the timer and close every channel. Safe to call when already stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;

        let was_active = match state.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        };
        state.teardown();

        if was_active {
            info!("Discovery of {} devices stopped.", self.config.product_identity);
        }
    }

    pub async fn is_active(&self) -> bool {
        self.state
            .lock()
            .await
            .timer
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub async fn channel_count(&self) -> usize {
        self.state.lock().await.channels.len()
    }

    /// Run one round now, outside the timer cadence.
    pub async fn trigger_immediate(&self) -> Result<RoundReport, DiscoveryError> {
        self.discover_round().await
    }

    async fn discover_round(&self) -> Result<RoundReport, DiscoveryError> {
        let mut state = self.state.lock().await;

        if state.channels.has_closed() {
            warn!("A discovery channel failed; rebuilding channels");
            state.teardown();
        }

        if state.channels.is_empty() {
            let addresses = self
                .interfaces
                .enumerate()
                .map_err(DiscoveryError::Enumerate)?;
            let channels =
                ChannelSet::prepare(addresses, self.strategy, self.config.max_datagram_size);
            let receivers = channels
                .channels()
                .iter()
                .map(|channel| self.spawn_receiver(Arc::clone(channel)))
                .collect();

            state.channels = channels;
            state.receivers = receivers;
        }

        let port = self.config.discovery_port;
        let channels = state.channels.channels();
        let results = join_all(channels.iter().map(|c| c.send_probe(port))).await;

        let mut probes_sent = 0;
        for result in results {
            match result {
                Ok(()) => probes_sent += 1,
                Err(e) => warn!("{}", e),
            }
        }

        let report = RoundReport {
            channels: channels.len(),
            probes_sent,
        };
        debug!(
            "Discovery round: {} probe(s) over {} channel(s)",
            report.probes_sent, report.channels
        );
        Ok(report)
    }

    /// Receive loop bound to one channel; it owns its own handle to that channel.
    fn spawn_receiver(&self, channel: Arc<BroadcastChannel>) -> JoinHandle<()> {
        let bridge = Arc::clone(&self.bridge);
        let product_identity = self.config.product_identity.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = channel.closed() => break,
                    ready = channel.readable() => {
                        if let Err(e) = ready {
                            error!("Discovery socket on {} failed: {}", channel.local_addr(), e);
                            channel.abort();
                            break;
                        }
                        for datagram in channel.drain() {
                            handle_datagram(&bridge, &product_identity, &channel, &datagram);
                        }
                    }
                }
            }
            trace!("Receiver for {} exited", channel.local_addr());
        })
    }
}

fn handle_datagram(
    bridge: &RegistryBridge,
    product_identity: &str,
    channel: &BroadcastChannel,
    datagram: &InboundDatagram,
) {
    if let Some(adv) = accept_advertisement(&datagram.payload, product_identity) {
        trace!("Advertisement from {} on {}", datagram.sender, channel.local_ip());
        bridge.register(&adv, channel.local_ip());
    }
}

impl Drop for DiscoveryScheduler {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.teardown();
    }
}
