use std::time::Duration;

/// Timing knobs for the announcer. The defaults are the contract; tests
/// shrink them to keep wall-clock time down.
#[derive(Clone, Debug)]
pub struct Config {
    /// Period of the re-announce ticker. 1100ms sits below the neighbor cache
    /// refresh interval of common gear while staying clear of the
    /// storm-detection heuristics some switches apply to sub-second senders.
    pub spam_period: Duration,

    /// How long an address keeps re-announcing after a change; enough for a
    /// handful of bursts.
    pub spam_window: Duration,

    /// How often the interface tracker re-enumerates the host's interfaces.
    /// Failover timescales don't justify reacting to netlink events.
    pub scan_interval: Duration,

    /// Capacity of the queue feeding the re-announce scheduler. Producers
    /// block when it fills, so it is sized to make that unheard-of.
    pub spam_queue_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            spam_period: Duration::from_millis(1100),
            spam_window: Duration::from_secs(5),
            scan_interval: Duration::from_secs(10),
            spam_queue_depth: 1024,
        }
    }
}
