use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the queue, logging and the demo worker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
    pub demo: DemoSettings,
}

/// Configuration settings for the queue manager.
///
/// `log_path` is only used when `persistent` is set.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub persistent: bool,
    pub log_path: String,
    pub replay_on_start: bool,
    pub lenient_replay: bool,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
}

/// Configuration settings for the demo email worker.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DemoSettings {
    pub topic: String,
    pub jobs: usize,
    pub failure_rate: f64,
    pub interval_ms: u64,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub queue: Option<PartialQueueSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub demo: Option<PartialDemoSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub persistent: Option<bool>,
    pub log_path: Option<String>,
    pub replay_on_start: Option<bool>,
    pub lenient_replay: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialDemoSettings {
    pub topic: Option<String>,
    pub jobs: Option<usize>,
    pub failure_rate: Option<f64>,
    pub interval_ms: Option<u64>,
}

/// Provides default values for `Settings`.
///
/// Persistence is off by default; the demo sends five emails with a 30%
/// simulated failure rate.
impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueSettings {
                persistent: false,
                log_path: "openmq.log".to_string(),
                replay_on_start: false,
                lenient_replay: false,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
            demo: DemoSettings {
                topic: "email".to_string(),
                jobs: 5,
                failure_rate: 0.3,
                interval_ms: 500,
            },
        }
    }
}

impl PartialSettings {
    /// Fills every missing value from `default`.
    pub fn merge_over(self, default: Settings) -> Settings {
        let queue = self.queue;
        let logging = self.logging;
        let demo = self.demo;

        Settings {
            queue: QueueSettings {
                persistent: queue
                    .as_ref()
                    .and_then(|q| q.persistent)
                    .unwrap_or(default.queue.persistent),
                log_path: queue
                    .as_ref()
                    .and_then(|q| q.log_path.clone())
                    .unwrap_or(default.queue.log_path),
                replay_on_start: queue
                    .as_ref()
                    .and_then(|q| q.replay_on_start)
                    .unwrap_or(default.queue.replay_on_start),
                lenient_replay: queue
                    .as_ref()
                    .and_then(|q| q.lenient_replay)
                    .unwrap_or(default.queue.lenient_replay),
            },
            logging: LoggingSettings {
                level: logging
                    .and_then(|l| l.level)
                    .unwrap_or(default.logging.level),
            },
            demo: DemoSettings {
                topic: demo
                    .as_ref()
                    .and_then(|d| d.topic.clone())
                    .unwrap_or(default.demo.topic),
                jobs: demo
                    .as_ref()
                    .and_then(|d| d.jobs)
                    .unwrap_or(default.demo.jobs),
                failure_rate: demo
                    .as_ref()
                    .and_then(|d| d.failure_rate)
                    .unwrap_or(default.demo.failure_rate),
                interval_ms: demo
                    .as_ref()
                    .and_then(|d| d.interval_ms)
                    .unwrap_or(default.demo.interval_ms),
            },
        }
    }
}
