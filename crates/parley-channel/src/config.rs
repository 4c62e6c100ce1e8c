use std::time::Duration;

use parley_core::BearerToken;
use parley_settings::ChannelSettings;

/// Connection parameters for a [`SessionChannel`](crate::SessionChannel).
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub url: String,
    pub token: Option<BearerToken>,
    /// Reconnect attempts after a drop before the channel goes offline.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub heartbeat_interval: Duration,
    pub offline_queue_limit: usize,
    pub connect_timeout: Duration,
    /// Upper bound on one frame write; exceeding it drops the connection.
    pub write_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::from_settings(&ChannelSettings::default(), None)
    }
}

impl ChannelConfig {
    pub fn from_settings(settings: &ChannelSettings, token: Option<BearerToken>) -> Self {
        Self {
            url: settings.url.clone(),
            token,
            max_retries: settings.max_retries,
            base_delay: settings.base_delay(),
            backoff_multiplier: settings.backoff_multiplier,
            heartbeat_interval: settings.heartbeat_interval(),
            offline_queue_limit: settings.offline_queue_limit,
            connect_timeout: settings.connect_timeout(),
            write_timeout: settings.write_timeout(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_token(mut self, token: BearerToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based):
    /// `base_delay * backoff_multiplier^(attempt - 1)`. No jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_channel_settings() {
        let config = ChannelConfig::default();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.offline_queue_limit, 50);
        assert!(config.token.is_none());
    }

    #[test]
    fn backoff_grows_geometrically() {
        let config = ChannelConfig::default();
        let expected = [1.0, 1.8, 3.24, 5.832, 10.4976];
        for (n, secs) in (1..=5).zip(expected) {
            let actual = config.backoff_delay(n).as_secs_f64();
            assert!((actual - secs).abs() < 1e-6, "attempt {n}: {actual} != {secs}");
        }
    }

    #[test]
    fn backoff_is_strictly_increasing() {
        let config = ChannelConfig {
            base_delay: Duration::from_millis(250),
            backoff_multiplier: 2.0,
            ..ChannelConfig::default()
        };
        for n in 1..10 {
            assert!(config.backoff_delay(n + 1) > config.backoff_delay(n));
        }
        assert_eq!(config.backoff_delay(3), Duration::from_secs(1));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let config = ChannelConfig::default();
        assert_eq!(config.backoff_delay(u32::MAX), Duration::MAX);
    }

    #[test]
    fn builder_methods() {
        let config = ChannelConfig::default()
            .with_url("ws://tutor.local/ws")
            .with_token(BearerToken::new("abc"));
        assert_eq!(config.url, "ws://tutor.local/ws");
        assert_eq!(config.token.unwrap().header_value(), "Bearer abc");
    }
}
