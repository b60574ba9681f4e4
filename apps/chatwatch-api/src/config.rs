use std::time::Duration;

/// Observer service configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Keywords an incoming chat message must match to be retained.
    /// Raw values as configured; the matcher trims, lowercases and drops blanks.
    pub keywords: Vec<String>,
    /// WebSocket endpoint of the chat relay the observer connects to.
    pub source_url: String,
    /// Interval between keep-alive pings on each real-time stream.
    pub ping_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable has a default; panics with a descriptive message only
    /// if a variable is present but cannot be parsed.
    pub fn from_env() -> Self {
        Self {
            port: parsed_var("PORT", 3000),
            keywords: std::env::var("KEYWORDS")
                .map(|v| split_keywords(&v))
                .unwrap_or_default(),
            source_url: std::env::var("SOURCE_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "ws://127.0.0.1:8765/chat".to_string()),
            ping_interval: Duration::from_secs(parsed_var("PING_INTERVAL_SECS", 15)),
        }
    }
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split(',').map(str::to_string).collect()
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{name} env var is not a valid value: {v:?}")),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keywords_keeps_raw_entries() {
        assert_eq!(split_keywords("rip, tp ,,tepung"), vec!["rip", " tp ", "", "tepung"]);
    }
}
