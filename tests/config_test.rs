//! Environment configuration loading
//!
//! These tests mutate process environment variables, so they all share one
//! lock to keep the harness's parallelism from interleaving them.

use std::sync::Mutex;

use trawler::config::Config;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const REQUIRED: &[(&str, &str)] = &[
    ("TABLE_NAME", "crawl-state"),
    ("QUEUE_URL", "https://sqs.us-east-1.amazonaws.com/1/crawl"),
    ("CONTENT_BUCKET", "crawl-content"),
];

const OPTIONAL: &[&str] = &[
    "MAX_DEPTH",
    "CRAWL_DELAY_MS",
    "TRAWLER_USER_AGENT",
    "TRAWLER_LOG_FORMAT",
];

fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
    let _guard = ENV_LOCK.lock().unwrap();
    for (k, v) in REQUIRED {
        std::env::set_var(k, v);
    }
    for k in OPTIONAL {
        std::env::remove_var(k);
    }
    for (k, v) in vars {
        std::env::set_var(k, v);
    }
    f();
    for (k, _) in REQUIRED {
        std::env::remove_var(k);
    }
    for k in OPTIONAL {
        std::env::remove_var(k);
    }
}

#[test]
fn test_defaults_applied() {
    with_env(&[], || {
        let config = Config::from_env().unwrap();
        assert_eq!(config.table_name, "crawl-state");
        assert_eq!(config.content_bucket, "crawl-content");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.crawl_delay_ms, 1000);
        assert_eq!(config.log_format, "text");
        assert!(config.user_agent.starts_with("trawler/"));
    });
}

#[test]
fn test_missing_required_is_fatal() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("TABLE_NAME");
    std::env::set_var("QUEUE_URL", "https://sqs.example/q");
    std::env::set_var("CONTENT_BUCKET", "bucket");

    let err = Config::from_env().unwrap_err();
    assert!(err.to_string().contains("TABLE_NAME"));

    std::env::remove_var("QUEUE_URL");
    std::env::remove_var("CONTENT_BUCKET");
}

#[test]
fn test_overrides_respected() {
    with_env(
        &[
            ("MAX_DEPTH", "5"),
            ("CRAWL_DELAY_MS", "2500"),
            ("TRAWLER_USER_AGENT", "custom-bot/9.9 (ops@example.com)"),
            ("TRAWLER_LOG_FORMAT", "json"),
        ],
        || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.max_depth, 5);
            assert_eq!(config.crawl_delay_ms, 2500);
            assert_eq!(config.user_agent, "custom-bot/9.9 (ops@example.com)");
            assert_eq!(config.robots_agent(), "custom-bot");
            assert_eq!(config.log_format, "json");
        },
    );
}

#[test]
fn test_unparseable_optionals_fall_back() {
    with_env(
        &[("MAX_DEPTH", "not-a-number"), ("CRAWL_DELAY_MS", "soon")],
        || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.max_depth, 3);
            assert_eq!(config.crawl_delay_ms, 1000);
        },
    );
}

#[test]
fn test_negative_delay_disables_rate_limiting() {
    with_env(&[("CRAWL_DELAY_MS", "-1")], || {
        let config = Config::from_env().unwrap();
        assert_eq!(config.crawl_delay_ms, -1);
        assert!(!config.rate_limiting_enabled());
    });
}
