//! Environment layer of the settings loader.

use agora::config::{self, CliArgs};
use clap::Parser;
use serial_test::serial;

struct EnvGuard(&'static [&'static str]);

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in self.0 {
            // SAFETY: tests touching the environment are serialized.
            unsafe { std::env::remove_var(key) };
        }
    }
}

fn set_env(pairs: &[(&str, &str)]) {
    for (key, value) in pairs {
        // SAFETY: tests touching the environment are serialized.
        unsafe { std::env::set_var(key, value) };
    }
}

#[test]
#[serial]
fn environment_overrides_defaults() {
    let _guard = EnvGuard(&["AGORA__CACHE__CAPACITY", "AGORA__DATABASE__URL"]);
    set_env(&[
        ("AGORA__CACHE__CAPACITY", "42"),
        ("AGORA__DATABASE__URL", "postgres://env/agora"),
    ]);

    let cli = CliArgs::try_parse_from(["agora", "health"]).expect("parse");
    let settings = config::load(&cli).expect("settings");

    assert_eq!(settings.cache.capacity.get(), 42);
    assert_eq!(
        settings.database.url.as_deref(),
        Some("postgres://env/agora")
    );
}

#[test]
#[serial]
fn cli_flags_beat_environment() {
    let _guard = EnvGuard(&["AGORA__CACHE__DEFAULT_TTL_SECONDS", "AGORA__CACHE__ENABLED"]);
    set_env(&[
        ("AGORA__CACHE__DEFAULT_TTL_SECONDS", "30"),
        ("AGORA__CACHE__ENABLED", "true"),
    ]);

    let cli = CliArgs::try_parse_from([
        "agora",
        "--cache-ttl-seconds",
        "5",
        "--cache-enabled",
        "off",
        "health",
    ])
    .expect("parse");
    let settings = config::load(&cli).expect("settings");

    assert_eq!(settings.cache.default_ttl.as_secs(), 5);
    assert!(!settings.cache.enabled);
}

#[test]
#[serial]
fn invalid_environment_value_names_its_key() {
    let _guard = EnvGuard(&["AGORA__CACHE__CAPACITY"]);
    set_env(&[("AGORA__CACHE__CAPACITY", "0")]);

    let cli = CliArgs::try_parse_from(["agora", "health"]).expect("parse");
    let err = config::load(&cli).expect_err("zero capacity");
    assert!(err.to_string().contains("cache.capacity"), "{err}");
}
