use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert!(!settings.queue.persistent);
    assert_eq!(settings.queue.log_path, "openmq.log");
    assert!(!settings.queue.replay_on_start);
    assert!(!settings.queue.lenient_replay);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.demo.topic, "email");
    assert_eq!(settings.demo.jobs, 5);
    assert_eq!(settings.demo.interval_ms, 500);
}

/// Runs `f` with a fresh temporary directory as the working directory.
fn in_temp_dir<F: FnOnce(&TempDir)>(f: F) {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");
    f(&tmp);
    env::set_current_dir(orig).expect("restore cwd");
}

#[test]
#[serial]
fn load_config_without_sources_uses_defaults() {
    in_temp_dir(|_| {
        temp_env::with_vars_unset(
            ["OPENMQ_QUEUE__PERSISTENT", "OPENMQ_QUEUE__LOG_PATH", "OPENMQ_DEMO__JOBS"],
            || {
                let cfg = load_config().expect("load_config failed");
                assert_eq!(cfg, Settings::default());
            },
        );
    });
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [queue]
            persistent = true
            log_path = "/var/lib/openmq/queue.log"

            [demo]
            jobs = 12
            failure_rate = 0.5
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config().expect("load_config failed");
        assert!(cfg.queue.persistent);
        assert_eq!(cfg.queue.log_path, "/var/lib/openmq/queue.log");
        assert_eq!(cfg.demo.jobs, 12);
        assert_eq!(cfg.demo.failure_rate, 0.5);
        // untouched sections keep their defaults
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.demo.topic, "email");
    });
}

#[test]
#[serial]
fn load_config_env_overrides_file() {
    in_temp_dir(|_| {
        fs::create_dir_all("config").expect("create config dir");
        fs::write("config/default.toml", "[queue]\nlog_path = \"from_file.log\"\n")
            .expect("write config file");

        temp_env::with_vars(
            [
                ("OPENMQ_QUEUE__LOG_PATH", Some("from_env.log")),
                ("OPENMQ_QUEUE__PERSISTENT", Some("true")),
                ("OPENMQ_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let cfg = load_config().expect("load_config failed");
                assert_eq!(cfg.queue.log_path, "from_env.log");
                assert!(cfg.queue.persistent);
                assert_eq!(cfg.logging.level, "debug");
            },
        );
    });
}
