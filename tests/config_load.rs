// tests/config_load.rs
// Mutates process env and CWD; every test here is serialized.

use std::{env, fs, path::PathBuf};

use job_lead_finder::config::{ENV_CONFIG_PATH, ENV_DRY_RUN, ENV_INTERVAL_SECS, ENV_STATE_DIR, ENV_THRESHOLD};
use job_lead_finder::{FinderConfig, TechFilter};

const ENV_KEYS: [&str; 5] = [
    ENV_CONFIG_PATH,
    ENV_THRESHOLD,
    ENV_STATE_DIR,
    ENV_DRY_RUN,
    ENV_INTERVAL_SECS,
];

/// Snapshot of CWD + finder env; restored on drop.
struct Sandbox {
    old_cwd: PathBuf,
    saved: Vec<(&'static str, Option<String>)>,
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new() -> Self {
        let old_cwd = env::current_dir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        let saved = ENV_KEYS.iter().map(|k| (*k, env::var(k).ok())).collect();
        for k in ENV_KEYS {
            env::remove_var(k);
        }
        Self { old_cwd, saved, dir }
    }

    fn write(&self, rel: &str, content: &str) -> PathBuf {
        let p = self.dir.path().join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&p, content).unwrap();
        p
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        for (k, v) in self.saved.drain(..) {
            match v {
                Some(v) => env::set_var(k, v),
                None => env::remove_var(k),
            }
        }
        let _ = env::set_current_dir(&self.old_cwd);
    }
}

#[serial_test::serial]
#[test]
fn defaults_when_nothing_on_disk() {
    let _sb = Sandbox::new();
    let cfg = FinderConfig::load().unwrap();
    assert_eq!(cfg.filter.threshold, 4.0);
    assert!(cfg.filter.positive.is_empty());
    assert!(!cfg.dry_run);
    assert!(cfg.interval_secs.is_none());
}

#[serial_test::serial]
#[test]
fn toml_preferred_over_json_and_env_path_wins() {
    let sb = Sandbox::new();
    sb.write("config/finder.json", r#"{"filter": {"threshold": 2.0}}"#);
    assert_eq!(FinderConfig::load().unwrap().filter.threshold, 2.0);

    sb.write("config/finder.toml", "[filter]\nthreshold = 3.0\n");
    assert_eq!(FinderConfig::load().unwrap().filter.threshold, 3.0);

    let explicit = sb.write("elsewhere.toml", "[filter]\nthreshold = 7.5\n");
    env::set_var(ENV_CONFIG_PATH, explicit.display().to_string());
    assert_eq!(FinderConfig::load().unwrap().filter.threshold, 7.5);
}

#[serial_test::serial]
#[test]
fn env_path_to_missing_file_is_an_error() {
    let _sb = Sandbox::new();
    env::set_var(ENV_CONFIG_PATH, "nope/finder.toml");
    let err = FinderConfig::load().unwrap_err();
    assert!(err.to_string().contains(ENV_CONFIG_PATH));
}

#[serial_test::serial]
#[test]
fn env_overrides_apply_after_file() {
    let sb = Sandbox::new();
    sb.write(
        "config/finder.toml",
        "dry_run = false\n[filter]\nthreshold = 3.0\n[store]\nstate_dir = \"from-file\"\n",
    );
    env::set_var(ENV_THRESHOLD, "5.25");
    env::set_var(ENV_STATE_DIR, "/tmp/finder-state");
    env::set_var(ENV_DRY_RUN, "1");
    env::set_var(ENV_INTERVAL_SECS, "900");

    let cfg = FinderConfig::load().unwrap();
    assert_eq!(cfg.filter.threshold, 5.25);
    assert_eq!(cfg.store.state_dir, PathBuf::from("/tmp/finder-state"));
    assert!(cfg.dry_run);
    assert_eq!(cfg.interval_secs, Some(900));

    env::set_var(ENV_THRESHOLD, "not-a-number");
    env::set_var(ENV_INTERVAL_SECS, "0");
    let cfg = FinderConfig::load().unwrap();
    assert_eq!(cfg.filter.threshold, 3.0);
    assert_eq!(cfg.interval_secs, None);
}

#[serial_test::serial]
#[test]
fn bad_regex_surfaces_when_filter_is_built() {
    let sb = Sandbox::new();
    sb.write(
        "config/finder.toml",
        "[[filter.positive]]\npattern = \"(rust\"\nweight = 1.0\n",
    );
    let cfg = FinderConfig::load().unwrap();
    let err = TechFilter::new(cfg.filter).unwrap_err();
    assert!(format!("{err:#}").contains("positive rule `(rust`"), "{err:#}");
}

#[serial_test::serial]
#[test]
fn unknown_ai_provider_is_rejected() {
    let sb = Sandbox::new();
    sb.write("config/finder.toml", "[ai]\nprovider = \"carrier-pigeon\"\n");
    assert!(FinderConfig::load().is_err());
}
