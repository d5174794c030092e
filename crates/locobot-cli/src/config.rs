//! Run configuration – reads/writes `~/.locobot/pick_place.toml`.

use locobot_runtime::PickPlaceConfig;
use locobot_types::{LocoError, Vec3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "LOCOBOT_CONFIG";

/// A table-top object placed in the simulated scene, in the arm-base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimObjectConfig {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl SimObjectConfig {
    fn new(name: &str, x: f32, y: f32, z: f32) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
            z,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// The `[sim]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// The point cloud re-segments only on every n-th query.
    #[serde(default = "default_refresh_every")]
    pub refresh_every: u32,

    #[serde(default = "default_objects")]
    pub objects: Vec<SimObjectConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            refresh_every: default_refresh_every(),
            objects: default_objects(),
        }
    }
}

/// Persisted settings stored in `~/.locobot/pick_place.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_robot_model")]
    pub robot_model: String,

    #[serde(default = "default_arm_model")]
    pub arm_model: String,

    /// Topic drive commands are published on.
    #[serde(default = "default_cmd_vel_topic")]
    pub cmd_vel_topic: String,

    /// Messages buffered on the drive-command topic.  The bus rounds this
    /// up to the next power of two (10 buffers 16), so it is a lower bound
    /// on how far a subscriber may fall behind before losing messages.
    #[serde(default = "default_queue_size")]
    pub cmd_vel_queue_size: usize,

    /// Frame cluster positions are expressed in.
    #[serde(default = "default_ref_frame")]
    pub ref_frame: String,

    #[serde(default = "default_dedup_tolerance")]
    pub dedup_tolerance: f32,

    /// Remembered positions before the oldest age out; unset keeps all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,

    #[serde(default = "default_loop_period_secs")]
    pub loop_period_secs: f64,

    #[serde(default = "default_settle_secs")]
    pub settle_secs: f64,

    /// Stop after this many iterations; unset runs until Ctrl-C.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u64>,

    /// Fixed locomotion seed; unset seeds from the OS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,

    #[serde(default)]
    pub sim: SimConfig,
}

fn default_robot_model() -> String {
    "locobot_wx250s".to_string()
}
fn default_arm_model() -> String {
    "mobile_wx250s".to_string()
}
fn default_cmd_vel_topic() -> String {
    "/mobile_base/cmd_vel".to_string()
}
fn default_queue_size() -> usize {
    locobot_middleware::DEFAULT_QUEUE_SIZE
}
fn default_ref_frame() -> String {
    locobot_runtime::pick_place::ARM_BASE_FRAME.to_string()
}
fn default_dedup_tolerance() -> f32 {
    locobot_perception::DEFAULT_DEDUP_TOLERANCE
}
fn default_loop_period_secs() -> f64 {
    1.0
}
fn default_settle_secs() -> f64 {
    0.5
}
fn default_refresh_every() -> u32 {
    2
}
fn default_objects() -> Vec<SimObjectConfig> {
    vec![
        SimObjectConfig::new("red_block", 0.22, 0.12, 0.02),
        SimObjectConfig::new("green_block", 0.30, 0.0, 0.02),
        SimObjectConfig::new("blue_block", 0.38, -0.12, 0.02),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robot_model: default_robot_model(),
            arm_model: default_arm_model(),
            cmd_vel_topic: default_cmd_vel_topic(),
            cmd_vel_queue_size: default_queue_size(),
            ref_frame: default_ref_frame(),
            dedup_tolerance: default_dedup_tolerance(),
            history_limit: None,
            loop_period_secs: default_loop_period_secs(),
            settle_secs: default_settle_secs(),
            max_iterations: None,
            rng_seed: None,
            sim: SimConfig::default(),
        }
    }
}

impl Config {
    /// Loop settings derived from this config.
    ///
    /// # Errors
    ///
    /// [`LocoError::Config`] for a negative or non-finite tolerance or
    /// duration.
    pub fn pick_place(&self) -> Result<PickPlaceConfig, LocoError> {
        if !self.dedup_tolerance.is_finite() || self.dedup_tolerance < 0.0 {
            return Err(LocoError::Config(format!(
                "dedup_tolerance must be a non-negative number, got {}",
                self.dedup_tolerance
            )));
        }
        Ok(PickPlaceConfig {
            ref_frame: self.ref_frame.clone(),
            dedup_tolerance: self.dedup_tolerance,
            history_limit: self.history_limit,
            settle: seconds("settle_secs", self.settle_secs)?,
            loop_period: seconds("loop_period_secs", self.loop_period_secs)?,
            max_iterations: self.max_iterations,
        })
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration, LocoError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| LocoError::Config(format!("{field} = {secs}: {e}")))
}

/// Return the config path: `$LOCOBOT_CONFIG` if set, else
/// `~/.locobot/pick_place.toml`.
pub fn config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    resolve_path(std::env::var(CONFIG_PATH_ENV).ok().as_deref(), &home)
}

fn resolve_path(explicit: Option<&str>, home: &str) -> PathBuf {
    match explicit {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => config_path_for_home(home),
    }
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".locobot").join("pick_place.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, LocoError> {
    load_from(&config_path())
}

/// Load the config from a specific path.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, LocoError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| LocoError::Io(format!("failed to read config at {}: {e}", path.display())))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| LocoError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `LOCOBOT_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LOCOBOT_QUEUE_SIZE` | `cmd_vel_queue_size` |
/// | `LOCOBOT_MAX_ITERATIONS` | `max_iterations` |
/// | `LOCOBOT_SEED` | `rng_seed` |
///
/// Unparseable values are logged and ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Some(n) = parse_env("LOCOBOT_QUEUE_SIZE") {
        cfg.cmd_vel_queue_size = n;
    }
    if let Some(n) = parse_env("LOCOBOT_MAX_ITERATIONS") {
        cfg.max_iterations = Some(n);
    }
    if let Some(seed) = parse_env("LOCOBOT_SEED") {
        cfg.rng_seed = Some(seed);
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var, value = %raw, "ignoring unparseable override");
            None
        }
    }
}

/// Save the config to disk.
pub fn save(cfg: &Config) -> Result<(), LocoError> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path, creating parent directories.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), LocoError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| LocoError::Io(format!("failed to create config directory: {e}")))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| LocoError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| LocoError::Io(format!("failed to write config at {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.cmd_vel_topic, "/mobile_base/cmd_vel");
        assert_eq!(loaded.cmd_vel_queue_size, 10);
        assert_eq!(loaded.sim.objects.len(), 3);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            r#"
dedup_tolerance = 0.08
max_iterations = 4

[sim]
refresh_every = 1

[[sim.objects]]
name = "cup"
x = 0.3
y = 0.05
z = 0.03
"#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.dedup_tolerance, 0.08);
        assert_eq!(cfg.max_iterations, Some(4));
        assert_eq!(cfg.robot_model, "locobot_wx250s");
        assert_eq!(cfg.ref_frame, "locobot/arm_base_link");
        assert_eq!(cfg.sim.refresh_every, 1);
        assert_eq!(cfg.sim.objects, vec![SimObjectConfig::new("cup", 0.3, 0.05, 0.03)]);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "cmd_vel_queue_size = \"lots\"").unwrap();
        assert!(matches!(load_from(&path), Err(LocoError::Config(_))));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn config_path_points_to_locobot_dir() {
        let p = config_path_for_home("/home/testuser");
        assert_eq!(p, PathBuf::from("/home/testuser/.locobot/pick_place.toml"));
    }

    #[test]
    fn explicit_path_wins_unless_empty() {
        assert_eq!(resolve_path(Some("/etc/locobot.toml"), "/home/u"), PathBuf::from("/etc/locobot.toml"));
        assert_eq!(resolve_path(Some(""), "/home/u"), config_path_for_home("/home/u"));
        assert_eq!(resolve_path(None, "/home/u"), config_path_for_home("/home/u"));
    }

    #[test]
    fn default_maps_to_default_loop_settings() {
        assert_eq!(Config::default().pick_place().unwrap(), PickPlaceConfig::default());
    }

    #[test]
    fn negative_durations_and_tolerances_are_rejected() {
        let cfg = Config {
            settle_secs: -0.5,
            ..Config::default()
        };
        assert!(matches!(cfg.pick_place(), Err(LocoError::Config(msg)) if msg.contains("settle_secs")));

        let cfg = Config {
            dedup_tolerance: -0.01,
            ..Config::default()
        };
        assert!(matches!(cfg.pick_place(), Err(LocoError::Config(_))));
    }

    #[test]
    fn apply_env_overrides_changes_queue_size() {
        // SAFETY: only this test touches LOCOBOT_QUEUE_SIZE.
        unsafe { std::env::set_var("LOCOBOT_QUEUE_SIZE", "32") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.cmd_vel_queue_size, 32);

        unsafe { std::env::set_var("LOCOBOT_QUEUE_SIZE", "lots") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.cmd_vel_queue_size, 10);
        unsafe { std::env::remove_var("LOCOBOT_QUEUE_SIZE") };
    }

    #[test]
    fn apply_env_overrides_sets_iteration_limit() {
        // SAFETY: only this test touches LOCOBOT_MAX_ITERATIONS.
        unsafe { std::env::set_var("LOCOBOT_MAX_ITERATIONS", "7") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.max_iterations, Some(7));
        unsafe { std::env::remove_var("LOCOBOT_MAX_ITERATIONS") };
    }

    #[test]
    fn apply_env_overrides_sets_seed() {
        // SAFETY: only this test touches LOCOBOT_SEED.
        unsafe { std::env::set_var("LOCOBOT_SEED", " 1234 ") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.rng_seed, Some(1234));
        unsafe { std::env::remove_var("LOCOBOT_SEED") };
    }
}
