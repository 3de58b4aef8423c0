use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::{debug, warn};

use crate::config::model::{GuardConfig, GuardSettings, Readiness, RsnapshotSettings};
use crate::error::{ConfigError, GuardError, Result};

pub const DEFAULT_RSNAPSHOT_CONFIG: &str = "/etc/rsnapshot.conf";
pub const DEFAULT_GUARD_SETTINGS: &str = "/etc/rsnapshot-once.yaml";

/// Reads the rsnapshot config at `path`, following `include_conf` directives.
pub fn load_rsnapshot_config(path: &Path) -> Result<RsnapshotSettings> {
    let mut settings = RsnapshotSettings::default();
    let mut stack = HashSet::new();
    parse_rsnapshot_file(path, &mut settings, &mut stack)?;
    debug!(
        "rsnapshot config: snapshot_root={:?} logfile={:?} sync_first={}",
        settings.snapshot_root, settings.logfile, settings.sync_first
    );
    Ok(settings)
}

fn parse_rsnapshot_file(
    path: &Path,
    settings: &mut RsnapshotSettings,
    stack: &mut HashSet<PathBuf>,
) -> Result<()> {
    let canonical = path.canonicalize().map_err(|e| {
        ConfigError::Invalid(format!("read config {}: {}", path.display(), e))
    })?;
    if !stack.insert(canonical.clone()) {
        return Err(ConfigError::Invalid(format!(
            "include_conf cycle detected at {}",
            canonical.display()
        ))
        .into());
    }
    let contents = fs::read_to_string(&canonical).map_err(|e| {
        ConfigError::Invalid(format!("read config {}: {}", canonical.display(), e))
    })?;
    let base = canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));

    for line in contents.lines() {
        let Some((key, value)) = split_directive(line) else {
            continue;
        };
        match key.as_str() {
            "include_conf" => {
                let target = resolve_include(&base, value)?;
                debug!("referenced file: {}", target.display());
                parse_rsnapshot_file(&target, settings, stack)?;
            }
            "logfile" => settings.logfile = Some(PathBuf::from(value)),
            "snapshot_root" => {
                if value.ends_with('/') && Path::new(value).is_absolute() {
                    settings.snapshot_root = Some(PathBuf::from(value));
                } else {
                    warn!(
                        "snapshot_root {} must be absolute with a trailing slash; ignoring it",
                        value
                    );
                }
            }
            "sync_first" => settings.sync_first = value == "1",
            _ => {}
        }
    }

    stack.remove(&canonical);
    Ok(())
}

/// Splits an rsnapshot `key<TAB>value` line. Comments and blank lines yield `None`.
fn split_directive(line: &str) -> Option<(String, &str)> {
    let line = line.trim_end();
    if line.trim_start().is_empty() || line.trim_start().starts_with('#') {
        return None;
    }
    let mut fields = line.split('\t').filter(|f| !f.is_empty());
    let key = fields.next()?.trim().to_ascii_lowercase();
    let value = fields.next()?.trim();
    Some((key, value))
}

fn resolve_include(base: &Path, value: &str) -> Result<PathBuf> {
    if value.starts_with('`') {
        return Err(ConfigError::Invalid(format!(
            "include_conf {} runs a command; only file includes are supported",
            value
        ))
        .into());
    }
    let target = Path::new(value);
    if target.is_absolute() {
        return Ok(target.to_path_buf());
    }
    warn!(
        "include_conf {} is a relative path; resolving against {}",
        value,
        base.display()
    );
    Ok(base.join(target))
}

/// Loads guard settings. A missing file at the default location means defaults;
/// a missing file the operator named explicitly is an error.
pub fn load_guard_settings(path: Option<&Path>) -> Result<GuardSettings> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_GUARD_SETTINGS), false),
    };
    let mut contents = String::new();
    match File::open(&path) {
        Ok(mut file) => {
            file.read_to_string(&mut contents)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
            debug!("no guard settings at {}; using defaults", path.display());
            return Ok(GuardSettings::default());
        }
        Err(err) => {
            return Err(ConfigError::Invalid(format!(
                "read settings {}: {}",
                path.display(),
                err
            ))
            .into())
        }
    }
    if contents.trim().is_empty() {
        return Ok(GuardSettings::default());
    }
    let settings: GuardSettings =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(settings)
}

/// Folds both inputs into the immutable configuration for one invocation.
pub fn build_config(
    config_file: &Path,
    rsnapshot: RsnapshotSettings,
    settings: GuardSettings,
) -> Result<GuardConfig> {
    if rsnapshot.sync_first {
        return Err(GuardError::UnsupportedSyncFirst);
    }
    let snapshot_root = rsnapshot
        .snapshot_root
        .ok_or_else(|| GuardError::MissingSnapshotRoot(config_file.to_path_buf()))?;
    if settings.min_uptime_minutes < 0 || settings.min_resume_minutes < 0 {
        return Err(ConfigError::Invalid(
            "minUptimeMinutes and minResumeMinutes must not be negative".to_string(),
        )
        .into());
    }
    if settings.error_marker.trim().is_empty() {
        return Err(ConfigError::Invalid("errorMarker is empty".to_string()).into());
    }
    Ok(GuardConfig {
        config_file: config_file.to_path_buf(),
        snapshot_root,
        log_file: rsnapshot.logfile,
        tool_path: settings.rsnapshot_binary,
        error_marker: settings.error_marker,
        readiness: Readiness {
            min_uptime: Duration::minutes(settings.min_uptime_minutes),
            min_since_resume: Duration::minutes(settings.min_resume_minutes),
        },
    })
}
