// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DagrunError, Result};
use crate::snapshot::file::validate_run_id;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DagrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let tick = validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task, tick))
    }
}

/// Check a raw pipeline file. Returns the parsed tick.
///
/// Cycles are not rejected here: the scheduler reports them with the full
/// dependency path when a run (or dry run) is planned.
pub fn validate_config(cfg: &RawConfigFile) -> Result<Duration> {
    ensure_has_tasks(cfg)?;
    let tick = validate_global_config(cfg)?;
    validate_tasks(cfg)?;
    Ok(tick)
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(DagrunError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<Duration> {
    if cfg.config.pool_size == Some(0) {
        return Err(DagrunError::ConfigError(
            "[config].pool_size must be >= 1 (got 0)".to_string(),
        ));
    }

    let tick = parse_duration(&cfg.config.tick)
        .map_err(|e| DagrunError::ConfigError(format!("[config].tick: {e}")))?;
    if tick.is_zero() {
        return Err(DagrunError::ConfigError(
            "[config].tick must be greater than zero".to_string(),
        ));
    }

    if let Some(run_id) = cfg.config.run_id.as_deref().filter(|id| !id.is_empty()) {
        validate_run_id(run_id)
            .map_err(|e| DagrunError::ConfigError(format!("[config].run_id: {e}")))?;
    }

    Ok(tick)
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.cmd.trim().is_empty() {
            return Err(DagrunError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(DagrunError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

/// Parse `"<digits><unit>"` with unit `ms`, `s`, `m` or `h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
