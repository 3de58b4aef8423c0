use std::fs;
use std::path::Path;

use tracing::{error, info};
use walkdir::WalkDir;

use crate::error::{GuardError, Result};

/// One `<job>.<index>` entry directly under the snapshot root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub name: String,
    pub index: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub removed: Option<String>,
    pub renamed: Vec<(String, String)>,
}

/// Index of `name` if it is exactly `<job>.<digits>` with no leading zeros.
pub fn parse_generation(name: &str, job: &str) -> Option<u64> {
    let digits = name.strip_prefix(job)?.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

/// Generations of `job` under `root`, newest (lowest index) first.
pub fn find_generations(root: &Path, job: &str) -> Result<Vec<Generation>> {
    let mut generations = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = entry
            .map_err(|e| GuardError::message(format!("read {}: {}", root.display(), e)))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(index) = parse_generation(&name, job) {
            generations.push(Generation { name, index });
        }
    }
    generations.sort_by_key(|g| g.index);
    Ok(generations)
}

/// Rolls back the generation an interrupted run was writing: deletes the newest
/// `<job>.<n>` and shifts every older one down by one index.
///
/// Stops at the first rename whose target already exists. Renames done up to that
/// point are kept; the caller reports the failure and an operator has to look.
pub fn recover(root: &Path, job: &str) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();
    let mut generations = find_generations(root, job)?.into_iter();
    let Some(newest) = generations.next() else {
        info!("No previous backups found. No cleanup necessary.");
        return Ok(report);
    };

    info!("Cleaning up unfinished backup ...");
    let target = root.join(&newest.name);
    verify_removable(&target, &newest.name, job)?;
    info!("Deleting {} ...", target.display());
    fs::remove_dir_all(&target)
        .map_err(|e| GuardError::message(format!("delete {}: {}", target.display(), e)))?;
    report.removed = Some(newest.name);

    // Indices are distinct and sorted, so every remaining index is at least 1.
    for generation in generations {
        let renamed = format!("{}.{}", job, generation.index - 1);
        move_generation(root, &generation.name, &renamed)?;
        report.renamed.push((generation.name, renamed));
    }
    Ok(report)
}

fn verify_removable(path: &Path, name: &str, job: &str) -> Result<()> {
    let violation = |reason: &str| {
        error!("Script security issue while deleting {}: {}", path.display(), reason);
        GuardError::RotationSafetyViolation {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    };
    let meta = fs::symlink_metadata(path).map_err(|_| violation("entry vanished"))?;
    if meta.file_type().is_symlink() {
        return Err(violation("entry is a symlink"));
    }
    if !meta.is_dir() {
        return Err(violation("entry is not a directory"));
    }
    if name.len() < 2 {
        return Err(violation("name is too short"));
    }
    if parse_generation(name, job).is_none() {
        return Err(violation("name is not a generation of this job"));
    }
    Ok(())
}

fn move_generation(root: &Path, from: &str, to: &str) -> Result<()> {
    let source = root.join(from);
    let dest = root.join(to);
    if fs::symlink_metadata(&dest).is_ok() {
        error!(
            "Could not rename {} to {}. Target already exists",
            source.display(),
            dest.display()
        );
        return Err(GuardError::RotationCollision {
            from: source,
            to: dest,
        });
    }
    info!("Moving {} to {} ...", from, to);
    fs::rename(&source, &dest).map_err(|e| {
        GuardError::message(format!(
            "rename {} to {}: {}",
            source.display(),
            dest.display(),
            e
        ))
    })
}
