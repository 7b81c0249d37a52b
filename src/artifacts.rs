use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    error::{RechromaError, RechromaResult},
    format::FrameIndex,
};

/// Filename for the artifact holding `index`, numbered `index + 1`.
pub fn artifact_name(index: FrameIndex) -> String {
    format!("frame_{}.png", index.display_number())
}

/// Embedded decimal frame number of an artifact path, if it has one.
///
/// This number is the sole sort key for artifacts; consumers must never fall
/// back to lexicographic filename order (`frame_10` sorts after `frame_9`).
pub fn artifact_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.strip_prefix("frame_")?;
    digits.parse::<u64>().ok()
}

/// List the numbered PNG artifacts in `dir`, ascending by embedded number.
///
/// Entries without a parsable number are ignored. Two entries carrying the same
/// number cannot be ordered and are a consistency error.
pub fn list_artifacts(dir: &Path) -> RechromaResult<Vec<(u64, PathBuf)>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        RechromaError::io(format!(
            "failed to list artifact directory '{}': {e}",
            dir.display()
        ))
    })?;

    let mut artifacts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            RechromaError::io(format!(
                "failed to read artifact directory '{}': {e}",
                dir.display()
            ))
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        if let Some(number) = artifact_number(&path) {
            artifacts.push((number, path));
        }
    }

    artifacts.sort_by_key(|(number, _)| *number);
    for pair in artifacts.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(RechromaError::consistency(format!(
                "duplicate frame number {} in '{}'",
                pair[0].0,
                dir.display()
            )));
        }
    }

    Ok(artifacts)
}

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> RechromaResult<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory '{}'", dir.display()))?;
    Ok(())
}
