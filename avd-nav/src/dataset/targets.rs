use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use super::errors::DatasetError;
use super::types::{InstanceId, InstanceNames, TargetRef};

/// Where one target reference file belongs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetEntry {
    pub instance_id: InstanceId,
    pub view_type: usize,
}

/// Extracts the instance name from a target reference file name.
///
/// File names follow one of two forms:
/// - `<instance>_N<anything>`: everything before the first `_N` is the instance;
/// - `<instance>_<suffix>`: everything before the last `_` is the instance.
///
/// Instance names are lowercase and never contain `_N`.
pub fn parse_target_instance_name(file_name: &str) -> Result<&str, DatasetError> {
    let end = file_name
        .find("_N")
        .or_else(|| file_name.rfind('_'))
        .ok_or_else(|| {
            DatasetError::Malformed(format!("target file name without suffix: {file_name}"))
        })?;
    let name = &file_name[..end];
    if name.is_empty() {
        return Err(DatasetError::Malformed(format!(
            "target file name without instance: {file_name}"
        )));
    }
    Ok(name)
}

pub fn parse_target_entry(
    view_type: usize,
    file_name: &str,
    names: &InstanceNames,
) -> Result<TargetEntry, DatasetError> {
    let name = parse_target_instance_name(file_name)?;
    let instance_id = names
        .id(name)
        .ok_or_else(|| DatasetError::UnknownInstance(name.to_string()))?;
    Ok(TargetEntry {
        instance_id,
        view_type,
    })
}

/// Walks `root/<view type dir>/<file>` and groups files per instance and view type.
///
/// View type directories are visited in sorted order; an instance only gets an
/// entry for the view types it actually has files in.
pub(crate) fn collect_target_candidates(
    root: &Path,
    names: &InstanceNames,
) -> Result<HashMap<InstanceId, Vec<Vec<TargetRef>>>, DatasetError> {
    let view_dirs = sorted_entries(root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();

    let mut grouped: HashMap<InstanceId, BTreeMap<usize, Vec<TargetRef>>> = HashMap::new();
    for (view_type, dir) in view_dirs.iter().enumerate() {
        for path in sorted_entries(dir)? {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match parse_target_entry(view_type, file_name, names) {
                Ok(entry) => grouped
                    .entry(entry.instance_id)
                    .or_default()
                    .entry(entry.view_type)
                    .or_default()
                    .push(TargetRef::new(path.clone())),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping target file"),
            }
        }
    }

    debug!(
        instances = grouped.len(),
        view_types = view_dirs.len(),
        "collected target references"
    );

    Ok(grouped
        .into_iter()
        .map(|(id, by_type)| (id, by_type.into_values().collect()))
        .collect())
}

fn sorted_entries(dir: &Path) -> Result<Vec<std::path::PathBuf>, DatasetError> {
    let read = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;
    let mut paths = Vec::new();
    for entry in read {
        paths.push(entry.map_err(|e| DatasetError::io(dir, e))?.path());
    }
    paths.sort();
    Ok(paths)
}
