use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// file extension of polygon instance files
pub const INSTANCE_EXTENSION: &str = "poly";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Instance directory {0:?} not found")]
    NotFound(PathBuf),
    #[error("Instance glob was invalid")]
    InvalidGlob(#[from] globset::Error),
}

/// A problem instance, named after its input file without the extension
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Instance {
    pub name: String,
    pub path: PathBuf,
}

fn extension_matcher(extension: &str) -> Result<GlobMatcher, CatalogError> {
    Ok(GlobBuilder::new(&format!("*.{extension}"))
        .literal_separator(true)
        .build()?
        .compile_matcher())
}

/// list all instances directly inside `directory`
/// the order follows the file system and carries no meaning
pub fn list_instances(directory: &Path, extension: &str) -> Result<Vec<Instance>, CatalogError> {
    if !directory.is_dir() {
        return Err(CatalogError::NotFound(directory.to_path_buf()));
    }

    let matcher = extension_matcher(extension)?;
    let suffix = format!(".{extension}");

    let instances = WalkBuilder::new(directory)
        .max_depth(Some(1))
        .standard_filters(false)
        // instance sets are often linked in from a shared store
        .follow_links(true)
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                warn!(error = %error, "Failed to read entry of instance directory");
                None
            }
        })
        .filter(|entry| entry.file_type().map_or(false, |kind| kind.is_file()))
        .filter_map(|entry| {
            let file_name = entry.file_name().to_str()?.to_owned();

            if !matcher.is_match(&file_name) {
                return None;
            }

            let name = file_name.strip_suffix(&suffix)?.to_owned();

            Some(Instance {
                name,
                path: entry.into_path(),
            })
        })
        .collect::<Vec<_>>();

    debug!(
        directory = ?directory,
        count = instances.len(),
        "Collected instances"
    );

    Ok(instances)
}
