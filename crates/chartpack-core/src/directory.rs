//! Writing a chart as a plain directory tree
//!
//! The chart lands in `<dest>/<name>/`. Dependencies are not expanded: each
//! one is written as its own archive under `<dest>/<name>/charts/`, so it can
//! be picked up or extracted independently of the parent.
//!
//! Directory output is not atomic. A failure leaves whatever was already
//! written, and an existing chart directory is written over file by file
//! without being cleared first.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::archive::Packager;
use crate::chart::{CHARTFILE_NAME, CHARTS_DIR, Chart, SCHEMA_FILE_NAME, VALUES_FILE_NAME};
use crate::error::{CoreError, Result};
use crate::name::validate_name;

impl Packager {
    /// Write `chart` into `<dest>/<name>/` and return that directory
    pub fn save_dir(&self, chart: &Chart, dest: &Path) -> Result<PathBuf> {
        validate_name(chart.name())?;

        let outdir = dest.join(chart.name());
        if let Ok(meta) = fs::metadata(&outdir) {
            if !meta.is_dir() {
                return Err(CoreError::DestinationConflict { path: outdir });
            }
        }
        create_dir_all(&outdir)?;
        let outdir = std::path::absolute(&outdir).map_err(|e| CoreError::io(&outdir, e))?;

        debug!(chart = chart.name(), path = %outdir.display(), "writing chart directory");

        let metadata = serde_yaml::to_string(&chart.metadata)?;
        write_file(&outdir.join(CHARTFILE_NAME), metadata.as_bytes())?;

        if let Some(values) = chart.values_file() {
            write_file(&outdir.join(VALUES_FILE_NAME), &values.data)?;
        }

        if let Some(schema) = &chart.schema {
            write_file(&outdir.join(SCHEMA_FILE_NAME), schema)?;
        }

        for file in chart.templates.iter().chain(&chart.files) {
            write_file(&join_relative(&outdir, &file.name), &file.data)?;
        }

        // Each dependency becomes an independent archive, not a nested directory.
        let charts = outdir.join(CHARTS_DIR);
        for dep in &chart.dependencies {
            self.save(dep, &charts).map_err(|e| {
                CoreError::in_dependency(
                    format!("{}/{}/{}", chart.name(), CHARTS_DIR, dep.name()),
                    e,
                )
            })?;
        }

        Ok(outdir)
    }
}

/// `mkdir -p` with 0755 permissions
pub(crate) fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path).map_err(|e| CoreError::io(path, e))
}

/// Write `data` to `path` (0644), creating parent directories as needed
fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let mut file = options.open(path).map_err(|e| CoreError::io(path, e))?;
    file.write_all(data).map_err(|e| CoreError::io(path, e))
}

/// Join a chart-relative file name under `root`; a leading `/` stays inside `root`
fn join_relative(root: &Path, name: &str) -> PathBuf {
    let mut path = root.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => path.push(".."),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    path
}
