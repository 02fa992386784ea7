//! Chartpack Core - Packaging for chart trees
//!
//! This crate writes an in-memory chart tree to disk in one of two forms:
//! - `save`: a single `<name>-<version>.tgz` with every dependency flattened
//!   into the same stream, removed again if writing fails
//! - `save_dir`: a `<dest>/<name>/` directory, with each dependency stored as
//!   its own archive under `charts/`
//!
//! Types:
//! - `Chart`: The loaded chart tree (metadata, files, sub-charts)
//! - `Packager`: Writer configured by `SaveOptions`
//! - `CoreError`: Everything that can go wrong while writing

pub mod archive;
pub mod chart;
pub mod directory;
pub mod error;
pub mod name;
pub mod options;

use std::path::{Path, PathBuf};

pub use archive::{ARCHIVE_EXTENSION, Packager, archive_file_name};
pub use chart::{
    CHARTFILE_NAME, CHARTS_DIR, Chart, ChartDependency, File, LOCKFILE_NAME, Lock, Maintainer,
    Metadata, SCHEMA_FILE_NAME, VALUES_FILE_NAME,
};
pub use error::{CoreError, Result};
pub use name::validate_name;
pub use options::{HEADER_MARKER, SaveOptions};

/// Archive `chart` into `out_dir` with default options
///
/// See [`Packager::save`].
pub fn save(chart: &Chart, out_dir: &Path) -> Result<PathBuf> {
    Packager::default().save(chart, out_dir)
}

/// Write `chart` as a directory under `dest` with default options
///
/// See [`Packager::save_dir`].
pub fn save_dir(chart: &Chart, dest: &Path) -> Result<PathBuf> {
    Packager::default().save_dir(chart, dest)
}
