//! Chart archive creation
//!
//! A chart tree is written as a single `<name>-<version>.tgz`: a gzip stream
//! wrapping one tar stream. Every entry lives under `<name>/`, and
//! dependencies are flattened into the same stream under
//! `<name>/charts/<dep>/...` so the archive extracts as one unit.
//!
//! Entry order per chart:
//! - Chart.yaml
//! - Chart.lock (if present)
//! - values.yaml (if present)
//! - values.schema.json (if present, must be valid JSON)
//! - templates, in chart order
//! - files, in chart order
//! - each dependency, recursively

use chrono::Utc;
use flate2::GzBuilder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::{debug, trace, warn};

use crate::chart::{
    CHARTFILE_NAME, CHARTS_DIR, Chart, LOCKFILE_NAME, SCHEMA_FILE_NAME, VALUES_FILE_NAME,
};
use crate::directory::create_dir_all;
use crate::error::{CoreError, Result};
use crate::name::validate_name;
use crate::options::{HEADER_MARKER, SaveOptions};

/// File extension of chart archives
pub const ARCHIVE_EXTENSION: &str = "tgz";

/// Permission bits of every archive entry
const ENTRY_MODE: u32 = 0o644;

/// Canonical archive filename, `<name>-<version>.tgz`
#[must_use]
pub fn archive_file_name(chart: &Chart) -> String {
    format!("{}-{}.{}", chart.name(), chart.version(), ARCHIVE_EXTENSION)
}

/// Writes charts to directories and archives
#[derive(Debug, Clone, Default)]
pub struct Packager {
    options: SaveOptions,
}

impl Packager {
    pub fn new(options: SaveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SaveOptions {
        &self.options
    }

    /// Write `chart` to `<out_dir>/<name>-<version>.tgz`
    ///
    /// `out_dir` is created if missing. Returns the absolute archive path.
    /// On any failure after the file was created, the partial file is removed
    /// before the error is returned.
    pub fn save(&self, chart: &Chart, out_dir: &Path) -> Result<PathBuf> {
        validate_name(chart.name())?;
        chart.validate()?;

        ensure_output_dir(out_dir)?;
        let filename = out_dir.join(archive_file_name(chart));
        let path = std::path::absolute(&filename).map_err(|e| CoreError::io(&filename, e))?;

        debug!(
            chart = chart.name(),
            version = chart.version(),
            path = %path.display(),
            "writing chart archive"
        );

        let file = File::create(&path).map_err(|e| CoreError::io(&path, e))?;
        let rollback = RemoveOnDrop::new(&path);

        let encoder = GzBuilder::new()
            .extra(HEADER_MARKER)
            .comment(self.options.comment.replace('\0', ""))
            .write(BufWriter::new(file), self.options.compression());
        let mut builder = Builder::new(encoder);

        let written = write_chart_contents(&mut builder, chart, "", self.mod_time());
        // Layers are closed on both paths so the file is released before removal.
        let closed = close_layers(builder).map_err(|e| CoreError::io(&path, e));

        written.and(closed)?;
        rollback.disarm();

        debug!(path = %path.display(), "chart archive written");
        Ok(path)
    }

    fn mod_time(&self) -> ModTime {
        if self.options.reproducible {
            ModTime::Epoch
        } else {
            ModTime::Now
        }
    }
}

/// Timestamp policy for archive entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ModTime {
    /// Wall-clock time at the moment each entry is written
    Now,
    Epoch,
}

impl ModTime {
    fn stamp(self) -> u64 {
        match self {
            ModTime::Now => Utc::now().timestamp().max(0) as u64,
            ModTime::Epoch => 0,
        }
    }
}

/// Removes a file when dropped, unless disarmed
struct RemoveOnDrop {
    path: PathBuf,
    armed: bool,
}

impl RemoveOnDrop {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed partial chart archive"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                "failed to remove partial chart archive: {}",
                e
            ),
        }
    }
}

/// Finish tar, then gzip, then flush the file
fn close_layers(builder: Builder<GzEncoder<BufWriter<File>>>) -> std::io::Result<()> {
    let encoder = builder.into_inner()?;
    let writer = encoder.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    drop(file);
    Ok(())
}

fn ensure_output_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CoreError::DestinationConflict {
            path: dir.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => create_dir_all(dir),
        Err(e) => Err(CoreError::io(dir, e)),
    }
}

/// Append `chart` and all of its dependencies under `prefix`
pub(crate) fn write_chart_contents<W: Write>(
    out: &mut Builder<W>,
    chart: &Chart,
    prefix: &str,
    mtime: ModTime,
) -> Result<()> {
    validate_name(chart.name())?;
    let base = join_entry(prefix, chart.name());

    let metadata = serde_yaml::to_string(&chart.metadata)?;
    write_entry(out, &join_entry(&base, CHARTFILE_NAME), metadata.as_bytes(), mtime)?;

    if let Some(lock) = &chart.lock {
        let lock = serde_yaml::to_string(lock)?;
        write_entry(out, &join_entry(&base, LOCKFILE_NAME), lock.as_bytes(), mtime)?;
    }

    for values in chart.raw.iter().filter(|f| f.name == VALUES_FILE_NAME) {
        write_entry(out, &join_entry(&base, VALUES_FILE_NAME), &values.data, mtime)?;
    }

    if let Some(schema) = &chart.schema {
        let path = join_entry(&base, SCHEMA_FILE_NAME);
        serde_json::from_slice::<serde::de::IgnoredAny>(schema).map_err(|source| {
            CoreError::MalformedSchema {
                path: PathBuf::from(&path),
                source,
            }
        })?;
        write_entry(out, &path, schema, mtime)?;
    }

    for file in chart.templates.iter().chain(&chart.files) {
        write_entry(out, &join_entry(&base, &file.name), &file.data, mtime)?;
    }

    let charts = join_entry(&base, CHARTS_DIR);
    for dep in &chart.dependencies {
        write_chart_contents(out, dep, &charts, mtime)
            .map_err(|e| CoreError::in_dependency(join_entry(&charts, dep.name()), e))?;
    }

    Ok(())
}

/// Append one regular file entry
pub(crate) fn write_entry<W: Write>(
    out: &mut Builder<W>,
    path: &str,
    body: &[u8],
    mtime: ModTime,
) -> Result<()> {
    let mut header = Header::new_gnu();
    header.set_entry_type(EntryType::Regular);
    header.set_size(body.len() as u64);
    header.set_mode(ENTRY_MODE);
    header.set_mtime(mtime.stamp());

    trace!(path, size = body.len(), "appending archive entry");
    out.append_data(&mut header, path, body)
        .map_err(|e| CoreError::io(path, e))
}

/// Join archive path segments with `/`, normalizing `name` to forward slashes
fn join_entry(base: &str, name: &str) -> String {
    let rel = to_slash(Path::new(name));
    if base.is_empty() {
        rel
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Forward-slash form of a relative path; roots and `.` segments are dropped
fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
