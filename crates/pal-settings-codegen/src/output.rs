//! Atomic file output.
//!
//! Files are rendered in memory, written to a temporary file in the target
//! directory and renamed into place. A failed run leaves any previous
//! output untouched and no partial file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use pal_settings_core::SettingsError;
use pal_settings_schema::DocumentFormat;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::config::CodegenConfig;
use crate::emit::RenderedFiles;

fn io_error(path: &Path, err: std::io::Error) -> SettingsError {
    SettingsError::Io(std::io::Error::new(
        err.kind(),
        format!("{}: {err}", path.display()),
    ))
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn stage(path: &Path, contents: &[u8]) -> Result<NamedTempFile, SettingsError> {
    let dir = parent_dir(path);
    let mut file = NamedTempFile::new_in(dir).map_err(|e| io_error(dir, e))?;
    file.write_all(contents).map_err(|e| io_error(path, e))?;
    file.flush().map_err(|e| io_error(path, e))?;
    Ok(file)
}

fn commit(file: NamedTempFile, path: &Path) -> Result<(), SettingsError> {
    file.persist(path).map_err(|e| io_error(path, e.error))?;
    tracing::debug!(path = %path.display(), "wrote file");
    Ok(())
}

/// Write `contents` to `path` through a temporary file.
///
/// # Errors
///
/// `Io` naming the path.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SettingsError> {
    let staged = stage(path, contents)?;
    commit(staged, path)
}

/// Write the generated header and source into `config.outdir`.
///
/// Both files are staged before either is renamed, so a failure while
/// writing leaves neither.
///
/// # Errors
///
/// `Io` naming the path that failed.
pub fn write_generated(
    config: &CodegenConfig,
    files: &RenderedFiles,
) -> Result<(PathBuf, PathBuf), SettingsError> {
    std::fs::create_dir_all(&config.outdir).map_err(|e| io_error(&config.outdir, e))?;
    let header_path = config.header_path();
    let source_path = config.source_path();

    let header = stage(&header_path, files.header.as_bytes())?;
    let source = stage(&source_path, files.source.as_bytes())?;
    commit(header, &header_path)?;
    commit(source, &source_path)?;
    Ok((header_path, source_path))
}

/// Serialize a settings document as JSON or YAML, chosen by extension.
///
/// # Errors
///
/// `Schema` if the value cannot be serialized in that format.
pub fn render_document(path: &Path, doc: &Value) -> Result<String, SettingsError> {
    let serialized = match DocumentFormat::from_path(path) {
        DocumentFormat::Json => serde_json::to_string_pretty(doc)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| e.to_string()),
        DocumentFormat::Yaml => serde_yaml::to_string(doc).map_err(|e| e.to_string()),
    };
    serialized.map_err(|message| SettingsError::Schema {
        path: path.display().to_string(),
        message,
    })
}

/// Write a settings document as JSON or YAML, chosen by extension.
///
/// # Errors
///
/// Serialization or `Io` failures.
pub fn write_document(path: &Path, doc: &Value) -> Result<(), SettingsError> {
    let text = render_document(path, doc)?;
    write_atomic(path, text.as_bytes())
}
