//! Source archive assembly.
//!
//! Packs an application directory into a zip archive the build service can
//! compile. Root-level files and directories matching the ignore lists are
//! skipped; everything else is added recursively. When toolkit roots are
//! configured the application moves under `{app}/` and every discovered
//! toolkit is bundled under `toolkits/{name}/`, with a root build file that
//! delegates into the application directory.
//!
//! For composite targets a build file invoking the compiler on the composite
//! is synthesized and any root-level build file of the application is left out.

mod ignore;
mod toolkits;
mod types;

pub use ignore::{IgnorePattern, IgnoreSet};
pub use toolkits::{Toolkit, discover_toolkits, split_toolkit_roots};
pub use types::*;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::consts::{DEFAULT_IGNORE_DIRS, DEFAULT_IGNORE_FILES, MAKEFILE_NAME, TOOLKITS_ARCHIVE_DIR};
use crate::types::BuildTarget;

/// Assemble a source archive for `request`.
///
/// Any stale file at the destination is replaced. A partially written archive
/// is removed before the error is returned.
pub fn assemble(request: &ArchiveRequest) -> Result<SourceArchive, ArchiveError> {
  if !request.app_root.is_dir() {
    return Err(ArchiveError::AppRootNotFound(request.app_root.clone()));
  }
  let app_root = dunce::canonicalize(&request.app_root).map_err(|source| ArchiveError::ReadDir {
    path: request.app_root.clone(),
    source,
  })?;

  let destination = match &request.destination {
    Some(path) => path.clone(),
    None => app_root.join(archive_file_name(&app_root, &request.target)),
  };

  if destination.exists() {
    fs::remove_file(&destination).map_err(|source| ArchiveError::RemoveStale {
      path: destination.clone(),
      source,
    })?;
  }

  let toolkits = discover_toolkits(&request.toolkit_roots)?;
  let nested = !request.toolkit_roots.is_empty();

  info!(
    app_root = %app_root.display(),
    target = %request.target.label(),
    toolkits = toolkits.len(),
    "assembling source archive"
  );

  match write_archive(&app_root, &destination, &request.target, &toolkits, nested) {
    Ok(entries) => {
      debug!(path = %destination.display(), entries = entries.len(), "source archive written");
      Ok(SourceArchive {
        path: destination,
        entries,
        toolkits: toolkits.into_iter().map(|t| t.name).collect(),
      })
    }
    Err(e) => {
      if let Err(remove_err) = fs::remove_file(&destination) {
        warn!(path = %destination.display(), error = %remove_err, "failed to remove partial archive");
      }
      Err(e)
    }
  }
}

/// Timestamped archive file name for a target.
///
/// `.build_{fqn}_{millis}.zip` for composites (with `::` replaced by `.`) and
/// `.build_make_{dir}_{millis}.zip` for build-file targets. Both match the
/// `.build*zip` ignore pattern, so an archive never packs a previous one.
pub fn archive_file_name(app_root: &Path, target: &BuildTarget) -> String {
  let millis = SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .map(|d| d.as_millis())
    .unwrap_or_default();

  match target {
    BuildTarget::Composite(fqn) => format!(".build_{}_{}.zip", fqn.replace("::", "."), millis),
    BuildTarget::Makefile(_) => format!(".build_make_{}_{}.zip", dir_name(app_root), millis),
  }
}

/// Content of the synthesized build file for a composite target.
pub fn composite_makefile(fqn: &str, nested: bool) -> String {
  let suffix = if nested { ":../toolkits" } else { "" };
  format!("main:\n\tsc -M {} -t $$STREAMS_INSTALL/toolkits{}\n", fqn, suffix)
}

/// Content of the root build file that delegates into the application directory.
pub fn delegating_makefile(app_dir: &str) -> String {
  format!("main:\n\tmake -C {}\n", app_dir)
}

fn dir_name(path: &Path) -> String {
  path
    .file_name()
    .map(|n| n.to_string_lossy().to_string())
    .unwrap_or_else(|| "app".to_string())
}

/// Archive writer that records entry names as they are added.
struct EntryWriter {
  zip: ZipWriter<BufWriter<File>>,
  options: SimpleFileOptions,
  entries: Vec<String>,
}

impl EntryWriter {
  fn create(path: &Path) -> Result<Self, ArchiveError> {
    let file = File::create(path).map_err(|source| ArchiveError::Create {
      path: path.to_path_buf(),
      source,
    })?;

    let options = SimpleFileOptions::default()
      .compression_method(zip::CompressionMethod::Deflated)
      .compression_level(Some(9))
      .last_modified_time(zip::DateTime::default())
      .unix_permissions(0o644);

    Ok(Self {
      zip: ZipWriter::new(BufWriter::new(file)),
      options,
      entries: Vec::new(),
    })
  }

  fn add_file(&mut self, name: String, source: &Path) -> Result<(), ArchiveError> {
    let mut input = File::open(source).map_err(|e| ArchiveError::AddFile {
      path: source.to_path_buf(),
      source: e,
    })?;
    self.zip.start_file(name.as_str(), self.options)?;
    std::io::copy(&mut input, &mut self.zip).map_err(|e| ArchiveError::AddFile {
      path: source.to_path_buf(),
      source: e,
    })?;
    self.entries.push(name);
    Ok(())
  }

  fn add_tree(&mut self, prefix: &str, dir: &Path) -> Result<(), ArchiveError> {
    for entry in WalkDir::new(dir)
      .min_depth(1)
      .follow_links(true)
      .sort_by_file_name()
    {
      let entry = entry.map_err(|e| ArchiveError::Walk {
        path: dir.to_path_buf(),
        message: e.to_string(),
      })?;
      if !entry.file_type().is_file() {
        continue;
      }
      let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
      self.add_file(format!("{}/{}", prefix, entry_name(relative)), entry.path())?;
    }
    Ok(())
  }

  fn add_text(&mut self, name: String, content: &str) -> Result<(), ArchiveError> {
    self.zip.start_file(name.as_str(), self.options)?;
    self.zip.write_all(content.as_bytes())?;
    self.entries.push(name);
    Ok(())
  }

  fn finish(self) -> Result<Vec<String>, ArchiveError> {
    let mut inner = self.zip.finish()?;
    inner.flush()?;
    Ok(self.entries)
  }
}

/// Forward-slash entry name for a relative path.
fn entry_name(relative: &Path) -> String {
  relative
    .components()
    .map(|c| c.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

fn write_archive(
  app_root: &Path,
  destination: &Path,
  target: &BuildTarget,
  toolkits: &[Toolkit],
  nested: bool,
) -> Result<Vec<String>, ArchiveError> {
  let app_dir = dir_name(app_root);
  let prefix = if nested { format!("{}/", app_dir) } else { String::new() };

  let mut ignore_files = IgnoreSet::new(DEFAULT_IGNORE_FILES);
  if let BuildTarget::Composite(_) = target {
    ignore_files = ignore_files.with_names(["Makefile", "makefile"]);
  }
  let ignore_dirs = IgnoreSet::new(DEFAULT_IGNORE_DIRS);

  let (files, dirs) = root_entries(app_root, destination)?;
  let mut writer = EntryWriter::create(destination)?;

  for (name, path) in files {
    if ignore_files.is_ignored(&name) {
      debug!(file = %name, "ignoring root file");
      continue;
    }
    writer.add_file(format!("{}{}", prefix, name), &path)?;
  }

  for (name, path) in dirs {
    if ignore_dirs.is_ignored(&name) {
      debug!(dir = %name, "ignoring root directory");
      continue;
    }
    writer.add_tree(&format!("{}{}", prefix, name), &path)?;
  }

  for toolkit in toolkits {
    writer.add_tree(&format!("{}/{}", TOOLKITS_ARCHIVE_DIR, toolkit.name), &toolkit.path)?;
  }

  if let BuildTarget::Composite(fqn) = target {
    writer.add_text(format!("{}{}", prefix, MAKEFILE_NAME), &composite_makefile(fqn, nested))?;
  }
  if nested {
    writer.add_text(MAKEFILE_NAME.to_string(), &delegating_makefile(&app_dir))?;
  }

  writer.finish()
}

type RootEntries = (Vec<(String, PathBuf)>, Vec<(String, PathBuf)>);

/// Split the application root into files and directories, sorted by name.
///
/// The destination archive itself is never listed.
fn root_entries(app_root: &Path, destination: &Path) -> Result<RootEntries, ArchiveError> {
  let read_err = |source| ArchiveError::ReadDir {
    path: app_root.to_path_buf(),
    source,
  };

  let mut files = Vec::new();
  let mut dirs = Vec::new();
  for entry in fs::read_dir(app_root).map_err(read_err)? {
    let entry = entry.map_err(read_err)?;
    let path = entry.path();
    if path == destination {
      continue;
    }
    let name = entry.file_name().to_string_lossy().to_string();
    if path.is_dir() {
      dirs.push((name, path));
    } else if path.is_file() {
      files.push((name, path));
    }
  }

  files.sort_by(|a, b| a.0.cmp(&b.0));
  dirs.sort_by(|a, b| a.0.cmp(&b.0));
  Ok((files, dirs))
}
