//! Implementation of the `streamsub build` command.
//!
//! Packs the application containing a source file, submits it to the build
//! service, follows the build, then downloads the resulting bundles or starts
//! a job from each of them.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;

use streamsub_lib::archive::{ArchiveRequest, split_toolkit_roots};
use streamsub_lib::engine::load_job_config;
use streamsub_lib::spl::{self, inspect_file, qualify};
use streamsub_lib::types::BuildTarget;

use super::service::{Reported, ServiceArgs, cancel_on_interrupt, engine, print_outcome, runtime};
use crate::output::{OutputFormat, format_duration, print_stat};

/// What to build: a source file or build file, and the toolkits to bundle with it.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
  /// Source file declaring the main composite, or the application's Makefile
  pub file: PathBuf,

  /// Main composite to build, plain or fully qualified (default: the one declared in FILE)
  #[arg(long, value_name = "FQN")]
  pub composite: Option<String>,

  /// Toolkit directories to bundle, separated by ',' or ';'
  #[arg(long, value_name = "PATHS")]
  pub toolkits: Option<String>,
}

/// A build target together with the application directory it lives in.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Resolved {
  pub app_root: PathBuf,
  pub target: BuildTarget,
}

impl TargetArgs {
  pub(super) fn resolve(&self) -> Result<Resolved> {
    if !self.file.is_file() {
      bail!("File not found: {}", self.file.display());
    }
    let file = dunce::canonicalize(&self.file).with_context(|| format!("Failed to resolve {}", self.file.display()))?;

    if is_build_file(&file) {
      let app_root = file
        .parent()
        .with_context(|| format!("{} has no parent directory", file.display()))?
        .to_path_buf();
      return Ok(Resolved {
        app_root,
        target: BuildTarget::Makefile(file),
      });
    }

    let workspace: Vec<PathBuf> = std::env::current_dir()
      .ok()
      .and_then(|dir| dunce::canonicalize(dir).ok())
      .into_iter()
      .collect();
    let app_root = spl::find_app_root(&file, &workspace)
      .or_else(|| file.parent().map(Path::to_path_buf))
      .with_context(|| format!("Cannot determine the application directory of {}", file.display()))?;

    let fqn = match &self.composite {
      Some(composite) if composite.contains("::") => composite.clone(),
      Some(composite) => {
        let info = inspect_file(&file)?;
        qualify(info.namespace.as_deref(), composite)
      }
      None => {
        let info = inspect_file(&file)?;
        match info.fqns().as_slice() {
          [] => bail!(
            "No main composite found in {}. Use --composite to name one.",
            file.display()
          ),
          [fqn] => fqn.clone(),
          many => bail!(
            "{} declares several main composites ({}). Use --composite to pick one.",
            file.display(),
            many.join(", ")
          ),
        }
      }
    };

    debug!(app_root = %app_root.display(), target = %fqn, "resolved build target");
    Ok(Resolved {
      app_root,
      target: BuildTarget::Composite(fqn),
    })
  }

  pub(super) fn archive_request(&self, resolved: &Resolved) -> ArchiveRequest {
    let roots = self.toolkits.as_deref().map(split_toolkit_roots).unwrap_or_default();
    ArchiveRequest::new(&resolved.app_root, resolved.target.clone()).with_toolkit_roots(roots)
  }
}

fn is_build_file(path: &Path) -> bool {
  matches!(
    path.file_name().and_then(|n| n.to_str()),
    Some("Makefile") | Some("makefile")
  )
}

/// Execute the build command.
pub fn cmd_build(
  target: &TargetArgs,
  submit: bool,
  output: Option<PathBuf>,
  job_config: Option<PathBuf>,
  service: &ServiceArgs,
  format: OutputFormat,
) -> Result<()> {
  let resolved = target.resolve()?;
  let job_config = if submit {
    Some(load_job_config(job_config.as_deref()).context("Failed to load job configuration")?)
  } else {
    None
  };
  let request = target.archive_request(&resolved);

  let rt = runtime()?;
  rt.block_on(async {
    let start = Instant::now();
    let engine = engine(service, format, Some(resolved.app_root.clone()))?;
    cancel_on_interrupt(&engine);

    let source = engine.package(request).await.map_err(Reported)?;
    let outcome = match job_config {
      Some(job_config) => engine.build_and_submit(source.path, resolved.target, job_config).await,
      None => engine.build_and_download(source.path, resolved.target, output).await,
    }
    .map_err(Reported)?;

    print_outcome(&outcome, format)?;
    if !format.is_json() {
      print_stat(format, "Duration", &format_duration(start.elapsed()));
    }
    Ok::<_, anyhow::Error>(())
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::TempDir;

  fn args(file: PathBuf) -> TargetArgs {
    TargetArgs {
      file,
      composite: None,
      toolkits: None,
    }
  }

  fn app(temp: &TempDir, source: &str) -> PathBuf {
    let root = temp.path().join("app");
    fs::create_dir_all(root.join("sample")).unwrap();
    fs::write(root.join("info.xml"), "<info/>").unwrap();
    let file = root.join("sample/Main.spl");
    fs::write(&file, source).unwrap();
    file
  }

  #[test]
  fn detects_single_main_composite() {
    let temp = TempDir::new().unwrap();
    let file = app(&temp, "namespace sample;\ncomposite Main {\n}\n");

    let resolved = args(file).resolve().unwrap();

    assert_eq!(resolved.target, BuildTarget::Composite("sample::Main".to_string()));
    assert_eq!(resolved.app_root, dunce::canonicalize(temp.path().join("app")).unwrap());
  }

  #[test]
  fn plain_composite_is_qualified() {
    let temp = TempDir::new().unwrap();
    let file = app(&temp, "namespace sample;\ncomposite Main {\n}\ncomposite Other {\n}\n");
    let mut target = args(file);
    target.composite = Some("Other".to_string());

    assert_eq!(
      target.resolve().unwrap().target,
      BuildTarget::Composite("sample::Other".to_string())
    );
  }

  #[test]
  fn several_composites_need_a_choice() {
    let temp = TempDir::new().unwrap();
    let file = app(&temp, "composite A {\n}\ncomposite B {\n}\n");

    let err = args(file).resolve().unwrap_err();
    assert!(err.to_string().contains("--composite"));
  }

  #[test]
  fn makefile_builds_with_existing_build_file() {
    let temp = TempDir::new().unwrap();
    let makefile = temp.path().join("Makefile");
    fs::write(&makefile, "all:\n").unwrap();

    let resolved = args(makefile.clone()).resolve().unwrap();

    assert!(resolved.target.is_makefile());
    assert_eq!(resolved.app_root, dunce::canonicalize(temp.path()).unwrap());
  }

  #[test]
  fn toolkits_are_split() {
    let temp = TempDir::new().unwrap();
    let file = app(&temp, "namespace sample;\ncomposite Main {\n}\n");
    let mut target = args(file);
    target.toolkits = Some("/tk/a;/tk/b".to_string());

    let resolved = target.resolve().unwrap();
    let request = target.archive_request(&resolved);
    assert_eq!(request.toolkit_roots, vec![PathBuf::from("/tk/a"), PathBuf::from("/tk/b")]);
  }

  #[test]
  fn missing_file_fails() {
    let temp = TempDir::new().unwrap();
    assert!(args(temp.path().join("nope.spl")).resolve().is_err());
  }
}
