use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub const DEFAULT_CATALOG_FILE: &str = "catalog.sqlite";
pub const DEFAULT_PACKS_DIR: &str = "analytics_out/packs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub catalog_path: PathBuf,
    pub packs_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PathOverrides<'a> {
    pub catalog: Option<&'a Path>,
    pub packs_dir: Option<&'a Path>,
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    overrides: PathOverrides<'_>,
) -> Result<RuntimePaths> {
    if !home_dir.is_absolute() {
        bail!("home_dir must be absolute: {}", home_dir.display());
    }
    if !cwd.is_absolute() {
        bail!("cwd must be absolute: {}", cwd.display());
    }

    let home_dir = normalize_lexical(home_dir);
    let cwd = normalize_lexical(cwd);
    let catalog_path = match overrides.catalog {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => cwd.join(DEFAULT_CATALOG_FILE),
    };
    let packs_dir = match overrides.packs_dir {
        Some(path) => resolve_user_path(path, &home_dir, &cwd)?,
        None => cwd.join(DEFAULT_PACKS_DIR),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        catalog_path: normalize_lexical(&catalog_path),
        packs_dir: normalize_lexical(&packs_dir),
    })
}

fn resolve_user_path(path: &Path, home_dir: &Path, cwd: &Path) -> Result<PathBuf> {
    let expanded = expand_tilde(path, home_dir)?;
    let resolved = if expanded.is_absolute() {
        expanded
    } else {
        cwd.join(expanded)
    };

    Ok(normalize_lexical(&resolved))
}

fn expand_tilde(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => {
            let mut expanded = home_dir.to_path_buf();
            for component in components {
                expanded.push(component.as_os_str());
            }
            Ok(expanded)
        }
        Some(Component::Normal(first))
            if first
                .to_str()
                .is_some_and(|segment| segment.starts_with('~')) =>
        {
            bail!(
                "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
                path.display()
            )
        }
        _ => Ok(path.to_path_buf()),
    }
}

fn normalize_lexical(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component.as_os_str());
                }
            }
            _ => normalized.push(component.as_os_str()),
        }
    }

    normalized
}
