use std::path::{Component, Path, PathBuf};

use anyhow::{Result, bail};

pub const MART_FILE_NAME: &str = "catalog.sqlite";
const DEFAULT_OUT_SEGMENTS: [&str; 2] = [".cinemart", "output"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    pub home_dir: PathBuf,
    pub cwd: PathBuf,
    pub out_dir: PathBuf,
}

impl RuntimePaths {
    /// Location of the sqlite mart every command reads or writes.
    #[must_use]
    pub fn mart_path(&self) -> PathBuf {
        self.out_dir.join(MART_FILE_NAME)
    }
}

pub fn resolve_runtime_paths(
    home_dir: &Path,
    cwd: &Path,
    out_dir_override: Option<&Path>,
) -> Result<RuntimePaths> {
    for (label, path) in [("home_dir", home_dir), ("cwd", cwd)] {
        if !path.is_absolute() {
            bail!("{label} must be absolute: {}", path.display());
        }
    }

    let home_dir = normalize(home_dir);
    let cwd = normalize(cwd);
    let out_dir = match out_dir_override {
        Some(path) => {
            let expanded = expand_home(path, &home_dir)?;
            let absolute = if expanded.is_absolute() {
                expanded
            } else {
                cwd.join(expanded)
            };
            normalize(&absolute)
        }
        None => DEFAULT_OUT_SEGMENTS
            .iter()
            .fold(home_dir.clone(), |dir, segment| dir.join(segment)),
    };

    Ok(RuntimePaths {
        home_dir,
        cwd,
        out_dir,
    })
}

/// Expand a leading `~` against the resolved home directory. `~user` forms
/// are rejected rather than silently misread.
fn expand_home(path: &Path, home_dir: &Path) -> Result<PathBuf> {
    let mut components = path.components();
    let Some(Component::Normal(first)) = components.next() else {
        return Ok(path.to_path_buf());
    };

    if first == "~" {
        let mut expanded = home_dir.to_path_buf();
        for component in components {
            expanded.push(component.as_os_str());
        }
        return Ok(expanded);
    }
    if first
        .to_str()
        .is_some_and(|segment| segment.starts_with('~'))
    {
        bail!(
            "unsupported home expansion syntax (only `~` and `~/...` are supported): {}",
            path.display()
        );
    }
    Ok(path.to_path_buf())
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !resolved.pop() {
                    resolved.push(component.as_os_str());
                }
            }
            other => resolved.push(other.as_os_str()),
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::resolve_runtime_paths;
    use std::path::Path;

    #[test]
    fn defaults_out_dir_under_cinemart_output() {
        let paths = resolve_runtime_paths(Path::new("/home/tester"), Path::new("/work/repo"), None)
            .expect("paths should resolve");

        assert_eq!(paths.out_dir, Path::new("/home/tester/.cinemart/output"));
        assert_eq!(
            paths.mart_path(),
            Path::new("/home/tester/.cinemart/output/catalog.sqlite")
        );
    }

    #[test]
    fn expands_tilde_override_against_home_dir() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("~/marts/movies")),
        )
        .expect("tilde override should resolve");

        assert_eq!(paths.out_dir, Path::new("/home/tester/marts/movies"));
    }

    #[test]
    fn resolves_relative_override_against_cwd() {
        let paths = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("./artifacts/../artifacts/mart")),
        )
        .expect("relative override should resolve");

        assert_eq!(paths.out_dir, Path::new("/work/repo/artifacts/mart"));
    }

    #[test]
    fn rejects_non_absolute_home_dir_and_cwd() {
        let err = resolve_runtime_paths(Path::new("home/tester"), Path::new("/work/repo"), None)
            .expect_err("relative home dir must fail");
        assert!(err.to_string().contains("home_dir must be absolute"));

        let err = resolve_runtime_paths(Path::new("/home/tester"), Path::new("work"), None)
            .expect_err("relative cwd must fail");
        assert!(err.to_string().contains("cwd must be absolute"));
    }

    #[test]
    fn rejects_tilde_username_syntax() {
        let err = resolve_runtime_paths(
            Path::new("/home/tester"),
            Path::new("/work/repo"),
            Some(Path::new("~someone/out")),
        )
        .expect_err("~username syntax must fail");

        assert!(
            err.to_string()
                .contains("unsupported home expansion syntax"),
            "unexpected error: {err}"
        );
    }
}
