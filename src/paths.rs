use color_eyre::eyre::bail;
use std::path::{Path, PathBuf};

pub const BINARY_NAME: &str = "picoclaw";

#[derive(Debug, Clone)]
pub struct Paths {
    binary: PathBuf,
    config: PathBuf,
}

impl Paths {
    /// Resolve the gateway binary and config file, preferring explicit
    /// overrides and falling back to discovery from the working directory.
    pub fn new(binary: Option<PathBuf>, config: Option<PathBuf>) -> color_eyre::Result<Self> {
        let cwd = std::env::current_dir()?;
        let config = match config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let binary = match binary {
            Some(path) if path.is_relative() => cwd.join(path),
            Some(path) => path,
            None => find_binary(&cwd),
        };
        Ok(Self { binary, config })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn config(&self) -> &Path {
        &self.config
    }
}

pub fn default_config_path() -> color_eyre::Result<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        bail!("could not determine home directory");
    };
    Ok(home.join(".picoclaw").join("config.json"))
}

fn binary_file_name() -> String {
    format!("{BINARY_NAME}{}", std::env::consts::EXE_SUFFIX)
}

/// `build/picoclaw`, then `./picoclaw`, then `picoclaw` on `PATH`. When none
/// exist the `build/` location is returned so the dashboard can report it.
pub fn find_binary(cwd: &Path) -> PathBuf {
    let name = binary_file_name();
    let build = cwd.join("build").join(&name);
    let local = cwd.join(&name);

    if build.exists() {
        return build;
    }
    if local.exists() {
        return local;
    }
    if let Ok(found) = which::which(BINARY_NAME) {
        return found;
    }
    build
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_under_home() {
        let path = default_config_path().unwrap();
        assert!(path.ends_with(".picoclaw/config.json"), "got: {}", path.display());
    }

    #[test]
    fn test_find_binary_prefers_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("build")).unwrap();
        std::fs::write(dir.path().join("build").join(binary_file_name()), "").unwrap();
        std::fs::write(dir.path().join(binary_file_name()), "").unwrap();

        let found = find_binary(dir.path());
        assert_eq!(found, dir.path().join("build").join(binary_file_name()));
    }

    #[test]
    fn test_find_binary_falls_back_to_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(binary_file_name()), "").unwrap();

        let found = find_binary(dir.path());
        assert_eq!(found, dir.path().join(binary_file_name()));
    }

    #[test]
    fn test_find_binary_reports_build_path_when_missing() {
        if which::which(BINARY_NAME).is_ok() {
            return; // a real install on PATH wins
        }
        let dir = tempfile::tempdir().unwrap();
        let found = find_binary(dir.path());
        assert_eq!(found, dir.path().join("build").join(binary_file_name()));
        assert!(found.is_absolute());
    }

    #[test]
    fn test_explicit_paths_win() {
        let paths = Paths::new(
            Some(PathBuf::from("/opt/picoclaw/bin/picoclaw")),
            Some(PathBuf::from("/etc/picoclaw.json")),
        )
        .unwrap();
        assert_eq!(paths.binary(), Path::new("/opt/picoclaw/bin/picoclaw"));
        assert_eq!(paths.config(), Path::new("/etc/picoclaw.json"));
    }

    #[test]
    fn test_relative_binary_is_absolutised() {
        let paths = Paths::new(Some(PathBuf::from("bin/picoclaw")), None).unwrap();
        assert!(paths.binary().is_absolute());
        assert!(paths.binary().ends_with("bin/picoclaw"));
    }
}
