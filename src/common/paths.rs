//! Configuration and scenario path handling

use std::path::{Path, PathBuf};

/// Application name used for platform directories
const APP_NAME: &str = "tutorial-harness";

/// Placeholder in script paths replaced by the tutorials directory
pub const TUTORIALS_DIR_PLACEHOLDER: &str = "@TUTORIALS_DIR@";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/tutorial-harness/`
/// - macOS: `~/Library/Application Support/tutorial-harness/`
/// - Windows: `%APPDATA%\tutorial-harness\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Expand `@TUTORIALS_DIR@` and resolve other relative paths against `base_dir`
///
/// The tutorials directory is taken as given, so a relative one stays
/// relative to the current directory. Returns `None` when the path uses
/// the placeholder but no tutorials directory is configured.
pub fn resolve_script_path(
    raw: &Path,
    base_dir: &Path,
    tutorials_dir: Option<&Path>,
) -> Option<PathBuf> {
    let raw_str = raw.to_string_lossy();
    if raw_str.contains(TUTORIALS_DIR_PLACEHOLDER) {
        let dir = tutorials_dir?;
        let expanded = raw_str.replace(TUTORIALS_DIR_PLACEHOLDER, &dir.to_string_lossy());
        return Some(PathBuf::from(expanded));
    }

    if raw.is_relative() {
        Some(base_dir.join(raw))
    } else {
        Some(raw.to_path_buf())
    }
}

/// Make a relative directory absolute against the current directory
pub fn absolute_from_cwd(dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        return dir;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(dir),
        Err(_) => dir,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_dir_is_valid() {
        let dir = config_dir();
        assert!(dir.is_some());
    }

    #[test]
    fn test_placeholder_is_expanded() {
        let path = resolve_script_path(
            Path::new("@TUTORIALS_DIR@/error_analysis/error_analysis_part1.py"),
            Path::new("/scenarios"),
            Some(Path::new("/opt/tutorials")),
        );
        assert_eq!(
            path,
            Some(PathBuf::from("/opt/tutorials/error_analysis/error_analysis_part1.py"))
        );
    }

    #[test]
    fn test_relative_tutorials_dir_ignores_scenario_dir() {
        let path = resolve_script_path(
            Path::new("@TUTORIALS_DIR@/part2.py"),
            Path::new("/scenarios"),
            Some(Path::new("tutorials")),
        );
        assert_eq!(path, Some(PathBuf::from("tutorials/part2.py")));
    }

    #[test]
    fn test_absolute_from_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_from_cwd(PathBuf::from("tutorials")), cwd.join("tutorials"));
        assert_eq!(
            absolute_from_cwd(PathBuf::from("/opt/tutorials")),
            PathBuf::from("/opt/tutorials")
        );
    }

    #[test]
    fn test_placeholder_without_dir() {
        let path = resolve_script_path(Path::new("@TUTORIALS_DIR@/x.py"), Path::new("."), None);
        assert!(path.is_none());
    }

    #[test]
    fn test_plain_relative_path() {
        let path = resolve_script_path(Path::new("fixtures/run.sh"), Path::new("/tests"), None);
        assert_eq!(path, Some(PathBuf::from("/tests/fixtures/run.sh")));
    }
}
