//! File discovery and loading.
//!
//! Each [`SearchPath`] resolves to zero or more directories. `Platform`,
//! `Home`, `Cwd` and `Path` give one directory each; `Env(var)` expands
//! inline into every directory listed in the variable, so a list such as
//! `[Platform, Env(CONFIG_PATH_VAR)]` lets the environment add directories
//! with the highest priority.
//!
//! After expansion every directory is checked for `{dir}/{file_name}`.
//! Missing files are skipped silently; only real I/O errors (permissions,
//! etc.) are propagated.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SectionalError;
use crate::types::SearchPath;

/// Colon-separated directories searched for configuration files.
pub const CONFIG_PATH_VAR: &str = "SECTIONAL_CONFIG_PATH";
/// Colon-separated directories searched for the schema file.
pub const SCHEMA_PATH_VAR: &str = "SECTIONAL_SCHEMA_PATH";

type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Split a colon-separated directory list, skipping empty entries.
pub fn split_dirs(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Resolve one [`SearchPath`] to the directories it names.
///
/// `app_name` is used by `SearchPath::Platform` to build the platform config
/// directory (e.g. `~/.config/{app_name}/` on Linux). Paths that cannot be
/// resolved (no home directory, unset variable) give an empty list.
pub fn resolve_search_path(sp: &SearchPath, app_name: &str) -> Vec<PathBuf> {
    resolve_search_path_with(sp, app_name, &process_env)
}

fn resolve_search_path_with(sp: &SearchPath, app_name: &str, env: EnvLookup<'_>) -> Vec<PathBuf> {
    let single = match sp {
        SearchPath::Platform => directories::ProjectDirs::from("", "", app_name)
            .map(|proj| proj.config_dir().to_path_buf()),
        SearchPath::Home(subdir) => {
            directories::UserDirs::new().map(|user| user.home_dir().join(subdir))
        }
        SearchPath::Cwd => std::env::current_dir().ok(),
        SearchPath::Path(p) => Some(p.clone()),
        SearchPath::Env(var) => return env(var).map(|v| split_dirs(&v)).unwrap_or_default(),
    };
    single.into_iter().collect()
}

/// Expand a priority-ascending list of search paths into directories,
/// keeping the order.
pub fn expand_search_paths(paths: &[SearchPath], app_name: &str) -> Vec<PathBuf> {
    expand_search_paths_with(paths, app_name, &process_env)
}

fn expand_search_paths_with(
    paths: &[SearchPath],
    app_name: &str,
    env: EnvLookup<'_>,
) -> Vec<PathBuf> {
    paths
        .iter()
        .flat_map(|sp| resolve_search_path_with(sp, app_name, env))
        .collect()
}

/// Read `{dir}/{file_name}`, `None` when it does not exist.
fn read_if_present(path: &Path) -> Result<Option<String>, SectionalError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "found file");
            Ok(Some(content))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SectionalError::IoError {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Every existing `{dir}/{file_name}`, in directory order.
pub fn load_all(dirs: &[PathBuf], file_name: &str) -> Result<Vec<(PathBuf, String)>, SectionalError> {
    let mut results = Vec::new();
    for dir in dirs {
        let path = dir.join(file_name);
        if let Some(content) = read_if_present(&path)? {
            results.push((path, content));
        }
    }
    Ok(results)
}

/// The highest-priority existing `{dir}/{file_name}`: the list is searched
/// from its end.
pub fn load_first_match(
    dirs: &[PathBuf],
    file_name: &str,
) -> Result<Option<(PathBuf, String)>, SectionalError> {
    for dir in dirs.iter().rev() {
        let path = dir.join(file_name);
        if let Some(content) = read_if_present(&path)? {
            return Ok(Some((path, content)));
        }
    }
    Ok(None)
}

/// Discover and read every config file along `search_paths`.
pub fn load_config_files(
    search_paths: &[SearchPath],
    file_name: &str,
    app_name: &str,
) -> Result<Vec<(PathBuf, String)>, SectionalError> {
    let dirs = expand_search_paths(search_paths, app_name);
    load_all(&dirs, file_name)
}

/// The file `Set`/`Unset` write to. `Env` picks the last directory the
/// variable lists.
pub fn resolve_persist_path(
    persist: &SearchPath,
    file_name: &str,
    app_name: &str,
) -> Result<PathBuf, SectionalError> {
    resolve_persist_path_with(persist, file_name, app_name, &process_env)
}

fn resolve_persist_path_with(
    persist: &SearchPath,
    file_name: &str,
    app_name: &str,
    env: EnvLookup<'_>,
) -> Result<PathBuf, SectionalError> {
    resolve_search_path_with(persist, app_name, env)
        .pop()
        .map(|dir| dir.join(file_name))
        .ok_or(SectionalError::NoPersistPath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn resolve_explicit_path() {
        let p = PathBuf::from("/tmp/test");
        assert_eq!(resolve_search_path(&SearchPath::Path(p.clone()), "x"), vec![p]);
    }

    #[test]
    fn resolve_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolve_search_path(&SearchPath::Cwd, "x"), vec![cwd]);
    }

    #[test]
    fn split_dirs_skips_empty_entries() {
        assert_eq!(
            split_dirs("/a::/b: :"),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert!(split_dirs("").is_empty());
    }

    #[test]
    fn env_expands_inline() {
        let env = |var: &str| (var == CONFIG_PATH_VAR).then(|| "/one:/two".to_string());
        let paths = vec![
            SearchPath::Path(PathBuf::from("/base")),
            SearchPath::Env(CONFIG_PATH_VAR),
            SearchPath::Env(SCHEMA_PATH_VAR),
        ];
        assert_eq!(
            expand_search_paths_with(&paths, "x", &env),
            vec![
                PathBuf::from("/base"),
                PathBuf::from("/one"),
                PathBuf::from("/two")
            ]
        );
    }

    #[test]
    fn load_no_files_exist() {
        let dir = TempDir::new().unwrap();
        let dirs = vec![dir.path().to_path_buf()];
        assert!(load_all(&dirs, "nonexistent.toml").unwrap().is_empty());
    }

    #[test]
    fn load_multiple_files_in_order() {
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();
        let dir3 = TempDir::new().unwrap();
        fs::write(dir1.path().join("app.toml"), "host = \"a\"\n").unwrap();
        fs::write(dir3.path().join("app.toml"), "port = 1000\n").unwrap();

        let paths = vec![
            SearchPath::Path(dir1.path().to_path_buf()),
            SearchPath::Path(dir2.path().to_path_buf()),
            SearchPath::Path(dir3.path().to_path_buf()),
        ];
        let files = load_config_files(&paths, "app.toml", "test").unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].0, dir1.path().join("app.toml"));
        assert!(files[1].1.contains("port"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_returns_io_error() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let file_path = dir.path().join("app.toml");
        fs::write(&file_path, "port = 1\n").unwrap();
        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o000)).unwrap();

        // root can read anything; only check when the permission bit bites
        let readable = fs::read_to_string(&file_path).is_ok();
        let result = load_all(&[dir.path().to_path_buf()], "app.toml");
        if !readable {
            assert!(matches!(result, Err(SectionalError::IoError { .. })));
        }

        fs::set_permissions(&file_path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn first_match_prefers_the_end_of_the_list() {
        let dir1 = TempDir::new().unwrap();
        let dir2 = TempDir::new().unwrap();
        let dir3 = TempDir::new().unwrap();
        fs::write(dir1.path().join("s.cfg"), "low").unwrap();
        fs::write(dir2.path().join("s.cfg"), "high").unwrap();

        let dirs = vec![
            dir1.path().to_path_buf(),
            dir2.path().to_path_buf(),
            dir3.path().to_path_buf(),
        ];
        let (path, content) = load_first_match(&dirs, "s.cfg").unwrap().unwrap();
        assert_eq!(path, dir2.path().join("s.cfg"));
        assert_eq!(content, "high");
        assert!(load_first_match(&dirs, "other.cfg").unwrap().is_none());
    }

    #[test]
    fn persist_path_explicit() {
        let p = PathBuf::from("/tmp/configs");
        let result = resolve_persist_path(&SearchPath::Path(p.clone()), "app.toml", "test");
        assert_eq!(result.unwrap(), p.join("app.toml"));
    }

    #[test]
    fn persist_path_from_env_takes_the_last_entry() {
        let env = |_: &str| Some("/a:/b".to_string());
        let result =
            resolve_persist_path_with(&SearchPath::Env(CONFIG_PATH_VAR), "app.toml", "x", &env);
        assert_eq!(result.unwrap(), PathBuf::from("/b/app.toml"));

        let result =
            resolve_persist_path_with(&SearchPath::Env(CONFIG_PATH_VAR), "app.toml", "x", &no_env);
        assert!(matches!(result, Err(SectionalError::NoPersistPath)));
    }
}
