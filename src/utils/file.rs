use relative_path::RelativePath;
use std::path::{Path, PathBuf};

/// Resolve a path from a config value
///
/// Absolute paths are kept. Relative paths are joined onto `base_dir` and
/// normalized, so `./build/../build/x.iso` becomes `<base_dir>/build/x.iso`.
pub fn resolve_path<P>(value: &str, base_dir: P) -> PathBuf
where
    P: AsRef<Path>,
{
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        RelativePath::new(value).to_logical_path(base_dir)
    }
}

/// Find absolute path to executable
///
/// A name containing a path separator is resolved against `in_dir`.
/// Otherwise, first looks for executable in local directory (`in_dir`),
/// then in PATH.
pub fn find_executable_path<P>(binary_name: &str, in_dir: P) -> Result<PathBuf, which::Error>
where
    P: AsRef<Path>,
{
    if binary_name.contains(['/', '\\']) {
        let candidate = resolve_path(binary_name, &in_dir);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    let paths = in_dir.as_ref().as_os_str();

    let mut local_executables = which::which_in_global(binary_name, Some(paths))?;
    if let Some(path) = local_executables.next() {
        return Ok(path);
    }

    which::which(binary_name)
}

/// Find an executable, preferring `bin_dir` for bare names
///
/// Falls back to [`find_executable_path`] when `bin_dir` does not hold it.
pub fn find_executable_path_in<B, P>(
    binary_name: &str,
    bin_dir: B,
    in_dir: P,
) -> Result<PathBuf, which::Error>
where
    B: AsRef<Path>,
    P: AsRef<Path>,
{
    if !binary_name.contains(['/', '\\']) {
        let bin_dir = bin_dir.as_ref().as_os_str();
        if let Ok(path) = which::which_in(binary_name, Some(bin_dir), in_dir.as_ref()) {
            return Ok(path);
        }
    }

    find_executable_path(binary_name, in_dir)
}

/// First existing file matching a glob pattern
///
/// A pattern without wildcards matches itself if the file exists.
pub fn first_match<P>(pattern: P) -> Result<Option<PathBuf>, glob::PatternError>
where
    P: AsRef<Path>,
{
    let pattern = pattern.as_ref().to_string_lossy();
    let mut matches = glob::glob(&pattern)?
        .filter_map(Result::ok)
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    matches.sort();

    Ok(matches.into_iter().next())
}

/// Show `path` relative to `base` when possible
pub fn display_path<P, B>(path: P, base: B) -> String
where
    P: AsRef<Path>,
    B: AsRef<Path>,
{
    let path = path.as_ref();
    match pathdiff::diff_paths(path, base) {
        Some(relative) if !relative.starts_with("..") && relative.as_os_str() != "" => {
            relative.display().to_string()
        }
        _ => path.display().to_string(),
    }
}
