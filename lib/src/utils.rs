//! Small filesystem helpers shared by the config loader and the driver
//! binary, trimmed down from termusic's `utils.rs` to the parts that
//! have nothing to do with playing audio or transliterating track
//! titles.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

/// Resolve (and create, if missing) `<os config dir>/media-catalog-merger`.
pub fn get_app_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow!("failed to find os config dir."))?;
    path.push("media-catalog-merger");

    if !path.exists() {
        std::fs::create_dir_all(&path)?;
    }
    Ok(path)
}

/// Absolutize a given path with the current working directory.
///
/// This function, unlike [`std::fs::canonicalize`] does *not* hit the filesystem and so does not require the input path to exist yet.
///
/// Examples:
/// `./somewhere` -> `/absolute/./somewhere`
/// `.\somewhere` -> `C:\somewhere`
///
/// in the future consider replacing with [`std::path::absolute`] once stable
pub fn absolute_path(path: &Path) -> std::io::Result<Cow<'_, Path>> {
    if path.is_absolute() {
        Ok(Cow::Borrowed(path))
    } else {
        Ok(Cow::Owned(std::env::current_dir()?.join(path)))
    }
}

/// Absolutize a given path with the given base.
///
/// `base` is expected to be absoulte!
///
/// This function, unlike [`std::fs::canonicalize`] does *not* hit the filesystem and so does not require the input path to exist yet.
///
/// Examples:
/// `./somewhere` -> `/absolute/./somewhere`
/// `.\somewhere` -> `C:\somewhere`
///
/// in the future consider replacing with [`std::path::absolute`] once stable
pub fn absolute_path_base<'a>(path: &'a Path, base: &Path) -> Cow<'a, Path> {
    if path.is_absolute() {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(base.join(path))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{absolute_path, absolute_path_base};

    #[test]
    fn absolute_path_passes_through_absolute_input() {
        let input = std::path::Path::new("/already/absolute");
        let resolved = absolute_path(input).unwrap();
        assert_eq!(resolved.as_ref(), input);
    }

    #[test]
    fn absolute_path_joins_relative_input_with_cwd() {
        let resolved = absolute_path(std::path::Path::new("relative/child")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("relative/child"));
    }

    #[test]
    fn absolute_path_base_passes_through_absolute_input() {
        let base = std::path::Path::new("/base");
        let input = std::path::Path::new("/already/absolute");
        assert_eq!(absolute_path_base(input, base).as_ref(), input);
    }

    #[test]
    fn absolute_path_base_joins_relative_input_with_base() {
        let base = std::path::Path::new("/base");
        let resolved = absolute_path_base(std::path::Path::new("child"), base);
        assert_eq!(resolved.as_ref(), std::path::Path::new("/base/child"));
    }
}
