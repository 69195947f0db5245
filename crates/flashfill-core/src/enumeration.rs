use eyre::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Case-insensitive allow-list of file extensions.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Extensions may be given with or without a leading dot.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// True when the file name ends in `.<ext>` for one of the allowed extensions.
    pub fn allows(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_ascii_lowercase();
        self.extensions.iter().any(|ext| {
            name.len() > ext.len()
                && name.ends_with(ext.as_str())
                && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
        })
    }
}

/// Recursive library scanner. Symlinked files are included and resolve to
/// their target; symlinked directories are not descended into. Unreadable
/// subtrees are skipped with a warning, and an unreadable root is an error.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    filter: ExtensionFilter,
}

impl LibraryScanner {
    pub fn new(filter: ExtensionFilter) -> Self {
        Self { filter }
    }

    /// Enumerate matching files beneath `root`.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut results = Vec::new();
        self.scan_streaming(root, |path| {
            results.push(path);
            Ok(())
        })?;
        Ok(results)
    }

    /// Enumerate matching files and invoke `visit` for each one.
    pub fn scan_streaming<F>(&self, root: &Path, mut visit: F) -> Result<()>
    where
        F: FnMut(PathBuf) -> Result<()>,
    {
        if !root.exists() {
            eyre::bail!("library root does not exist: {}", root.display());
        }

        for next in WalkDir::new(root).follow_links(false) {
            let entry = match next {
                Ok(e) => e,
                Err(err) => {
                    if err.depth() == 0 {
                        return Err(err)
                            .with_context(|| format!("read library root {}", root.display()));
                    }
                    log::warn!("skipping unreadable library entry: {err}");
                    continue;
                }
            };

            let path = entry.path();
            if !self.filter.allows(path) {
                continue;
            }

            if entry.path_is_symlink() {
                match fs::metadata(path) {
                    Ok(md) if md.is_file() => {}
                    Ok(_) => continue,
                    Err(err) => {
                        log::warn!("skipping dangling link {}: {err}", path.display());
                        continue;
                    }
                }
            } else if !entry.file_type().is_file() {
                continue;
            }

            visit(path.to_path_buf())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matches_case_insensitively() {
        let filter = ExtensionFilter::new([".mp3", "MP4"]);
        assert!(filter.allows(Path::new("/a/song.mp3")));
        assert!(filter.allows(Path::new("/a/SONG.MP3")));
        assert!(filter.allows(Path::new("/a/clip.Mp4")));
        assert!(!filter.allows(Path::new("/a/cover.jpg")));
        assert!(!filter.allows(Path::new("/a/mp3")));
        assert!(!filter.allows(Path::new("/a/notes.xmp3")));
    }

    #[test]
    fn scan_recurses_and_filters() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let base = temp.path();
        std::fs::create_dir_all(base.join("artist/album"))?;
        std::fs::write(base.join("artist/album/01.mp3"), b"abc")?;
        std::fs::write(base.join("artist/album/cover.jpg"), b"jpg")?;
        std::fs::write(base.join("top.MP4"), b"video")?;

        let scanner = LibraryScanner::new(ExtensionFilter::new(["mp3", "mp4"]));
        let mut entries = scanner.scan(base)?;
        entries.sort();

        assert_eq!(
            entries,
            vec![base.join("artist/album/01.mp3"), base.join("top.MP4")]
        );
        Ok(())
    }

    #[test]
    fn missing_root_is_an_error() {
        let scanner = LibraryScanner::new(ExtensionFilter::new(["mp3"]));
        assert!(scanner.scan(Path::new("/definitely/not/here")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_tracks_are_included() -> Result<()> {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir()?;
        let store = temp.path().join("store");
        let lib = temp.path().join("lib");
        std::fs::create_dir_all(&store)?;
        std::fs::create_dir_all(&lib)?;
        std::fs::write(store.join("song.mp3"), b"data")?;
        symlink(store.join("song.mp3"), lib.join("song.mp3"))?;
        symlink(store.join("gone.mp3"), lib.join("dangling.mp3"))?;

        let scanner = LibraryScanner::new(ExtensionFilter::new(["mp3"]));
        let entries = scanner.scan(&lib)?;
        assert_eq!(entries, vec![lib.join("song.mp3")]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_descended() -> Result<()> {
        use std::os::unix::fs::symlink;

        let temp = tempfile::tempdir()?;
        let store = temp.path().join("store");
        let lib = temp.path().join("lib");
        std::fs::create_dir_all(&store)?;
        std::fs::create_dir_all(&lib)?;
        std::fs::write(store.join("a.mp3"), b"a")?;
        std::fs::write(lib.join("b.mp3"), b"b")?;
        symlink(&store, lib.join("album.mp3"))?;

        let scanner = LibraryScanner::new(ExtensionFilter::new(["mp3"]));
        let entries = scanner.scan(&lib)?;
        assert_eq!(entries, vec![lib.join("b.mp3")]);
        Ok(())
    }
}
