//! Filename conventions (§3, §6, and the disambiguation Open Question in
//! §9): the `.miniz` suffix, and the exact rule used to dodge a collision
//! with an existing file.

use std::path::{Path, PathBuf};

pub const SUFFIX: &str = ".miniz";

pub fn is_compressed(path: &Path) -> bool {
    path.extension().map(|ext| ext == "miniz").unwrap_or(false)
}

/// Appends `.miniz` to `path`.
pub fn compressed_name(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(SUFFIX);
    PathBuf::from(name)
}

/// Strips `.miniz` from `path`. Caller guarantees `is_compressed(path)`.
pub fn decompressed_name(path: &Path) -> PathBuf {
    path.with_extension("")
}

/// Picks an output path that does not already exist. If `candidate` exists,
/// inserts a numeric disambiguation suffix (1, 2, ...) just before the
/// *first* `.` in the file name, or appends it if there is no `.` at all.
///
/// This preserves the original tool's behavior exactly: `archive.tar.miniz`
/// decompresses to `1archive.tar`, not `archive1.tar` (see spec.md §9 — the
/// "first dot" placement is a deliberately-preserved quirk, not a bug fix).
pub fn disambiguate(candidate: &Path, exists: impl Fn(&Path) -> bool) -> PathBuf {
    if !exists(candidate) {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent();
    let file_name = candidate
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for n in 1u32.. {
        let disambiguated_name = match file_name.find('.') {
            Some(dot) => format!("{}{}{}", &file_name[..dot], n, &file_name[dot..]),
            None => format!("{file_name}{n}"),
        };
        let candidate_path = match parent {
            Some(p) if !p.as_os_str().is_empty() => p.join(&disambiguated_name),
            _ => PathBuf::from(&disambiguated_name),
        };
        if !exists(&candidate_path) {
            return candidate_path;
        }
    }
    unreachable!("u32 numeric suffixes exhausted")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_and_decompressed_names_roundtrip() {
        let path = Path::new("/tmp/data.bin");
        let compressed = compressed_name(path);
        assert_eq!(compressed, Path::new("/tmp/data.bin.miniz"));
        assert!(is_compressed(&compressed));
        assert_eq!(decompressed_name(&compressed), path);
    }

    #[test]
    fn disambiguation_inserts_before_first_dot() {
        let existing = ["archive.tar".to_string()];
        let candidate = Path::new("archive.tar");
        let result = disambiguate(candidate, |p| {
            existing.contains(&p.to_string_lossy().into_owned())
        });
        assert_eq!(result, Path::new("1archive.tar"));
    }

    #[test]
    fn disambiguation_no_collision_is_identity() {
        let candidate = Path::new("fresh.bin");
        let result = disambiguate(candidate, |_| false);
        assert_eq!(result, candidate);
    }

    #[test]
    fn disambiguation_appends_when_no_dot_present() {
        let existing = ["noext".to_string()];
        let candidate = Path::new("noext");
        let result = disambiguate(candidate, |p| {
            existing.contains(&p.to_string_lossy().into_owned())
        });
        assert_eq!(result, Path::new("noext1"));
    }

    #[test]
    fn disambiguation_increments_past_repeated_collisions() {
        let taken = ["foo.txt".to_string(), "1foo.txt".to_string(), "2foo.txt".to_string()];
        let candidate = Path::new("foo.txt");
        let result = disambiguate(candidate, |p| {
            taken.contains(&p.to_string_lossy().into_owned())
        });
        assert_eq!(result, Path::new("3foo.txt"));
    }

    #[test]
    fn disambiguation_preserves_parent_directory() {
        let existing = ["/tmp/out/archive.tar".to_string()];
        let candidate = Path::new("/tmp/out/archive.tar");
        let result = disambiguate(candidate, |p| {
            existing.contains(&p.to_string_lossy().into_owned())
        });
        assert_eq!(result, Path::new("/tmp/out/1archive.tar"));
    }
}
