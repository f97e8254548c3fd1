use std::path::Path;

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir_exists(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Copy a file, creating parent directories as needed.
pub fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Source file not found: {}", src.display()),
        ));
    }

    if let Some(parent) = dst.parent() {
        ensure_dir_exists(parent)?;
    }

    std::fs::copy(src, dst).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to copy {} to {}: {}", src.display(), dst.display(), e),
        )
    })?;
    Ok(())
}

/// Serialize `value` as pretty JSON into `path`, creating parent directories.
pub fn write_json_pretty<T: serde::Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> crate::core::error::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read and deserialize a JSON file.
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> crate::core::error::Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_exists_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let new_dir = dir.path().join("subdir");
        assert!(!new_dir.exists());

        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.exists());
        assert!(new_dir.is_dir());
    }

    #[test]
    fn test_ensure_dir_exists_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let new_dir = dir.path().join("subdir");

        ensure_dir_exists(&new_dir).unwrap();
        ensure_dir_exists(&new_dir).unwrap();
        assert!(new_dir.exists());
    }

    #[test]
    fn test_copy_file_success() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");
        std::fs::write(&src, b"hello world").unwrap();

        copy_file(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "hello world");
    }

    #[test]
    fn test_copy_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("a/b/c/dest.txt");
        std::fs::write(&src, b"nested").unwrap();

        copy_file(&src, &dst).unwrap();
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "nested");
    }

    #[test]
    fn test_copy_file_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("nonexistent.txt");
        let dst = dir.path().join("dest.txt");

        let result = copy_file(&src, &dst);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::NotFound);
    }

    #[test]
    fn test_json_roundtrip_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Testing/results.json");
        write_json_pretty(&path, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(std::fs::read_to_string(&path).unwrap().contains("\n"));
    }

    #[test]
    fn test_read_json_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[1, 2").unwrap();
        let result: crate::core::error::Result<Vec<i32>> = read_json(&path);
        assert!(matches!(result, Err(crate::core::Error::Json(_))));
    }
}
