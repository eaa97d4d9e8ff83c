//! Plain filesystem walking used by the cleanup pass: the storage crate's
//! interface covers per-thumbnail read/write, but reconciling the whole
//! root against the `storage-used` counter needs a recursive walk that
//! belongs to the eviction engine, not the storage layer.

use std::path::{Path, PathBuf};

use tokio::fs;

use framecache_storage::{IMAGE_EXT, MIN_IMAGE_BYTES};

pub struct ScanResult {
    pub folder_size: u64,
    pub file_count: u64,
}

/// Recursively sum file sizes and count files under `root`. Any file with
/// the image extension at or below `MIN_IMAGE_BYTES` is deleted as corrupt
/// along the way and excluded from the totals.
pub async fn scan_and_reconcile(root: &Path) -> std::io::Result<ScanResult> {
    let mut folder_size = 0u64;
    let mut file_count = 0u64;
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                stack.push(path);
                continue;
            }
            let size = metadata.len();
            if path.extension().and_then(|e| e.to_str()) == Some(IMAGE_EXT) && size <= MIN_IMAGE_BYTES {
                fs::remove_file(&path).await?;
                continue;
            }
            folder_size += size;
            file_count += 1;
        }
    }

    Ok(ScanResult {
        folder_size,
        file_count,
    })
}

/// Immediate child directory names under `root`, one per videoID.
pub async fn list_video_dirs(root: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match fs::read_dir(root).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e),
    };
    while let Some(entry) = entries.next_entry().await? {
        if entry.metadata().await?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// Recursive size of a single video's directory.
pub async fn dir_size(dir: &Path) -> std::io::Result<u64> {
    let mut size = 0u64;
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let mut entries = match fs::read_dir(&d).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                stack.push(entry.path());
            } else {
                size += metadata.len();
            }
        }
    }
    Ok(size)
}

pub async fn remove_dir(dir: &PathBuf) -> std::io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
