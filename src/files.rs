// files.rs — collect the photographs to review

use std::io;
use std::path::{Path, PathBuf};

pub const IMAGE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// JPEG files directly inside `dir`, sorted case-insensitively by path.
pub fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_image(&path) {
            files.push(path);
        }
    }
    files.sort_by_key(|p| p.to_string_lossy().to_lowercase());
    Ok(files)
}

/// A single file as given, or every image in a directory.
pub fn image_list(path: &Path) -> io::Result<Vec<PathBuf>> {
    if path.is_dir() {
        image_files(path)
    } else if path.is_file() {
        Ok(vec![path.to_path_buf()])
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        ))
    }
}
