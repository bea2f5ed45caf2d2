pub mod test_server;

use std::path::PathBuf;

/// Path relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    root.join("../../").join(name)
}

/// Writes `count` small fake images into `dir` (the server only checks that a file arrived).
pub fn write_images(dir: &std::path::Path, count: usize) -> std::io::Result<Vec<PathBuf>> {
    (0..count)
        .map(|i| {
            let path = dir.join(format!("img_{i:03}.jpg"));
            std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, i as u8])?;
            Ok(path)
        })
        .collect()
}
