//! Raw payload fixture loader.
//!
//! Loads request bodies from `fixtures/` at the workspace root. Bodies are
//! returned byte for byte since signatures cover the exact bytes.

use std::path::{Path, PathBuf};

pub struct Fixture;

impl Fixture {
    /// Load `workspace_root/fixtures/relative_path` as raw bytes.
    ///
    /// Panics if the file is missing.
    pub fn load_bytes(relative_path: &str) -> Vec<u8> {
        let full_path = workspace_root().join("fixtures").join(relative_path);
        std::fs::read(&full_path)
            .unwrap_or_else(|e| panic!("fixture not found at {}: {}", full_path.display(), e))
    }
}

fn workspace_root() -> PathBuf {
    // Walk up from the crate under test to the directory holding `fixtures/`
    std::env::var("CARGO_MANIFEST_DIR")
        .map(|dir| {
            let p = Path::new(&dir);
            p.ancestors()
                .find(|a| a.join("fixtures").is_dir())
                .unwrap_or(p)
                .to_path_buf()
        })
        .unwrap_or_else(|_| std::env::current_dir().unwrap())
}
