//! Local partition listing

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::token::{file_key, strip_release_tags, NameKey};

/// Content tokens present in a bot's partition, recomputed from a fresh
/// directory listing (no cache). Creates the partition if it does not exist.
/// Dotfiles (including the transfer cursor) and archive volumes contribute
/// nothing to the set.
pub fn local_tokens(data_root: &Path, alias: &str) -> Result<HashSet<String>> {
    let dir = data_root.join(alias);
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let mut tokens = HashSet::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if let Some(NameKey::Hash(token)) = file_key(&strip_release_tags(&name)) {
            tokens.insert(token);
        }
    }
    Ok(tokens)
}
