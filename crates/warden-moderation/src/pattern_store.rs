use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use regex::Regex;

pub const FORBIDDEN_PATTERNS_FILE_NAME: &str = "forbidden_words.txt";
pub const ENABLED_GROUPS_FILE_NAME: &str = "enabled_groups.txt";

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

#[derive(Debug, Default)]
struct PatternSnapshot {
    patterns: Vec<CompiledPattern>,
    enabled_groups: HashSet<i64>,
}

/// Forbidden-pattern list plus the moderation-enabled group set.
///
/// Both are read from newline-delimited files under the data directory at
/// load time. Readers see one immutable snapshot; [`PatternStore::reload`]
/// swaps the whole snapshot so a concurrent reader never observes a
/// partially updated set.
pub struct PatternStore {
    patterns_path: PathBuf,
    groups_path: PathBuf,
    snapshot: ArcSwap<PatternSnapshot>,
}

impl PatternStore {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let patterns_path = data_dir.join(FORBIDDEN_PATTERNS_FILE_NAME);
        let groups_path = data_dir.join(ENABLED_GROUPS_FILE_NAME);
        let snapshot = read_snapshot(&patterns_path, &groups_path)?;
        Ok(Self {
            patterns_path,
            groups_path,
            snapshot: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Re-reads both files and swaps the in-memory snapshot atomically.
    pub fn reload(&self) -> Result<()> {
        let snapshot = read_snapshot(&self.patterns_path, &self.groups_path)?;
        self.snapshot.store(Arc::new(snapshot));
        Ok(())
    }

    pub fn is_group_enabled(&self, group_id: i64) -> bool {
        self.snapshot.load().enabled_groups.contains(&group_id)
    }

    /// First pattern (by load order) matching anywhere in `text`.
    pub fn find_match(&self, text: &str) -> Option<String> {
        self.snapshot
            .load()
            .patterns
            .iter()
            .find(|pattern| pattern.regex.is_match(text))
            .map(|pattern| pattern.source.clone())
    }

    pub fn pattern_count(&self) -> usize {
        self.snapshot.load().patterns.len()
    }

    pub fn enabled_group_count(&self) -> usize {
        self.snapshot.load().enabled_groups.len()
    }
}

fn read_snapshot(patterns_path: &Path, groups_path: &Path) -> Result<PatternSnapshot> {
    Ok(PatternSnapshot {
        patterns: read_patterns(patterns_path)?,
        enabled_groups: read_enabled_groups(groups_path)?,
    })
}

// A missing file disables the corresponding check instead of erroring.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn read_patterns(path: &Path) -> Result<Vec<CompiledPattern>> {
    let mut patterns = Vec::new();
    for line in read_lines(path)? {
        match Regex::new(&line) {
            Ok(regex) => patterns.push(CompiledPattern {
                source: line,
                regex,
            }),
            Err(error) => {
                tracing::warn!(
                    "skipping invalid forbidden pattern: file={} pattern={} error={}",
                    path.display(),
                    line,
                    error
                );
            }
        }
    }
    Ok(patterns)
}

fn read_enabled_groups(path: &Path) -> Result<HashSet<i64>> {
    let mut groups = HashSet::new();
    for line in read_lines(path)? {
        match line.parse::<i64>() {
            Ok(group_id) => {
                groups.insert(group_id);
            }
            Err(_) => {
                tracing::warn!(
                    "skipping non-integer enabled-group line: file={} line={}",
                    path.display(),
                    line
                );
            }
        }
    }
    Ok(groups)
}
