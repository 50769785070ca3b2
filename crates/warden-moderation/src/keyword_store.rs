use std::path::PathBuf;

use thiserror::Error;
use warden_core::write_text_atomic;

pub const KEYWORDS_DIR_NAME: &str = "keywords";
pub const KEYWORDS_FILE_NAME: &str = "keywords.txt";
pub const KEYWORD_SEPARATOR: char = ':';

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read keyword table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to persist keyword table {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
    #[error("keyword '{keyword}' must be non-empty and must not contain ':'")]
    InvalidKeyword { keyword: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadyExists { existing_reply: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    NotFound,
}

/// Per-group keyword→reply table, one record file per group.
///
/// Records are newline-delimited `keyword:reply` lines split on the first
/// `:`, so replies may contain `:` but keywords may not. Every operation
/// loads the whole table, mutates in memory, and rewrites the file
/// atomically; the owning process is the only writer.
pub struct KeywordStore {
    root: PathBuf,
}

impl KeywordStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    fn table_path(&self, group_id: i64) -> PathBuf {
        self.root
            .join(KEYWORDS_DIR_NAME)
            .join(group_id.to_string())
            .join(KEYWORDS_FILE_NAME)
    }

    /// Inserts a new record unless the keyword is already present.
    pub fn add(&self, group_id: i64, keyword: &str, reply: &str) -> Result<AddOutcome, StoreError> {
        if keyword.is_empty() || keyword.contains(KEYWORD_SEPARATOR) {
            return Err(StoreError::InvalidKeyword {
                keyword: keyword.to_string(),
            });
        }
        let mut table = self.load_table(group_id)?;
        if let Some((_, existing_reply)) = table.iter().find(|(key, _)| key == keyword) {
            return Ok(AddOutcome::AlreadyExists {
                existing_reply: existing_reply.clone(),
            });
        }
        table.push((keyword.to_string(), reply.to_string()));
        self.persist_table(group_id, &table)?;
        Ok(AddOutcome::Inserted)
    }

    /// Removes the matching record and rewrites the compacted table.
    pub fn delete(&self, group_id: i64, keyword: &str) -> Result<DeleteOutcome, StoreError> {
        let mut table = self.load_table(group_id)?;
        let before = table.len();
        table.retain(|(key, _)| key != keyword);
        if table.len() == before {
            return Ok(DeleteOutcome::NotFound);
        }
        self.persist_table(group_id, &table)?;
        Ok(DeleteOutcome::Removed)
    }

    /// Exact-match lookup against stored keywords.
    pub fn lookup(&self, group_id: i64, text: &str) -> Result<Option<String>, StoreError> {
        let table = self.load_table(group_id)?;
        Ok(table
            .into_iter()
            .find(|(key, _)| key == text)
            .map(|(_, reply)| reply))
    }

    fn load_table(&self, group_id: i64) -> Result<Vec<(String, String)>, StoreError> {
        let path = self.table_path(group_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        let mut table = Vec::new();
        for line in raw.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            match line.split_once(KEYWORD_SEPARATOR) {
                Some((keyword, reply)) if !keyword.is_empty() => {
                    table.push((keyword.to_string(), reply.to_string()));
                }
                _ => {
                    tracing::warn!(
                        "skipping malformed keyword record: file={} line={}",
                        path.display(),
                        line
                    );
                }
            }
        }
        Ok(table)
    }

    fn persist_table(&self, group_id: i64, table: &[(String, String)]) -> Result<(), StoreError> {
        let path = self.table_path(group_id);
        let mut content = String::new();
        for (keyword, reply) in table {
            content.push_str(keyword);
            content.push(KEYWORD_SEPARATOR);
            content.push_str(reply);
            content.push('\n');
        }
        write_text_atomic(&path, &content).map_err(|source| StoreError::Persist {
            path,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, KeywordStore) {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = KeywordStore::new(tempdir.path());
        (tempdir, store)
    }

    #[test]
    fn unit_add_then_lookup_round_trips() {
        let (_guard, store) = store();
        assert_eq!(
            store.add(200, "你好", "欢迎").expect("add"),
            AddOutcome::Inserted
        );
        assert_eq!(
            store.lookup(200, "你好").expect("lookup"),
            Some("欢迎".to_string())
        );
    }

    #[test]
    fn unit_duplicate_add_keeps_the_original_reply() {
        let (_guard, store) = store();
        store.add(200, "你好", "欢迎").expect("add");
        assert_eq!(
            store.add(200, "你好", "再见").expect("second add"),
            AddOutcome::AlreadyExists {
                existing_reply: "欢迎".to_string()
            }
        );
        assert_eq!(
            store.lookup(200, "你好").expect("lookup"),
            Some("欢迎".to_string())
        );
    }

    #[test]
    fn unit_delete_removes_record_and_absent_delete_is_noop() {
        let (_guard, store) = store();
        store.add(200, "你好", "欢迎").expect("add");
        store.add(200, "帮助", "看公告").expect("add second");

        assert_eq!(
            store.delete(200, "你好").expect("delete"),
            DeleteOutcome::Removed
        );
        assert_eq!(store.lookup(200, "你好").expect("lookup"), None);

        assert_eq!(
            store.delete(200, "不存在").expect("absent delete"),
            DeleteOutcome::NotFound
        );
        assert_eq!(
            store.lookup(200, "帮助").expect("surviving record"),
            Some("看公告".to_string())
        );
    }

    #[test]
    fn unit_delete_on_missing_file_reports_not_found() {
        let (_guard, store) = store();
        assert_eq!(
            store.delete(999, "你好").expect("delete"),
            DeleteOutcome::NotFound
        );
    }

    #[test]
    fn unit_reply_may_contain_separator() {
        let (_guard, store) = store();
        store.add(200, "时间", "上午 9:30").expect("add");
        assert_eq!(
            store.lookup(200, "时间").expect("lookup"),
            Some("上午 9:30".to_string())
        );
    }

    #[test]
    fn unit_keyword_containing_separator_is_rejected() {
        let (_guard, store) = store();
        let error = store.add(200, "a:b", "reply").expect_err("must fail");
        assert!(matches!(error, StoreError::InvalidKeyword { .. }));
        let error = store.add(200, "", "reply").expect_err("empty keyword");
        assert!(matches!(error, StoreError::InvalidKeyword { .. }));
    }

    #[test]
    fn functional_persisted_table_round_trips_through_a_fresh_store() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        {
            let store = KeywordStore::new(tempdir.path());
            store.add(200, "你好", "欢迎").expect("add");
            store.add(200, "规则", "禁止广告").expect("add second");
        }
        let reopened = KeywordStore::new(tempdir.path());
        assert_eq!(
            reopened.lookup(200, "你好").expect("lookup"),
            Some("欢迎".to_string())
        );
        assert_eq!(
            reopened.lookup(200, "规则").expect("lookup"),
            Some("禁止广告".to_string())
        );
    }

    #[test]
    fn unit_tables_are_isolated_per_group() {
        let (_guard, store) = store();
        store.add(200, "你好", "欢迎").expect("add");
        assert_eq!(store.lookup(300, "你好").expect("lookup"), None);
    }

    #[test]
    fn regression_persisted_record_format_is_keyword_colon_reply() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = KeywordStore::new(tempdir.path());
        store.add(200, "你好", "欢迎").expect("add");
        let path = tempdir
            .path()
            .join(KEYWORDS_DIR_NAME)
            .join("200")
            .join(KEYWORDS_FILE_NAME);
        let contents = std::fs::read_to_string(path).expect("read");
        assert_eq!(contents, "你好:欢迎\n");
    }
}
