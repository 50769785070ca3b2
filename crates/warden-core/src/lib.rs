//! Foundational low-level utilities shared across Warden crates.
//!
//! Provides the atomic file-write helper used by the persistent stores and
//! the unix-time helpers used by runtime logging.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn time_utils_seconds_and_millis_agree() {
        let now_s = current_unix_timestamp();
        let now_ms = current_unix_timestamp_ms();
        let now_ms_s = now_ms / 1_000;
        assert!(now_ms_s >= now_s);
        assert!(now_ms_s <= now_s.saturating_add(1));
    }

    #[test]
    fn write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("keywords.txt");
        write_text_atomic(&path, "你好:欢迎\n").expect("write");
        let contents = read_to_string(&path).expect("read");
        assert_eq!(contents, "你好:欢迎\n");
    }

    #[test]
    fn write_text_atomic_creates_missing_parent_dirs() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("keywords").join("200").join("keywords.txt");
        write_text_atomic(&path, "a:b\n").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "a:b\n");
    }

    #[test]
    fn write_text_atomic_replaces_existing_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("store.txt");
        write_text_atomic(&path, "first\n").expect("write first");
        write_text_atomic(&path, "second\n").expect("write second");
        assert_eq!(read_to_string(&path).expect("read"), "second\n");
    }
}
