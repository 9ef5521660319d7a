//! Locating rollout files under a Codex home directory.

use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use walkdir::WalkDir;

use crate::error::{Result, ThreadLinkError};
use crate::model::ResolvedRollout;
use crate::source::rollout::session_id_from_file_name;

#[derive(Debug, Clone)]
pub struct CodexHome {
    root: PathBuf,
}

#[derive(Debug, Clone)]
struct IndexedRollout {
    rollout_path: PathBuf,
    archived: bool,
}

impl CodexHome {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn sessions_root(&self) -> PathBuf {
        self.root.join("sessions")
    }

    fn archived_root(&self) -> PathBuf {
        self.root.join("archived_sessions")
    }

    /// `state.sqlite` and `state_<n>.sqlite`, newest schema first.
    fn state_db_paths(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut paths = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && state_db_version(path).is_some())
            .collect::<Vec<_>>();

        paths.sort_by_key(|path| {
            (
                Reverse(state_db_version(path).unwrap_or(0)),
                Reverse(modified_at(path)),
            )
        });
        paths
    }

    fn query_index(db_path: &Path, session_id: &str) -> Result<Option<IndexedRollout>> {
        let sqlite_err = |source: rusqlite::Error| ThreadLinkError::Sqlite {
            path: db_path.to_path_buf(),
            source,
        };

        let conn = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(sqlite_err)?;
        let mut stmt = conn
            .prepare("SELECT rollout_path, archived FROM threads WHERE id = ?1 LIMIT 1")
            .map_err(sqlite_err)?;
        let record = stmt
            .query_row([session_id], |row| {
                Ok(IndexedRollout {
                    rollout_path: PathBuf::from(row.get::<_, String>(0)?),
                    archived: row.get::<_, i64>(1)? != 0,
                })
            })
            .optional()
            .map_err(sqlite_err)?;
        Ok(record)
    }

    fn lookup_index(&self, session_id: &str, warnings: &mut Vec<String>) -> Option<IndexedRollout> {
        for db_path in self.state_db_paths() {
            match Self::query_index(&db_path, session_id) {
                Ok(Some(record)) => return Some(record),
                Ok(None) => {}
                Err(err) => warnings.push(format!("failed reading thread index: {err}")),
            }
        }
        None
    }

    fn find_rollouts(root: &Path, session_id: &str) -> Vec<PathBuf> {
        if !root.exists() {
            return Vec::new();
        }

        WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("rollout-"))
                    && session_id_from_file_name(path)
                        .is_some_and(|id| id.eq_ignore_ascii_case(session_id))
            })
            .collect()
    }

    /// Most recently modified candidate and how many there were.
    fn latest(mut paths: Vec<PathBuf>) -> Option<(PathBuf, usize)> {
        let count = paths.len();
        paths.sort_by_key(|path| Reverse(modified_at(path)));
        paths.into_iter().next().map(|path| (path, count))
    }

    /// Finds the rollout of `session_id`.
    ///
    /// Order: live index entry, `sessions/`, archived index entry,
    /// `archived_sessions/`. Stale index entries and ambiguous matches are
    /// reported as warnings.
    pub fn resolve(&self, session_id: &str) -> Result<ResolvedRollout> {
        let mut warnings = Vec::new();
        let indexed = self.lookup_index(session_id, &mut warnings);
        let resolved = |path: PathBuf, source: &str, warnings: Vec<String>| ResolvedRollout {
            session_id: session_id.to_string(),
            path,
            source: source.to_string(),
            warnings,
        };

        for archived in [false, true] {
            let (index_source, walk_source, walk_root) = if archived {
                (
                    "codex:sqlite:archived_sessions",
                    "codex:archived_sessions",
                    self.archived_root(),
                )
            } else {
                ("codex:sqlite:sessions", "codex:sessions", self.sessions_root())
            };

            if let Some(record) = indexed.as_ref().filter(|entry| entry.archived == archived) {
                if record.rollout_path.exists() {
                    return Ok(resolved(record.rollout_path.clone(), index_source, warnings));
                }
                warnings.push(format!(
                    "thread index points to a missing rollout for session_id={session_id}: {}",
                    record.rollout_path.display()
                ));
            }

            if let Some((path, count)) = Self::latest(Self::find_rollouts(&walk_root, session_id)) {
                if count > 1 {
                    warnings.push(format!(
                        "multiple rollouts found ({count}) for session_id={session_id}; selected latest: {}",
                        path.display()
                    ));
                }
                return Ok(resolved(path, walk_source, warnings));
            }
        }

        Err(ThreadLinkError::ThreadNotFound {
            session_id: session_id.to_string(),
            searched_roots: [self.sessions_root(), self.archived_root()]
                .into_iter()
                .chain(self.state_db_paths())
                .collect(),
        })
    }
}

fn state_db_version(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    if name == "state.sqlite" {
        return Some(0);
    }
    name.strip_prefix("state_")?
        .strip_suffix(".sqlite")?
        .parse::<u32>()
        .ok()
}

fn modified_at(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use rusqlite::Connection;
    use tempfile::tempdir;

    use crate::source::codex::CodexHome;

    const SESSION_ID: &str = "019c871c-b1f9-7f60-9c4f-87ed09f13592";

    fn prepare_state_db(path: &Path) -> Connection {
        let conn = Connection::open(path).expect("open sqlite");
        conn.execute_batch(
            "
            CREATE TABLE threads (
                id TEXT PRIMARY KEY,
                rollout_path TEXT NOT NULL,
                archived INTEGER NOT NULL DEFAULT 0
            );
            ",
        )
        .expect("create schema");
        conn
    }

    fn write_rollout(root: &Path, relative: &str) -> std::path::PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "{}\n").expect("write");
        path
    }

    #[test]
    fn resolves_from_sessions_walk() {
        let temp = tempdir().expect("tempdir");
        let path = write_rollout(
            temp.path(),
            &format!("sessions/2026/02/23/rollout-2026-02-23T04-48-50-{SESSION_ID}.jsonl"),
        );

        let resolved = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect("resolve");
        assert_eq!(resolved.path, path);
        assert_eq!(resolved.source, "codex:sessions");
    }

    #[test]
    fn resolves_archived_when_not_live() {
        let temp = tempdir().expect("tempdir");
        let path = write_rollout(
            temp.path(),
            &format!("archived_sessions/rollout-2026-02-22T01-05-36-{SESSION_ID}.jsonl"),
        );

        let resolved = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect("resolve");
        assert_eq!(resolved.path, path);
        assert_eq!(resolved.source, "codex:archived_sessions");
    }

    #[test]
    fn prefers_state_index() {
        let temp = tempdir().expect("tempdir");
        let conn = prepare_state_db(&temp.path().join("state_5.sqlite"));
        let rollout = write_rollout(temp.path(), "sessions/custom/thread.jsonl");
        conn.execute(
            "INSERT INTO threads (id, rollout_path, archived) VALUES (?1, ?2, 0)",
            (&SESSION_ID, rollout.display().to_string()),
        )
        .expect("insert");

        let resolved = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect("resolve");
        assert_eq!(resolved.path, rollout);
        assert_eq!(resolved.source, "codex:sqlite:sessions");
    }

    #[test]
    fn stale_index_entry_falls_back_with_warning() {
        let temp = tempdir().expect("tempdir");
        let conn = prepare_state_db(&temp.path().join("state.sqlite"));
        conn.execute(
            "INSERT INTO threads (id, rollout_path, archived) VALUES (?1, ?2, 0)",
            (&SESSION_ID, temp.path().join("gone.jsonl").display().to_string()),
        )
        .expect("insert");
        let rollout = write_rollout(
            temp.path(),
            &format!("sessions/rollout-2026-02-23T04-48-50-{SESSION_ID}.jsonl"),
        );

        let resolved = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect("resolve");
        assert_eq!(resolved.path, rollout);
        assert_eq!(resolved.warnings.len(), 1);
        assert!(resolved.warnings[0].contains("missing rollout"));
    }

    #[test]
    fn unreadable_index_is_a_warning() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("state.sqlite"), "").expect("write");
        write_rollout(
            temp.path(),
            &format!("sessions/rollout-2026-02-23T04-48-50-{SESSION_ID}.jsonl"),
        );

        let resolved = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect("resolve");
        assert_eq!(resolved.source, "codex:sessions");
        assert_eq!(resolved.warnings.len(), 1);
    }

    #[test]
    fn missing_thread_lists_searched_roots() {
        let temp = tempdir().expect("tempdir");
        let err = CodexHome::new(temp.path())
            .resolve(SESSION_ID)
            .expect_err("must fail");
        let message = format!("{err}");
        assert!(message.contains("thread not found"));
        for root in ["sessions", "archived_sessions"] {
            let searched = temp.path().join(root).display().to_string();
            assert!(message.contains(&searched));
        }
    }

    #[test]
    fn walk_requires_exact_session_id() {
        let temp = tempdir().expect("tempdir");
        write_rollout(
            temp.path(),
            "sessions/rollout-2026-02-23T04-48-50-019c8800-0000-7000-8000-00000000000a.jsonl",
        );

        let err = CodexHome::new(temp.path())
            .resolve("a")
            .expect_err("must fail");
        assert!(format!("{err}").contains("thread not found"));
    }
}
