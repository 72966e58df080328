//! Dated output directories and the `latest` link.
//!
//! # Responsibility
//! - Compute `<base>/notification_archive/notificationsYYYYMMDD` for a run.
//! - Repoint `<base>/notification_archive/latest` at the newest run
//!   directory; the delivery collaborator reads the batch through it.
//!
//! # Invariants
//! - The link is replaced by renaming a freshly created link over it, so
//!   readers see either the old or the new target, never a missing link.

use chrono::NaiveDate;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub const ARCHIVE_DIR_NAME: &str = "notification_archive";
pub const LATEST_LINK_NAME: &str = "latest";

#[derive(Debug)]
pub enum ArchiveError {
    Io { path: PathBuf, source: io::Error },
}

impl Display for ArchiveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "archive operation failed at `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ArchiveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Output locations for one notification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLayout {
    archive_dir: PathBuf,
    run_dir: PathBuf,
}

impl ArchiveLayout {
    pub fn for_date(base_dir: impl AsRef<Path>, date: NaiveDate) -> Self {
        let archive_dir = base_dir.as_ref().join(ARCHIVE_DIR_NAME);
        let run_dir = archive_dir.join(format!("notifications{}", date.format("%Y%m%d")));
        Self {
            archive_dir,
            run_dir,
        }
    }

    /// Directory the renderer writes this run's artifacts into.
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn latest_link(&self) -> PathBuf {
        self.archive_dir.join(LATEST_LINK_NAME)
    }

    /// Creates the run directory and its parents.
    pub fn prepare(&self) -> Result<(), ArchiveError> {
        std::fs::create_dir_all(&self.run_dir).map_err(io_error(&self.run_dir))
    }

    /// Atomically points the `latest` link at this run's directory.
    pub fn point_latest(&self) -> Result<(), ArchiveError> {
        let latest = self.latest_link();
        let staging = self
            .archive_dir
            .join(format!(".{LATEST_LINK_NAME}.{}", std::process::id()));

        if std::fs::symlink_metadata(&staging).is_ok() {
            std::fs::remove_file(&staging).map_err(io_error(&staging))?;
        }
        symlink_dir(&self.run_dir, &staging).map_err(io_error(&staging))?;
        if let Err(source) = std::fs::rename(&staging, &latest) {
            let _ = std::fs::remove_file(&staging);
            return Err(ArchiveError::Io {
                path: latest,
                source,
            });
        }

        info!(
            "event=archive_latest module=archive status=ok target={}",
            self.run_dir.display()
        );
        Ok(())
    }
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(test)]
mod tests {
    use super::ArchiveLayout;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).expect("valid date")
    }

    #[test]
    fn run_dir_is_named_after_the_date() {
        let layout = ArchiveLayout::for_date("/var/out", date(7));
        assert_eq!(
            layout.run_dir().to_str(),
            Some("/var/out/notification_archive/notifications20260307")
        );
        assert_eq!(
            layout.latest_link().to_str(),
            Some("/var/out/notification_archive/latest")
        );
    }

    #[cfg(unix)]
    #[test]
    fn latest_link_is_repointed_to_newest_run() {
        let base = tempfile::tempdir().unwrap();

        let first = ArchiveLayout::for_date(base.path(), date(1));
        first.prepare().unwrap();
        first.point_latest().unwrap();
        assert_eq!(
            std::fs::read_link(first.latest_link()).unwrap(),
            first.run_dir()
        );

        let second = ArchiveLayout::for_date(base.path(), date(2));
        second.prepare().unwrap();
        second.point_latest().unwrap();
        assert_eq!(
            std::fs::read_link(second.latest_link()).unwrap(),
            second.run_dir()
        );

        second.point_latest().unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(base.path().join("notification_archive"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }
}
