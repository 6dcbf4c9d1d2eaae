//! The claim challenge: one random value the caller must read back from a
//! local file to prove administrative access to this host.
//!
//! The in-memory value is authoritative. The file at [`ChallengeStore::path`]
//! is only a mirror for the operator, so a failed write never keeps the
//! in-memory value from rotating.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

/// Length of the hyphenated rendering, e.g. `67e55044-10b1-426f-9247-bb680e5fe0c8`.
const HYPHENATED_LEN: usize = 36;

/// Owns the single active challenge and its on-disk mirror.
#[derive(Debug)]
pub struct ChallengeStore {
    path: PathBuf,
    active: Mutex<Option<Uuid>>,
}

/// Exclusive access to the active challenge.
///
/// A handshake holds one guard across its key check and the rotation that
/// follows, so two requests can never interleave their match/rotate pairs.
pub struct ChallengeGuard<'a> {
    path: &'a Path,
    active: MutexGuard<'a, Option<Uuid>>,
}

impl ChallengeStore {
    /// Create a store mirroring to `path`. No challenge exists until the
    /// first [`ChallengeGuard::generate`] or [`ChallengeStore::filename`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            active: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the challenge. The value is a plain `Option<Uuid>`, so a panic
    /// elsewhere cannot leave it half-written and poisoning is ignored.
    pub fn lock(&self) -> ChallengeGuard<'_> {
        ChallengeGuard {
            path: &self.path,
            active: self.active.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Path of the challenge file, generating a first challenge if none
    /// exists yet.
    pub fn filename(&self) -> PathBuf {
        let mut guard = self.lock();
        if guard.active.is_none() {
            guard.rotate();
        }
        self.path.clone()
    }

    /// The active value, if any.
    pub fn current(&self) -> Option<Uuid> {
        *self.lock().active
    }
}

impl ChallengeGuard<'_> {
    /// Exact match against the active value. Only the 36-character
    /// hyphenated form is accepted (either case). The nil UUID and
    /// unparseable candidates never match.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let Some(active) = *self.active else {
            return false;
        };
        if active.is_nil() || candidate.len() != HYPHENATED_LEN {
            return false;
        }
        Uuid::try_parse(candidate).is_ok_and(|c| c == active)
    }

    /// Replace the active challenge with a fresh random one and rewrite the
    /// mirror file.
    ///
    /// The previous value is invalid as soon as this returns, even when the
    /// file write fails.
    pub fn generate(&mut self) -> io::Result<Uuid> {
        let value = Uuid::new_v4();
        *self.active = Some(value);
        write_mirror(self.path, value)?;
        Ok(value)
    }

    /// [`generate`](Self::generate), logging instead of returning a mirror
    /// write failure.
    pub fn rotate(&mut self) {
        match self.generate() {
            Ok(_) => tracing::debug!(path = %self.path.display(), "claim challenge rotated"),
            Err(e) => tracing::error!(
                path = %self.path.display(),
                error = %e,
                "cannot write claim challenge file; in-memory challenge rotated anyway",
            ),
        }
    }
}

/// Remove-then-create, so a reader never sees a stale or partially
/// rewritten value under the old inode.
fn write_mirror(path: &Path, value: Uuid) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o640);
    }

    let mut file = options.open(path)?;
    writeln!(file, "{}", value.hyphenated())?;
    file.sync_all()
}
