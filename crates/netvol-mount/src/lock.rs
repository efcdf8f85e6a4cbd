//! Cross-process sharing of one mounted volume.
//!
//! Several unrelated processes (possibly on different machines) may use the
//! same share at once. There is no coordinator and no shared memory: the
//! only evidence of who is using a volume is the set of lock markers,
//! `.<holder>.lock` files directly under the mounted root.
//!
//! # Protocol
//!
//! - **Acquire**: mount if not active, then write this holder's marker
//!   (current timestamp, RFC 3339) atomically via a temp file + rename.
//! - **Release**: delete this holder's marker, list the markers left, and
//!   unmount only if none remain.
//!
//! [`VolumeLease`] releases on drop, so the marker goes away on every exit
//! path including panics. [`LockCoordinator::with_volume`] wraps the
//! acquire / run / release sequence for a closure.
//!
//! # Known race
//!
//! "List markers, then unmount" is check-then-act across processes. Two
//! holders releasing at the same instant can each see the other's marker and
//! leave the volume mounted, or both see none and both try to unmount (the
//! loser gets [`VolumeError::VolumeNotMounted`] or
//! [`VolumeError::MountPointMissing`]). A holder acquiring between another
//! holder's check and its unmount loses the volume under its feet.
//! [`LockCoordinator::release_settle`] re-lists after a delay, which
//! narrows the window without closing it.
//!
//! Holders are per process, not per scope: every [`LockCoordinator::new`]
//! in one process writes the same marker. Nesting two scopes on one volume
//! inside a process lets the inner release delete that marker and unmount
//! under the outer scope; give nested scopes their own identity with
//! [`LockCoordinator::with_holder`].
//!
//! # Leaked markers
//!
//! A crashed holder leaves its marker behind and the volume stays mounted.
//! Markers never expire; [`LockMarker::holder_alive`] lets an operator find
//! dead local holders and remove them explicitly.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use tracing::instrument;

use crate::controller::MountController;
use crate::error::{Result, VolumeError};
use crate::liveness::{is_process_alive, local_hostname};

/// Suffix shared by every lock marker file.
pub const MARKER_SUFFIX: &str = ".lock";

/// Identity of one holder: `<pid>@<host>` for real processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Identity of the running process on this host.
    pub fn current_process() -> Self {
        Self::new(format!("{}@{}", std::process::id(), local_hostname()))
    }

    /// Arbitrary identity. Path separators and control characters are
    /// replaced so the marker stays directly under the root.
    pub fn new(id: impl Into<String>) -> Self {
        let id: String = id
            .into()
            .chars()
            .map(|c| if c == '/' || c == '\\' || c.is_control() { '_' } else { c })
            .collect();
        if id.is_empty() {
            Self("_".to_string())
        } else {
            Self(id)
        }
    }

    /// The identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Process id, if the identity starts with one.
    pub fn pid(&self) -> Option<u32> {
        self.0.split('@').next()?.parse().ok()
    }

    /// Host part after `@`, if any.
    pub fn host(&self) -> Option<&str> {
        self.0.split_once('@').map(|(_, host)| host)
    }

    /// File name of this holder's marker.
    pub fn marker_file_name(&self) -> String {
        format!(".{}{MARKER_SUFFIX}", self.0)
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A marker file found under a mounted root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockMarker {
    /// Full path of the marker file
    pub path: PathBuf,
    /// Holder parsed from the file name
    pub holder: HolderId,
    /// Timestamp written at acquisition, if readable
    pub created_at: Option<DateTime<FixedOffset>>,
}

impl LockMarker {
    fn from_path(path: PathBuf) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let holder = holder_from_file_name(name)?;
        let created_at = fs::read_to_string(&path)
            .ok()
            .and_then(|content| parse_timestamp(content.trim()));

        Some(Self {
            holder: HolderId(holder.to_string()),
            path,
            created_at,
        })
    }

    /// Whether the holder process is still running.
    ///
    /// `None` when the holder is on another host or has no pid, since
    /// nothing can be said about it from here.
    pub fn holder_alive(&self) -> Option<bool> {
        let pid = self.holder.pid()?;
        let host = self.holder.host()?;
        (host == local_hostname()).then(|| is_process_alive(pid))
    }

    /// Delete the marker file.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path).map_err(|e| VolumeError::io(&self.path, e))
    }
}

/// `.<holder>.lock` -> `<holder>`
fn holder_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix('.')?.strip_suffix(MARKER_SUFFIX)
}

/// RFC 3339, or the `YYYY-MM-DD HH:MM:SS[.ffffff]` local form older
/// markers carry.
fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.fixed_offset())
}

/// Every lock marker directly under `root`, sorted by path.
pub fn list_markers(root: &Path) -> Result<Vec<LockMarker>> {
    let entries = fs::read_dir(root).map_err(|e| VolumeError::io(root, e))?;

    let mut markers = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| VolumeError::io(root, e))?;
        if let Some(marker) = LockMarker::from_path(entry.path()) {
            markers.push(marker);
        }
    }
    markers.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(markers)
}

/// Write `holder`'s marker under `root`, replacing any previous one.
pub fn write_marker(root: &Path, holder: &HolderId) -> Result<LockMarker> {
    let path = root.join(holder.marker_file_name());
    let created_at = Local::now().fixed_offset();

    let mut tmp = tempfile::Builder::new()
        .prefix(".netvol-")
        .suffix(".tmp")
        .tempfile_in(root)
        .map_err(|e| VolumeError::io(root, e))?;
    tmp.write_all(created_at.to_rfc3339().as_bytes())
        .and_then(|()| tmp.flush())
        .map_err(|e| VolumeError::io(tmp.path(), e))?;
    tmp.persist(&path)
        .map_err(|e| VolumeError::io(&path, e.error))?;

    Ok(LockMarker {
        path,
        holder: holder.clone(),
        created_at: Some(created_at),
    })
}

/// What release did with the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No markers were left; the volume was unmounted
    Unmounted,
    /// Other holders still have markers; the volume stays mounted
    StillHeld {
        /// Number of markers left
        remaining: usize,
    },
}

/// Hands out [`VolumeLease`]s for one holder identity.
#[derive(Debug, Clone)]
pub struct LockCoordinator {
    holder: HolderId,
    settle: Option<Duration>,
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LockCoordinator {
    /// Coordinator acting for the running process.
    pub fn new() -> Self {
        Self::with_holder(HolderId::current_process())
    }

    /// Coordinator acting for an explicit holder.
    pub fn with_holder(holder: HolderId) -> Self {
        Self {
            holder,
            settle: None,
        }
    }

    /// Before unmounting, wait `delay` and list markers again.
    #[must_use]
    pub fn release_settle(mut self, delay: Duration) -> Self {
        self.settle = Some(delay);
        self
    }

    /// Holder identity used for markers.
    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    /// Mount if needed and register this holder.
    ///
    /// A root that exists but is not mounted is not taken over: `mount()`
    /// refuses it with [`VolumeError::MountPointAlreadyExists`].
    #[instrument(level = "info", name = "volume::acquire", skip_all, fields(root = %controller.root().display(), holder = %self.holder))]
    pub fn acquire<'a>(&self, controller: &'a mut MountController) -> Result<VolumeLease<'a>> {
        let mounted_here = if controller.is_active() {
            false
        } else {
            controller.mount()?;
            true
        };

        let root = controller.root();
        let marker = match write_marker(&root, &self.holder) {
            Ok(marker) => marker,
            Err(e) => {
                if mounted_here && list_markers(&root).is_ok_and(|m| m.is_empty()) {
                    if let Err(unmount_err) = controller.unmount() {
                        tracing::warn!(
                            "Failed to unmount {} after marker write failed: {}",
                            root.display(),
                            unmount_err
                        );
                    }
                }
                return Err(e);
            }
        };

        tracing::debug!("Wrote lock marker {}", marker.path.display());
        Ok(VolumeLease {
            controller,
            marker,
            settle: self.settle,
            released: false,
        })
    }

    /// Run `body` with the volume acquired; release on every exit path.
    ///
    /// The body's error wins over a release error; a release error is only
    /// returned when the body succeeded.
    pub fn with_volume<T, E, F>(
        &self,
        controller: &mut MountController,
        body: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce(&VolumeLease<'_>) -> std::result::Result<T, E>,
        E: From<VolumeError>,
    {
        let lease = self.acquire(controller)?;
        let result = body(&lease);

        match (result, lease.release()) {
            (Ok(value), Ok(_)) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err.into()),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(release_err)) => {
                tracing::warn!("Release after failed body also failed: {}", release_err);
                Err(e)
            }
        }
    }
}

/// Scoped use of a mounted volume by one holder.
///
/// Dropping the lease releases it; call [`VolumeLease::release`] to see
/// the outcome and errors.
#[must_use = "dropping a lease releases the volume immediately"]
pub struct VolumeLease<'a> {
    controller: &'a mut MountController,
    marker: LockMarker,
    settle: Option<Duration>,
    released: bool,
}

impl fmt::Debug for VolumeLease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeLease")
            .field("root", &self.controller.root())
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl VolumeLease<'_> {
    /// Root of the mounted volume.
    pub fn root(&self) -> PathBuf {
        self.controller.root()
    }

    /// Absolute path of `relative` on the volume.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.controller.resolve(relative)
    }

    /// This holder's marker.
    pub fn marker(&self) -> &LockMarker {
        &self.marker
    }

    /// The controller this lease holds.
    pub fn controller(&self) -> &MountController {
        self.controller
    }

    /// Remove this holder's marker and unmount if nobody else holds it.
    pub fn release(mut self) -> Result<ReleaseOutcome> {
        self.released = true;
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<ReleaseOutcome> {
        match fs::remove_file(&self.marker.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    "Lock marker {} was already removed",
                    self.marker.path.display()
                );
            }
            Err(e) => return Err(VolumeError::io(&self.marker.path, e)),
        }

        let root = self.controller.root();
        let mut remaining = list_markers(&root)?;
        if remaining.is_empty()
            && let Some(delay) = self.settle
        {
            std::thread::sleep(delay);
            remaining = list_markers(&root)?;
        }

        if !remaining.is_empty() {
            tracing::info!(
                "{} still held by {} other holder(s); leaving it mounted",
                root.display(),
                remaining.len()
            );
            return Ok(ReleaseOutcome::StillHeld {
                remaining: remaining.len(),
            });
        }

        self.controller.unmount()?;
        Ok(ReleaseOutcome::Unmounted)
    }
}

impl Drop for VolumeLease<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.release_inner() {
            tracing::warn!(
                "Failed to release {}: {}",
                self.controller.root().display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VolumeErrorKind;
    use crate::testing::FakeSystem;
    use crate::volume::{Platform, VolumeSpec};
    use tempfile::TempDir;

    fn spec(temp: &TempDir) -> VolumeSpec {
        VolumeSpec::builder("files.example.org/Share", temp.path().join("Share"))
            .principal("alice")
            .secret("s3cret")
            .build()
            .unwrap()
    }

    #[test]
    fn test_holder_id_parts() {
        let holder = HolderId::new("4242@workstation");
        assert_eq!(holder.pid(), Some(4242));
        assert_eq!(holder.host(), Some("workstation"));
        assert_eq!(holder.marker_file_name(), ".4242@workstation.lock");

        let legacy = HolderId::new("4242");
        assert_eq!(legacy.pid(), Some(4242));
        assert_eq!(legacy.host(), None);

        assert_eq!(HolderId::new("a/b\\c").as_str(), "a_b_c");
        assert_eq!(HolderId::new("").as_str(), "_");
    }

    #[test]
    fn test_current_process_holder() {
        let holder = HolderId::current_process();
        assert_eq!(holder.pid(), Some(std::process::id()));
        assert_eq!(holder.host(), Some(local_hostname().as_str()));
    }

    #[test]
    fn test_write_and_list_markers() {
        let temp = TempDir::new().unwrap();
        write_marker(temp.path(), &HolderId::new("b")).unwrap();
        write_marker(temp.path(), &HolderId::new("a")).unwrap();
        fs::write(temp.path().join("notes.lock"), "not a marker").unwrap();
        fs::write(temp.path().join(".hidden"), "not a marker").unwrap();

        let markers = list_markers(temp.path()).unwrap();
        let holders: Vec<_> = markers.iter().map(|m| m.holder.as_str()).collect();
        assert_eq!(holders, vec!["a", "b"]);
        assert!(markers.iter().all(|m| m.created_at.is_some()));
    }

    #[test]
    fn test_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        write_marker(temp.path(), &HolderId::new("a")).unwrap();

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![".a.lock".to_string()]);
    }

    #[test]
    fn test_legacy_timestamp_parsed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(".1234.lock"), "2022-03-01 14:05:09.123456").unwrap();
        fs::write(temp.path().join(".5678.lock"), "garbage").unwrap();

        let markers = list_markers(temp.path()).unwrap();
        assert_eq!(markers.len(), 2);
        let legacy = markers[0].created_at.unwrap();
        assert_eq!(legacy.naive_local().to_string(), "2022-03-01 14:05:09.123456");
        assert_eq!(markers[1].created_at, None);
    }

    #[test]
    fn test_holder_alive() {
        let alive = LockMarker {
            path: PathBuf::from(".x.lock"),
            holder: HolderId::current_process(),
            created_at: None,
        };
        assert_eq!(alive.holder_alive(), Some(true));

        let remote = LockMarker {
            holder: HolderId::new(format!("{}@some-other-host.invalid", std::process::id())),
            ..alive.clone()
        };
        assert_eq!(remote.holder_alive(), None);

        let named = LockMarker {
            holder: HolderId::new("report-job"),
            ..alive
        };
        assert_eq!(named.holder_alive(), None);
    }

    #[test]
    fn test_marker_serializes_holder_as_string() {
        let marker = LockMarker {
            path: PathBuf::from("/srv/Share/.a@h.lock"),
            holder: HolderId::new("a@h"),
            created_at: None,
        };
        let json = serde_json::to_value(&marker).unwrap();
        assert_eq!(json["holder"], "a@h");
        assert!(json["created_at"].is_null());
    }

    #[test]
    fn test_single_holder_mounts_and_unmounts() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        let lease = coordinator.acquire(&mut controller).unwrap();
        assert!(lease.marker().path.exists());
        assert_eq!(lease.root(), temp.path().join("Share"));
        assert_eq!(&lease / "docs", temp.path().join("Share/docs"));

        assert_eq!(lease.release().unwrap(), ReleaseOutcome::Unmounted);
        assert!(!controller.is_mounted());
        assert!(!temp.path().join("Share").exists());
    }

    #[test]
    fn test_second_holder_keeps_volume_mounted() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut first = fake.controller(spec(&temp), Platform::Posix);
        let mut second = fake.controller(spec(&temp), Platform::Posix);
        let a = LockCoordinator::with_holder(HolderId::new("a"));
        let b = LockCoordinator::with_holder(HolderId::new("b"));

        let lease_a = a.acquire(&mut first).unwrap();
        let lease_b = b.acquire(&mut second).unwrap();

        assert_eq!(
            lease_a.release().unwrap(),
            ReleaseOutcome::StillHeld { remaining: 1 }
        );
        assert!(fake.is_attached(&temp.path().join("Share")));

        assert_eq!(lease_b.release().unwrap(), ReleaseOutcome::Unmounted);
        assert!(!fake.is_attached(&temp.path().join("Share")));

        let mounts = fake
            .commands()
            .iter()
            .filter(|c| c.program() == "mount")
            .count();
        assert_eq!(mounts, 1);
    }

    #[test]
    fn test_drop_releases_marker() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        {
            let _lease = coordinator.acquire(&mut controller).unwrap();
        }

        assert!(!controller.is_mounted());
        assert!(!temp.path().join("Share").exists());
    }

    #[test]
    fn test_with_volume_releases_on_error() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        let result: std::result::Result<(), anyhow::Error> =
            coordinator.with_volume(&mut controller, |lease| {
                assert!(lease.marker().path.exists());
                anyhow::bail!("body failed")
            });

        assert_eq!(result.unwrap_err().to_string(), "body failed");
        assert!(!controller.is_mounted());
        assert!(!temp.path().join("Share").exists());
    }

    #[test]
    fn test_with_volume_releases_on_panic() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: Result<()> = coordinator.with_volume(&mut controller, |_| panic!("boom"));
        }));

        assert!(outcome.is_err());
        assert!(!controller.is_mounted());
        assert!(!temp.path().join("Share").exists());
    }

    #[test]
    fn test_with_volume_returns_body_value() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        let root: Result<PathBuf> = coordinator.with_volume(&mut controller, |lease| Ok(lease.root()));
        assert_eq!(root.unwrap(), temp.path().join("Share"));
    }

    #[test]
    fn test_acquire_reuses_active_mount() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        controller.mount().unwrap();

        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));
        let lease = coordinator.acquire(&mut controller).unwrap();
        assert_eq!(lease.release().unwrap(), ReleaseOutcome::Unmounted);
        assert_eq!(fake.commands().len(), 2);
    }

    #[test]
    fn test_acquire_refuses_stale_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("Share")).unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);

        let err = LockCoordinator::with_holder(HolderId::new("a"))
            .acquire(&mut controller)
            .unwrap_err();
        assert_eq!(err.kind(), VolumeErrorKind::MountPointAlreadyExists);
    }

    #[test]
    fn test_leaked_marker_keeps_volume_mounted() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"));

        let lease = coordinator.acquire(&mut controller).unwrap();
        write_marker(&lease.root(), &HolderId::new("crashed")).unwrap();

        assert_eq!(
            lease.release().unwrap(),
            ReleaseOutcome::StillHeld { remaining: 1 }
        );
        assert!(controller.is_mounted());
    }

    #[test]
    fn test_settle_delay_still_unmounts_when_alone() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"))
            .release_settle(Duration::from_millis(5));

        let lease = coordinator.acquire(&mut controller).unwrap();
        assert_eq!(lease.release().unwrap(), ReleaseOutcome::Unmounted);
    }

    #[test]
    fn test_settle_delay_sees_late_holder() {
        let temp = TempDir::new().unwrap();
        let fake = FakeSystem::new();
        let mut controller = fake.controller(spec(&temp), Platform::Posix);
        let coordinator = LockCoordinator::with_holder(HolderId::new("a"))
            .release_settle(Duration::from_secs(2));

        let lease = coordinator.acquire(&mut controller).unwrap();
        let root = lease.root();
        let late = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            write_marker(&root, &HolderId::new("late")).unwrap();
        });

        let outcome = lease.release().unwrap();
        late.join().unwrap();

        assert_eq!(outcome, ReleaseOutcome::StillHeld { remaining: 1 });
        assert!(controller.is_mounted());
    }

    #[test]
    fn test_default_coordinators_share_process_holder() {
        let first = LockCoordinator::new();
        let second = LockCoordinator::new();
        assert_eq!(first.holder(), second.holder());
        assert_eq!(
            first.holder().marker_file_name(),
            second.holder().marker_file_name()
        );
        assert_ne!(
            LockCoordinator::with_holder(HolderId::new("outer")).holder(),
            first.holder()
        );
    }
}
