//! Volume identity.
//!
//! A [`VolumeSpec`] names one remote share and where it lives locally. It is
//! immutable once built; the local mount path and the drive letter are
//! alternative roots, and the active [`Platform`] decides which one counts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SpecError;

/// Filesystem mode passed to `mount -t` when none is configured.
pub const DEFAULT_MODE: &str = "smbfs";

/// Readiness timeout when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 1;

/// How volumes are attached on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// `mount`/`umount` onto a local directory
    Posix,
    /// `net use` onto a drive letter
    DriveLetter,
}

impl Platform {
    /// The platform this binary was built for.
    pub const fn current() -> Self {
        if cfg!(windows) {
            Self::DriveLetter
        } else {
            Self::Posix
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Posix => write!(f, "posix"),
            Self::DriveLetter => write!(f, "drive-letter"),
        }
    }
}

/// Identity of one network volume.
#[derive(Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    address: String,
    mount_point: PathBuf,
    drive: Option<char>,
    principal: String,
    secret: String,
    mode: String,
    timeout_secs: u64,
}

impl VolumeSpec {
    /// Start building a spec for `address` mounted at `mount_point`.
    pub fn builder(address: impl Into<String>, mount_point: impl Into<PathBuf>) -> VolumeSpecBuilder {
        VolumeSpecBuilder {
            address: address.into(),
            mount_point: mount_point.into(),
            drive: None,
            principal: String::new(),
            secret: String::new(),
            mode: DEFAULT_MODE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Remote host/share identifier, e.g. `files.example.org/Share`.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Local directory used by the POSIX strategy.
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Drive letter used by the drive-letter strategy, upper-cased.
    pub fn drive(&self) -> Option<char> {
        self.drive
    }

    /// Account name.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Account secret. Never logged.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Filesystem mode tag, e.g. `smbfs` or `cifs`.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Readiness timeout in whole seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    /// Readiness timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for VolumeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeSpec")
            .field("address", &self.address)
            .field("mount_point", &self.mount_point)
            .field("drive", &self.drive)
            .field("principal", &self.principal)
            .field("secret", &"<redacted>")
            .field("mode", &self.mode)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Builder for [`VolumeSpec`].
#[derive(Debug, Clone)]
#[must_use]
pub struct VolumeSpecBuilder {
    address: String,
    mount_point: PathBuf,
    drive: Option<String>,
    principal: String,
    secret: String,
    mode: String,
    timeout_secs: u64,
}

impl VolumeSpecBuilder {
    /// Drive identifier, `"J"` or `"J:"`.
    pub fn drive(mut self, drive: impl Into<String>) -> Self {
        self.drive = Some(drive.into());
        self
    }

    /// Account name.
    pub fn principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }

    /// Account secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    /// Filesystem mode tag.
    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Readiness timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<VolumeSpec, SpecError> {
        let address = self.address.trim().to_string();
        if address.is_empty() {
            return Err(SpecError::EmptyAddress);
        }

        let drive = self.drive.as_deref().map(parse_drive).transpose()?;

        Ok(VolumeSpec {
            address,
            mount_point: self.mount_point,
            drive,
            principal: self.principal,
            secret: self.secret,
            mode: self.mode,
            timeout_secs: self.timeout_secs,
        })
    }
}

/// Accept `J`, `j`, `J:` or `J:\`.
fn parse_drive(raw: &str) -> Result<char, SpecError> {
    let trimmed = raw.trim().trim_end_matches(['\\', '/']).trim_end_matches(':');
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(letter), None) if letter.is_ascii_alphabetic() => Ok(letter.to_ascii_uppercase()),
        _ => Err(SpecError::InvalidDrive(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let spec = VolumeSpec::builder("files.example.org/Share", "/mnt/share")
            .build()
            .unwrap();
        assert_eq!(spec.mode(), "smbfs");
        assert_eq!(spec.timeout_secs(), 1);
        assert_eq!(spec.drive(), None);
        assert_eq!(spec.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn test_empty_address_rejected() {
        let err = VolumeSpec::builder("  ", "/mnt/share").build().unwrap_err();
        assert_eq!(err, SpecError::EmptyAddress);
    }

    #[test]
    fn test_drive_normalised() {
        for raw in ["J", "j", "J:", "j:\\", " J: "] {
            let spec = VolumeSpec::builder("host/share", "/mnt/share")
                .drive(raw)
                .build()
                .unwrap();
            assert_eq!(spec.drive(), Some('J'), "input {raw:?}");
        }
    }

    #[test]
    fn test_drive_invalid() {
        for raw in ["", "JK", "1", "J:K"] {
            let err = VolumeSpec::builder("host/share", "/mnt/share")
                .drive(raw)
                .build()
                .unwrap_err();
            assert!(matches!(err, SpecError::InvalidDrive(_)), "input {raw:?}");
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let spec = VolumeSpec::builder("host/share", "/mnt/share")
            .principal("alice")
            .secret("hunter2")
            .build()
            .unwrap();
        let rendered = format!("{spec:?}");
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
