pub mod completions;
pub mod exec;
pub mod fetch;
pub mod ls;
pub mod markers;
pub mod mount;
pub mod mounts;
pub mod status;
pub mod unmount;

use anyhow::Result;

use netvol_mount::{local_hostname, HolderId, MountController};

use crate::config::Config;
use crate::PasswordOptions;

/// Holder of the marker `netvol mount` leaves on a volume it mounted.
pub fn manual_holder() -> HolderId {
    HolderId::new(format!("manual@{}", local_hostname()))
}

/// Controller for inspecting or unmounting `volume`. Carries no secret, so
/// it must not be used to mount.
pub fn inspect_volume(config: &Config, volume: &str) -> Result<MountController> {
    let spec = config.volume_spec(volume, "")?;
    Ok(MountController::new(spec)?)
}

/// Controller able to mount `volume`. The password is only asked for when
/// the volume is not already active.
pub fn open_volume(
    config: &Config,
    volume: &str,
    password: &PasswordOptions,
) -> Result<MountController> {
    let controller = inspect_volume(config, volume)?;
    if controller.is_active() {
        return Ok(controller);
    }

    let account = config.volume(volume)?.user.clone().unwrap_or_default();
    let secret = crate::get_password(password, &account)?;
    Ok(MountController::new(config.volume_spec(volume, &secret)?)?)
}
