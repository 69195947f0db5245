//! Device capacity queries and the run's capacity budget.
//!
//! The budget is derived once per run from the device's reported total minus
//! the configured reserve. Verification against the expected nominal size
//! guards against filling the wrong mount.

use eyre::Result;
use std::path::Path;

use crate::config::FillConfig;
use crate::errors::StartupError;

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Filesystem-reported space for the volume holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSpace {
    pub total: u64,
    pub free: u64,
}

/// Source of device space figures. The engine calls it from several worker
/// threads during the pre-check, so implementations must be shareable.
pub trait SpaceProbe: Send + Sync {
    fn space(&self, path: &Path) -> std::io::Result<DeviceSpace>;
}

/// Queries the operating system for the volume backing `path`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    #[cfg(unix)]
    fn space(&self, path: &Path) -> std::io::Result<DeviceSpace> {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        let frsize = stat.f_frsize as u64;
        Ok(DeviceSpace {
            total: frsize.saturating_mul(stat.f_blocks as u64),
            free: frsize.saturating_mul(stat.f_bavail as u64),
        })
    }

    #[cfg(not(unix))]
    fn space(&self, path: &Path) -> std::io::Result<DeviceSpace> {
        use sysinfo::Disks;

        let canonical = std::fs::canonicalize(path)?;
        let disks = Disks::new_with_refreshed_list();

        let mut best_match = None;
        let mut best_len = 0usize;
        for disk in disks.iter() {
            let mount = disk.mount_point();
            if canonical.starts_with(mount) {
                let depth = mount.components().count();
                if depth >= best_len {
                    best_len = depth;
                    best_match = Some(disk);
                }
            }
        }

        let disk = best_match.ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no filesystem information available for {}", path.display()),
            )
        })?;
        Ok(DeviceSpace {
            total: disk.total_space(),
            free: disk.available_space(),
        })
    }
}

/// Capacity figures fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityBudget {
    pub device_total: u64,
    pub reserve_bytes: u64,
    pub target_size: u64,
}

impl CapacityBudget {
    pub fn new(device_total: u64, reserve_bytes: u64) -> Self {
        Self {
            device_total,
            reserve_bytes,
            target_size: device_total.saturating_sub(reserve_bytes),
        }
    }
}

/// Check a reported total against the configured expected size band.
/// The band is inclusive on both ends.
pub fn verify_capacity(total_bytes: u64, config: &FillConfig) -> Result<u64> {
    let expected = config.expected_size_gb as f64 * GIB as f64;
    let expected_min = expected * (1.0 - config.allowed_deviation);
    let expected_max = expected * (1.0 + config.allowed_deviation);
    let total = total_bytes as f64;

    if !(expected_min <= total && total <= expected_max) {
        return Err(StartupError::CapacityMismatch {
            expected_gb: config.expected_size_gb,
            allowed_deviation: config.allowed_deviation,
            actual_bytes: total_bytes,
        }
        .into());
    }
    Ok(total_bytes)
}

/// Queries the device and derives the run's capacity budget.
pub struct CapacityOracle<'a> {
    config: &'a FillConfig,
    probe: &'a dyn SpaceProbe,
}

impl<'a> CapacityOracle<'a> {
    pub fn new(config: &'a FillConfig, probe: &'a dyn SpaceProbe) -> Self {
        Self { config, probe }
    }

    /// Reported total size of the target device.
    pub fn device_total(&self) -> Result<u64> {
        let path = &self.config.device_path;
        let space = self
            .probe
            .space(path)
            .map_err(|err| StartupError::capacity_query(path, err))?;
        Ok(space.total)
    }

    /// Establish the budget. With `skip_check` the deviation band is not
    /// enforced but the target is derived the same way.
    pub fn budget(&self, skip_check: bool) -> Result<CapacityBudget> {
        let mut total = self.device_total()?;
        if skip_check {
            log::info!("capacity check bypassed; device reports {total} bytes");
        } else {
            total = verify_capacity(total, self.config)?;
        }
        Ok(CapacityBudget::new(total, self.config.reserve_bytes))
    }
}
