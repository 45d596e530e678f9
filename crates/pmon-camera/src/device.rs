//! Camera device enumeration.

use nokhwa::{query, utils::ApiBackend, utils::CameraIndex};

use pmon_core::{Error, Result};

/// One enumerated camera.
#[derive(Clone, Debug)]
pub struct CameraDevice {
    /// Position in the enumerated list; this is what `CAMERA_ID` selects.
    pub position: usize,
    /// Backend-specific handle used to open the device.
    pub index: CameraIndex,
    pub name: String,
    pub description: String,
}

impl std::fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ({})", self.position, self.name, self.description)
    }
}

/// List all cameras visible to the native backend.
///
/// An empty list is not an error here; see [`select_device`].
pub fn list_devices() -> Result<Vec<CameraDevice>> {
    let devices = query(ApiBackend::Auto)
        .map_err(|e| Error::Device(format!("failed to enumerate cameras: {e}")))?;

    Ok(devices
        .into_iter()
        .enumerate()
        .map(|(position, d)| CameraDevice {
            position,
            index: d.index().clone(),
            name: d.human_name(),
            description: d.description().to_string(),
        })
        .collect())
}

/// Pick the camera at `position` in the enumerated list.
pub fn select_device(devices: &[CameraDevice], position: usize) -> Result<&CameraDevice> {
    if devices.is_empty() {
        return Err(Error::Device("No cameras found".to_string()));
    }
    devices.get(position).ok_or_else(|| {
        Error::Device(format!(
            "camera {position} not available ({} camera(s) found)",
            devices.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(position: usize) -> CameraDevice {
        CameraDevice {
            position,
            index: CameraIndex::Index(position as u32),
            name: format!("cam{position}"),
            description: "usb".to_string(),
        }
    }

    #[test]
    fn empty_device_list_fails_fast() {
        let err = select_device(&[], 0).unwrap_err();
        assert!(matches!(err, Error::Device(m) if m == "No cameras found"));
    }

    #[test]
    fn selects_by_position() {
        let devices = vec![device(0), device(1)];
        assert_eq!(select_device(&devices, 1).unwrap().name, "cam1");
    }

    #[test]
    fn out_of_range_position_is_a_device_error() {
        let devices = vec![device(0)];
        let err = select_device(&devices, 3).unwrap_err();
        assert!(matches!(err, Error::Device(m) if m.contains("1 camera(s) found")));
    }

    #[test]
    fn display_shows_position_and_name() {
        assert_eq!(device(2).to_string(), "[2] cam2 (usb)");
    }
}
