//! Webcam adapter (nokhwa).
//!
//! This crate implements the `pmon-core` CaptureSource port over the native
//! camera backend. The device is opened for each capture and released again,
//! so nothing holds it between cycles.

use async_trait::async_trait;
use chrono::Local;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
    Camera,
};

pub mod device;
pub mod encode;

use pmon_core::{config::Config, domain::CapturedImage, ports::CaptureSource, Error, Result};

use crate::{
    device::{list_devices, select_device, CameraDevice},
    encode::{encode_jpeg, Frame},
};

const REQUESTED_FPS: u32 = 30;

#[derive(Clone, Debug)]
pub struct CameraSettings {
    /// Position in the enumerated device list.
    pub device_index: usize,
    pub width: u32,
    pub height: u32,
    pub jpeg_quality: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            jpeg_quality: 90,
        }
    }
}

impl CameraSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            device_index: cfg.camera_index,
            width: cfg.capture_width,
            height: cfg.capture_height,
            jpeg_quality: cfg.jpeg_quality,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WebcamSource {
    device: CameraDevice,
    settings: CameraSettings,
}

impl WebcamSource {
    /// Enumerate cameras and bind to the configured one.
    ///
    /// Fails with `Error::Device` when no camera is present or the configured
    /// index is out of range. The device itself is not opened yet.
    pub fn open(settings: CameraSettings) -> Result<Self> {
        let devices = list_devices()?;
        let device = select_device(&devices, settings.device_index)?.clone();
        tracing::info!(camera = %device, "camera selected");
        Ok(Self { device, settings })
    }
}

#[async_trait]
impl CaptureSource for WebcamSource {
    async fn capture(&self) -> Result<CapturedImage> {
        let index = self.device.index.clone();
        let settings = self.settings.clone();

        // nokhwa is blocking (and its handles are not Send on every backend),
        // so the whole acquire → read → release happens on one blocking thread.
        tokio::task::spawn_blocking(move || -> Result<CapturedImage> {
            let frame = grab_frame(&index, &settings)?;
            let captured_at = Local::now();
            let jpeg = encode_jpeg(&frame, settings.jpeg_quality)?;
            Ok(CapturedImage {
                jpeg,
                width: frame.width,
                height: frame.height,
                captured_at,
            })
        })
        .await
        .map_err(|e| Error::Device(format!("capture task failed: {e}")))?
    }
}

fn grab_frame(index: &CameraIndex, settings: &CameraSettings) -> Result<Frame> {
    let mut camera = open_camera(index, settings)?;

    camera
        .open_stream()
        .map_err(|e| Error::Device(format!("failed to start camera stream: {e}")))?;
    let buffer = camera.frame();
    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "failed to stop camera stream");
    }
    drop(camera);

    let buffer = buffer.map_err(|e| Error::Device(format!("failed to read frame: {e}")))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| Error::Device(format!("failed to decode frame: {e}")))?;

    Ok(Frame {
        width: decoded.width(),
        height: decoded.height(),
        data: decoded.into_raw(),
    })
}

/// Open the camera, trying progressively looser format requests.
fn open_camera(index: &CameraIndex, settings: &CameraSettings) -> Result<Camera> {
    let resolution = Resolution::new(settings.width, settings.height);
    let attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            FrameFormat::YUYV,
            REQUESTED_FPS,
        ))),
        // Let the driver pick whatever works.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for requested in attempts {
        match Camera::new(index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => {
                tracing::debug!(error = %e, "camera format rejected, trying next");
                last_error = Some(e);
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no format accepted".to_string());
    let lower = reason.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") {
        return Err(Error::Device(format!("camera access denied: {reason}")));
    }
    Err(Error::Device(format!("failed to open camera: {reason}")))
}
