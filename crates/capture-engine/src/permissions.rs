//! Capture permission broker.

use std::sync::atomic::{AtomicU32, Ordering};

/// Asks the platform for capture permission.
///
/// Requests may show a prompt and cannot be cancelled once issued.
#[async_trait::async_trait]
pub trait PermissionBroker: Send + Sync {
    async fn request_camera_access(&self) -> bool;

    async fn request_microphone_access(&self) -> bool;
}

/// A broker with fixed answers that counts how often it was asked.
#[derive(Debug, Default)]
pub struct StaticPermissionBroker {
    camera: bool,
    microphone: bool,
    camera_requests: AtomicU32,
    microphone_requests: AtomicU32,
}

impl StaticPermissionBroker {
    pub fn new(camera: bool, microphone: bool) -> Self {
        Self {
            camera,
            microphone,
            ..Self::default()
        }
    }

    pub fn granted() -> Self {
        Self::new(true, true)
    }

    pub fn denied() -> Self {
        Self::new(false, false)
    }

    pub fn camera_requests(&self) -> u32 {
        self.camera_requests.load(Ordering::Relaxed)
    }

    pub fn microphone_requests(&self) -> u32 {
        self.microphone_requests.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl PermissionBroker for StaticPermissionBroker {
    async fn request_camera_access(&self) -> bool {
        self.camera_requests.fetch_add(1, Ordering::Relaxed);
        self.camera
    }

    async fn request_microphone_access(&self) -> bool {
        self.microphone_requests.fetch_add(1, Ordering::Relaxed);
        self.microphone
    }
}
