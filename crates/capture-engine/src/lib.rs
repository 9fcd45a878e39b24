//! Altimeter Capture Engine
//!
//! Owns the camera and microphone device graph. The session manager takes
//! its collaborators at construction:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                CaptureSessionManager                 │
//! │  commands ──► capture-config thread ──► backend      │
//! │                      │                    │          │
//! │          DeviceRegistry, PermissionBroker │          │
//! │                                           ▼          │
//! │              capture-video / capture-audio threads   │
//! │                         │                            │
//! │                         ▼                            │
//! │                   FrameHandler                       │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Graph changes are serialized on the configuration thread; frames are
//! delivered on per-media threads that never wait for it.

pub mod backend;
pub mod permissions;
pub mod registry;
pub mod session;

pub use backend::{
    CaptureBackend, CaptureOutput, ConnectionMetadata, FrameHandler, GraphConfiguration,
    NormalizedPoint, SessionPreset, SyntheticBackend, SyntheticInspector,
};
pub use permissions::{PermissionBroker, StaticPermissionBroker};
pub use registry::{DeviceRegistry, StaticDeviceRegistry};
pub use session::*;
