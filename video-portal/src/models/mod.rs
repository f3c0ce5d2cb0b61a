pub mod identity;
pub mod video;

pub use identity::{AuthResponse, Identity, Role};
pub use video::{DisplayStatus, ProcessingStatus, SensitivityStatus, StatusFilter, VideoAsset};
