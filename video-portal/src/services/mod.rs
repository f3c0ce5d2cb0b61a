pub mod api_client;
pub mod auth_client;
pub mod credential_store;
pub mod metrics;
pub mod policy;
pub mod reconciler;
pub mod roster;
pub mod stream;
pub mod upload;
pub mod video_client;
