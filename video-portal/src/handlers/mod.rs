//! HTTP handlers for the video portal.

pub mod app;
pub mod auth;
pub mod library;
pub mod metrics;
pub mod upload;
pub mod users;
pub mod videos;
