//! Data models for the session and the cached projects.

mod project;
mod session;

pub use project::{FrameImage, FrameImages, ProjectDescriptor};
pub use session::{AuthStatus, Session, UserProfile};
