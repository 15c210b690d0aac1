mod slug;
mod snapshot;

pub use slug::Slug;
pub use snapshot::{BoundingSphere, CameraPose, MAX_SOLID_ANGLE, VisibilitySnapshot};
