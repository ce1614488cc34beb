pub mod cli;
pub mod config;
pub mod copy;
pub mod events;
pub mod mesh;
pub mod mesh_preview;
pub mod skeleton;
pub mod skinning;

pub use copy::{CopyPasteError, CopyTool, PasteOptions, PasteReport};
pub use events::{EventBus, RigEvent, RigEventListener};
pub use mesh_preview::{MeshPreviewCache, PreviewDirty};
pub use skinning::{MeshTool, SkinningCache, SkinningMode};

use glam::Quat;

/// Wraps an angle in degrees into `[0, 360)`.
pub(crate) fn wrap_degrees(mut degrees: f32) -> f32 {
    while degrees >= 360.0 {
        degrees -= 360.0;
    }
    while degrees < 0.0 {
        degrees += 360.0;
    }
    degrees
}

/// Rotation around Z in degrees, as an editor displays it (`[0, 360)`).
/// Bones only rotate in the sprite plane, so X/Y components are ignored.
pub(crate) fn euler_z_degrees(rotation: Quat) -> f32 {
    let rotation = if rotation.length_squared() > 0.0 { rotation.normalize() } else { Quat::IDENTITY };
    let radians = 2.0 * rotation.z.atan2(rotation.w);
    wrap_degrees(radians.to_degrees())
}

pub(crate) fn rotation_from_degrees(degrees: f32) -> Quat {
    Quat::from_rotation_z(degrees.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn euler_z_roundtrips_through_quaternions() {
        for degrees in [0.0_f32, 45.0, 90.0, 179.5, 180.0, 270.0, 359.0] {
            let q = rotation_from_degrees(degrees);
            let back = euler_z_degrees(q);
            let diff = (back - degrees).abs().min(360.0 - (back - degrees).abs());
            assert!(diff < 1e-3, "expected {degrees}, got {back}");
        }
    }

    #[test]
    fn wrap_degrees_handles_negative_and_large_angles() {
        assert!((wrap_degrees(-90.0) - 270.0).abs() < 1e-5);
        assert!((wrap_degrees(720.0 + 10.0) - 10.0).abs() < 1e-5);
        assert!(wrap_degrees(360.0).abs() < 1e-5);
    }
}
