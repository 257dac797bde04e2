//! Scene validation errors.

/// Errors raised when supplied scene geometry fails boundary validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    /// Scene bounds contain a non-finite value or have min > max on some axis.
    #[error("scene bounds are malformed: min {min:?}, max {max:?}")]
    MalformedBounds {
        /// Reported minimum corner.
        min: [f64; 3],
        /// Reported maximum corner.
        max: [f64; 3],
    },

    /// A collision volume's box is malformed.
    #[error("collision volume {index} has malformed bounds")]
    MalformedVolume {
        /// Index of the offending volume.
        index: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {vertex}, but only {vertex_count} vertices exist")]
    FaceIndexOutOfRange {
        /// Index of the offending face.
        face: usize,
        /// The out-of-range vertex index.
        vertex: u32,
        /// Number of vertices in the scene.
        vertex_count: usize,
    },
}
