// ============================================================================
// ERRORS — structural failures reported by the editing core
// ============================================================================
//
// Pixel math never fails: out-of-range numbers are clamped. Only structural
// problems (bad region, unknown or malformed filter, nothing loaded) and the
// file/config collaborators produce errors, and none of them leave a session
// half-modified.
// ============================================================================

use crate::canvas::Rect;

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(thiserror::Error, Debug)]
pub enum EditorError {
    #[error("invalid region: {rect} does not fit inside a {width}x{height} buffer")]
    InvalidRegion { rect: Rect, width: u32, height: u32 },

    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

impl EditorError {
    pub fn invalid_region(rect: Rect, width: u32, height: u32) -> Self {
        Self::InvalidRegion { rect, width, height }
    }

    pub fn unsupported_filter(msg: impl Into<String>) -> Self {
        Self::UnsupportedFilter(msg.into())
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        let rect = Rect::new(5, 5, 3, 3);
        let msg = EditorError::invalid_region(rect, 4, 4).to_string();
        assert!(msg.contains("invalid region:"));
        assert!(msg.contains("4x4"));
        assert!(
            EditorError::unsupported_filter("Lomo")
                .to_string()
                .contains("unsupported filter: Lomo")
        );
        assert!(
            EditorError::precondition("no image loaded")
                .to_string()
                .contains("precondition violated:")
        );
        assert!(
            EditorError::config("history_limit")
                .to_string()
                .contains("configuration error:")
        );
    }

    #[test]
    fn io_preserves_source() {
        let err = EditorError::from(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
    }
}
