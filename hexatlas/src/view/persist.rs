//! Saved view records.
//!
//! A view is persisted as a small JSON record with an explicit format tag.
//! Restore is all-or-nothing: a tag mismatch or malformed record reports
//! failure and leaves the live view untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coord::WorldPoint;
use crate::view::{ViewChange, ViewState};

/// Format tag written into every saved view.
pub const VIEW_FORMAT: &str = "hexatlas-view/1";

/// Errors restoring a persisted view.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// The record carries a different format tag.
    #[error("unsupported view format: {0:?} (expected {VIEW_FORMAT:?})")]
    FormatMismatch(String),

    /// The record is not valid JSON for this shape.
    #[error("malformed view record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A persisted view: format tag, world center and log scale.
///
/// The viewport is deliberately absent; it belongs to the window, not the
/// view, and is supplied by the host on restore.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedView {
    pub format: String,
    pub center_x: f64,
    pub center_y: f64,
    pub log_scale: f64,
}

impl SavedView {
    /// Capture the current view.
    pub fn capture(view: &ViewState) -> Self {
        Self {
            format: VIEW_FORMAT.to_string(),
            center_x: view.center().x,
            center_y: view.center().y,
            log_scale: view.log_scale(),
        }
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON without applying anything.
    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply this record to a live view.
    ///
    /// Fails without touching the view when the format tag mismatches;
    /// center and scale are clamped like any direct mutation.
    pub fn apply(&self, view: &mut ViewState) -> Result<ViewChange, RestoreError> {
        if self.format != VIEW_FORMAT {
            return Err(RestoreError::FormatMismatch(self.format.clone()));
        }
        Ok(view.set_view(
            WorldPoint::new(self.center_x, self.center_y),
            self.log_scale,
            view.viewport(),
            view.clip(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AtlasConfig;
    use crate::coord::Viewport;

    fn view() -> ViewState {
        let config = AtlasConfig::default().normalize().unwrap();
        ViewState::new(
            &config,
            WorldPoint::new(12.5, -3.25),
            4.0,
            Viewport::new(800, 600),
        )
        .unwrap()
    }

    #[test]
    fn test_capture_roundtrip() {
        let original = view();
        let json = SavedView::capture(&original).to_json().unwrap();

        let mut restored = view();
        restored.set_view(WorldPoint::default(), 0.0, restored.viewport(), None);

        SavedView::from_json(&json)
            .unwrap()
            .apply(&mut restored)
            .unwrap();
        assert_eq!(restored.center(), original.center());
        assert_eq!(restored.log_scale(), original.log_scale());
    }

    #[test]
    fn test_format_mismatch_leaves_view_untouched() {
        let record = SavedView {
            format: "hexatlas-view/99".to_string(),
            center_x: 100.0,
            center_y: 100.0,
            log_scale: 9.0,
        };
        let mut v = view();
        let before_center = v.center();
        let before_scale = v.log_scale();

        let result = record.apply(&mut v);
        assert!(matches!(result, Err(RestoreError::FormatMismatch(_))));
        assert_eq!(v.center(), before_center);
        assert_eq!(v.log_scale(), before_scale);
    }

    #[test]
    fn test_malformed_json_fails() {
        let result = SavedView::from_json("{\"format\": 3}");
        assert!(matches!(result, Err(RestoreError::Malformed(_))));
    }

    #[test]
    fn test_restored_scale_is_clamped() {
        let record = SavedView {
            format: VIEW_FORMAT.to_string(),
            center_x: 0.0,
            center_y: 0.0,
            log_scale: 99.0,
        };
        let mut v = view();
        record.apply(&mut v).unwrap();
        assert_eq!(v.log_scale(), 10.0);
    }
}
