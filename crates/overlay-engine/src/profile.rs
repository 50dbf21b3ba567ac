//! Static description of one host application's overlay layout.

use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-overlay-dimmed";
pub const DEFAULT_STYLESHEET_ID: &str = "overlay-dimmer-styles";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    /// Candidate patterns, in match order.
    pub match_patterns: Vec<String>,
    /// Regions whose contents are never suppressed.
    pub protected_zones: Vec<String>,
    /// Host markers meaning "hidden on purpose".
    #[serde(default)]
    pub hidden_markers: Vec<String>,
    /// Host auto-hide markers; compound class/attribute selectors only.
    #[serde(default)]
    pub autohide_markers: Vec<String>,
    /// Narrow roots to observe, most preferred first.
    #[serde(default)]
    pub content_roots: Vec<String>,
    #[serde(default = "SiteProfile::default_marker_attribute")]
    pub marker_attribute: String,
    #[serde(default = "SiteProfile::default_stylesheet_id")]
    pub stylesheet_id: String,
}

impl SiteProfile {
    fn default_marker_attribute() -> String {
        DEFAULT_MARKER_ATTRIBUTE.to_string()
    }

    fn default_stylesheet_id() -> String {
        DEFAULT_STYLESHEET_ID.to_string()
    }

    /// Video player end-screen cards and short-form metadata panels.
    pub fn video_player() -> Self {
        Self {
            name: "video-player".into(),
            match_patterns: vec![
                ".ytp-ce-element-show".into(),
                ".ytReelMetapanelViewModelHost".into(),
            ],
            protected_zones: vec![
                ".ytp-chrome-bottom".into(),
                ".ytp-chrome-top".into(),
                ".ytp-chrome-controls".into(),
                ".ytp-gradient-bottom".into(),
                ".ytp-gradient-top".into(),
                ".ytp-progress-bar-container".into(),
            ],
            hidden_markers: vec![
                ".ytp-ce-element-hide".into(),
                "[aria-hidden=\"true\"]".into(),
            ],
            autohide_markers: vec![".ytp-autohide".into()],
            content_roots: vec!["ytd-app".into(), "#movie_player".into()],
            marker_attribute: Self::default_marker_attribute(),
            stylesheet_id: Self::default_stylesheet_id(),
        }
    }

    /// `[marker="true"]`.
    pub fn marker_selector(&self) -> String {
        format!("[{}=\"true\"]", self.marker_attribute)
    }
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::video_player()
    }
}
