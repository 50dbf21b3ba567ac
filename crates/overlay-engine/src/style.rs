//! Generates and installs the document-level suppression stylesheet.

use document_tree::{Document, Selector};
use tracing::debug;

use crate::errors::EngineError;
use crate::metrics;
use crate::model::format_opacity;
use crate::policy::HoverMode;
use crate::profile::SiteProfile;

/// Inline style fragments a host writes to hide an element. Inline styles
/// are matched verbatim, so both spellings are listed.
const HOST_HIDDEN_STYLES: [&str; 4] = [
    "display: none",
    "display:none",
    "visibility: hidden",
    "visibility:hidden",
];

#[derive(Clone, Debug)]
pub struct StyleRuleGenerator {
    stylesheet_id: String,
    marker: String,
    profile_name: String,
    protected_zones: Vec<String>,
    hidden_markers: Vec<String>,
    autohide_markers: Vec<String>,
    hover_mode: HoverMode,
    installed: Option<String>,
}

impl StyleRuleGenerator {
    pub fn new(profile: &SiteProfile, hover_mode: HoverMode) -> Self {
        Self {
            stylesheet_id: profile.stylesheet_id.clone(),
            marker: profile.marker_selector(),
            profile_name: profile.name.clone(),
            protected_zones: parseable(&profile.protected_zones),
            hidden_markers: parseable(&profile.hidden_markers),
            autohide_markers: parseable(&profile.autohide_markers),
            hover_mode,
            installed: None,
        }
    }

    pub fn stylesheet_id(&self) -> &str {
        &self.stylesheet_id
    }

    /// Full stylesheet text for `intensity`.
    pub fn render(&self, intensity: f64) -> String {
        let marker = &self.marker;
        let mut css = format!("/* overlay-dimmer: {} */\n", self.profile_name);
        css.push_str(&format!(
            "{marker} {{\n  transition: opacity 0.3s ease !important;\n}}\n"
        ));

        if self.hover_mode == HoverMode::Declarative {
            let visible = format!("{marker}{}", self.visibility_guard());
            css.push_str(&format!(
                "{visible} {{\n  opacity: {} !important;\n}}\n",
                format_opacity(intensity)
            ));
            css.push_str(&format!(
                "{visible}:hover {{\n  opacity: 1 !important;\n}}\n"
            ));
        }

        if !self.autohide_markers.is_empty() {
            let selectors: Vec<String> = self
                .autohide_markers
                .iter()
                .flat_map(|a| [format!("{a} {marker}"), format!("{marker}{a}")])
                .collect();
            css.push_str(&format!(
                "{} {{\n  opacity: 0 !important;\n  pointer-events: none !important;\n}}\n",
                selectors.join(", ")
            ));
        }

        if !self.protected_zones.is_empty() {
            let selectors: Vec<String> = self
                .protected_zones
                .iter()
                .cloned()
                .chain(self.protected_zones.iter().map(|z| format!("{z} {marker}")))
                .collect();
            css.push_str(&format!(
                "{} {{\n  opacity: 1 !important;\n}}\n",
                selectors.join(", ")
            ));
            if !self.autohide_markers.is_empty() {
                let hidden_zones: Vec<String> = self
                    .autohide_markers
                    .iter()
                    .flat_map(|a| self.protected_zones.iter().map(move |z| format!("{a} {z}")))
                    .collect();
                css.push_str(&format!(
                    "{} {{\n  opacity: 0 !important;\n}}\n",
                    hidden_zones.join(", ")
                ));
            }
        }
        css
    }

    /// `:not(...)` chain excluding host-hidden, auto-hidden and protected
    /// elements from the intensity and hover rules.
    fn visibility_guard(&self) -> String {
        let mut guard = String::new();
        for hidden in HOST_HIDDEN_STYLES {
            guard.push_str(&format!(":not([style*=\"{hidden}\"])"));
        }
        for hidden in &self.hidden_markers {
            guard.push_str(&format!(":not({hidden})"));
        }
        for autohide in &self.autohide_markers {
            guard.push_str(&format!(":not({autohide}):not({autohide} *)"));
        }
        if !self.protected_zones.is_empty() {
            let zones: Vec<String> = self
                .protected_zones
                .iter()
                .map(|z| format!("{z} *"))
                .collect();
            guard.push_str(&format!(":not({})", zones.join(", ")));
        }
        guard
    }

    /// Installs (or replaces) the stylesheet. `Ok(false)` when the live
    /// sheet already has exactly this text.
    pub fn install(&mut self, doc: &Document, intensity: f64) -> Result<bool, EngineError> {
        let css = self.render(intensity);
        if self.installed.as_deref() == Some(css.as_str())
            && doc.stylesheet_text(&self.stylesheet_id).as_deref() == Some(css.as_str())
        {
            return Ok(false);
        }
        let revision = doc.install_stylesheet(&self.stylesheet_id, &css)?;
        debug!(
            target: "overlay-engine",
            id = %self.stylesheet_id,
            revision,
            intensity,
            "suppression rules installed"
        );
        metrics::record_rule_install();
        self.installed = Some(css);
        Ok(true)
    }

    pub fn uninstall(&mut self, doc: &Document) -> bool {
        self.installed = None;
        doc.remove_stylesheet(&self.stylesheet_id)
    }

    pub fn is_installed(&self, doc: &Document) -> bool {
        doc.stylesheet_text(&self.stylesheet_id).is_some()
    }
}

/// Drops entries that would make the whole stylesheet unparseable.
fn parseable(selectors: &[String]) -> Vec<String> {
    selectors
        .iter()
        .filter(|s| Selector::parse(s).is_ok())
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_tree::NodeId;

    const MARKER: &str = "data-overlay-dimmed";

    fn marked(doc: &Document, parent: NodeId, class: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attribute(node, "class", class).unwrap();
        doc.set_attribute(node, MARKER, "true").unwrap();
        doc.append_child(parent, node).unwrap();
        node
    }

    fn opacity(doc: &Document, node: NodeId) -> f64 {
        doc.computed_style(node).unwrap().opacity
    }

    #[test]
    fn install_is_idempotent() {
        let doc = Document::new();
        let mut rules = StyleRuleGenerator::new(&SiteProfile::default(), HoverMode::Declarative);
        assert!(rules.install(&doc, 0.3).unwrap());
        let revision = doc.stylesheet_revision(rules.stylesheet_id());
        assert!(!rules.install(&doc, 0.3).unwrap());
        assert_eq!(doc.stylesheet_revision(rules.stylesheet_id()), revision);
        assert!(rules.install(&doc, 0.6).unwrap());
        assert!(doc.stylesheet_revision(rules.stylesheet_id()) > revision);
    }

    #[test]
    fn reinstalls_after_external_removal() {
        let doc = Document::new();
        let mut rules = StyleRuleGenerator::new(&SiteProfile::default(), HoverMode::Declarative);
        rules.install(&doc, 0.3).unwrap();
        doc.remove_stylesheet(rules.stylesheet_id());
        assert!(rules.install(&doc, 0.3).unwrap());
        assert!(rules.is_installed(&doc));
    }

    #[test]
    fn rules_apply_in_priority_order() {
        let doc = Document::new();
        let player = doc.create_element("div");
        doc.append_child(doc.body(), player).unwrap();
        let card = marked(&doc, player, "ytp-ce-element-show");
        let hidden = marked(&doc, player, "ytp-ce-element-show ytp-ce-element-hide");
        let zone = doc.create_element("div");
        doc.set_attribute(zone, "class", "ytp-chrome-bottom").unwrap();
        doc.append_child(player, zone).unwrap();
        let in_zone = marked(&doc, zone, "ytp-ce-element-show");

        let mut rules = StyleRuleGenerator::new(&SiteProfile::default(), HoverMode::Declarative);
        rules.install(&doc, 0.3).unwrap();

        assert_eq!(opacity(&doc, card), 0.3);
        assert_eq!(opacity(&doc, hidden), 1.0);
        assert_eq!(opacity(&doc, in_zone), 1.0);
        assert_eq!(opacity(&doc, zone), 1.0);

        doc.pointer_over(card).unwrap();
        assert_eq!(opacity(&doc, card), 1.0);
        doc.pointer_out();
        assert_eq!(opacity(&doc, card), 0.3);

        doc.add_class(player, "ytp-autohide").unwrap();
        assert_eq!(opacity(&doc, card), 0.0);
        assert_eq!(
            doc.computed_style(card).unwrap().pointer_events,
            "none".to_string()
        );
        assert_eq!(opacity(&doc, zone), 0.0);
        assert_eq!(opacity(&doc, in_zone), 1.0);
    }

    #[test]
    fn host_hidden_inline_styles_skip_the_intensity_rule() {
        let doc = Document::new();
        let player = doc.create_element("div");
        doc.append_child(doc.body(), player).unwrap();
        let mut rules = StyleRuleGenerator::new(&SiteProfile::default(), HoverMode::Declarative);
        rules.install(&doc, 0.3).unwrap();

        for style in ["display: none", "display:none", "visibility: hidden", "visibility:hidden"] {
            let card = marked(&doc, player, "ytp-ce-element-show");
            doc.set_attribute(card, "style", style).unwrap();
            assert_eq!(opacity(&doc, card), 1.0, "{style}");
        }
        let shown = marked(&doc, player, "ytp-ce-element-show");
        doc.set_attribute(shown, "style", "display:block").unwrap();
        assert_eq!(opacity(&doc, shown), 0.3);
    }

    #[test]
    fn broken_profile_entries_do_not_break_the_sheet() {
        let mut profile = SiteProfile::default();
        profile.protected_zones.push(".ok > ".into());
        let doc = Document::new();
        let mut rules = StyleRuleGenerator::new(&profile, HoverMode::Declarative);
        assert!(rules.install(&doc, 0.3).unwrap());
    }

    #[test]
    fn imperative_mode_leaves_opacity_to_inline_writes() {
        let rules = StyleRuleGenerator::new(&SiteProfile::default(), HoverMode::Imperative);
        let css = rules.render(0.3);
        assert!(!css.contains(":hover"));
        assert!(!css.contains("opacity: 0.3"));
        assert!(css.contains("pointer-events: none"));
    }
}
