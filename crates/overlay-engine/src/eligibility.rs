use document_tree::{Document, NodeId, Selector};
use serde::Serialize;

use crate::profile::SiteProfile;
use crate::scanner::PatternSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    Gone,
    ProtectedZone,
    HostHidden,
    NotRendered,
}

/// Decides whether a matched candidate may be suppressed.
#[derive(Clone, Debug)]
pub struct EligibilityFilter {
    protected: Option<Selector>,
    hidden: Option<Selector>,
}

impl EligibilityFilter {
    pub fn from_profile(profile: &SiteProfile) -> Self {
        let hidden: Vec<String> = profile
            .hidden_markers
            .iter()
            .chain(profile.autohide_markers.iter())
            .cloned()
            .collect();
        Self {
            protected: PatternSet::compile("protected zone", &profile.protected_zones).combined(),
            hidden: PatternSet::compile("hidden marker", &hidden).combined(),
        }
    }

    pub fn evaluate(&self, doc: &Document, node: NodeId) -> Result<(), Rejection> {
        if !doc.is_connected(node) {
            return Err(Rejection::Gone);
        }
        if let Some(zone) = &self.protected {
            if doc.closest(node, zone).is_some() {
                return Err(Rejection::ProtectedZone);
            }
        }
        if let Some(hidden) = &self.hidden {
            if doc.matches(node, hidden) {
                return Err(Rejection::HostHidden);
            }
        }
        match doc.computed_style(node) {
            Ok(style) if style.is_rendered() => Ok(()),
            Ok(_) => Err(Rejection::NotRendered),
            Err(_) => Err(Rejection::Gone),
        }
    }

    pub fn admits(&self, doc: &Document, node: NodeId) -> bool {
        self.evaluate(doc, node).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_tree::{DocumentFixture, NodeSpec};

    fn spec(tag: &str, classes: &[&str], children: Vec<NodeSpec>) -> NodeSpec {
        NodeSpec {
            tag: tag.into(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            children,
            ..NodeSpec::default()
        }
    }

    fn fixture() -> Document {
        DocumentFixture {
            body: vec![spec(
                "div",
                &["html5-video-player"],
                vec![
                    spec(
                        "div",
                        &["ytp-chrome-bottom"],
                        vec![spec("div", &["ytp-ce-element-show"], vec![])],
                    ),
                    spec("div", &["ytp-ce-element-show"], vec![]),
                    spec("div", &["ytp-ce-element-show", "ytp-ce-element-hide"], vec![]),
                ],
            )],
            ..DocumentFixture::default()
        }
        .build()
        .unwrap()
    }

    #[test]
    fn protected_zone_wins_over_match() {
        let doc = fixture();
        let filter = EligibilityFilter::from_profile(&SiteProfile::default());
        let cards = doc.select(".ytp-ce-element-show").unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(filter.evaluate(&doc, cards[0]), Err(Rejection::ProtectedZone));
        assert_eq!(filter.evaluate(&doc, cards[1]), Ok(()));
        assert_eq!(filter.evaluate(&doc, cards[2]), Err(Rejection::HostHidden));
    }

    #[test]
    fn unrendered_and_detached_are_rejected() {
        let doc = fixture();
        let filter = EligibilityFilter::from_profile(&SiteProfile::default());
        let cards = doc.select(".ytp-ce-element-show").unwrap();
        doc.set_style_property(cards[1], "display", "none").unwrap();
        assert_eq!(filter.evaluate(&doc, cards[1]), Err(Rejection::NotRendered));
        doc.remove_style_property(cards[1], "display").unwrap();
        doc.detach(cards[1]).unwrap();
        assert!(!filter.admits(&doc, cards[1]));
    }
}
