use document_tree::{Document, NodeId, Selector, SelectorError};
use tracing::{debug, trace, warn};

use crate::eligibility::EligibilityFilter;
use crate::model::{EngineConfig, ScanReport, ScanTrigger};
use crate::profile::SiteProfile;
use crate::store::SuppressionStore;

/// Selector patterns compiled one by one; a bad pattern is skipped without
/// taking the others down with it.
#[derive(Clone, Debug)]
pub struct PatternSet {
    entries: Vec<(String, Result<Selector, SelectorError>)>,
    combined: Option<Selector>,
}

impl PatternSet {
    pub fn compile(kind: &str, patterns: &[String]) -> Self {
        let entries: Vec<(String, Result<Selector, SelectorError>)> = patterns
            .iter()
            .map(|source| (source.clone(), Selector::parse(source)))
            .collect();
        for (source, result) in &entries {
            if let Err(err) = result {
                warn!(target: "overlay-engine", kind, pattern = %source, %err, "pattern skipped");
            }
        }
        let combined = Selector::union(entries.iter().filter_map(|(_, r)| r.as_ref().ok()));
        Self { entries, combined }
    }

    pub fn combined(&self) -> Option<Selector> {
        self.combined.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// All matches under `scope`, deduplicated, in document order.
    pub fn query_all(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        match &self.combined {
            Some(selector) => doc.query_selector_all(scope, selector),
            None => Vec::new(),
        }
    }

    /// True when `node` or anything beneath it matches. Stops at the first hit.
    pub fn matches_subtree(&self, doc: &Document, node: NodeId) -> bool {
        let Some(selector) = &self.combined else {
            return false;
        };
        doc.matches(node, selector) || doc.query_selector(node, selector).is_some()
    }
}

/// Finds eligible candidates and marks them through the store.
#[derive(Clone, Debug)]
pub struct Scanner {
    patterns: PatternSet,
    filter: EligibilityFilter,
}

impl Scanner {
    pub fn from_profile(profile: &SiteProfile) -> Self {
        Self {
            patterns: PatternSet::compile("match pattern", &profile.match_patterns),
            filter: EligibilityFilter::from_profile(profile),
        }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn filter(&self) -> &EligibilityFilter {
        &self.filter
    }

    /// One pass over the whole document. Does nothing while disabled.
    pub fn scan(
        &self,
        doc: &Document,
        config: &EngineConfig,
        store: &mut SuppressionStore,
        trigger: ScanTrigger,
    ) -> ScanReport {
        let mut report = ScanReport::new(trigger);
        if !config.enabled {
            trace!(target: "overlay-engine", trigger = trigger.as_str(), "scan skipped while disabled");
            return report;
        }
        report.pruned = store.prune(doc);
        report.skipped_patterns = self.patterns.skipped();
        let candidates = self.patterns.query_all(doc, doc.root());
        report.candidates = candidates.len();
        for node in candidates {
            if store.is_suppressed(doc, node) {
                report.already_marked += 1;
                continue;
            }
            if let Err(reason) = self.filter.evaluate(doc, node) {
                trace!(target: "overlay-engine", %node, ?reason, "candidate rejected");
                report.rejected += 1;
                continue;
            }
            match store.mark_suppressed(doc, node) {
                Ok(true) => report.newly_marked.push(node),
                Ok(false) => report.already_marked += 1,
                Err(err) => warn!(target: "overlay-engine", %node, ?err, "failed to mark candidate"),
            }
        }
        debug!(
            target: "overlay-engine",
            trigger = trigger.as_str(),
            candidates = report.candidates,
            newly_marked = report.found(),
            rejected = report.rejected,
            pruned = report.pruned,
            "scan complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(doc: &Document, parent: NodeId, class: &str) -> NodeId {
        let node = doc.create_element("div");
        doc.set_attribute(node, "class", class).unwrap();
        doc.append_child(parent, node).unwrap();
        node
    }

    #[test]
    fn bad_pattern_does_not_abort_the_pass() {
        let doc = Document::new();
        let first = card(&doc, doc.body(), "ytp-ce-element-show");
        let panel = card(&doc, doc.body(), "ytReelMetapanelViewModelHost");
        let mut profile = SiteProfile::default();
        profile.match_patterns.insert(1, "div:nth-child(2)".into());
        let scanner = Scanner::from_profile(&profile);
        assert_eq!(scanner.patterns().skipped(), 1);

        let mut store = SuppressionStore::new(&profile.marker_attribute);
        let report = scanner.scan(&doc, &EngineConfig::default(), &mut store, ScanTrigger::Manual);
        assert_eq!(report.newly_marked, vec![first, panel]);
        assert_eq!(report.skipped_patterns, 1);
    }

    #[test]
    fn second_pass_marks_nothing_new() {
        let doc = Document::new();
        card(&doc, doc.body(), "ytp-ce-element-show");
        let scanner = Scanner::from_profile(&SiteProfile::default());
        let mut store = SuppressionStore::new("data-overlay-dimmed");
        let config = EngineConfig::default();
        assert_eq!(scanner.scan(&doc, &config, &mut store, ScanTrigger::Manual).found(), 1);
        let again = scanner.scan(&doc, &config, &mut store, ScanTrigger::Manual);
        assert_eq!(again.found(), 0);
        assert_eq!(again.already_marked, 1);
    }

    #[test]
    fn disabled_scan_is_a_no_op() {
        let doc = Document::new();
        let node = card(&doc, doc.body(), "ytp-ce-element-show");
        let scanner = Scanner::from_profile(&SiteProfile::default());
        let mut store = SuppressionStore::new("data-overlay-dimmed");
        let config = EngineConfig {
            enabled: false,
            ..EngineConfig::default()
        };
        let report = scanner.scan(&doc, &config, &mut store, ScanTrigger::Schedule);
        assert_eq!(report.found(), 0);
        assert!(!doc.has_attribute(node, "data-overlay-dimmed"));
    }

    #[test]
    fn subtree_check_finds_nested_candidates() {
        let doc = Document::new();
        let wrapper = card(&doc, doc.body(), "wrapper");
        card(&doc, wrapper, "ytp-ce-element-show");
        let scanner = Scanner::from_profile(&SiteProfile::default());
        assert!(scanner.patterns().matches_subtree(&doc, wrapper));
        assert!(!scanner.patterns().matches_subtree(&doc, doc.head()));
    }
}
