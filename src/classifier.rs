//! Event and page-title canonicalization
//!
//! The platform exports localized page titles and event labels. The
//! classifier rewrites both onto the canonical vocabulary and derives the
//! composite paragraph-level activity identifier used by paragraph logs.
//!
//! Relabeling is open-world: a label with no mapping entry passes through
//! unchanged rather than failing validation.

use std::collections::HashMap;

use crate::types::{EventKind, RawEvent};

/// Separator for the composite paragraph activity identifier.
const COMPOSITE_SEPARATOR: &str = "_";

/// Label mappings handed to the classifier at construction time.
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    /// Raw page title → canonical activity code.
    pub page_titles: HashMap<String, String>,
    /// Raw event label → canonical event label.
    pub event_labels: HashMap<String, String>,
}

impl ClassifierConfig {
    /// The mapping shipped for the programming-tutorial deployment:
    /// Italian page titles onto short activity codes, Italian event names
    /// onto the canonical [`EventKind`] spellings.
    pub fn tutorial_defaults() -> Self {
        let page_titles = [
            ("Introduzione", "INTRO"),
            ("Introduzione-Quiz", "INTRO-Q"),
            ("Primo programma", "PROG"),
            ("Primo programma-Quiz", "PROG-Q"),
            ("Variabili", "VARS"),
            ("Variabili-Quiz", "VARS-Q"),
            ("Istruzione if", "IF_ELSE"),
            ("Istruzione if-Quiz", "IF_ELSE-Q"),
            ("Ciclo for", "FOR"),
            ("Ciclo for-Quiz", "FOR-Q"),
            ("Tipi di dato", "TYPES"),
            ("Tipi di dato-Quiz", "TYPES-Q"),
            ("Conversioni", "CONV"),
            ("Conversioni-Quiz", "CONV-Q"),
            ("Liste", "LISTS"),
            ("Liste-Quiz", "LISTS-Q"),
            ("Dizionari", "DICTS"),
            ("Dizionari-Quiz", "DICTS-Q"),
            ("Funzioni", "FUNCT"),
            ("Funzioni-Quiz", "FUNCT-Q"),
            ("Survey", "SURVEY-START"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let event_labels = [
            ("ingressoPagina", EventKind::PageIn),
            ("uscitaPagina", EventKind::PageOut),
            ("mouseover", EventKind::MouseIn),
            ("mouseout", EventKind::MouseOut),
            ("mouseenter", EventKind::MouseEnter),
            ("click", EventKind::Click),
            ("dbclick", EventKind::DoubleClick),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.as_str().to_string()))
        .collect();

        Self {
            page_titles,
            event_labels,
        }
    }
}

/// Rewrites raw labels onto the canonical vocabulary.
pub struct EventClassifier {
    config: ClassifierConfig,
}

impl EventClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Relabel page titles and event labels in place. Unmapped labels are
    /// left as they are.
    pub fn relabel(&self, events: &mut [RawEvent]) {
        for event in events.iter_mut() {
            if let Some(canonical) = self.config.page_titles.get(&event.page_title) {
                event.page_title = canonical.clone();
            }
            if let Some(canonical) = self.config.event_labels.get(&event.event) {
                event.event = canonical.clone();
            }
        }
    }

    /// Composite paragraph activity: canonical page title, canonical event
    /// label, and paragraph index joined with `_` (e.g. `VARS_Click_3`).
    pub fn composite_activity(page_title: &str, event: &str, page_para: i64) -> String {
        [page_title, event, &page_para.to_string()].join(COMPOSITE_SEPARATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn make_event(page_title: &str, event: &str) -> RawEvent {
        RawEvent {
            session_id: "s1".to_string(),
            page_title: page_title.to_string(),
            menu: "main".to_string(),
            page_order: 5,
            page_para: 3,
            event: event.to_string(),
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 7)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_relabel_known_labels() {
        let classifier = EventClassifier::new(ClassifierConfig::tutorial_defaults());
        let mut events = vec![make_event("Variabili", "click")];

        classifier.relabel(&mut events);

        assert_eq!(events[0].page_title, "VARS");
        assert_eq!(events[0].event, "Click");
    }

    #[test]
    fn test_unmapped_labels_pass_through() {
        let classifier = EventClassifier::new(ClassifierConfig::tutorial_defaults());
        let mut events = vec![make_event("Pagina inattesa", "scroll")];

        classifier.relabel(&mut events);

        assert_eq!(events[0].page_title, "Pagina inattesa");
        assert_eq!(events[0].event, "scroll");
    }

    #[test]
    fn test_composite_activity_format() {
        assert_eq!(
            EventClassifier::composite_activity("VARS", "Click", 3),
            "VARS_Click_3"
        );
        assert_eq!(
            EventClassifier::composite_activity("SURVEY-END", "PageIn", 0),
            "SURVEY-END_PageIn_0"
        );
    }

    #[test]
    fn test_event_mapping_covers_canonical_vocabulary() {
        let config = ClassifierConfig::tutorial_defaults();
        for canonical in config.event_labels.values() {
            assert!(EventKind::from_label(canonical).is_some());
        }
    }
}
