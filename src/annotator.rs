//! Idempotent price decoration
//!
//! Scans a subtree for qualifying elements, parses and converts each
//! price, and attaches a tooltip under a wrapper element. Per-element
//! state lives in an explicit map keyed by node identity, owned
//! exclusively by the annotator; an element whose record already carries
//! the current epoch is skipped, which is what lets the mutation stream
//! quiesce after the annotator's own writes.

use crate::constants::{
    TOOLTIP_CLASS, TOOLTIP_HIGHLIGHT_CLASS, TOOLTIP_ROW_CLASS, WRAPPER_CLASS,
};
use crate::convert;
use crate::dom::{Document, NodeId, SelectorSet};
use crate::parser;
use crate::types::{ConvertedPrice, RateTable};
use std::collections::HashMap;

/// State attached to a decorated element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationRecord {
    /// The rate table epoch this element's decoration was computed under
    pub epoch: u64,
}

/// Scans a document for qualifying elements and decorates them
pub struct Annotator {
    records: HashMap<NodeId, AnnotationRecord>,
}

impl Annotator {
    /// Creates an annotator with no decorated elements
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Scans the document for qualifying elements and decorates each one
    /// at most once per epoch.
    ///
    /// Elements whose text does not parse are left unmarked so a later
    /// text change can still be picked up.
    ///
    /// # Returns
    /// The number of elements newly decorated by this pass
    pub fn scan(
        &mut self,
        doc: &mut Document,
        selectors: &SelectorSet,
        table: &RateTable,
    ) -> usize {
        self.prune(doc);

        let mut decorated = 0;
        for id in doc.query(doc.root(), selectors) {
            if self
                .records
                .get(&id)
                .is_some_and(|record| record.epoch == table.epoch)
            {
                continue;
            }

            let Some(price) = parser::parse(doc.text(id)) else {
                continue;
            };
            let converted = convert::convert(&price, table);
            self.decorate(doc, id, &converted);
            self.records.insert(id, AnnotationRecord { epoch: table.epoch });
            decorated += 1;
        }

        if decorated > 0 {
            tracing::debug!(decorated, epoch = table.epoch, "Decorated price elements");
        }
        decorated
    }

    /// Strips every record and tooltip, then rescans, forcing full
    /// re-decoration under the new table's epoch
    pub fn rescan_after_rate_change(
        &mut self,
        doc: &mut Document,
        selectors: &SelectorSet,
        table: &RateTable,
    ) -> usize {
        self.strip(doc);
        self.scan(doc, selectors, table)
    }

    /// Removes every tooltip and clears all annotation records
    pub fn strip(&mut self, doc: &mut Document) {
        let stripped = self.records.len();
        for (id, _) in self.records.drain() {
            let Some(parent) = doc.parent(id) else {
                continue;
            };
            if !doc.has_class(parent, WRAPPER_CLASS) {
                continue;
            }
            if let Some(tooltip) = doc.find_child_by_class(parent, TOOLTIP_CLASS) {
                doc.remove(tooltip);
            }
        }
        if stripped > 0 {
            tracing::debug!(stripped, "Stripped price decorations");
        }
    }

    fn decorate(&mut self, doc: &mut Document, el: NodeId, converted: &ConvertedPrice) {
        let wrapper = ensure_wrapper(doc, el);
        if let Some(old_tooltip) = doc.find_child_by_class(wrapper, TOOLTIP_CLASS) {
            doc.remove(old_tooltip);
        }
        let tooltip = build_tooltip(doc, converted);
        doc.append_child(wrapper, tooltip);
    }

    /// Drops records of elements no longer attached to the tree
    fn prune(&mut self, doc: &Document) {
        self.records.retain(|&id, _| doc.is_attached(id));
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the element's wrapper container, creating one and reparenting
/// the element into it only when absent
fn ensure_wrapper(doc: &mut Document, el: NodeId) -> NodeId {
    match doc.parent(el) {
        Some(parent) if doc.has_class(parent, WRAPPER_CLASS) => parent,
        Some(parent) => {
            let wrapper = doc.create_element("div", &[WRAPPER_CLASS]);
            doc.insert_before(parent, wrapper, el);
            doc.append_child(wrapper, el);
            wrapper
        }
        None => {
            let wrapper = doc.create_element("div", &[WRAPPER_CLASS]);
            doc.append_child(wrapper, el);
            wrapper
        }
    }
}

fn build_tooltip(doc: &mut Document, converted: &ConvertedPrice) -> NodeId {
    let tooltip = doc.create_element("div", &[TOOLTIP_CLASS]);
    for target in &converted.targets {
        let row = if target.emphasized {
            doc.create_element("div", &[TOOLTIP_ROW_CLASS, TOOLTIP_HIGHLIGHT_CLASS])
        } else {
            doc.create_element("div", &[TOOLTIP_ROW_CLASS])
        };

        let currency = doc.create_element("span", &["currency"]);
        doc.set_text(currency, target.currency.symbol());
        let amount = doc.create_element("span", &["amount"]);
        doc.set_text(amount, &format_amount(target.amount));

        doc.append_child(row, currency);
        doc.append_child(row, amount);
        doc.append_child(tooltip, row);
    }
    tooltip
}

/// Formats an amount with two decimals, a comma decimal separator and
/// space-grouped thousands
pub(crate) fn format_amount(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (formatted.as_str(), "00"),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(*c);
    }
    format!("{grouped},{frac_part}")
}
