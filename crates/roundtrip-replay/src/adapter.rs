//! Assertion adapter: the interface an external suite calls, and the
//! capturing implementation the harness hands it.
//!
//! The suite believes it is asserting; the adapter records every
//! syntax-acceptance assertion into a [`CaptureBuffer`] the harness owns.
//! Nothing is global: the buffer is passed in and reset explicitly with
//! [`CaptureAdapter::begin_test`].

use crate::suite::SuiteError;
use roundtrip_kernel::Tree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Grammar versions a fixture applies to. Empty means every version.
pub type Versions = BTreeSet<String>;

/// Parser-builder toggles in effect when a fixture was captured.
pub type BuilderAttributes = BTreeMap<String, bool>;

/// One captured syntax-acceptance assertion. Immutable after capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub node: Tree,
    pub parser_source: String,
    pub default_builder_attributes: BuilderAttributes,
    pub versions: Versions,
}

impl Capture {
    pub fn applies_to(&self, version: &str) -> bool {
        self.versions.is_empty() || self.versions.contains(version)
    }
}

/// The assertion entry points an external grammar suite calls.
pub trait Assertions {
    /// `source` parses to `node` under `versions` (empty: the ambient set).
    fn assert_parses(&mut self, node: Tree, source: &str, versions: &Versions);

    /// `source` is rejected with `diagnostic`.
    fn assert_diagnoses(&mut self, diagnostic: &str, source: &str, versions: &Versions);

    /// Source-map assertions carry nothing a round trip can check.
    fn assert_source_maps(&mut self, _source: &str, _versions: &Versions) {}

    /// Run `body` with `versions` as the ambient version set.
    fn with_versions(
        &mut self,
        versions: &Versions,
        body: &mut dyn FnMut(&mut dyn Assertions) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError>;

    fn set_builder_attribute(&mut self, name: &str, value: bool);
}

/// Harness-owned sink for captures.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    captures: Vec<Capture>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, capture: Capture) {
        self.captures.push(capture);
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }

    pub fn reset(&mut self) {
        self.captures.clear();
    }

    /// Take every capture, in call order, leaving the buffer empty.
    pub fn drain(&mut self) -> Vec<Capture> {
        std::mem::take(&mut self.captures)
    }
}

/// [`Assertions`] implementation that records instead of asserting.
#[derive(Debug)]
pub struct CaptureAdapter<'a> {
    buffer: &'a mut CaptureBuffer,
    defaults: BuilderAttributes,
    attributes: BuilderAttributes,
    ambient_versions: Versions,
    diagnoses: usize,
}

impl<'a> CaptureAdapter<'a> {
    pub fn new(buffer: &'a mut CaptureBuffer, defaults: BuilderAttributes) -> Self {
        Self {
            buffer,
            attributes: defaults.clone(),
            defaults,
            ambient_versions: Versions::new(),
            diagnoses: 0,
        }
    }

    /// Start a logical test: clear the buffer and restore default attributes.
    pub fn begin_test(&mut self) {
        self.buffer.reset();
        self.attributes = self.defaults.clone();
        self.ambient_versions.clear();
    }

    /// Captures recorded since the last [`begin_test`](Self::begin_test).
    pub fn drain(&mut self) -> Vec<Capture> {
        self.buffer.drain()
    }

    /// Diagnostic assertions seen so far. They are counted, not replayed.
    pub fn diagnoses(&self) -> usize {
        self.diagnoses
    }
}

impl Assertions for CaptureAdapter<'_> {
    fn assert_parses(&mut self, node: Tree, source: &str, versions: &Versions) {
        let versions = if versions.is_empty() {
            self.ambient_versions.clone()
        } else {
            versions.clone()
        };
        self.buffer.push(Capture {
            node,
            parser_source: source.to_string(),
            default_builder_attributes: self.attributes.clone(),
            versions,
        });
    }

    fn assert_diagnoses(&mut self, _diagnostic: &str, _source: &str, _versions: &Versions) {
        self.diagnoses += 1;
    }

    fn with_versions(
        &mut self,
        versions: &Versions,
        body: &mut dyn FnMut(&mut dyn Assertions) -> Result<(), SuiteError>,
    ) -> Result<(), SuiteError> {
        let saved = std::mem::replace(&mut self.ambient_versions, versions.clone());
        let result = body(self);
        self.ambient_versions = saved;
        result
    }

    fn set_builder_attribute(&mut self, name: &str, value: bool) {
        self.attributes.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtrip_kernel::Node;

    fn tree(sexp: &str) -> Tree {
        Tree::from(Node::parse_sexp(sexp).unwrap())
    }

    fn versions(list: &[&str]) -> Versions {
        list.iter().map(|v| v.to_string()).collect()
    }

    fn defaults() -> BuilderAttributes {
        BuilderAttributes::from([("fold_negative_literals".to_string(), true)])
    }

    #[test]
    fn records_parses_in_call_order_and_ignores_diagnoses() {
        let mut buffer = CaptureBuffer::new();
        let mut adapter = CaptureAdapter::new(&mut buffer, defaults());
        adapter.begin_test();
        adapter.assert_parses(tree("(int 1)"), "1", &Versions::new());
        adapter.assert_diagnoses("unexpected token", "1 +", &Versions::new());
        adapter.assert_source_maps("1", &Versions::new());
        adapter.assert_parses(tree("(int 2)"), "2", &versions(&["1.0"]));
        assert_eq!(adapter.diagnoses(), 1);
        let captures = adapter.drain();
        let sources: Vec<_> = captures.iter().map(|c| c.parser_source.as_str()).collect();
        assert_eq!(sources, vec!["1", "2"]);
        assert!(captures[0].applies_to("9.9"));
        assert!(!captures[1].applies_to("9.9"));
    }

    #[test]
    fn begin_test_resets_buffer_and_attributes() {
        let mut buffer = CaptureBuffer::new();
        let mut adapter = CaptureAdapter::new(&mut buffer, defaults());
        adapter.set_builder_attribute("fold_negative_literals", false);
        adapter.assert_parses(tree("(int 1)"), "1", &Versions::new());
        assert!(!adapter.buffer.captures[0].default_builder_attributes["fold_negative_literals"]);

        adapter.begin_test();
        assert!(adapter.buffer.is_empty());
        adapter.assert_parses(tree("(int 1)"), "1", &Versions::new());
        assert_eq!(adapter.drain()[0].default_builder_attributes, defaults());
    }

    #[test]
    fn with_versions_scopes_the_ambient_set() {
        let mut buffer = CaptureBuffer::new();
        let mut adapter = CaptureAdapter::new(&mut buffer, defaults());
        adapter
            .with_versions(&versions(&["0.9"]), &mut |inner| {
                inner.assert_parses(tree("(int 1)"), "1", &Versions::new());
                inner.assert_parses(tree("(int 2)"), "2", &versions(&["1.0"]));
                Ok(())
            })
            .unwrap();
        adapter.assert_parses(tree("(int 3)"), "3", &Versions::new());
        let captures = adapter.drain();
        assert_eq!(captures[0].versions, versions(&["0.9"]));
        assert_eq!(captures[1].versions, versions(&["1.0"]));
        assert!(captures[2].versions.is_empty());
    }
}
