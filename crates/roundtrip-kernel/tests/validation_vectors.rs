//! Integration tests: run the validation vectors.
//!
//! Each fixture in tests/fixtures/validation/ names a source, its encoding,
//! the generator to use and the expected verdict. The verdict is compared
//! in its serialized form so the fixture format doubles as the wire format.

use roundtrip_kernel::{
    Child, Either, Encoding, GenerateError, Node, SourceGenerator, SourceText, ToyGenerator,
    ToyParser, Tree, Validation,
};
use serde_json::Value;
use std::path::PathBuf;

/// Drops the last argument of every call before rendering.
struct DropLastArg;

fn drop_last_arg(node: &Node) -> Node {
    let mut children: Vec<Child> = node
        .children
        .iter()
        .map(|child| match child {
            Child::Node(inner) => Child::Node(drop_last_arg(inner)),
            Child::Atom(atom) => Child::Atom(atom.clone()),
        })
        .collect();
    if node.kind == "send" && children.len() > 2 && matches!(children.last(), Some(Child::Node(_)))
    {
        children.pop();
    }
    Node::new(node.kind.clone(), children)
}

impl SourceGenerator for DropLastArg {
    fn generate(&self, tree: &Tree) -> Either<GenerateError, String> {
        let mut mutated = tree.clone();
        mutated.root = tree.root.as_ref().map(drop_last_arg);
        ToyGenerator.generate(&mutated)
    }
}

struct Unsupported;

impl SourceGenerator for Unsupported {
    fn generate(&self, _tree: &Tree) -> Either<GenerateError, String> {
        Either::Left(GenerateError::Unsupported {
            kind: "send".to_string(),
        })
    }
}

/// Appends a non-ASCII comment, which no US-ASCII source can carry.
struct TrailingAccent;

impl SourceGenerator for TrailingAccent {
    fn generate(&self, tree: &Tree) -> Either<GenerateError, String> {
        ToyGenerator
            .generate(tree)
            .map(|text| format!("{text}\n# caf\u{e9}"))
    }
}

/// Appends one extra call after the program.
struct AppendCall;

impl SourceGenerator for AppendCall {
    fn generate(&self, tree: &Tree) -> Either<GenerateError, String> {
        ToyGenerator.generate(tree).map(|text| format!("{text}\nf(2)"))
    }
}

fn generator(name: &str) -> Box<dyn SourceGenerator> {
    match name {
        "toy" => Box::new(ToyGenerator),
        "drop_last_arg" => Box::new(DropLastArg),
        "unsupported" => Box::new(Unsupported),
        "trailing_accent" => Box::new(TrailingAccent),
        other => panic!("unknown generator: {other}"),
    }
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/validation")
}

fn run_fixture(name: &str) {
    let path = fixtures_dir().join(format!("{name}.json"));
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    let case: Value = serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()));

    let source = case["source"].as_str().expect("missing source field");
    let encoding: Encoding = case["encoding"]
        .as_str()
        .expect("missing encoding field")
        .parse()
        .expect("fixture encoding should parse");
    let generator = generator(case["generator"].as_str().expect("missing generator field"));

    let validation = Validation::from_source(
        name,
        SourceText::new(source.as_bytes().to_vec(), encoding),
        &ToyParser::default(),
        generator.as_ref(),
    );
    let verdict = serde_json::to_value(validation.verdict()).expect("verdict serializes");

    assert_eq!(
        verdict,
        case["expect"],
        "\n\nFixture: {name}\n\nReport:\n{}\n",
        validation.report().unwrap_or_default(),
    );
    assert_eq!(validation.success(), verdict["verdict"] == "equivalent");
    assert_eq!(
        validation.failure_record().is_some(),
        verdict["verdict"] == "mismatch"
    );
}

#[test]
fn equivalent_arithmetic() {
    run_fixture("equivalent_arithmetic");
}

#[test]
fn equivalent_comments() {
    run_fixture("equivalent_comments");
}

#[test]
fn equivalent_binary_bytes() {
    run_fixture("equivalent_binary_bytes");
}

#[test]
fn exempt_original_syntax() {
    run_fixture("exempt_original_syntax");
}

#[test]
fn exempt_ascii_reencode() {
    run_fixture("exempt_ascii_reencode");
}

#[test]
fn exempt_invalid_byte_escape() {
    run_fixture("exempt_invalid_byte_escape");
}

#[test]
fn mismatch_dropped_argument() {
    run_fixture("mismatch_dropped_argument");
}

#[test]
fn mismatch_unsupported_node() {
    run_fixture("mismatch_unsupported_node");
}

#[test]
fn mismatch_ascii_accent_introduced() {
    run_fixture("mismatch_ascii_accent_introduced");
}

#[test]
fn equivalent_replacement_character() {
    run_fixture("equivalent_replacement_character");
}

#[test]
fn large_program_mismatch_reports_a_compact_diff() {
    let source = "f(1)\n".repeat(5000);
    let validation = Validation::from_source(
        "large.toy",
        SourceText::utf8(source),
        &ToyParser::without_comments(),
        &AppendCall,
    );
    assert_eq!(validation.verdict(), roundtrip_kernel::Verdict::Mismatch);
    let report = validation.report().unwrap();
    let diff = report.split("Node-Diff:\n").nth(1).unwrap();
    let changed: Vec<&str> = diff
        .lines()
        .filter(|line| line.starts_with('+') || line.starts_with('-'))
        .collect();
    assert_eq!(
        changed,
        vec![
            "-    (int 1)))",
            "+    (int 1))",
            "+  (send",
            "+    nil",
            "+    :f",
            "+    (int 2)))",
        ]
    );
}

#[test]
fn mismatch_report_shows_sources_and_diff() {
    let validation = Validation::from_source(
        "sample.toy",
        SourceText::utf8("foo(1, 2)"),
        &ToyParser::without_comments(),
        &DropLastArg,
    );
    insta::assert_snapshot!(validation.report().unwrap(), @r"
    sample.toy
    Original-Source:
    foo(1, 2)
    Generated-Source:
    foo(1)
    Original-Node:
    (send
      nil
      :foo
      (int 1)
      (int 2))
    Generated-Node:
    (send
      nil
      :foo
      (int 1))
    Node-Diff:
     (send
       nil
       :foo
    -  (int 1)
    -  (int 2))
    +  (int 1))
    ");
}

#[test]
fn generation_failure_propagates_without_reparse() {
    let validation = Validation::from_source(
        "unsupported.toy",
        SourceText::utf8("1"),
        &ToyParser::default(),
        &Unsupported,
    );
    assert!(validation.generated_source.is_left());
    assert_eq!(
        validation.generated.left_ref(),
        validation.generated_source.left_ref()
    );
    assert!(validation.report().unwrap().contains("unsupported node: send"));
}

#[test]
fn tree_validation_uses_supplied_encoding() {
    let tree = Tree::from(Node::parse_sexp("(str \"\u{e9}\")").unwrap());
    let ascii = Validation::from_tree(
        "tree",
        tree.clone(),
        Some(SourceText::new(Vec::new(), Encoding::UsAscii)),
        &ToyParser::default(),
        &ToyGenerator,
    );
    assert_eq!(
        ascii.verdict(),
        roundtrip_kernel::Verdict::Exempt(roundtrip_kernel::Exemption::GeneratedEncoding)
    );

    let utf8 = Validation::from_tree("tree", tree, None, &ToyParser::default(), &ToyGenerator);
    assert!(utf8.success());
    assert!(utf8.report().is_none());
}
