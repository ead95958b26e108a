use dynquery::predicate::{compile, TreePolicy};
use dynquery::spec::FilterTriple;
use dynquery::{ModelRegistry, Predicate};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

#[derive(Clone, Debug)]
enum Clause {
    Id(&'static str, i64),
    Text(&'static str, &'static str),
    IdNull(bool),
    TextIn(Vec<&'static str>),
}

#[derive(Clone, Debug)]
struct TestRow {
    id: Option<i64>,
    datatype: Option<&'static str>,
}

const WORDS: [&str; 5] = ["ip", "domain", "ipv6", "url", "d_main"];
const PATTERNS: [&str; 6] = ["ip", "i%", "%n", "d_main", "%", "p"];

fn row_strategy() -> impl Strategy<Value = TestRow> {
    (
        proptest::option::of(-3i64..3),
        proptest::option::of(proptest::sample::select(WORDS.to_vec())),
    )
        .prop_map(|(id, datatype)| TestRow { id, datatype })
}

fn clause_strategy() -> impl Strategy<Value = Clause> {
    prop_oneof![
        (proptest::sample::select(vec!["eq", "ne", "lt", "le", "gt", "ge"]), -3i64..3)
            .prop_map(|(op, n)| Clause::Id(op, n)),
        (
            proptest::sample::select(vec!["eq", "ne", "like", "contains", "startswith", "endswith"]),
            proptest::sample::select(PATTERNS.to_vec())
        )
            .prop_map(|(op, p)| Clause::Text(op, p)),
        any::<bool>().prop_map(Clause::IdNull),
        proptest::sample::subsequence(WORDS.to_vec(), 1..3).prop_map(Clause::TextIn),
    ]
}

fn triple(c: &Clause) -> FilterTriple {
    match c {
        Clause::Id(op, n) => FilterTriple::new("id", *op, n.to_string()),
        Clause::Text(op, p) => FilterTriple::new("datatype", *op, *p),
        Clause::IdNull(true) => FilterTriple::new("id", "eq", "null"),
        Clause::IdNull(false) => FilterTriple::new("id", "ne", "null"),
        Clause::TextIn(words) => FilterTriple::new("datatype", "in", words.join(",")),
    }
}

fn like(s: &str, p: &str) -> bool {
    match p.chars().next() {
        None => s.is_empty(),
        Some('%') => (0..=s.len()).filter(|i| s.is_char_boundary(*i)).any(|i| like(&s[i..], &p[1..])),
        Some(c) => match s.chars().next() {
            Some(h) if c == '_' || c == h => like(&s[h.len_utf8()..], &p[c.len_utf8()..]),
            _ => false,
        },
    }
}

/// Direct reading of the filter: SQL NULL fails every comparison except the null tests.
fn reference(c: &Clause, r: &TestRow) -> bool {
    match c {
        Clause::Id(op, n) => r.id.map_or(false, |v| match *op {
            "eq" => v == *n,
            "ne" => v != *n,
            "lt" => v < *n,
            "le" => v <= *n,
            "gt" => v > *n,
            _ => v >= *n,
        }),
        Clause::Text(op, p) => r.datatype.map_or(false, |s| match *op {
            "eq" => s == *p,
            "ne" => s != *p,
            "like" => like(s, p),
            "contains" => like(s, &format!("%{}%", p)),
            "startswith" => like(s, &format!("{}%", p)),
            _ => like(s, &format!("%{}", p)),
        }),
        Clause::IdNull(is_null) => r.id.is_none() == *is_null,
        Clause::TextIn(words) => r.datatype.map_or(false, |s| words.contains(&s)),
    }
}

fn as_map(r: &TestRow) -> Map<String, Value> {
    let v = json!({"id": r.id, "datatype": r.datatype, "datavalue": "x", "date_added": null});
    v.as_object().cloned().unwrap()
}

proptest! {
    #[test]
    fn compiled_filters_agree_with_reference(
        rows in proptest::collection::vec(row_strategy(), 0..16),
        clauses in proptest::collection::vec(clause_strategy(), 0..4),
    ) {
        let model = ModelRegistry::builtin().unwrap().resolve("dbblacklist");
        let triples: Vec<FilterTriple> = clauses.iter().map(triple).collect();
        let compiled = compile(&model, &triples, None, TreePolicy::Strict).unwrap();
        for r in &rows {
            let expected = clauses.iter().all(|c| reference(c, r));
            let actual = compiled.predicate.as_ref().map_or(true, |p| p.matches(&as_map(r)));
            prop_assert_eq!(actual, expected, "row {:?} clauses {:?}", r, clauses);
        }
    }

    #[test]
    fn negation_never_matches_the_same_row(
        row in row_strategy(),
        clause in clause_strategy(),
    ) {
        let model = ModelRegistry::builtin().unwrap().resolve("dbblacklist");
        let p = compile(&model, &[triple(&clause)], None, TreePolicy::Strict)
            .unwrap()
            .predicate
            .unwrap();
        let m = as_map(&row);
        let neg = Predicate::negate(p.clone());
        prop_assert!(!(p.matches(&m) && neg.matches(&m)));
    }
}
