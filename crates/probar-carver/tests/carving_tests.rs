//! End-to-end carving scenarios: capture log in, Java test body out.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use probar_carver::capture::Literal;
use probar_carver::intent::Intent;
use probar_carver::prelude::*;
use probar_carver::types::ClassEntry;
use serde_json::Value;

// ============================================================================
// Helpers
// ============================================================================

fn body_of(source: &str) -> Vec<String> {
    let start = source
        .find("throws Exception {\n")
        .expect("test method header")
        + "throws Exception {\n".len();
    source[start..]
        .lines()
        .take_while(|l| *l != "    }")
        .map(|l| l.trim().to_string())
        .collect()
}

fn carve(log: &CaptureLog, targets: &[&str]) -> GeneratedTest {
    let config = targets
        .iter()
        .fold(CarverConfig::new(), |config, t| config.with_target(*t));
    Carver::new(config, TypeTable::new())
        .generate(log, GenerationMode::Final)
        .unwrap()
}

fn person() -> Observed {
    Observed::instance(1, "Person")
}

fn constructed_person() -> CaptureLog {
    let mut log = CaptureLog::new();
    log.log_call(1, &person(), "<init>", "()V", &[]);
    log.log_end(1, Oid(1), None);
    log
}

/// Insert copies of `records` (in order) at `at`, across every column.
fn duplicate_records(log: &CaptureLog, records: &[usize], at: usize) -> CaptureLog {
    const COLUMNS: [&str; 7] = [
        "object_ids",
        "capture_ids",
        "method_names",
        "params",
        "return_values",
        "is_static_call_list",
        "desc_list",
    ];
    let mut json: Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
    for column in COLUMNS {
        let values = json[column].as_array_mut().unwrap();
        let copies: Vec<Value> = records.iter().map(|r| values[*r].clone()).collect();
        for (offset, value) in copies.into_iter().enumerate() {
            values.insert(at + offset, value);
        }
    }
    CaptureLog::from_json(&json.to_string()).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_constructor_only() {
    let test = carve(&constructed_person(), &["Person"]);
    assert_eq!(body_of(&test.source), vec!["Person var0 = new Person();"]);
}

#[test]
fn test_literal_argument_declared_before_call() {
    let mut log = constructed_person();
    log.log_call(
        2,
        &person(),
        "setName",
        "(Ljava/lang/String;)V",
        &[Some(Observed::plain(2, Literal::Str("Ben".to_string())))],
    );
    log.log_end(2, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "String var1 = \"Ben\";",
            "var0.setName(var1);",
        ]
    );
}

#[test]
fn test_field_write_pulls_in_value_history() {
    let mut log = constructed_person();
    let address = Observed::instance(3, "Address");
    log.log_call(2, &address, "<init>", "()V", &[]);
    log.log_end(2, Oid(3), None);
    log.log_call(
        3,
        &address,
        "setStreet",
        "(Ljava/lang/String;)V",
        &[Some(Observed::plain(4, Literal::Str("Main".to_string())))],
    );
    log.log_end(3, Oid(3), None);
    log.log_field_write(4, &person(), "address", "LAddress;", Some(&address));
    log.log_end(4, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "Address var1 = new Address();",
            "String var2 = \"Main\";",
            "var1.setStreet(var2);",
            "var0.address = var1;",
        ]
    );
}

#[test]
fn test_repeated_plain_init_declares_once() {
    let mut log = constructed_person();
    let age = Observed::plain(2, Literal::Int(42));
    log.log_call(2, &person(), "setAge", "(I)V", &[Some(age.clone())]);
    log.log_end(2, Oid(1), None);
    log.log_call(3, &person(), "setShoeSize", "(I)V", &[Some(age)]);
    log.log_end(3, Oid(1), None);
    // a second PLAIN_INIT span for oid 2 right before setShoeSize
    let log = duplicate_records(&log, &[2, 3], 6);
    assert_eq!(log.len(), 10);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "Integer var1 = 42;",
            "var0.setAge((int) var1);",
            "var0.setShoeSize((int) var1);",
        ]
    );

    let types = TypeTable::new();
    let mut resolver = Resolver::new(log.clone(), &types);
    let mut gen = IntentRecorder::new();
    let mut ctx = GenerationContext::default();
    gen.before(&ctx).unwrap();
    resolver
        .synthesize(Oid(2), log.len() - 1, &mut gen, &mut ctx)
        .unwrap();
    let literals = gen
        .intents()
        .iter()
        .filter(|i| matches!(i, Intent::Literal { .. }))
        .count();
    assert_eq!(literals, 1);
}

#[test]
fn test_no_target_objects_yields_empty_unit() {
    let test = carve(&constructed_person(), &["com.example.Unrelated"]);
    assert_eq!(test.statements, 0);
    assert!(body_of(&test.source).is_empty());
    assert!(test.source.contains("public class CarvedTest {"));
    assert!(test.source.trim_end().ends_with('}'));
}

#[test]
fn test_array_argument_is_rebuilt() {
    let mut log = constructed_person();
    let scores = Observed::array(
        5,
        "[I",
        vec![
            Some(Observed::plain(6, Literal::Int(7))),
            Some(Observed::plain(7, Literal::Int(9))),
        ],
    );
    log.log_call(2, &person(), "setScores", "([I)V", &[Some(scores)]);
    log.log_end(2, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "Integer var1 = 7;",
            "Integer var2 = 9;",
            "int[] var3 = new int[2];",
            "var3[0] = var1;",
            "var3[1] = var2;",
            "var0.setScores(var3);",
        ]
    );
}

#[test]
fn test_collection_argument_is_rebuilt() {
    let mut log = constructed_person();
    let tags = Observed::collection(
        5,
        "java.util.ArrayList",
        vec![Some(Observed::plain(6, Literal::Str("a".to_string()))), None],
    );
    log.log_call(2, &person(), "setTags", "(Ljava/util/List;)V", &[Some(tags)]);
    log.log_end(2, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "String var1 = \"a\";",
            "java.util.ArrayList var2 = new java.util.ArrayList();",
            "var2.add(var1);",
            "var2.add(null);",
            "var0.setTags(var2);",
        ]
    );
}

#[test]
fn test_map_argument_falls_back_to_hash_map() {
    let mut log = constructed_person();
    let index = Observed::map(
        5,
        "java.util.Collections$UnmodifiableMap",
        vec![(
            Some(Observed::plain(6, Literal::Str("k".to_string()))),
            Some(Observed::plain(7, Literal::Int(3))),
        )],
    );
    log.log_call(2, &person(), "setIndex", "(Ljava/util/Map;)V", &[Some(index)]);
    log.log_end(2, Oid(1), None);

    let types = TypeTable::new().with_class(
        "java.util.Collections$UnmodifiableMap",
        ClassEntry {
            public: false,
            ..ClassEntry::default()
        },
    );
    let test = Carver::new(CarverConfig::new().with_target("Person"), types)
        .generate(&log, GenerationMode::Final)
        .unwrap();
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "String var1 = \"k\";",
            "Integer var2 = 3;",
            "java.util.HashMap var3 = new java.util.HashMap();",
            "var3.put(var1, var2);",
            "var0.setIndex(var3);",
        ]
    );
}

#[test]
fn test_array_passed_twice_is_refilled() {
    let mut log = constructed_person();
    let scores = |first: i32| {
        Observed::array(5, "[I", vec![Some(Observed::plain(first, Literal::Int(first)))])
    };
    log.log_call(2, &person(), "setA", "([I)V", &[Some(scores(6))]);
    log.log_end(2, Oid(1), None);
    log.log_call(3, &person(), "setB", "([I)V", &[Some(scores(7))]);
    log.log_end(3, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "Integer var1 = 6;",
            "int[] var2 = new int[1];",
            "var2[0] = var1;",
            "var0.setA(var2);",
            "Integer var3 = 7;",
            "var2[0] = var3;",
            "var0.setB(var2);",
        ]
    );
}

#[test]
fn test_receiver_without_constructor_is_restored() {
    let mut log = CaptureLog::new();
    log.log_call(1, &person(), "getName", "()Ljava/lang/String;", &[]);
    log.log_end(1, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec!["Person var0 = null;", "var0.getName();"]
    );

    let mut log = CaptureLog::new();
    let stored = Observed::opaque(1, "Person", Some("<person/>".to_string()));
    log.log_call(1, &stored, "getName", "()Ljava/lang/String;", &[]);
    log.log_end(1, Oid(1), None);

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = (Person) XSTREAM.fromXML(\"<person/>\");",
            "var0.getName();",
        ]
    );
}

#[test]
fn test_inner_class_built_from_enclosing_instance() {
    let mut log = constructed_person();
    let pet = Observed::instance(2, "Person$Pet");
    log.log_call(2, &pet, "<init>", "(LPerson;)V", &[Some(person())]);
    log.log_end(2, Oid(2), None);
    log.log_call(3, &person(), "adopt", "(LPerson$Pet;)V", &[Some(pet)]);
    log.log_end(3, Oid(1), None);

    let types = TypeTable::new().with_class(
        "Person$Pet",
        ClassEntry {
            inner_instance: true,
            ..ClassEntry::default()
        },
    );
    let test = Carver::new(CarverConfig::new().with_target("Person"), types)
        .generate(&log, GenerationMode::Final)
        .unwrap();
    assert_eq!(
        body_of(&test.source),
        vec![
            "Person var0 = new Person();",
            "Person.Pet var1 = var0.new Pet();",
            "var0.adopt(var1);",
        ]
    );
}

// ============================================================================
// Replay semantics
// ============================================================================

#[test]
fn test_nested_records_stay_inside_their_span() {
    let mut log = constructed_person();
    log.log_call(5, &person(), "makeAddress", "()LAddress;", &[]);
    let address = Observed::instance(3, "Address");
    log.log_call(6, &address, "<init>", "()V", &[]);
    log.log_end(6, Oid(3), None);
    log.log_end(5, Oid(1), Some(&address));

    let test = carve(&log, &["Person"]);
    assert_eq!(
        body_of(&test.source),
        vec!["Person var0 = new Person();", "var0.makeAddress();"]
    );
}

#[test]
fn test_two_targets_share_declarations() {
    let mut log = constructed_person();
    let address = Observed::instance(3, "Address");
    log.log_call(2, &address, "<init>", "()V", &[]);
    log.log_end(2, Oid(3), None);
    log.log_call(3, &person(), "setAddress", "(LAddress;)V", &[Some(address.clone())]);
    log.log_end(3, Oid(1), None);
    log.log_call(4, &address, "validate", "()V", &[]);
    log.log_end(4, Oid(3), None);

    let test = carve(&log, &["Person", "Address"]);
    let body = body_of(&test.source);
    assert_eq!(
        body,
        vec![
            "Person var0 = new Person();",
            "Address var1 = new Address();",
            "var0.setAddress(var1);",
            "var1.validate();",
        ]
    );
    assert_eq!(
        body.iter().filter(|l| l.starts_with("Address var")).count(),
        1
    );
}

#[test]
fn test_statement_limit_truncates() {
    let mut log = constructed_person();
    for cid in 2..6 {
        log.log_call(cid, &person(), "tick", "()V", &[]);
        log.log_end(cid, Oid(1), None);
    }
    let carver = Carver::new(
        CarverConfig::new()
            .with_target("Person")
            .with_max_statements(Some(3)),
        TypeTable::new(),
    );
    let test = carver.generate(&log, GenerationMode::Final).unwrap();
    assert_eq!(test.statements, 3);
    assert_eq!(body_of(&test.source).len(), 3);
}

#[test]
fn test_generation_is_repeatable() {
    let log = constructed_person();
    let carver = Carver::new(CarverConfig::new().with_target("Person"), TypeTable::new());
    let first = carver.generate(&log, GenerationMode::Final).unwrap();
    let second = carver.generate(&log, GenerationMode::Final).unwrap();
    assert_eq!(first.source, second.source);
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_unknown_argument_names_the_record() {
    let mut log = constructed_person();
    log.log_call(
        2,
        &person(),
        "setName",
        "(Ljava/lang/String;)V",
        &[Some(Observed::plain(2, Literal::Str("Ben".to_string())))],
    );
    log.log_end(2, Oid(1), None);
    let mut json: Value = serde_json::from_str(&log.to_json().unwrap()).unwrap();
    json["params"][4] = serde_json::json!([{ "oid": 99 }]);
    let log = CaptureLog::from_json(&json.to_string()).unwrap();

    let err = Carver::new(CarverConfig::new().with_target("Person"), TypeTable::new())
        .generate(&log, GenerationMode::Final)
        .unwrap_err();
    assert!(matches!(err, CarverError::UnknownOid { record: 4, oid: Oid(99) }));
    assert!(log.validate().is_err());
}

#[test]
fn test_unresolved_dependency_type_names_its_record() {
    let mut log = constructed_person();
    let address = Observed::instance(3, "Address");
    log.log_call(2, &address, "<init>", "()V", &[]);
    log.log_end(2, Oid(3), None);
    log.log_field_write(3, &person(), "address", "LAddress;", Some(&address));
    log.log_end(3, Oid(1), None);

    let types = TypeTable::strict().with_class("Person", ClassEntry::default());
    let err = Carver::new(CarverConfig::new().with_target("Person"), types)
        .generate(&log, GenerationMode::Final)
        .unwrap_err();
    assert_eq!(err.record(), Some(2));
    assert!(err.to_string().contains("record 2"));
}

#[test]
fn test_unclosed_span_is_rejected() {
    let mut log = CaptureLog::new();
    log.log_call(1, &person(), "<init>", "()V", &[]);
    assert!(matches!(
        log.validate(),
        Err(CarverError::MissingSpanEnd { record: 0, .. })
    ));
}
