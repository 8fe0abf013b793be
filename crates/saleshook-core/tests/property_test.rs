//! Property-based tests for the validation gate.
//!
//! Checks rules that must hold for any input: error lists are reproducible,
//! a missing field is reported where it was removed, and surrounding
//! whitespace never reaches the validated payload.

#![allow(clippy::unwrap_used)]

use proptest::{prelude::*, test_runner::Config as ProptestConfig};
use saleshook_core::{validate, validate_body, ErrorKind, PathSegment};
use saleshook_testing::PayloadBuilder;
use serde_json::{json, Value};

fn proptest_config() -> ProptestConfig {
    ProptestConfig {
        cases: 64,
        fork: false,
        failure_persistence: None,
        source_file: None,
        ..ProptestConfig::default()
    }
}

/// Every required field paired with its JSON pointer.
fn required_field_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "/id_venda",
        "/status",
        "/data_criacao",
        "/data_atualizacao",
        "/dados_empreendimento",
        "/dados_cliente",
        "/dados_empreendimento/nome",
        "/dados_empreendimento/endereco",
        "/dados_empreendimento/unidade",
        "/dados_empreendimento/bloco",
        "/dados_cliente/nome",
        "/dados_cliente/sexo",
        "/dados_cliente/data_de_nascimento",
        "/dados_cliente/email",
        "/dados_cliente/telefone",
        "/dados_cliente/estado_civil",
        "/dados_cliente/conjuge/nome",
        "/dados_cliente/conjuge/email",
    ])
}

/// Arbitrary JSON values up to a small depth.
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z@. ]{0,12}".prop_map(Value::from),
    ];

    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
            prop::collection::btree_map("[a-z_]{1,10}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #![proptest_config(proptest_config())]

    /// Removing one required field yields exactly one `missing` error at
    /// that field's location.
    #[test]
    fn missing_field_is_reported_at_its_location(pointer in required_field_strategy()) {
        let body = PayloadBuilder::new().remove(pointer).build();

        let errors = validate(&body).unwrap_err();
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].kind, ErrorKind::Missing);

        let expected: Vec<PathSegment> =
            pointer.trim_start_matches('/').split('/').map(PathSegment::from).collect();
        prop_assert_eq!(&errors[0].loc, &expected);
    }

    /// The same input always produces the same outcome.
    #[test]
    fn validation_is_deterministic(value in json_strategy()) {
        prop_assert_eq!(validate(&value), validate(&value));
    }

    /// Arbitrary bytes never panic and always produce at least one error
    /// when they fail.
    #[test]
    fn arbitrary_bytes_are_handled(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        if let Err(errors) = validate_body(&bytes) {
            prop_assert!(!errors.is_empty());
        }
    }

    /// Surrounding whitespace is removed from every string field.
    #[test]
    fn strings_are_trimmed(
        status in "[a-z_]{1,20}",
        left in "[ \t]{0,3}",
        right in "[ \t\n]{0,3}",
    ) {
        let body = PayloadBuilder::new()
            .set("/status", json!(format!("{left}{status}{right}")))
            .set("/dados_empreendimento/vagas", json!([format!("{left}A1{right}")]))
            .build();

        let payload = validate(&body).unwrap();
        prop_assert_eq!(payload.status, status);
        prop_assert_eq!(payload.venture.parking_slots, vec!["A1".to_string()]);
    }

    /// Undeclared keys are always rejected, never dropped.
    #[test]
    fn extra_keys_are_rejected(key in "x_[a-z]{1,10}") {
        let pointer = format!("/dados_empreendimento/{key}");
        let body = PayloadBuilder::new().set(&pointer, json!("value")).build();

        let errors = validate(&body).unwrap_err();
        prop_assert_eq!(errors.len(), 1);
        prop_assert_eq!(errors[0].kind, ErrorKind::ExtraForbidden);
        prop_assert!(errors[0].loc_ends_with(&["dados_empreendimento", key.as_str()]));
    }
}
