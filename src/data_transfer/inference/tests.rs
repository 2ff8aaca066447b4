use super::*;

fn infer(values: &[&str]) -> TypeTag {
    let values = values.iter().map(|value| Some(*value)).collect::<Vec<_>>();
    infer_type(&values)
}

#[test]
fn test_integers_infer_integer64() {
    assert_eq!(infer(&["1", "2", "3"]), TypeTag::Integer64);
    assert_eq!(infer(&["-4", "10", "3.0"]), TypeTag::Integer64);
}

#[test]
fn test_mixed_integer_and_fraction_infer_float64() {
    assert_eq!(infer(&["1", "2.5"]), TypeTag::Float64);
    assert_eq!(infer(&[".5", "6.02e23"]), TypeTag::Float64);
}

#[test]
fn test_dates_and_timestamps() {
    assert_eq!(infer(&["2024-01-01", "2024-01-02"]), TypeTag::Date);
    assert_eq!(
        infer(&["2024-01-01T10:00:00", "2024-01-02 11:30:00"]),
        TypeTag::DateTime
    );
    // A bare date is not a timestamp, so a mixed column falls through to String.
    assert_eq!(infer(&["2024-01-01T10:00:00", "2024-01-02"]), TypeTag::String);
}

#[test]
fn test_any_mismatch_forces_string() {
    assert_eq!(infer(&["2024-01-01T10:00:00", "x"]), TypeTag::String);
    assert_eq!(infer(&["1", "two"]), TypeTag::String);
    assert_eq!(infer(&["NaN", "inf"]), TypeTag::String);
}

#[test]
fn test_no_evidence_infers_string() {
    assert_eq!(infer_type(&[None, None]), TypeTag::String);
    assert_eq!(infer_type(&[]), TypeTag::String);
}

#[test]
fn test_nulls_are_ignored() {
    assert_eq!(infer_type(&[None, Some("5"), None]), TypeTag::Integer64);
}

#[test]
fn test_inference_is_deterministic() {
    let values = [Some("1"), Some("2.5"), None, Some("3")];
    let first = infer_type(&values);
    for _ in 0..10 {
        assert_eq!(infer_type(&values), first);
    }
}

#[test]
fn test_infer_schema_keeps_header_order() {
    let headers = vec!["id".to_string(), "when".to_string(), "label".to_string()];
    let sample = vec![
        vec!["1".to_string(), "2024-03-01".to_string(), "a".to_string()],
        vec!["2".to_string(), "".to_string(), "b".to_string()],
        vec!["3".to_string()],
    ];
    let schema = infer_schema(&headers, &sample).unwrap();

    assert_eq!(schema.names(), vec!["id", "when", "label"]);
    let tags = schema
        .columns()
        .iter()
        .map(|column| column.type_tag)
        .collect::<Vec<_>>();
    assert_eq!(tags, vec![TypeTag::Integer64, TypeTag::Date, TypeTag::String]);
}

#[test]
fn test_infer_schema_records_first_present_value() {
    let headers = vec!["id".to_string(), "note".to_string(), "gap".to_string()];
    let sample = vec![
        vec!["7".to_string(), "".to_string(), "".to_string()],
        vec!["8".to_string(), "hello".to_string(), "".to_string()],
    ];
    let schema = infer_schema(&headers, &sample).unwrap();

    let samples = schema
        .columns()
        .iter()
        .map(|column| column.sample.as_deref())
        .collect::<Vec<_>>();
    assert_eq!(samples, vec![Some("7"), Some("hello"), None]);

    let json = serde_json::to_value(&schema.columns()[1]).unwrap();
    assert_eq!(json["sample"], "hello");
    assert!(serde_json::to_value(&schema.columns()[2]).unwrap().get("sample").is_none());
}

#[test]
fn test_infer_schema_only_reads_sample_prefix() {
    let headers = vec!["n".to_string()];
    let mut sample = (0..SAMPLE_ROW_LIMIT)
        .map(|i| vec![i.to_string()])
        .collect::<Vec<_>>();
    sample.push(vec!["not a number".to_string()]);

    let schema = infer_schema(&headers, &sample).unwrap();
    assert_eq!(schema.columns()[0].type_tag, TypeTag::Integer64);
}
