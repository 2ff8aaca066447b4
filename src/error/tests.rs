use super::*;

#[test]
fn test_error_kinds_are_distinct() {
    assert_eq!(TransferError::connection("down").kind(), ErrorKind::Connection);
    assert_eq!(TransferError::query("bad").kind(), ErrorKind::Query);
    assert_eq!(TransferError::parse("bad csv").kind(), ErrorKind::Parse);
    assert_eq!(TransferError::validation("empty").kind(), ErrorKind::Validation);
}

#[test]
fn test_only_connection_errors_are_retry_safe() {
    assert!(TransferError::connection("refused").is_retry_safe());
    assert!(!TransferError::query("syntax error near ON").is_retry_safe());
    assert!(!TransferError::validation("no columns").is_retry_safe());
}

#[test]
fn test_report_carries_message() {
    let report = TransferError::validation("At least one column must be selected").report();
    assert_eq!(report.kind, ErrorKind::Validation);
    assert_eq!(
        report.message,
        "Validation error: At least one column must be selected"
    );
    assert!(!report.retry_safe);
}

#[test]
fn test_csv_error_maps_to_parse() {
    let data = "a,b\n1,2\n3\n";
    let mut reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
    let error = reader
        .records()
        .find_map(|record| record.err())
        .expect("ragged row should fail");
    assert_eq!(TransferError::from(error).kind(), ErrorKind::Parse);
}

#[test]
fn test_exit_codes_follow_kind() {
    assert_eq!(TransferError::connection("x").exit_code(), 2);
    assert_eq!(TransferError::validation("x").exit_code(), 5);
    let io = TransferError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
    assert_eq!(io.exit_code(), 6);
    assert_eq!(io.kind(), ErrorKind::Io);
}
