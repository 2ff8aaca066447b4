use super::*;
use crate::db_types::{TypeTag, Value};
use crate::error::ErrorKind;
use std::io::Write;

fn people_csv() -> FileHandle {
    FileHandle::memory(
        "people.csv",
        "id,name,joined,score\n1,\"Smith, Ann\",2024-01-02,1.5\n2,Bob,2024-02-03,2\n3,\"Quote \"\"Q\"\"\",,\n",
    )
}

#[test]
fn test_parse_infers_schema_and_preview() {
    let source = CsvSource::parse(people_csv()).unwrap();

    assert_eq!(source.schema().names(), vec!["id", "name", "joined", "score"]);
    let tags = source
        .schema()
        .columns()
        .iter()
        .map(|column| column.type_tag)
        .collect::<Vec<_>>();
    assert_eq!(
        tags,
        vec![TypeTag::Integer64, TypeTag::String, TypeTag::Date, TypeTag::Float64]
    );

    let preview = source.preview();
    assert_eq!(preview.len(), 3);
    assert_eq!(
        preview.rows[0].get(1),
        Some(&Value::Text("Smith, Ann".to_string()))
    );
    assert_eq!(
        preview.rows[2].get(1),
        Some(&Value::Text("Quote \"Q\"".to_string()))
    );
    assert!(preview.rows[2].get(2).unwrap().is_null());
}

#[test]
fn test_preview_is_bounded_to_sample_size() {
    let mut data = String::from("n\n");
    for i in 0..250 {
        data.push_str(&format!("{}\n", i));
    }
    let source = CsvSource::parse(FileHandle::memory("big.csv", data)).unwrap();
    assert_eq!(source.preview().len(), SAMPLE_ROW_LIMIT);
}

#[test]
fn test_header_only_file_has_string_columns() {
    let source = CsvSource::parse(FileHandle::memory("empty.csv", "a,b\n")).unwrap();
    assert_eq!(source.schema().len(), 2);
    assert!(source
        .schema()
        .columns()
        .iter()
        .all(|column| column.type_tag == TypeTag::String));
    assert!(source.preview().is_empty());
}

#[test]
fn test_malformed_file_aborts_with_parse_error() {
    let ragged = FileHandle::memory("ragged.csv", "a,b\n1,2\n3,4,5\n");
    let error = CsvSource::parse(ragged).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Parse);

    let empty = FileHandle::memory("nothing.csv", "");
    assert_eq!(CsvSource::parse(empty).unwrap_err().kind(), ErrorKind::Parse);

    let duplicate = FileHandle::memory("dup.csv", "a,a\n1,2\n");
    assert_eq!(CsvSource::parse(duplicate).unwrap_err().kind(), ErrorKind::Parse);
}

#[test]
fn test_missing_path_is_io_error() {
    let handle = FileHandle::Path("/definitely/not/here.csv".into());
    assert_eq!(CsvSource::parse(handle).unwrap_err().kind(), ErrorKind::Io);
}

#[test]
fn test_parse_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "city,population\nOslo,709037\nBergen,291940\n").unwrap();

    let source = CsvSource::parse(FileHandle::Path(file.path().to_path_buf())).unwrap();
    assert_eq!(source.schema().columns()[1].type_tag, TypeTag::Integer64);
    assert_eq!(source.preview().len(), 2);
}

#[test]
fn test_batches_stream_whole_file_in_projection_order() {
    let mut data = String::from("id,label,extra\n");
    for i in 0..2_500 {
        data.push_str(&format!("{},row-{},x\n", i, i));
    }
    let source = CsvSource::parse(FileHandle::memory("rows.csv", data)).unwrap();

    let projection = vec!["label".to_string(), "id".to_string()];
    let mut batches = source.batches(&projection, 1_000).unwrap();
    assert_eq!(batches.schema().names(), projection);

    let mut sizes = Vec::new();
    let mut last = None;
    while let Some(batch) = batches.next_batch().unwrap() {
        sizes.push(batch.len());
        last = batch.rows.last().cloned();
    }
    assert_eq!(sizes, vec![1_000, 1_000, 500]);
    assert_eq!(batches.progress_pct(), 100);

    let last = last.unwrap();
    assert_eq!(last.get(0), Some(&Value::Text("row-2499".to_string())));
    assert_eq!(last.get(1), Some(&Value::Integer(2_499)));
}

#[test]
fn test_batches_report_partial_progress() {
    let mut data = String::from("n\n");
    for i in 0..100 {
        data.push_str(&format!("{}\n", i));
    }
    let source = CsvSource::parse(FileHandle::memory("n.csv", data)).unwrap();
    let mut batches = source.batches(&["n".to_string()], 10).unwrap();

    batches.next_batch().unwrap();
    let pct = batches.progress_pct();
    assert!(pct > 0 && pct < 100, "unexpected progress {}", pct);
}

#[test]
fn test_batches_reject_unknown_column_and_zero_size() {
    let source = CsvSource::parse(people_csv()).unwrap();
    assert!(source.batches(&["missing".to_string()], 10).is_err());
    assert!(source.batches(&["id".to_string()], 0).is_err());
}

#[tokio::test]
async fn test_file_source_rejects_join() {
    let source = CsvSource::parse(people_csv()).unwrap();
    let join = JoinSpec {
        target_table: "users".to_string(),
        condition: crate::db_types::JoinCondition::predicate("a.id = b.id"),
    };
    let error = source
        .preview_rows(&["id".to_string()], Some(&join))
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_file_source_export_reencodes_projection() {
    let source = CsvSource::parse(people_csv()).unwrap();
    let text = source
        .export_rows(&["name".to_string(), "id".to_string()], None)
        .await
        .unwrap();
    assert_eq!(text, "name,id\n\"Smith, Ann\",1\nBob,2\n\"Quote \"\"Q\"\"\",3\n");
}
