mod common;

use common::{Bytes, wdbc};
use dbfile_reader::{DbError, DbFile, ElementType, FieldValue, FormatVersion, ReaderOptions, Schema};

fn open(bytes: Vec<u8>, schema: &str) -> Result<DbFile, DbError> {
    common::init_logging();
    let schema: Schema = schema.parse().unwrap_or_else(|e| panic!("bad test schema {:?}: {}", schema, e));
    DbFile::from_bytes(bytes, schema, ReaderOptions::default())
}

#[test]
fn test_self_keyed_integers() {
    let records = Bytes::new().u32(7).u32(9).build();
    let file = open(wdbc(2, 1, 4, &records, &[]), "id:u32:key").expect("valid WDBC file");

    assert_eq!(file.format(), FormatVersion::Wdbc);
    assert_eq!(file.record_count(), 2);

    let decoded = file.load().expect("records decode");
    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[&7].values(), &[FieldValue::U32(7)]);
    assert_eq!(decoded[&9].values(), &[FieldValue::U32(9)]);
}

#[test]
fn test_pooled_strings_and_arrays() {
    let records = Bytes::new()
        .u32(1)
        .u32(0)
        .raw(&[1, 2, 3, 4])
        .u32(2)
        .u32(6)
        .raw(&[5, 6, 7, 8])
        .build();
    let strings = Bytes::new().cstr("alpha").cstr("beta").build();
    let file = open(
        wdbc(2, 6, 12, &records, &strings),
        "id:u32:key, name:string, flags:u8[4]",
    )
    .expect("valid WDBC file");

    let items: Vec<_> = file.records().collect::<Result<_, _>>().expect("records decode");
    assert_eq!(items.len(), 2);

    let (key, record) = &items[1];
    assert_eq!(*key, 2);
    assert_eq!(record.get_by_name(file.schema(), "name").and_then(FieldValue::as_str), Some("beta"));
    assert_eq!(
        record.get(2).and_then(FieldValue::as_array),
        Some(&[FieldValue::U8(5), FieldValue::U8(6), FieldValue::U8(7), FieldValue::U8(8)][..]),
        "flags of record 2"
    );
    assert_eq!(items[0].1.get(1), Some(&FieldValue::String("alpha".into())));
}

#[test]
fn test_string_pool_scan_requires_option() {
    let records = Bytes::new().u32(1).u32(0).build();
    let strings = Bytes::new().cstr("alpha").cstr("").cstr("beta").build();
    let bytes = wdbc(1, 2, 8, &records, &strings);
    let schema: Schema = "id:u32:key, name:string".parse().unwrap();

    let lazy = DbFile::from_bytes(bytes.clone(), schema.clone(), ReaderOptions::default()).unwrap();
    assert_eq!(lazy.strings().count(), 0, "pool scan is off by default");

    let eager = DbFile::from_bytes(bytes, schema, ReaderOptions::default().load_string_pool(true)).unwrap();
    let pool: Vec<(u32, String)> = eager.strings().collect::<Result<_, _>>().expect("pool scan");
    assert_eq!(
        pool,
        vec![(0, "alpha".to_string()), (6, String::new()), (7, "beta".to_string())]
    );
}

#[test]
fn test_disabled_record_loading() {
    let records = Bytes::new().u32(7).build();
    let schema: Schema = "id:u32:key".parse().unwrap();
    let file = DbFile::from_bytes(wdbc(1, 1, 4, &records, &[]), schema, ReaderOptions::default().load_records(false))
        .expect("header still parses");

    assert_eq!(file.record_count(), 1);
    assert_eq!(file.records().count(), 0);
}

#[test]
fn test_zero_record_file_is_empty_not_an_error() {
    // Nothing after the record count is read.
    let bytes = Bytes::new().raw(b"WDBC").u32(0).build();
    let file = open(bytes, "id:u32:key").expect("empty file is valid");

    assert!(file.is_empty());
    assert!(file.layout().is_none());
    assert!(file.fields().is_empty());
    assert_eq!(file.records().count(), 0);
    assert!(file.record_at(0).unwrap().is_none());
}

#[test]
fn test_unknown_signature() {
    let bytes = Bytes::new().raw(b"WDB9").u32(1).build();
    let err = open(bytes, "id:u32:key").expect_err("signature is unknown");

    assert!(matches!(err, DbError::UnknownSignature(sig) if &sig == b"WDB9"), "got {:?}", err);
    assert!(err.is_corruption());
    assert!(!err.is_schema_error());
}

#[test]
fn test_truncated_signature() {
    let err = open(b"WD".to_vec(), "id:u32:key").expect_err("two bytes can't hold a signature");
    assert!(matches!(err, DbError::UnexpectedEof { .. }), "got {:?}", err);
}

#[test]
fn test_record_size_mismatch() {
    let records = Bytes::new().u32(1).u16(2).zeros(6).build();
    let err = open(wdbc(1, 2, 12, &records, &[]), "id:u32:key, value:u16").expect_err("12 != 8");

    match err {
        DbError::StructureSizeMismatch { declared, computed } => {
            assert_eq!((declared, computed), (12, 8), "declared vs padded schema width");
        }
        other => panic!("expected StructureSizeMismatch, got {:?}", other),
    }
}

#[test]
fn test_record_size_check_can_be_disabled() {
    let records = Bytes::new().u32(1).u16(2).zeros(6).build();
    let schema: Schema = "id:u32:key, value:u16".parse().unwrap();
    let file = DbFile::from_bytes(
        wdbc(1, 2, 12, &records, &[]),
        schema,
        ReaderOptions::default().verify_record_size(false),
    )
    .expect("check disabled");

    let (key, record) = file.record_at(0).unwrap().expect("one record");
    assert_eq!(key, 1);
    assert_eq!(record.get(1), Some(&FieldValue::U16(2)));
}

#[test]
fn test_field_count_mismatch() {
    let records = Bytes::new().u32(1).u32(2).build();
    let err = open(wdbc(1, 3, 8, &records, &[]), "id:u32:key, value:u32").expect_err("3 fields vs 2");

    assert!(
        matches!(err, DbError::StructureSizeMismatch { declared: 3, computed: 2 }),
        "got {:?}",
        err
    );
    assert!(err.is_schema_error());
}

#[test]
fn test_key_declaration_errors() {
    let records = Bytes::new().u32(1).u32(2).build();

    let err = open(wdbc(1, 2, 8, &records, &[]), "id:u32, value:u32").expect_err("no key");
    assert!(matches!(err, DbError::MissingIndexField), "got {:?}", err);

    let err = open(wdbc(1, 2, 8, &records, &[]), "id:u32:key, value:u32:key").expect_err("two keys");
    assert!(matches!(err, DbError::MultipleIndexFields), "got {:?}", err);

    let err = open(wdbc(1, 2, 8, &records, &[]), "id:f32:key, value:u32").expect_err("float key");
    assert!(matches!(err, DbError::UnsupportedFieldType { .. }), "got {:?}", err);
}

#[test]
fn test_mixed_types_with_padding() {
    let records = Bytes::new()
        .u32(3)
        .f32(1.5)
        .i16(-3)
        .u8(0xFF)
        .zeros(1)
        .u32(4)
        .f32(-0.25)
        .i16(300)
        .u8(1)
        .zeros(1)
        .build();
    let schema = Schema::builder()
        .key("id", ElementType::U32)
        .scalar("rate", ElementType::F32)
        .scalar("delta", ElementType::I16)
        .scalar("sign", ElementType::I8)
        .build();
    let file = DbFile::from_bytes(wdbc(2, 4, 12, &records, &[]), schema, ReaderOptions::default())
        .expect("11 bytes pad to 12");

    let decoded = file.load().unwrap();
    assert_eq!(
        decoded[&3].values(),
        &[FieldValue::U32(3), FieldValue::F32(1.5), FieldValue::I16(-3), FieldValue::I8(-1)]
    );
    assert_eq!(
        decoded[&4].values(),
        &[FieldValue::U32(4), FieldValue::F32(-0.25), FieldValue::I16(300), FieldValue::I8(1)]
    );
}

#[test]
fn test_trailing_array_length_inference() {
    let records = Bytes::new().u32(1).u32(10).u32(20).build();
    let file = open(wdbc(1, 3, 12, &records, &[]), "id:u32:key, values:u32[]").expect("uniform widths");
    assert_eq!(file.fields()[1].array_length, 2);

    let records = Bytes::new().u32(1).raw(&[1, 2, 3, 4]).build();
    let err = open(wdbc(1, 5, 8, &records, &[]), "id:u32:key, values:u8[]").expect_err("mixed widths");
    assert!(
        matches!(&err, DbError::MissingArraySizeDeclaration { field } if field == "values"),
        "got {:?}",
        err
    );
}

#[test]
fn test_section_past_end_of_stream() {
    let records = Bytes::new().u32(7).build();
    let err = open(wdbc(2, 1, 4, &records, &[]), "id:u32:key").expect_err("second record is missing");

    assert!(
        matches!(err, DbError::SectionOutOfBounds { section: "record table", .. }),
        "got {:?}",
        err
    );
}

#[test]
fn test_bad_pool_offset_stops_iteration() {
    let records = Bytes::new().u32(1).u32(0).u32(2).u32(99).u32(3).u32(0).build();
    let strings = Bytes::new().cstr("ok").build();
    let file = open(wdbc(3, 2, 8, &records, &strings), "id:u32:key, name:string").unwrap();

    let mut records = file.records();
    assert!(records.next().unwrap().is_ok());
    assert!(matches!(records.next(), Some(Err(DbError::UnexpectedEof { .. }))));
    assert!(records.next().is_none(), "iteration is fused after an error");
}

#[test]
fn test_random_access_matches_iteration() {
    let records = Bytes::new().u32(7).u32(9).build();
    let file = open(wdbc(2, 1, 4, &records, &[]), "id:u32:key").unwrap();

    let sequential: Vec<_> = file.records().collect::<Result<_, _>>().unwrap();
    for (ordinal, expected) in sequential.iter().enumerate() {
        let decoded = file.record_at(ordinal).unwrap().expect("ordinal in range");
        assert_eq!(&decoded, expected, "record #{}", ordinal);
    }
    assert!(file.record_at(2).unwrap().is_none());
}

#[test]
fn test_parallel_random_access() {
    let mut records = Bytes::new();
    for key in 1..=64u32 {
        records = records.u32(key).u32(key * 10);
    }
    let file = open(wdbc(64, 2, 8, &records.build(), &[]), "id:u32:key, value:u32").unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4usize {
            let file = &file;
            scope.spawn(move || {
                for ordinal in (worker..64).step_by(4) {
                    let (key, record) = file.record_at(ordinal).unwrap().expect("ordinal in range");
                    assert_eq!(key, ordinal as u32 + 1);
                    assert_eq!(record.get(1), Some(&FieldValue::U32(key * 10)), "worker {}", worker);
                }
            });
        }
    });
}
