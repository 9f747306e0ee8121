mod common;

use common::{BitWriter, Bytes, ModernHeader, Wdc1Sizes, raw_fields, storage_info};
use dbfile_reader::{CompressionKind, DbError, DbFile, FieldValue, FormatVersion, ReaderOptions, Schema};

const HEADER_SIZE: usize = 84;
const OFFSET_MAP: u16 = 0x01;

const NONE: u32 = 0;
const BITPACKED: u32 = 1;
const COMMON_DATA: u32 = 2;
const PALLET: u32 = 3;
const PALLET_ARRAY: u32 = 4;

/// A WDC1 file assembled section by section; sizes and offsets are filled in by `build`.
#[derive(Default)]
struct Wdc1 {
    header: ModernHeader,
    total_field_count: u32,
    fields: Vec<(i16, u16)>,
    data: Vec<u8>,
    strings: Vec<u8>,
    offset_map: Vec<(u32, u16)>,
    index: Vec<u32>,
    copies: Vec<(u32, u32)>,
    storage: Bytes,
    pallet: Vec<u8>,
    common: Vec<u8>,
}

impl Wdc1 {
    fn data_start(&self) -> usize {
        HEADER_SIZE + self.fields.len() * 4
    }

    fn build(self) -> Vec<u8> {
        let mut header = self.header;
        header.field_count = self.fields.len() as u32;
        header.string_table_size = self.strings.len() as u32;
        header.copy_table_size = self.copies.len() as u32 * 8;
        let storage = self.storage.clone().build();
        let sizes = Wdc1Sizes {
            total_field_count: self.total_field_count,
            offset_map_offset: if self.offset_map.is_empty() {
                0
            } else {
                (self.data_start() + self.data.len()) as u32
            },
            index_table_size: self.index.len() as u32 * 4,
            field_storage_info_size: storage.len() as u32,
            common_data_size: self.common.len() as u32,
            pallet_data_size: self.pallet.len() as u32,
            relationship_data_size: 0,
        };

        let mut out = raw_fields(sizes.write(header.write(b"WDC1")), &self.fields).raw(&self.data);
        if self.offset_map.is_empty() {
            out = out.raw(&self.strings);
        } else {
            for &(offset, length) in &self.offset_map {
                out = out.u32(offset).u16(length);
            }
        }
        for &key in &self.index {
            out = out.u32(key);
        }
        for &(new_key, old_key) in &self.copies {
            out = out.u32(new_key).u32(old_key);
        }
        out.raw(&storage).raw(&self.pallet).raw(&self.common).build()
    }
}

fn open(bytes: Vec<u8>, schema: &str) -> Result<DbFile, DbError> {
    common::init_logging();
    let schema: Schema = schema.parse().unwrap_or_else(|e| panic!("bad test schema {:?}: {}", schema, e));
    DbFile::from_bytes(bytes, schema, ReaderOptions::default())
}

/// level u8 | delta i5 | flags u11 | color idx u2 | pos idx u1 | 5 padding bits
fn packed_record(level: u64, delta: u64, flags: u64, color: u64, pos: u64) -> Vec<u8> {
    BitWriter::new()
        .write(level, 8)
        .write(delta, 5)
        .write(flags, 11)
        .write(color, 2)
        .write(pos, 1)
        .write(0, 5)
        .finish()
}

fn compressed_file() -> Vec<u8> {
    let mut data = packed_record(3, 0b11101, 1500, 2, 1);
    data.extend(packed_record(200, 15, 0, 0, 0));

    let mut storage = storage_info(Bytes::new(), 0, 8, 0, NONE, [0, 0, 0]);
    storage = storage_info(storage, 8, 5, 0, BITPACKED, [8, 5, 1]);
    storage = storage_info(storage, 13, 11, 0, BITPACKED, [13, 11, 0]);
    storage = storage_info(storage, 24, 2, 12, PALLET, [24, 2, 0]);
    storage = storage_info(storage, 26, 1, 24, PALLET_ARRAY, [26, 1, 3]);
    storage = storage_info(storage, 0, 0, 8, COMMON_DATA, [7, 0, 0]);

    let mut pallet = Bytes::new().u32(0xFF_0000).u32(0x00_FF00).u32(0x00_00FF);
    for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
        pallet = pallet.f32(v);
    }

    Wdc1 {
        header: ModernHeader {
            record_count: 2,
            record_size: 4,
            min_key: 10,
            max_key: 11,
            ..ModernHeader::default()
        },
        total_field_count: 6,
        fields: vec![(24, 0), (0, 1), (0, 1), (0, 3), (0, 3), (0, 4)],
        data,
        index: vec![10, 11],
        storage,
        pallet: pallet.build(),
        common: Bytes::new().u32(10).u32(99).build(),
        ..Wdc1::default()
    }
    .build()
}

const COMPRESSED_SCHEMA: &str = "id:u32:key, level:u8, delta:i32, flags:u32, color:u32, pos:f32[3], rate:u32";

#[test]
fn test_every_compression_kind() {
    let file = open(compressed_file(), COMPRESSED_SCHEMA).expect("valid WDC1 file");

    assert_eq!(file.format(), FormatVersion::Wdc1);
    let fields = file.fields();
    assert!(fields[0].from_index_table);
    assert_eq!(fields[2].compression, CompressionKind::Bitpacked { signed: true });
    assert_eq!(fields[4].additional_data_offset, 0);
    assert_eq!(fields[5].additional_data_offset, 12, "pallet kinds share one pool");
    assert_eq!(fields[5].array_length, 3);
    assert_eq!(fields[6].compression, CompressionKind::CommonData { default: 7 });

    let decoded = file.load().unwrap();
    assert_eq!(
        decoded[&10].values(),
        &[
            FieldValue::U32(10),
            FieldValue::U8(3),
            FieldValue::I32(-3),
            FieldValue::U32(1500),
            FieldValue::U32(0x00_00FF),
            FieldValue::Array(vec![FieldValue::F32(4.0), FieldValue::F32(5.0), FieldValue::F32(6.0)]),
            FieldValue::U32(99),
        ]
    );
    assert_eq!(
        decoded[&11].values(),
        &[
            FieldValue::U32(11),
            FieldValue::U8(200),
            FieldValue::I32(15),
            FieldValue::U32(0),
            FieldValue::U32(0xFF_0000),
            FieldValue::Array(vec![FieldValue::F32(1.0), FieldValue::F32(2.0), FieldValue::F32(3.0)]),
            FieldValue::U32(7),
        ],
        "key 11 has no common-data entry and takes the default"
    );
}

#[test]
fn test_pallet_array_length_must_agree() {
    let err = open(
        compressed_file(),
        "id:u32:key, level:u8, delta:i32, flags:u32, color:u32, pos:f32[2], rate:u32",
    )
    .expect_err("pallet array stores 3 elements");
    assert!(
        matches!(&err, DbError::InvalidArraySize { field, declared: 2, found: 3 } if field == "pos"),
        "got {:?}",
        err
    );

    let file = open(
        compressed_file(),
        "id:u32:key, level:u8, delta:i32, flags:u32, color:u32, pos:f32[], rate:u32",
    )
    .expect("length taken from the file");
    assert_eq!(file.fields()[5].array_length, 3);
}

#[test]
fn test_string_member_cannot_be_bitpacked() {
    let err = open(
        compressed_file(),
        "id:u32:key, level:u8, delta:string, flags:u32, color:u32, pos:f32[3], rate:u32",
    )
    .expect_err("strings are never bit-packed");
    assert!(
        matches!(&err, DbError::UnsupportedFieldType { field, kind: "bitpacked", .. } if field == "delta"),
        "got {:?}",
        err
    );
}

#[test]
fn test_inline_keys_and_copies() {
    let storage = storage_info(Bytes::new(), 0, 32, 0, NONE, [0; 3]);
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 2,
            record_size: 6,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields: vec![(0, 0), (16, 4)],
        data: Bytes::new().u32(5).u16(50).u32(6).u16(60).build(),
        copies: vec![(9, 6)],
        storage: storage_info(storage, 32, 16, 0, NONE, [0; 3]),
        ..Wdc1::default()
    };
    let file = open(file.build(), "id:u32:key, value:u16").expect("unpadded record size is accepted");

    let items: Vec<_> = file.records().collect::<Result<_, _>>().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].0, 9);
    assert_eq!(items[2].1.values(), &[FieldValue::U32(9), FieldValue::U16(60)]);
}

#[test]
fn test_bitpacked_key_without_index_table() {
    let mut data = Vec::new();
    for (key, value) in [(0xABC, 1), (0x123, 2)] {
        data.extend(BitWriter::new().write(key, 12).write(0, 4).write(value, 8).finish());
    }
    let storage = storage_info(Bytes::new(), 0, 12, 0, BITPACKED, [0, 12, 0]);
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 2,
            record_size: 3,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields: vec![(0, 0), (24, 2)],
        data,
        storage: storage_info(storage, 16, 8, 0, NONE, [0; 3]),
        ..Wdc1::default()
    };
    let file = open(file.build(), "id:u32:key, value:u8").expect("valid WDC1 file");

    let decoded = file.load().unwrap();
    assert_eq!(decoded.keys().copied().collect::<Vec<_>>(), vec![0x123, 0xABC]);
    assert_eq!(decoded[&0xABC].values(), &[FieldValue::U32(0xABC), FieldValue::U8(1)]);
}

#[test]
fn test_variable_records() {
    let fields = vec![(0, 0), (0, 4)];
    let start = (HEADER_SIZE + fields.len() * 4) as u32;
    let storage = storage_info(Bytes::new(), 0, 32, 0, NONE, [0; 3]);
    let wdc1 = Wdc1 {
        header: ModernHeader {
            record_count: 1,
            record_size: 7,
            min_key: 1,
            max_key: 1,
            flags: OFFSET_MAP,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields,
        data: Bytes::new().u32(1).cstr("hi").build(),
        offset_map: vec![(start, 7)],
        storage: storage_info(storage, 32, 32, 0, NONE, [0; 3]),
        ..Wdc1::default()
    };
    assert_eq!(wdc1.data_start() as u32, start);
    let file = open(wdc1.build(), "id:u32:key, name:string").expect("valid variable-record WDC1 file");

    assert!(file.layout().unwrap().has_variable_records());
    let decoded = file.load().unwrap();
    assert_eq!(decoded[&1].values(), &[FieldValue::U32(1), FieldValue::String("hi".into())]);
}

#[test]
fn test_unknown_compression_kind() {
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 1,
            record_size: 4,
            ..ModernHeader::default()
        },
        total_field_count: 1,
        fields: vec![(0, 0)],
        data: Bytes::new().u32(1).build(),
        storage: storage_info(Bytes::new(), 0, 32, 0, 9, [0; 3]),
        ..Wdc1::default()
    };
    let err = open(file.build(), "id:u32:key").expect_err("kind 9 is unknown");

    assert!(matches!(err, DbError::UnsupportedCompressionKind(9)), "got {:?}", err);
    assert!(err.is_corruption());
}

#[test]
fn test_signedness_must_match_the_file() {
    let err = open(
        compressed_file(),
        "id:u32:key, level:u8, delta:u32, flags:u32, color:u32, pos:f32[3], rate:u32",
    )
    .expect_err("delta is stored signed");
    assert!(
        matches!(&err, DbError::SignednessMismatch { field, stored_signed: true } if field == "delta"),
        "got {:?}",
        err
    );
    assert!(err.is_schema_error());
}

#[test]
fn test_narrow_common_data_skips_padding() {
    let storage = storage_info(Bytes::new(), 0, 32, 0, NONE, [0; 3]);
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 3,
            record_size: 4,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields: vec![(0, 0), (24, 4)],
        data: Bytes::new().u32(5).u32(6).u32(7).build(),
        storage: storage_info(storage, 0, 0, 13, COMMON_DATA, [3, 0, 0]),
        // The first value is padded to 4 bytes, the last one ends the block unpadded.
        common: Bytes::new().u32(5).u8(9).zeros(3).u32(6).u8(10).build(),
        ..Wdc1::default()
    };
    let file = open(file.build(), "id:u32:key, level:u8").expect("valid WDC1 file");

    let decoded = file.load().unwrap();
    assert_eq!(decoded[&5].values(), &[FieldValue::U32(5), FieldValue::U8(9)]);
    assert_eq!(decoded[&6].values(), &[FieldValue::U32(6), FieldValue::U8(10)]);
    assert_eq!(decoded[&7].values(), &[FieldValue::U32(7), FieldValue::U8(3)]);
}

#[test]
fn test_pallet_index_overflow() {
    let storage = storage_info(Bytes::new(), 0, 32, 0, NONE, [0; 3]);
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 1,
            record_size: 12,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields: vec![(0, 0), (0, 4)],
        data: Bytes::new().u32(1).raw(&[0xFF; 8]).build(),
        storage: storage_info(storage, 32, 64, 12, PALLET_ARRAY, [32, 64, 3]),
        pallet: Bytes::new().u32(1).u32(2).u32(3).build(),
        ..Wdc1::default()
    };
    let file = open(file.build(), "id:u32:key, pos:u32[3]").expect("header and sections are valid");

    let err = file.load().expect_err("index u64::MAX addresses no pallet word");
    assert!(matches!(err, DbError::UnexpectedEof { .. }), "got {:?}", err);
}

#[test]
fn test_index_table_shorter_than_record_count() {
    let storage = storage_info(Bytes::new(), 0, 32, 0, NONE, [0; 3]);
    let file = Wdc1 {
        header: ModernHeader {
            record_count: 2,
            record_size: 8,
            ..ModernHeader::default()
        },
        total_field_count: 2,
        fields: vec![(0, 0), (0, 4)],
        data: Bytes::new().u32(1).u32(100).u32(2).u32(200).build(),
        index: vec![10],
        copies: vec![(20, 10)],
        storage: storage_info(storage, 32, 32, 0, NONE, [0; 3]),
        ..Wdc1::default()
    };
    let file = open(file.build(), "id:u32:key, value:u32").expect("copy table is not read as index keys");

    assert_eq!(file.context().unwrap().index_table().unwrap().len(), 1);
    let decoded = file.load().unwrap();
    assert_eq!(decoded.keys().copied().collect::<Vec<_>>(), vec![2, 10, 20]);
    assert_eq!(decoded[&10].values(), &[FieldValue::U32(10), FieldValue::U32(100)]);
    assert_eq!(decoded[&2].values(), &[FieldValue::U32(2), FieldValue::U32(200)]);
    assert_eq!(decoded[&20].values(), &[FieldValue::U32(20), FieldValue::U32(100)]);
}
