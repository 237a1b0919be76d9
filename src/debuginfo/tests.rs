use super::headers::{BlobProgramHeader, KERNEL_BLOBS_MAGIC};
use super::*;

fn blobs() -> KernelBlobs {
    KernelBlobs {
        device: 9,
        stepping_id: 2,
        pointer_size: 8,
        kernels: vec![
            KernelBlob {
                name: "vadd".into(),
                visa: vec![1, 2, 3],
                gen_isa: vec![4, 5],
            },
            KernelBlob {
                name: "no_debug".into(),
                visa: vec![],
                gen_isa: vec![],
            },
        ],
    }
}

fn lines() -> LineTables {
    LineTables {
        device: 12,
        stepping_id: 0,
        pointer_size: 8,
        dirs: vec!["/src".into(), "include".into()],
        files: vec![
            SourceFile {
                dir: 0,
                name: "vadd.cl".into(),
            },
            SourceFile {
                dir: 1,
                name: "inc.h".into(),
            },
        ],
        kernel_names: vec!["vadd".into(), "other".into()],
        kernels: vec![KernelLines {
            kernel: 0,
            code_offset: 0x40,
            size: 0x100,
            entries: vec![
                LineEntry {
                    offset: 0,
                    position: LineColumn::new(3, 5),
                    file: 0,
                },
                LineEntry {
                    offset: 0x10,
                    position: LineColumn::new(7, 1),
                    file: 1,
                },
            ],
        }],
    }
}

#[test]
fn special_debug_variables() {
    assert!(is_special_debug_variable("__ocl_dbg_gid0"));
    assert!(is_special_debug_variable("__ocl_dbg"));
    assert!(!is_special_debug_variable("x__ocl_dbg"));
    assert!(!is_special_debug_variable("gid"));
}

#[test]
fn line_column_packing() {
    let pos = LineColumn::new(1234, 56);
    assert_eq!(pos.pack(), 1234 | (56 << 20));
    assert_eq!(LineColumn::unpack(pos.pack()), pos);
    let clamped = LineColumn::new(u32::MAX, u32::MAX);
    assert_eq!(clamped.line, LineColumn::MAX_LINE);
    assert_eq!(clamped.column, LineColumn::MAX_COLUMN);
    assert_eq!(clamped.pack(), u32::MAX);
}

#[test]
fn kernel_names_are_dword_padded() {
    let bytes = blobs().encode();
    // program header, then the first kernel header
    let name_size = u32::from_le_bytes(bytes[28..32].try_into().unwrap());
    assert_eq!(name_size, 8);
    assert_eq!(&bytes[40..48], b"vadd\0\0\0\0");
    // The 5 blob bytes leave the second header unaligned; its name field is
    // still padded relative to its own start.
    let second_name_size = u32::from_le_bytes(bytes[53..57].try_into().unwrap());
    assert_eq!(second_name_size, 12);
    assert_eq!(&bytes[65..77], b"no_debug\0\0\0\0");
    assert_eq!(bytes.len(), 77);
    assert_eq!(
        u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize,
        bytes.len()
    );
}

#[test]
fn unaligned_names_round_trip() {
    let mut original = blobs();
    original.kernels[0].visa = vec![7; 3];
    original.kernels[0].gen_isa = vec![];
    original.kernels.push(KernelBlob {
        name: "k3".into(),
        visa: vec![9],
        gen_isa: vec![8, 8],
    });
    let decoded = KernelBlobs::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn kernel_blobs_decode() {
    let original = blobs();
    let decoded = KernelBlobs::decode(&original.encode()).unwrap();
    assert_eq!(decoded, original);
    match decode(&original.encode()).unwrap() {
        DebugData::Blobs(b) => assert_eq!(b.kernels[0].gen_isa, vec![4, 5]),
        other => panic!("wrong layout: {:?}", other),
    }
}

#[test]
fn line_tables_decode() {
    let original = lines();
    let bytes = original.encode();
    assert_eq!(bytes.len() % 4, 0);
    let decoded = LineTables::decode(&bytes).unwrap();
    assert_eq!(decoded, original);
    assert_eq!(decoded.file_path(0).as_deref(), Some("/src/vadd.cl"));
    assert_eq!(decoded.file_path(1).as_deref(), Some("include/inc.h"));
    assert_eq!(decoded.file_path(2), None);
    assert!(matches!(decode(&bytes).unwrap(), DebugData::Lines(_)));

    let mut flat = original;
    flat.dirs[1].clear();
    assert_eq!(flat.file_path(1).as_deref(), Some("inc.h"));
}

#[test]
fn line_tables_listing() {
    insta::assert_snapshot!(lines().to_string(), @r"
    line tables: device 12 stepping 0 pointer size 8 kernels 2 (1 with debug data)
      dir  [0] /src
      dir  [1] include
      file [0] vadd.cl (dir 0)
      file [1] inc.h (dir 1)
      kernel vadd @ 0x40, 256 byte(s), 2 line(s)
        0x0000 /src/vadd.cl:3:5
        0x0010 include/inc.h:7:1
    ");
}

#[test]
fn unknown_magic_is_rejected() {
    let bytes = [0xEFu8, 0xBE, 0xAD, 0xDE, 0, 0, 0, 0];
    assert_eq!(decode(&bytes), Err(DecodeError::BadMagic(0xDEAD_BEEF)));
}

#[test]
fn truncated_container() {
    let bytes = blobs().encode();
    let err = KernelBlobs::decode(&bytes[..10]).unwrap_err();
    assert!(matches!(
        err,
        DecodeError::Truncated {
            what: "program header",
            ..
        }
    ));
}

#[test]
fn declared_size_must_match() {
    let mut bytes = blobs().encode();
    bytes.push(0);
    assert!(matches!(
        KernelBlobs::decode(&bytes),
        Err(DecodeError::SizeMismatch { .. })
    ));
}

#[test]
fn version_is_checked() {
    let header = BlobProgramHeader {
        magic: KERNEL_BLOBS_MAGIC,
        version: 7,
        size: 28,
        ..Default::default()
    };
    let bytes = bytemuck::bytes_of(&headers::swap_to_le(header)).to_vec();
    assert_eq!(
        KernelBlobs::decode(&bytes),
        Err(DecodeError::UnsupportedVersion(7))
    );
}

#[test]
fn bad_file_index_is_rejected() {
    let mut tables = lines();
    // last entry's file index is the final word
    let mut corrupted = tables.encode();
    let n = corrupted.len();
    corrupted[n - 4..].copy_from_slice(&9u32.to_le_bytes());
    assert_eq!(
        LineTables::decode(&corrupted),
        Err(DecodeError::IndexOutOfRange {
            what: "file",
            index: 9,
            len: 2,
        })
    );
    tables.kernels.clear();
    assert!(LineTables::decode(&tables.encode()).unwrap().kernels.is_empty());
}

#[test]
#[should_panic(expected = "refers to file")]
fn encoding_checks_file_indices() {
    let mut tables = lines();
    tables.kernels[0].entries[0].file = 5;
    tables.encode();
}

#[test]
fn display_lists_kernels() {
    insta::assert_snapshot!(blobs().to_string(), @r"
    kernel debug blobs: device 9 stepping 2 pointer size 8 kernels 2
      [0] vadd: vISA 3 byte(s), GenISA 2 byte(s)
      [1] no_debug: vISA 0 byte(s), GenISA 0 byte(s)
    ");
}
