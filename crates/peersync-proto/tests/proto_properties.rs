//! Property tests for wire-level round-tripping and validation predicates.

use peersync_proto::{
    check_filename, BlockInfo, ErrorCode, FileInfo, FileType, Message, RequestMessage,
    ResponseMessage,
};
use proptest::prelude::*;

fn arb_filename_component() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,12}"
}

fn arb_clean_filename() -> impl Strategy<Value = String> {
    proptest::collection::vec(arb_filename_component(), 1..5).prop_map(|parts| parts.join("/"))
}

proptest! {
    #[test]
    fn clean_filenames_are_always_accepted(name in arb_clean_filename()) {
        prop_assert!(check_filename(&name).is_ok());
    }

    #[test]
    fn filenames_with_leading_slash_are_rejected(name in arb_clean_filename()) {
        let bad = format!("/{name}");
        prop_assert!(check_filename(&bad).is_err());
    }

    #[test]
    fn filenames_with_embedded_dotdot_segment_are_rejected(
        prefix in arb_clean_filename(),
        suffix in arb_clean_filename(),
    ) {
        let bad = format!("{prefix}/../{suffix}");
        prop_assert!(check_filename(&bad).is_err());
    }

    #[test]
    fn request_message_round_trips(
        id in any::<u32>(),
        offset in any::<i64>(),
        size in any::<i32>(),
        hash in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let msg = Message::Request(RequestMessage {
            id,
            folder: "folder-1".to_string(),
            name: "a/b.txt".to_string(),
            offset,
            size,
            hash,
            weak_hash: 0,
            flags: 0,
        });
        let mut buf = Vec::new();
        msg.encode_to(&mut buf).unwrap();
        let decoded = Message::decode(msg.message_type(), &buf).unwrap();
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn response_message_round_trips(
        id in any::<u32>(),
        data in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let msg = Message::Response(ResponseMessage { id, data, code: ErrorCode::NoError });
        let mut buf = Vec::new();
        msg.encode_to(&mut buf).unwrap();
        let decoded = Message::decode(msg.message_type(), &buf).unwrap();
        prop_assert_eq!(decoded, msg);
    }

    #[test]
    fn file_with_nonempty_blocks_and_no_deleted_invalid_is_consistent(
        name in arb_clean_filename(),
        size in 1i64..1_000_000,
    ) {
        let info = FileInfo {
            name,
            file_type: FileType::File,
            size,
            modified_s: 0,
            deleted: false,
            invalid: false,
            conflicting: false,
            blocks: vec![BlockInfo { offset: 0, size: size as i32, hash: vec![0u8; 32] }],
        };
        prop_assert!(peersync_proto::check_file_info_consistency(&info).is_ok());
    }
}
