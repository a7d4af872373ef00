//! 针对定长前缀分帧编解码器及请求/响应负载编解码器的属性测试。

use bk_proto::{
    decode_request, decode_response, encode_frame, encode_request, encode_response, try_decode_frame,
    OpType, RequestBody, RequestFlags, ResponseBody, StatusCode,
};
use bytes::{Bytes, BytesMut};
use proptest::prelude::*;

fn arb_bytes(max_len: usize) -> impl Strategy<Value = Bytes> {
    proptest::collection::vec(any::<u8>(), 0..max_len).prop_map(Bytes::from)
}

fn arb_add_request() -> impl Strategy<Value = RequestBody> {
    (
        any::<i64>(),
        any::<i64>(),
        arb_bytes(64),
        arb_bytes(256),
        any::<bool>(),
    )
        .prop_map(|(ledger_id, entry_id, master_key, body, recovery)| RequestBody::Add {
            ledger_id,
            entry_id,
            master_key,
            body,
            flags: if recovery {
                RequestFlags::recovery_add()
            } else {
                RequestFlags::NONE
            },
        })
}

fn arb_read_request() -> impl Strategy<Value = RequestBody> {
    (
        any::<i64>(),
        any::<i64>(),
        proptest::option::of(arb_bytes(64)),
    )
        .prop_map(|(ledger_id, entry_id, master_key)| {
            let flags = if master_key.is_some() {
                RequestFlags::fence_ledger()
            } else {
                RequestFlags::NONE
            };
            RequestBody::Read {
                ledger_id,
                entry_id,
                master_key,
                flags,
            }
        })
}

fn arb_read_response() -> impl Strategy<Value = ResponseBody> {
    (any::<i64>(), any::<i64>(), arb_bytes(256)).prop_map(|(ledger_id, entry_id, body)| {
        ResponseBody::Read {
            status: StatusCode::Ok,
            ledger_id,
            entry_id,
            body,
        }
    })
}

proptest! {
    #[test]
    fn add_request_survives_frame_and_payload_round_trip(body in arb_add_request()) {
        let payload = encode_request(1, &body);
        let framed = encode_frame(&payload);

        let mut buf = BytesMut::from(&framed[..]);
        let unframed = try_decode_frame(&mut buf).unwrap().expect("one complete frame");
        prop_assert!(buf.is_empty());

        let (header, decoded) = decode_request(unframed).unwrap();
        prop_assert_eq!(header.op, OpType::AddEntry);
        prop_assert_eq!(decoded, body);
    }

    #[test]
    fn read_request_survives_frame_and_payload_round_trip(body in arb_read_request()) {
        let payload = encode_request(2, &body);
        let framed = encode_frame(&payload);

        let mut buf = BytesMut::from(&framed[..]);
        let unframed = try_decode_frame(&mut buf).unwrap().expect("one complete frame");

        let (header, decoded) = decode_request(unframed).unwrap();
        prop_assert_eq!(header.op, OpType::ReadEntry);
        prop_assert_eq!(decoded, body);
    }

    #[test]
    fn read_response_survives_frame_and_payload_round_trip(body in arb_read_response()) {
        let payload = encode_response(3, &body);
        let framed = encode_frame(&payload);

        let mut buf = BytesMut::from(&framed[..]);
        let unframed = try_decode_frame(&mut buf).unwrap().expect("one complete frame");

        let (header, decoded) = decode_response(unframed).unwrap();
        prop_assert_eq!(header.op, OpType::ReadEntry);
        prop_assert_eq!(decoded, body);
    }

    #[test]
    fn frame_splitting_is_insensitive_to_chunk_boundaries(
        bodies in proptest::collection::vec(arb_bytes(32), 1..6),
    ) {
        let mut buf = BytesMut::new();
        for (i, body) in bodies.iter().enumerate() {
            let req = RequestBody::Read {
                ledger_id: i as i64,
                entry_id: i as i64,
                master_key: None,
                flags: RequestFlags::NONE,
            };
            let _ = body; // only the request shape matters for framing here
            buf.extend_from_slice(&encode_frame(&encode_request(i as u64, &req)));
        }

        let mut decoded_count = 0;
        while let Some(payload) = try_decode_frame(&mut buf).unwrap() {
            decode_request(payload).unwrap();
            decoded_count += 1;
        }
        prop_assert_eq!(decoded_count, bodies.len());
        prop_assert!(buf.is_empty());
    }
}
