//! Fuzz target for [`Pdu::decode`]
//!
//! Every byte string is either a PDU or a typed decode error.
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary input
//! - A decoded PDU re-encodes to exactly the input bytes
//! - Unknown type ids are reported as unsupported, not malformed

#![no_main]

use dcp_proto::{Pdu, PduType};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match Pdu::decode(data) {
        Ok(pdu) => {
            let encoded = pdu.to_bytes().expect("decoded PDU must re-encode");
            assert_eq!(&encoded[..], data, "re-encoding changed the bytes of {}", pdu.pdu_type());
        },
        Err(e) if e.is_unsupported() => {
            assert!(PduType::from_u8(data[0]).is_none(), "known type id reported unsupported");
        },
        Err(_) => {},
    }
});
