#![no_main]
use libfuzzer_sys::fuzz_target;
use techdesk::gateway::api::{parse_body, ChatBody, CreateSessionBody};

fuzz_target!(|data: &[u8]| {
    let body = axum::body::Bytes::copy_from_slice(data);
    let _ = parse_body::<ChatBody>(&body);
    let _ = parse_body::<CreateSessionBody>(&body);
});
