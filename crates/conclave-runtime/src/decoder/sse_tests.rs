use super::*;

fn decode_all(input: &[u8]) -> Vec<SseEvent> {
    let mut decoder = SseDecoder::new();
    let mut events = decoder.feed_events(input);
    events.extend(decoder.finish_events());
    events
}

#[test]
fn test_multi_data_lines_joined() {
    let events = decode_all(b"data: a\ndata: b\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "a\nb");

    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"data: a\ndata: b\n\n");
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].raw, "a\nb");
}

#[test]
fn test_named_fields() {
    let events = decode_all(b"id: 7\nevent: delta\nretry: 1500\ndata: x\n\n");
    let event = &events[0];
    assert_eq!(event.id.as_deref(), Some("7"));
    assert_eq!(event.event.as_deref(), Some("delta"));
    assert_eq!(event.retry, Some(1500));
    assert_eq!(event.data, "x");

    let meta = event.meta();
    assert_eq!(meta.event_id.as_deref(), Some("7"));
    assert_eq!(meta.retry, Some(1500));
}

#[test]
fn test_non_numeric_retry_omitted() {
    let events = decode_all(b"retry: soon\ndata: x\n\n");
    assert_eq!(events[0].retry, None);
}

#[test]
fn test_comments_ignored() {
    let events = decode_all(b": keep-alive\ndata: x\n\n: another\n\n");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "x");
}

#[test]
fn test_unknown_fields_preserved() {
    let events = decode_all(b"data: x\nx-trace: abc:def\nflag\n\n");
    let fields = &events[0].fields;
    assert_eq!(fields.get("x-trace").map(String::as_str), Some("abc:def"));
    assert_eq!(fields.get("flag").map(String::as_str), Some(""));
}

#[test]
fn test_only_one_leading_space_stripped() {
    let events = decode_all(b"data:  two spaces\ndata:none\n\n");
    assert_eq!(events[0].data, " two spaces\nnone");
}

#[test]
fn test_done_sentinel_ends_stream() {
    let mut decoder = SseDecoder::new();
    let events = decoder.feed_events(b"data: a\n\ndata: [DONE]\n\ndata: late\n\n");
    assert_eq!(events.len(), 1);
    assert!(decoder.is_ended());
    assert!(decoder.feed_events(b"data: more\n\n").is_empty());
    assert!(decoder.finish_events().is_empty());
}

#[test]
fn test_crlf_line_endings() {
    let events = decode_all(b"event: message\r\ndata: hi\r\n\r\n");
    assert_eq!(events[0].event.as_deref(), Some("message"));
    assert_eq!(events[0].data, "hi");
}

#[test]
fn test_finish_flushes_pending_event() {
    let events = decode_all(b"data: tail");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].data, "tail");
}

#[test]
fn test_event_frame_mapping() {
    let mut decoder = SseDecoder::new();
    let frames = decoder.feed(b"event: error\ndata: overloaded\n\nevent: done\n\ndata: plain\n\n");
    assert_eq!(frames[0].kind, FrameKind::Error { message: "overloaded".into() });
    assert_eq!(frames[1].kind, FrameKind::Done);
    assert_eq!(frames[2].kind, FrameKind::Text { text: "plain".into(), done: false });
    assert_eq!(frames[0].meta.event_type.as_deref(), Some("error"));
}

#[test]
fn test_boundary_insensitive() {
    let input = "id: 1\nevent: delta\ndata: héllo\ndata: wörld\n: note\nx-extra: 1\n\nretry: 30\ndata: {\"k\":1}\n\ndata: [DONE]\n\n"
        .as_bytes();
    let expected = decode_all(input);
    assert_eq!(expected.len(), 2);

    for split in 1..input.len() {
        let mut decoder = SseDecoder::new();
        let mut events = decoder.feed_events(&input[..split]);
        events.extend(decoder.feed_events(&input[split..]));
        events.extend(decoder.finish_events());
        assert_eq!(events, expected, "split at {split}");
    }

    // Byte-at-a-time.
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();
    for byte in input {
        events.extend(decoder.feed_events(std::slice::from_ref(byte)));
    }
    events.extend(decoder.finish_events());
    assert_eq!(events, expected);
}
