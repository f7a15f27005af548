use super::*;

#[test]
fn test_text_frames() {
    let first = decode_line(r#"{"type":"text","content":"Hel"}"#);
    let second = decode_line(r#"{"type":"text","content":"lo","done":true}"#);
    assert_eq!(
        first[0].kind,
        FrameKind::Text { text: "Hel".into(), done: false }
    );
    assert_eq!(
        second[0].kind,
        FrameKind::Text { text: "lo".into(), done: true }
    );
    assert!(second[0].is_terminal());
    assert_eq!(first[0].raw, r#"{"type":"text","content":"Hel"}"#);
}

#[test]
fn test_missing_type_defaults_to_text() {
    let frames = decode_line(r#"{"content":"hi"}"#);
    assert_eq!(frames[0].kind, FrameKind::Text { text: "hi".into(), done: false });
}

#[test]
fn test_malformed_line_skipped() {
    assert!(decode_line("{not json").is_empty());
    assert!(decode_line("").is_empty());
    assert!(decode_line("   ").is_empty());
}

#[test]
fn test_unknown_type_skipped() {
    assert!(decode_line(r#"{"type":"heartbeat"}"#).is_empty());
}

#[test]
fn test_tool_call_frame() {
    let frames = decode_line(
        r#"{"type":"tool_use","tool_calls":[{"id":"call_1","name":"read_file","input":{"path":"a.txt"}}]}"#,
    );
    assert_eq!(frames.len(), 1);
    match &frames[0].kind {
        FrameKind::ToolCall { calls } => {
            assert_eq!(calls[0].id, "call_1");
            assert_eq!(calls[0].name, "read_file");
            assert_eq!(calls[0].parameters["path"], "a.txt");
        }
        other => panic!("Expected tool call frame, got {:?}", other),
    }
}

#[test]
fn test_tool_call_string_arguments_and_done() {
    let frames = decode_line(
        r#"{"type":"tool_call","done":true,"tool_calls":[{"name":"search","arguments":"{\"q\":\"rust\"}"}]}"#,
    );
    assert_eq!(frames.len(), 2);
    match &frames[0].kind {
        FrameKind::ToolCall { calls } => assert_eq!(calls[0].parameters["q"], "rust"),
        other => panic!("Expected tool call frame, got {:?}", other),
    }
    assert_eq!(frames[1].kind, FrameKind::Done);
}

#[test]
fn test_tool_call_without_calls_skipped() {
    assert!(decode_line(r#"{"type":"tool_call"}"#).is_empty());
}

#[test]
fn test_error_frame() {
    let frames = decode_line(r#"{"type":"error","content":"rate limited"}"#);
    assert_eq!(frames[0].kind, FrameKind::Error { message: "rate limited".into() });

    let nested = decode_line(r#"{"type":"error","error":{"message":"bad input"}}"#);
    assert_eq!(nested[0].kind, FrameKind::Error { message: "bad input".into() });
}

#[test]
fn test_done_frame_with_usage() {
    let frames = decode_line(
        r#"{"type":"done","usage":{"input_tokens":10,"output_tokens":5,"total_tokens":15}}"#,
    );
    assert_eq!(frames[0].kind, FrameKind::Done);
    assert_eq!(frames[0].usage, Some(Usage::new(10, 5)));
}

#[test]
fn test_decoder_chunk_boundaries() {
    let input = concat!(
        r#"{"type":"text","content":"Hel"}"#,
        "\n",
        "garbage\n",
        r#"{"type":"text","content":"lo","done":true}"#,
        "\n"
    )
    .as_bytes();

    let mut whole = NdjsonDecoder::new();
    let mut expected = whole.feed(input);
    expected.extend(whole.finish());
    assert_eq!(expected.len(), 2);

    for split in 1..input.len() {
        let mut decoder = NdjsonDecoder::new();
        let mut frames = decoder.feed(&input[..split]);
        frames.extend(decoder.feed(&input[split..]));
        frames.extend(decoder.finish());
        assert_eq!(frames, expected, "split at {split}");
    }
}

#[test]
fn test_decoder_finish_flushes_unterminated_line() {
    let mut decoder = NdjsonDecoder::new();
    assert!(decoder.feed(br#"{"type":"done"}"#).is_empty());
    assert_eq!(decoder.finish()[0].kind, FrameKind::Done);
}
