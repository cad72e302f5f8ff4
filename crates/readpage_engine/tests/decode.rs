use pretty_assertions::assert_eq;
use readpage_engine::decode_body;

#[test]
fn decode_respects_charset_header() {
    let bytes = b"caf\xe9"; // iso-8859-1
    let decoded = decode_body(bytes, Some("text/mycomarkup; charset=\"ISO-8859-1\""));
    assert_eq!(decoded.text, "caf\u{e9}");
    assert_eq!(decoded.encoding_label, "windows-1252");
    assert!(!decoded.lossy);
}

#[test]
fn decode_handles_utf8_bom() {
    let bytes = b"\xEF\xBB\xBFhello";
    let decoded = decode_body(bytes, Some("text/plain"));
    assert_eq!(decoded.text, "hello");
    assert_eq!(decoded.encoding_label, "UTF-8");
}

#[test]
fn decode_guesses_without_charset() {
    let decoded = decode_body("= Заголовок".as_bytes(), None);
    assert_eq!(decoded.text, "= Заголовок");
}

#[test]
fn unknown_charset_label_falls_back_to_guessing() {
    let decoded = decode_body("plain ascii".as_bytes(), Some("text/plain; charset=no-such-thing"));
    assert_eq!(decoded.text, "plain ascii");
    assert!(!decoded.lossy);
}

#[test]
fn malformed_bytes_become_replacement_characters() {
    let decoded = decode_body(b"ok \xc3\x28 still here", Some("text/plain; charset=utf-8"));
    assert_eq!(decoded.text, "ok \u{fffd}( still here");
    assert_eq!(decoded.encoding_label, "UTF-8");
    assert!(decoded.lossy);
}
