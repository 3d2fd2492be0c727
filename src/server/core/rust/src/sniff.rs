/* src/server/core/rust/src/sniff.rs */

const OCTET_STREAM: &str = "application/octet-stream";

// Checked in order; first match wins.
const SIGNATURES: &[(&[u8], &str)] = &[
  (b"\x89PNG\r\n\x1a\n", "image/png"),
  (b"\xff\xd8\xff", "image/jpeg"),
  (b"GIF87a", "image/gif"),
  (b"GIF89a", "image/gif"),
  (b"%PDF-", "application/pdf"),
  (b"PK\x03\x04", "application/zip"),
  (b"\x1f\x8b\x08", "application/x-gzip"),
  (b"\x00\x00\x01\x00", "image/x-icon"),
  (b"BM", "image/bmp"),
];

const HTML_PREFIXES: &[&[u8]] =
  &[b"<!doctype html", b"<html", b"<head", b"<body", b"<div", b"<p", b"<!--"];

/// Guess a content type from the leading bytes of a payload.
pub fn sniff_content_type(data: &[u8]) -> &'static str {
  if data.is_empty() {
    return "text/plain; charset=utf-8";
  }

  for (magic, mime) in SIGNATURES {
    if data.starts_with(magic) {
      return mime;
    }
  }
  if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
    return "image/webp";
  }

  let head = &data[..data.len().min(512)];
  let trimmed = trim_leading_whitespace(head);
  if HTML_PREFIXES.iter().any(|p| starts_with_ignore_case(trimmed, p)) {
    return "text/html; charset=utf-8";
  }
  if trimmed.starts_with(b"<?xml") {
    return "text/xml; charset=utf-8";
  }
  if (trimmed.starts_with(b"{") || trimmed.starts_with(b"["))
    && serde_json::from_slice::<serde_json::Value>(data).is_ok()
  {
    return "application/json";
  }
  if is_text(head) {
    return "text/plain; charset=utf-8";
  }
  OCTET_STREAM
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
  let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
  &data[start..]
}

fn starts_with_ignore_case(data: &[u8], prefix: &[u8]) -> bool {
  data.len() >= prefix.len() && data[..prefix.len()].eq_ignore_ascii_case(prefix)
}

// Binary control bytes rule out text; valid UTF-8 otherwise counts as text.
fn is_text(data: &[u8]) -> bool {
  let binary = data.iter().any(|&b| matches!(b, 0x00..=0x08 | 0x0b | 0x0e..=0x1a | 0x1c..=0x1f));
  if binary {
    return false;
  }
  match std::str::from_utf8(data) {
    Ok(_) => true,
    // A multi-byte sequence cut at the 512-byte window is still text.
    Err(e) => e.error_len().is_none(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn images() {
    assert_eq!(sniff_content_type(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
    assert_eq!(sniff_content_type(b"\xff\xd8\xff\xe0\0\x10JFIF"), "image/jpeg");
    assert_eq!(sniff_content_type(b"GIF89a\x01\0"), "image/gif");
    assert_eq!(sniff_content_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
  }

  #[test]
  fn documents() {
    assert_eq!(sniff_content_type(b"%PDF-1.7"), "application/pdf");
    assert_eq!(sniff_content_type(b"  <!DOCTYPE html><html>"), "text/html; charset=utf-8");
    assert_eq!(sniff_content_type(br#"{"a": 1}"#), "application/json");
  }

  #[test]
  fn text_and_binary() {
    assert_eq!(sniff_content_type(b"hello, world"), "text/plain; charset=utf-8");
    assert_eq!(sniff_content_type(b"\x01\x02\x03binary"), OCTET_STREAM);
    assert_eq!(sniff_content_type(b""), "text/plain; charset=utf-8");
  }

  #[test]
  fn broken_json_is_text() {
    assert_eq!(sniff_content_type(b"{not json"), "text/plain; charset=utf-8");
  }
}
