/// Decodes RFC 2047 encoded-words that occasionally survive in API header values.
/// Plain values are returned as-is.
pub fn decode_header_value(raw: &str) -> String {
    if !raw.contains("=?") {
        return raw.to_string();
    }

    // mailparse expects a full "Key: value" header line
    let mut line = b"X: ".to_vec();
    line.extend_from_slice(raw.as_bytes());
    line.extend_from_slice(b"\r\n");

    match mailparse::parse_header(&line) {
        Ok((h, _idx)) => h.get_value(),
        Err(_) => raw.to_string(),
    }
}

/// Drops NUL characters, which webhook endpoints reject.
pub fn strip_nul(s: &str) -> String {
    s.chars().filter(|&c| c != '\0').collect()
}
