use crate::future::yield_now;

/// Parse the leading run of whitespace separated decimal integers.
///
/// Scanning stops at the first token that is not an integer (this includes
/// values that overflow an `i64`); everything before it is returned. Yields
/// once per token.
pub async fn scan_integers(bytes: &[u8]) -> Vec<i64> {
    let mut numbers = Vec::new();

    for token in bytes.split(is_space).filter(|t| !t.is_empty()) {
        let Some(n) = parse_token(token) else {
            break;
        };

        numbers.push(n);
        yield_now().await;
    }

    numbers
}

/// Whitespace as C's `isspace` sees it, which unlike
/// [`u8::is_ascii_whitespace`] includes the vertical tab.
fn is_space(b: &u8) -> bool {
    b.is_ascii_whitespace() || *b == b'\x0b'
}

fn parse_token(token: &[u8]) -> Option<i64> {
    std::str::from_utf8(token).ok()?.parse().ok()
}
