//! Minimal HTTP/1.1 client framing: one POST out, one response in.

use core::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Transient,
    Fatal,
}

/// 2xx succeeds, 5xx may succeed later, 3xx and 4xx never will.
/// 1xx and anything outside 100..=599 count as a malformed answer.
pub const fn classify_status(status: u16) -> Option<StatusClass> {
    match status {
        200..=299 => Some(StatusClass::Success),
        500..=599 => Some(StatusClass::Transient),
        300..=499 => Some(StatusClass::Fatal),
        _ => None,
    }
}

/// Frames a JSON POST into `out`. Fails only when `out` is too small.
pub fn write_post_request<const N: usize>(
    out: &mut heapless::String<N>,
    host: &str,
    port: u16,
    path: &str,
    body: &str,
) -> Result<(), core::fmt::Error> {
    out.clear();
    write!(out, "POST {path} HTTP/1.1\r\nHost: {host}")?;
    if port != 80 {
        write!(out, ":{port}")?;
    }
    write!(
        out,
        "\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )?;
    out.push_str(body).map_err(|_| core::fmt::Error)
}

pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|window| window == b"\r\n\r\n")
}

pub fn parse_status_line(header: &str) -> Option<u16> {
    let first_line = header.lines().next()?;
    let mut parts = first_line.split_ascii_whitespace();
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse::<u16>().ok()
}

pub fn parse_content_length(header: &str) -> Result<Option<usize>, &'static str> {
    let mut content_length = None;

    for line in header.lines().skip(1) {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };

        if !name.trim().eq_ignore_ascii_case("content-length") {
            continue;
        }

        let parsed = value
            .trim()
            .parse::<usize>()
            .map_err(|_| "invalid content-length")?;

        if content_length.is_some() {
            return Err("duplicate content-length");
        }

        content_length = Some(parsed);
    }

    Ok(content_length)
}

/// How far a buffered response has arrived.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseProgress {
    NeedMore,
    Complete { header_end: usize, body_len: usize },
    Malformed,
}

/// Checks whether `buf` holds the full header plus the declared body.
/// Without a `Content-Length` the body runs until the peer closes.
pub fn response_progress(buf: &[u8]) -> ResponseProgress {
    let Some(header_end) = find_header_end(buf) else {
        return ResponseProgress::NeedMore;
    };
    let Ok(header) = core::str::from_utf8(&buf[..header_end]) else {
        return ResponseProgress::Malformed;
    };
    match parse_content_length(header) {
        Ok(Some(len)) => match (header_end + 4).checked_add(len) {
            Some(total) if buf.len() >= total => ResponseProgress::Complete {
                header_end,
                body_len: len,
            },
            Some(_) => ResponseProgress::NeedMore,
            None => ResponseProgress::Malformed,
        },
        Ok(None) => ResponseProgress::NeedMore,
        Err(_) => ResponseProgress::Malformed,
    }
}
