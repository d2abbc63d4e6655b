//! Wire codec for the echo protocol.
//!
//! There is no framing beyond the datagram boundary itself. A request is the
//! UTF-8 rendering of its identifier, `<prefix><lane>_<sequence>`; a response
//! is the fixed literal `"Hello, "` followed by the received bytes verbatim.
//! Everything here operates on raw bytes: the response path never decodes the
//! payload, so arbitrary byte content survives the round trip untouched.

use bytes::{BufMut, Bytes, BytesMut};

/// Literal prepended to every echoed payload.
pub const RESPONSE_PREFIX: &[u8] = b"Hello, ";

/// Maximum practical UDP payload in bytes (65535 minus IP and UDP headers).
pub const MAX_DATAGRAM: usize = 65507;

/// Render the request identifier for `(prefix, lane, sequence)` as bytes.
pub fn render_request(prefix: &str, lane: usize, sequence: usize) -> Vec<u8> {
    format!("{prefix}{lane}_{sequence}").into_bytes()
}

/// Whether `response` acknowledges `request`.
///
/// True iff the request bytes occur as a contiguous subsequence of the
/// response bytes. Containment rather than equality: the server wraps the
/// echo in [`RESPONSE_PREFIX`]. An empty request is acknowledged by anything.
pub fn is_acknowledged(response: &[u8], request: &[u8]) -> bool {
    if request.is_empty() {
        return true;
    }
    if request.len() > response.len() {
        return false;
    }
    response.windows(request.len()).any(|w| w == request)
}

/// Render the echo response for a received payload.
///
/// Byte-for-byte prepend of [`RESPONSE_PREFIX`]; no decode/re-encode round
/// trip, so non-UTF-8 input is passed through unchanged.
pub fn render_response(received: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(RESPONSE_PREFIX.len() + received.len());
    out.put_slice(RESPONSE_PREFIX);
    out.put_slice(received);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_request() {
        assert_eq!(render_request("ping", 0, 0), b"ping0_0");
        assert_eq!(render_request("ping", 1, 2), b"ping1_2");
        assert_eq!(render_request("", 10, 25), b"10_25");
    }

    #[test]
    fn test_render_response_prefixes() {
        let response = render_response(b"ping0_0");
        assert_eq!(&response[..], b"Hello, ping0_0");
    }

    #[test]
    fn test_render_response_tolerates_arbitrary_bytes() {
        let payload = [0xff, 0x00, 0xfe, b'x'];
        let response = render_response(&payload);
        assert_eq!(&response[..RESPONSE_PREFIX.len()], RESPONSE_PREFIX);
        assert_eq!(&response[RESPONSE_PREFIX.len()..], &payload);
    }

    #[test]
    fn test_acknowledgement_is_containment_not_equality() {
        let request = render_request("ping", 0, 1);
        let response = render_response(&request);
        assert!(is_acknowledged(&response, &request));
        assert_ne!(&response[..], &request[..]);
    }

    #[test]
    fn test_unrelated_response_not_acknowledged() {
        let request = render_request("ping", 0, 1);
        let stale = render_response(&render_request("ping", 0, 0));
        assert!(!is_acknowledged(&stale, &request));
    }

    #[test]
    fn test_shorter_response_not_acknowledged() {
        assert!(!is_acknowledged(b"pi", b"ping0_0"));
    }

    #[test]
    fn test_empty_request_matches_anything() {
        assert!(is_acknowledged(b"", b""));
        assert!(is_acknowledged(b"whatever", b""));
    }

    #[test]
    fn test_similar_identifiers_do_not_collide() {
        // ping1_2 must not be mistaken for an ack of ping1_22 or ping11_2.
        let response = render_response(b"ping1_2");
        assert!(!is_acknowledged(&response, b"ping1_22"));
        assert!(!is_acknowledged(&response, b"ping11_2"));
    }
}
