//! Pure wire-protocol decoders for scale indicator heads. No I/O here.
//!
//! Two formats are supported, selected by configuration:
//!
//! - **BCD framed**: fixed-length frame `0x02 <bcd bytes> 0x03`. Each interior
//!   byte carries two decimal digits (high nibble first); the digit string has
//!   two implied decimal places, so the decoded integer is already in
//!   centi-units.
//! - **Reversed text**: ASCII digits transmitted least-significant-first, up
//!   to a delimiter byte. The payload is reversed and parsed as a decimal
//!   literal.
//!
//! A malformed frame is a normal condition on a noisy line: decoders return a
//! typed [`FrameError`] and never panic.

use thiserror::Error;

/// Start-of-frame marker for the BCD framed protocol.
pub const FRAME_START: u8 = 0x02;
/// End-of-frame marker for the BCD framed protocol.
pub const FRAME_END: u8 = 0x03;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("bad start marker: {0:#04x}")]
    BadStart(u8),
    #[error("bad end marker: {0:#04x}")]
    BadEnd(u8),
    #[error("nibble out of range at byte {index}: {value:#04x}")]
    BadNibble { index: usize, value: u8 },
    #[error("empty payload")]
    Empty,
    #[error("not a decimal literal: {0:?}")]
    BadLiteral(String),
    #[error("value out of range")]
    Overflow,
}

/// Decode a complete BCD frame including both markers.
///
/// Returns the weight in centi-units: for digits `d1..dn` the result is the
/// n-digit integer, which carries two implied decimal places on the wire.
pub fn decode_bcd_frame(frame: &[u8]) -> Result<i64, FrameError> {
    if frame.len() < 3 {
        return Err(FrameError::TooShort(frame.len()));
    }
    let first = frame[0];
    if first != FRAME_START {
        return Err(FrameError::BadStart(first));
    }
    let last = frame[frame.len() - 1];
    if last != FRAME_END {
        return Err(FrameError::BadEnd(last));
    }
    let mut value: i64 = 0;
    for (i, &b) in frame[1..frame.len() - 1].iter().enumerate() {
        let hi = b >> 4;
        let lo = b & 0x0F;
        if hi > 9 || lo > 9 {
            return Err(FrameError::BadNibble {
                index: i + 1,
                value: b,
            });
        }
        value = value
            .checked_mul(100)
            .and_then(|v| v.checked_add(i64::from(hi) * 10 + i64::from(lo)))
            .ok_or(FrameError::Overflow)?;
    }
    Ok(value)
}

/// Encode a non-negative centi-weight as a BCD frame with `interior_len`
/// payload bytes. Inverse of [`decode_bcd_frame`]; used by the scripted line
/// and by tests.
pub fn encode_bcd_frame(centi: i64, interior_len: usize) -> Option<Vec<u8>> {
    if centi < 0 {
        return None;
    }
    let mut rem = centi as u64;
    let mut payload = vec![0u8; interior_len];
    for b in payload.iter_mut().rev() {
        let lo = (rem % 10) as u8;
        rem /= 10;
        let hi = (rem % 10) as u8;
        rem /= 10;
        *b = (hi << 4) | lo;
    }
    if rem != 0 {
        // Value does not fit in the configured number of BCD digits.
        return None;
    }
    let mut frame = Vec::with_capacity(interior_len + 2);
    frame.push(FRAME_START);
    frame.extend_from_slice(&payload);
    frame.push(FRAME_END);
    Some(frame)
}

/// Decode a reversed-text payload (delimiter already stripped).
///
/// The wire transmits digits least-significant-first, so the payload is
/// reversed before parsing. Accepts an optional leading sign and up to one
/// decimal point after reversal; the result is rounded half-away-from-zero to
/// centi-units when more than two fractional digits are present.
pub fn decode_reversed_text(payload: &[u8]) -> Result<i64, FrameError> {
    if payload.is_empty() {
        return Err(FrameError::Empty);
    }
    let reversed: Vec<u8> = payload.iter().rev().copied().collect();
    let text = std::str::from_utf8(&reversed)
        .map_err(|_| FrameError::BadLiteral(format!("{:?}", payload)))?
        .trim()
        .to_owned();
    parse_decimal_centi(&text)
}

/// Parse a plain decimal literal (`[-]digits[.digits]`) into centi-units,
/// rounding half-away-from-zero beyond two fractional digits.
pub fn parse_decimal_centi(text: &str) -> Result<i64, FrameError> {
    let bad = || FrameError::BadLiteral(text.to_owned());
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if body.is_empty() {
        return Err(bad());
    }
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(bad());
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(bad());
    }

    let mut value: i64 = 0;
    for b in int_part.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(i64::from(b - b'0')))
            .ok_or(FrameError::Overflow)?;
    }
    value = value.checked_mul(100).ok_or(FrameError::Overflow)?;

    let mut frac = frac_part.bytes();
    if let Some(b) = frac.next() {
        value += i64::from(b - b'0') * 10;
    }
    if let Some(b) = frac.next() {
        value += i64::from(b - b'0');
    }
    // Round half-away-from-zero on the third fractional digit.
    if let Some(b) = frac.next()
        && b - b'0' >= 5
    {
        value += 1;
    }

    Ok(if negative { -value } else { value })
}

/// Re-encode a centi-weight as a reversed-text payload (without delimiter).
/// Inverse of [`decode_reversed_text`] for scripted lines and tests.
pub fn encode_reversed_text(centi: i64) -> Vec<u8> {
    let magnitude = centi.unsigned_abs();
    let mut text = format!("{}.{:02}", magnitude / 100, magnitude % 100);
    if centi < 0 {
        text.insert(0, '-');
    }
    text.into_bytes().into_iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_six_digit_bcd() {
        // digits 1 8 5 0 0 0 -> 185000 centi = 1850.00
        let frame = [FRAME_START, 0x18, 0x50, 0x00, FRAME_END];
        assert_eq!(decode_bcd_frame(&frame), Ok(185_000));
    }

    #[test]
    fn rejects_bad_markers() {
        assert_eq!(
            decode_bcd_frame(&[0x00, 0x18, FRAME_END]),
            Err(FrameError::BadStart(0x00))
        );
        assert_eq!(
            decode_bcd_frame(&[FRAME_START, 0x18, 0x00]),
            Err(FrameError::BadEnd(0x00))
        );
    }

    #[test]
    fn rejects_non_bcd_nibble() {
        let frame = [FRAME_START, 0x1A, FRAME_END];
        assert_eq!(
            decode_bcd_frame(&frame),
            Err(FrameError::BadNibble {
                index: 1,
                value: 0x1A
            })
        );
    }

    #[test]
    fn bcd_encode_decode_inverse() {
        for centi in [0, 1, 99, 185_000, 999_999] {
            let frame = encode_bcd_frame(centi, 3).unwrap();
            assert_eq!(decode_bcd_frame(&frame), Ok(centi));
        }
        // 7 digits do not fit in 3 BCD bytes
        assert!(encode_bcd_frame(1_000_000, 3).is_none());
    }

    #[test]
    fn reversed_text_basic() {
        // "1850.25" on the wire arrives as "52.0581"
        assert_eq!(decode_reversed_text(b"52.0581"), Ok(185_025));
    }

    #[test]
    fn reversed_text_round_trip() {
        for centi in [0, 5, 100, 185_025, -4200] {
            let payload = encode_reversed_text(centi);
            assert_eq!(decode_reversed_text(&payload), Ok(centi));
        }
    }

    #[test]
    fn text_parse_failures_are_typed() {
        assert!(matches!(
            decode_reversed_text(b"x5.1"),
            Err(FrameError::BadLiteral(_))
        ));
        assert_eq!(decode_reversed_text(b""), Err(FrameError::Empty));
    }

    #[test]
    fn parse_rounds_half_away_from_zero() {
        assert_eq!(parse_decimal_centi("1.005"), Ok(101));
        assert_eq!(parse_decimal_centi("-1.005"), Ok(-101));
        assert_eq!(parse_decimal_centi("1.004"), Ok(100));
    }
}
