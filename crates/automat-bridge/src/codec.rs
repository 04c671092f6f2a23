//! Value codec
//!
//! Bidirectional conversion between tagged wire values and host dynamic
//! objects. The host is string-centric: on decode every numeric,
//! string, date, currency and identifier tag is normalized to a string
//! representation; the single exception is boolean, which maps to the
//! host true/false singletons and never travels the string path.

use crate::array_codec;
use automat_core::error::{BridgeError, BridgeResult};
use automat_core::host::HostValue;
use automat_core::tag::Tag;
use automat_core::value::WireValue;

/// An encoded wire value plus its disposal obligation.
///
/// `owned` is false when the value was produced by a typed wrapper's
/// direct-encode path: ownership stays with the wrapper and the caller
/// must not clear the value on its behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// The produced wire value.
    pub value: WireValue,
    /// Whether disposal of the value is the caller's responsibility.
    pub owned: bool,
}

impl Encoded {
    fn owned(value: WireValue) -> Self {
        Encoded { value, owned: true }
    }

    fn borrowed(value: WireValue) -> Self {
        Encoded {
            value,
            owned: false,
        }
    }
}

/// Convert a wire value to a host object.
///
/// Object-reference tags yield a proxy when a dispatchable view can be
/// obtained and the host nil sentinel otherwise — never an error.
/// Structural tags fail with the offending tag's name.
pub fn decode(value: &WireValue) -> BridgeResult<HostValue> {
    let decoded = match value {
        // The empty and null sentinels normalize to the host empty
        // string.
        WireValue::Empty | WireValue::Null => HostValue::Str(String::new()),
        WireValue::Error(code) => HostValue::Str(code.to_string()),
        WireValue::Bool(b) => HostValue::Bool(*b),
        WireValue::I1(v) => HostValue::Str(v.to_string()),
        WireValue::I2(v) => HostValue::Str(v.to_string()),
        WireValue::I4(v) => HostValue::Str(v.to_string()),
        WireValue::I8(v) => HostValue::Str(v.to_string()),
        WireValue::U1(v) => HostValue::Str(v.to_string()),
        WireValue::R4(v) => HostValue::Str(format_float(*v as f64)),
        WireValue::R8(v) => HostValue::Str(format_float(*v)),
        WireValue::Currency(v) => HostValue::Str(format_currency(*v)),
        WireValue::Date(v) => HostValue::Str(format_float(*v)),
        WireValue::Str(s) => HostValue::Str(s.clone()),
        WireValue::Dispatch(Some(r)) => HostValue::Proxy(r.clone()),
        WireValue::Dispatch(None) => HostValue::Nil,
        WireValue::Unknown(Some(u)) => match u.query_dispatch() {
            Some(dispatch) => HostValue::Proxy(dispatch),
            None => HostValue::Nil,
        },
        WireValue::Unknown(None) => HostValue::Nil,
        WireValue::Array(a) => HostValue::Array(array_codec::decode_array(a)?),
        WireValue::Opaque(tag) => {
            return Err(BridgeError::Conversion { tag: tag.name() })
        }
    };
    Ok(decoded)
}

/// Convert a host object to a wire value aimed at `target`.
///
/// The typed-wrapper override hook runs first; a wrapper's explicit tag
/// supersedes `target`. With no target (or a pass-through target) the
/// host value is probed as boolean, whole number, then double before
/// falling back to string. An explicit boolean target accepts only the
/// host true/false singletons; anything else fails naming `argument`
/// (1-based).
pub fn encode(host: &HostValue, target: Option<Tag>, argument: usize) -> BridgeResult<Encoded> {
    if let HostValue::Wrapped(wrapper) = host {
        // Wrapper-declared sentinels and nil object references encode
        // directly; ownership stays with the wrapper.
        match wrapper.target {
            Some(Tag::Null) => return Ok(Encoded::borrowed(WireValue::Null)),
            Some(Tag::Empty) => return Ok(Encoded::borrowed(WireValue::Empty)),
            Some(Tag::Dispatch) if wrapper.value.is_nil() => {
                return Ok(Encoded::borrowed(WireValue::Dispatch(None)))
            }
            Some(Tag::Unknown) if wrapper.value.is_nil() => {
                return Ok(Encoded::borrowed(WireValue::Unknown(None)))
            }
            _ => {}
        }
        let mut encoded = encode(&wrapper.value, wrapper.target.or(target), argument)?;
        if wrapper.keep_ownership {
            encoded.owned = false;
        }
        return Ok(encoded);
    }

    if let HostValue::Proxy(r) = host {
        // The wrapper retains the reference; the local handle is
        // released after hand-off.
        return Ok(Encoded::owned(WireValue::Dispatch(Some(r.clone()))));
    }
    if let HostValue::Array(a) = host {
        return Ok(Encoded::owned(array_codec::encode_array(a)?));
    }

    match target {
        None | Some(Tag::Variant) => Ok(Encoded::owned(probe(host))),
        Some(Tag::Bool) => match host.truth() {
            Some(b) => Ok(Encoded::owned(WireValue::Bool(b))),
            // Silent 0/1-to-boolean coercion is rejected here on
            // purpose; the argument position makes the failure
            // diagnosable.
            None => Err(BridgeError::ConversionAt {
                tag: Tag::Bool.name(),
                argument,
            }),
        },
        Some(Tag::R8) => match host.as_float() {
            Some(v) => Ok(Encoded::owned(WireValue::R8(v))),
            None => Ok(Encoded::owned(string_path(host, Tag::R8))),
        },
        Some(Tag::R4) => match host.as_float() {
            Some(v) => Ok(Encoded::owned(WireValue::R4(v as f32))),
            None => Ok(Encoded::owned(string_path(host, Tag::R4))),
        },
        Some(tag) => Ok(Encoded::owned(string_path(host, tag))),
    }
}

/// The no-target probe: boolean, whole number, double, then string.
fn probe(host: &HostValue) -> WireValue {
    if host.is_nil() {
        return WireValue::Empty;
    }
    if let Some(b) = host.truth() {
        return WireValue::Bool(b);
    }
    if let Some(v) = host.as_int() {
        return match i32::try_from(v) {
            Ok(v) => WireValue::I4(v),
            Err(_) => WireValue::I8(v),
        };
    }
    if let Some(v) = host.as_float() {
        return WireValue::R8(v);
    }
    WireValue::Str(host.stringify())
}

/// The generic string conversion path: stringify the host value and ask
/// the type system to coerce the string to the target tag, keeping the
/// raw string when the coercion is rejected.
fn string_path(host: &HostValue, tag: Tag) -> WireValue {
    let s = host.stringify();
    coerce_str(&s, tag).unwrap_or(WireValue::Str(s))
}

/// Coerce a string to a wire value of the given tag. `None` means the
/// string has no representation under that tag.
pub fn coerce_str(s: &str, tag: Tag) -> Option<WireValue> {
    let trimmed = s.trim();
    match tag {
        Tag::Empty => Some(WireValue::Empty),
        Tag::Null => Some(WireValue::Null),
        Tag::I1 => trimmed.parse::<i8>().ok().map(WireValue::I1),
        Tag::I2 => trimmed.parse::<i16>().ok().map(WireValue::I2),
        Tag::I4 => trimmed.parse::<i32>().ok().map(WireValue::I4),
        Tag::I8 => trimmed.parse::<i64>().ok().map(WireValue::I8),
        Tag::U1 => trimmed.parse::<u8>().ok().map(WireValue::U1),
        Tag::R4 => trimmed.parse::<f32>().ok().map(WireValue::R4),
        Tag::R8 => trimmed.parse::<f64>().ok().map(WireValue::R8),
        Tag::Date => trimmed.parse::<f64>().ok().map(WireValue::Date),
        Tag::Error => trimmed.parse::<u32>().ok().map(WireValue::Error),
        Tag::Currency => parse_currency(trimmed).map(WireValue::Currency),
        Tag::Str => Some(WireValue::Str(s.to_string())),
        _ => None,
    }
}

/// Format a double. The decimal separator is always `.` regardless of
/// the process locale.
pub fn format_float(value: f64) -> String {
    let mut s = value.to_string();
    if let Some(at) = s.find(',') {
        s.replace_range(at..at + 1, ".");
    }
    s
}

/// Format a fixed-point currency amount (scaled by 10^4) as a decimal
/// string, trimming trailing fraction zeros.
fn format_currency(scaled: i64) -> String {
    let sign = if scaled < 0 { "-" } else { "" };
    let magnitude = scaled.unsigned_abs();
    let whole = magnitude / 10_000;
    let fraction = magnitude % 10_000;
    if fraction == 0 {
        return format!("{sign}{whole}");
    }
    let mut fraction = format!("{fraction:04}");
    while fraction.ends_with('0') {
        fraction.pop();
    }
    format!("{sign}{whole}.{fraction}")
}

/// Parse a decimal currency string into its 10^4-scaled representation.
fn parse_currency(s: &str) -> Option<i64> {
    let (sign, body) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, fraction) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > 4 || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().ok()?
    };
    let mut scale = String::from(fraction);
    while scale.len() < 4 {
        scale.push('0');
    }
    let fraction: i64 = scale.parse().ok()?;
    whole
        .checked_mul(10_000)
        .and_then(|w| w.checked_add(fraction))
        .map(|v| sign * v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use automat_core::error::ForeignFailure;
    use automat_core::foreign::{ForeignDispatch, ForeignUnknown, InvokeRequest};
    use automat_core::host::TypedWrapper;
    use std::sync::Arc;

    struct DummyDispatch;

    impl ForeignDispatch for DummyDispatch {
        fn member_id(&self, _name: &str) -> Result<i32, ForeignFailure> {
            Err(ForeignFailure::MemberNotFound)
        }

        fn invoke(
            &self,
            _request: InvokeRequest<'_>,
        ) -> Result<Option<WireValue>, ForeignFailure> {
            Ok(None)
        }
    }

    struct PlainUnknown {
        dispatchable: bool,
    }

    impl ForeignUnknown for PlainUnknown {
        fn query_dispatch(&self) -> Option<automat_core::foreign::ForeignRef> {
            if self.dispatchable {
                Some(Arc::new(DummyDispatch))
            } else {
                None
            }
        }
    }

    #[test]
    fn test_decode_numerics_to_strings() {
        assert_eq!(decode(&WireValue::I2(-7)).unwrap(), HostValue::str("-7"));
        assert_eq!(
            decode(&WireValue::I4(i32::MAX)).unwrap(),
            HostValue::str("2147483647")
        );
        assert_eq!(decode(&WireValue::U1(255)).unwrap(), HostValue::str("255"));
        assert_eq!(decode(&WireValue::R8(2.5)).unwrap(), HostValue::str("2.5"));
        assert_eq!(decode(&WireValue::R8(3.0)).unwrap(), HostValue::str("3"));
        assert_eq!(
            decode(&WireValue::Error(0x8000_0001)).unwrap(),
            HostValue::str("2147483649")
        );
    }

    #[test]
    fn test_decode_sentinels_normalize_to_empty_string() {
        assert_eq!(decode(&WireValue::Empty).unwrap(), HostValue::str(""));
        assert_eq!(decode(&WireValue::Null).unwrap(), HostValue::str(""));
    }

    #[test]
    fn test_decode_boolean_yields_singletons() {
        assert_eq!(decode(&WireValue::Bool(true)).unwrap(), HostValue::Bool(true));
        assert_eq!(
            decode(&WireValue::Bool(false)).unwrap(),
            HostValue::Bool(false)
        );
    }

    #[test]
    fn test_decode_currency() {
        assert_eq!(
            decode(&WireValue::Currency(12_345)).unwrap(),
            HostValue::str("1.2345")
        );
        assert_eq!(
            decode(&WireValue::Currency(-5_000)).unwrap(),
            HostValue::str("-0.5")
        );
        assert_eq!(
            decode(&WireValue::Currency(70_000)).unwrap(),
            HostValue::str("7")
        );
    }

    #[test]
    fn test_decode_object_flavors() {
        let dispatch: automat_core::foreign::ForeignRef = Arc::new(DummyDispatch);
        let decoded = decode(&WireValue::Dispatch(Some(dispatch.clone()))).unwrap();
        match decoded {
            HostValue::Proxy(p) => assert!(Arc::ptr_eq(&p, &dispatch)),
            other => panic!("expected proxy, got {other:?}"),
        }
        assert_eq!(decode(&WireValue::Dispatch(None)).unwrap(), HostValue::Nil);

        let plain: automat_core::foreign::UnknownRef =
            Arc::new(PlainUnknown { dispatchable: true });
        assert!(matches!(
            decode(&WireValue::Unknown(Some(plain))).unwrap(),
            HostValue::Proxy(_)
        ));
        let opaque: automat_core::foreign::UnknownRef =
            Arc::new(PlainUnknown { dispatchable: false });
        // A reference with no dispatchable view decodes to nil, not an
        // error.
        assert_eq!(decode(&WireValue::Unknown(Some(opaque))).unwrap(), HostValue::Nil);
    }

    #[test]
    fn test_decode_structural_tags_fail_with_name() {
        for tag in [Tag::Blob, Tag::Storage, Tag::Ptr, Tag::CArray, Tag::UserDefined] {
            match decode(&WireValue::Opaque(tag)) {
                Err(BridgeError::Conversion { tag: name }) => assert_eq!(name, tag.name()),
                other => panic!("expected conversion failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_scalar_round_trips() {
        let cases = [
            ("0", Tag::I4),
            ("1", Tag::I4),
            ("-1", Tag::I4),
            ("2147483647", Tag::I4),
            ("-32768", Tag::I2),
            ("255", Tag::U1),
            ("9223372036854775807", Tag::I8),
            ("2.5", Tag::R8),
            ("", Tag::Str),
            ("typical string", Tag::Str),
            ("1.2345", Tag::Currency),
        ];
        for (text, tag) in cases {
            let host = HostValue::str(text);
            let encoded = encode(&host, Some(tag), 1).unwrap();
            assert_eq!(encoded.value.tag(), tag, "tag for {text:?}");
            assert_eq!(decode(&encoded.value).unwrap(), host, "round trip {text:?}");
        }
        // Booleans round-trip through the singleton path.
        for b in [true, false] {
            let encoded = encode(&HostValue::Bool(b), Some(Tag::Bool), 1).unwrap();
            assert_eq!(decode(&encoded.value).unwrap(), HostValue::Bool(b));
        }
    }

    #[test]
    fn test_encode_probe_order() {
        assert_eq!(
            encode(&HostValue::Bool(true), None, 1).unwrap().value,
            WireValue::Bool(true)
        );
        assert_eq!(
            encode(&HostValue::str("42"), None, 1).unwrap().value,
            WireValue::I4(42)
        );
        assert_eq!(
            encode(&HostValue::str("5000000000"), None, 1).unwrap().value,
            WireValue::I8(5_000_000_000)
        );
        assert_eq!(
            encode(&HostValue::str("2.5"), None, 1).unwrap().value,
            WireValue::R8(2.5)
        );
        assert_eq!(
            encode(&HostValue::str("abc"), None, 1).unwrap().value,
            WireValue::Str("abc".to_string())
        );
        assert_eq!(
            encode(&HostValue::Nil, None, 1).unwrap().value,
            WireValue::Empty
        );
    }

    #[test]
    fn test_encode_boolean_target_is_strict() {
        let err = encode(&HostValue::str("1"), Some(Tag::Bool), 3).unwrap_err();
        match err {
            BridgeError::ConversionAt { tag, argument } => {
                assert_eq!(tag, "BOOL");
                assert_eq!(argument, 3);
            }
            other => panic!("expected positional conversion failure, got {other:?}"),
        }
        assert!(encode(&HostValue::Nil, Some(Tag::Bool), 1).is_err());
        assert_eq!(
            encode(&HostValue::Bool(false), Some(Tag::Bool), 1)
                .unwrap()
                .value,
            WireValue::Bool(false)
        );
    }

    #[test]
    fn test_encode_float_target_falls_back_to_string() {
        assert_eq!(
            encode(&HostValue::str("2.5"), Some(Tag::R8), 1).unwrap().value,
            WireValue::R8(2.5)
        );
        assert_eq!(
            encode(&HostValue::str("wide open"), Some(Tag::R8), 1)
                .unwrap()
                .value,
            WireValue::Str("wide open".to_string())
        );
    }

    #[test]
    fn test_encode_rejected_coercion_keeps_raw_string() {
        assert_eq!(
            encode(&HostValue::str("not a number"), Some(Tag::I4), 1)
                .unwrap()
                .value,
            WireValue::Str("not a number".to_string())
        );
    }

    #[test]
    fn test_wrapper_overrides_target() {
        let wrapped = HostValue::Wrapped(Box::new(TypedWrapper::new(
            HostValue::str("7"),
            Tag::I2,
        )));
        // The declared I4 target loses to the wrapper's I2.
        assert_eq!(
            encode(&wrapped, Some(Tag::I4), 1).unwrap().value,
            WireValue::I2(7)
        );
    }

    #[test]
    fn test_wrapper_direct_encode_keeps_ownership() {
        let null = HostValue::Wrapped(Box::new(TypedWrapper::new(HostValue::Nil, Tag::Null)));
        let encoded = encode(&null, None, 1).unwrap();
        assert_eq!(encoded.value, WireValue::Null);
        assert!(!encoded.owned);

        let nil_obj =
            HostValue::Wrapped(Box::new(TypedWrapper::new(HostValue::Nil, Tag::Dispatch)));
        let encoded = encode(&nil_obj, None, 1).unwrap();
        assert_eq!(encoded.value, WireValue::Dispatch(None));
        assert!(!encoded.owned);

        // A non-nil wrapped value under an object tag takes the normal
        // path and is caller-owned.
        let dispatch: automat_core::foreign::ForeignRef = Arc::new(DummyDispatch);
        let live = HostValue::Wrapped(Box::new(TypedWrapper::new(
            HostValue::Proxy(dispatch),
            Tag::Dispatch,
        )));
        assert!(encode(&live, None, 1).unwrap().owned);
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!(parse_currency("1.2345"), Some(12_345));
        assert_eq!(parse_currency("-0.5"), Some(-5_000));
        assert_eq!(parse_currency("7"), Some(70_000));
        assert_eq!(parse_currency("+2.00"), Some(20_000));
        assert_eq!(parse_currency("1.23456"), None);
        assert_eq!(parse_currency("abc"), None);
        assert_eq!(parse_currency(""), None);
    }
}
