//! Endpoint ID decoding
//!
//! An endpoint ID is a two-element array of scheme code and scheme-specific
//! part. The decoder derives a canonical URI rendering; unknown schemes keep
//! a placeholder rendering plus a diagnostic so the block remains usable.

use std::fmt;

use bpscan_cbor::{ChunkError, Cursor, Diagnostics, ErrorKind, Limits, MajorType, Result};

use crate::field::reskip;

/// Scheme code for `dtn` endpoint IDs.
pub const EID_SCHEME_DTN: u64 = 1;
/// Scheme code for `ipn` endpoint IDs.
pub const EID_SCHEME_IPN: u64 = 2;

const CATEGORY: &str = "eid";

/// One decoded endpoint ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Eid {
    /// Declared scheme code.
    pub scheme: u64,
    /// Canonical URI rendering.
    pub uri: String,
}

impl Eid {
    /// The null endpoint, `dtn:none`.
    pub fn none() -> Self {
        Self {
            scheme: EID_SCHEME_DTN,
            uri: "dtn:none".to_string(),
        }
    }

    /// Whether this is the null endpoint.
    pub fn is_none(&self) -> bool {
        self.scheme == EID_SCHEME_DTN && self.uri == "dtn:none"
    }
}

impl fmt::Display for Eid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Decode one endpoint ID, resynchronizing past the item on failure.
pub fn decode_eid(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<Option<Eid>> {
    let start = cursor.position();
    let mut outer = cursor.read_chunk(limits)?;
    if outer.require_array(2, 2).is_none() {
        diags.absorb_chunk(CATEGORY, &outer);
        reskip(cursor, limits, start)?;
        return Ok(None);
    }

    let scheme_start = cursor.position();
    let mut scheme_chunk = cursor.read_chunk(limits)?;
    let scheme = scheme_chunk.require_uint();
    diags.absorb_chunk(CATEGORY, &scheme_chunk);
    let Some(scheme) = scheme else {
        reskip(cursor, limits, scheme_start)?;
        cursor.skip_item(limits)?;
        return Ok(None);
    };

    match scheme {
        EID_SCHEME_DTN => decode_dtn_ssp(cursor, limits, diags),
        EID_SCHEME_IPN => decode_ipn_ssp(cursor, limits, diags),
        other => {
            diags.warning(
                CATEGORY,
                cursor.position(),
                format!("unknown EID scheme {other}"),
            );
            cursor.skip_item(limits)?;
            Ok(Some(Eid {
                scheme: other,
                uri: format!("<scheme {other}>"),
            }))
        }
    }
}

fn decode_dtn_ssp(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<Option<Eid>> {
    let start = cursor.position();
    let mut ssp = cursor.read_chunk(limits)?;
    let eid = if ssp.major == MajorType::UnsignedInt && ssp.argument == 0 {
        Some(Eid::none())
    } else if ssp.major == MajorType::TextString {
        ssp.require_text().map(|text| Eid {
            scheme: EID_SCHEME_DTN,
            uri: format!("dtn:{text}"),
        })
    } else {
        ssp.push_error(ChunkError::with_detail(
            ErrorKind::WrongType,
            "dtn SSP must be the integer 0 or a text string",
        ));
        reskip(cursor, limits, start)?;
        None
    };
    diags.absorb_chunk(CATEGORY, &ssp);
    Ok(eid)
}

fn decode_ipn_ssp(
    cursor: &mut Cursor<'_>,
    limits: &Limits,
    diags: &mut Diagnostics,
) -> Result<Option<Eid>> {
    let start = cursor.position();
    let mut pair = cursor.read_chunk(limits)?;
    if pair.require_array(2, 2).is_none() {
        diags.absorb_chunk(CATEGORY, &pair);
        reskip(cursor, limits, start)?;
        return Ok(None);
    }

    let node = crate::field::read_uint(cursor, limits, CATEGORY, diags)?;
    let service = crate::field::read_uint(cursor, limits, CATEGORY, diags)?;
    Ok(node.zip(service).map(|(node, service)| Eid {
        scheme: EID_SCHEME_IPN,
        uri: format!("ipn:{node}.{service}"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bpscan_cbor::Diagnostics;
    use bpscan_test_utils::CborWriter;

    fn decode(bytes: &[u8]) -> (Option<Eid>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let mut cursor = Cursor::new(bytes);
        let eid = decode_eid(&mut cursor, &Limits::default(), &mut diags).unwrap();
        assert_eq!(cursor.position(), bytes.len(), "must consume the item");
        (eid, diags)
    }

    #[test]
    fn test_dtn_none() {
        let mut w = CborWriter::new();
        w.array(2).uint(1).uint(0);
        let (eid, diags) = decode(w.as_slice());
        let eid = eid.unwrap();
        assert_eq!(eid.uri, "dtn:none");
        assert!(eid.is_none());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_dtn_text() {
        let mut w = CborWriter::new();
        w.array(2).uint(1).text("//node/svc");
        let (eid, diags) = decode(w.as_slice());
        assert_eq!(eid.unwrap().uri, "dtn://node/svc");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_ipn() {
        let mut w = CborWriter::new();
        w.array(2).uint(2).array(2).uint(977).uint(3);
        let (eid, diags) = decode(w.as_slice());
        assert_eq!(eid.unwrap().uri, "ipn:977.3");
        assert!(diags.is_empty());
    }

    #[test]
    fn test_unknown_scheme_keeps_placeholder() {
        let mut w = CborWriter::new();
        w.array(2).uint(99).array(3).uint(1).uint(2).uint(3);
        let (eid, diags) = decode(w.as_slice());
        let eid = eid.unwrap();
        assert_eq!(eid.scheme, 99);
        assert_eq!(eid.uri, "<scheme 99>");
        assert!(!diags.is_empty());
    }

    #[test]
    fn test_wrong_ssp_type_resynchronizes() {
        let mut w = CborWriter::new();
        w.array(2).uint(1).array(1).uint(5);
        let (eid, diags) = decode(w.as_slice());
        assert!(eid.is_none());
        assert!(diags.error_count() >= 1);
    }

    #[test]
    fn test_non_array_eid() {
        let mut w = CborWriter::new();
        w.uint(42);
        let (eid, diags) = decode(w.as_slice());
        assert!(eid.is_none());
        assert_eq!(diags.error_count(), 1);
    }
}
