//! Parameter fingerprinting for stage staleness detection.
//!
//! A fingerprint is a blake3 digest over the canonical JSON encoding of a
//! stage's effective parameters. serde_json maps are keyed by BTreeMap,
//! so field order in the source struct does not affect the digest.

use serde::Serialize;

/// Compute the fingerprint for a stage's parameter set.
///
/// Serialization failures cannot occur for the plain parameter structs
/// used by the pipeline, but the error is surfaced rather than masked.
pub fn fingerprint_params<T: Serialize>(params: &T) -> Result<String, serde_json::Error> {
    // Round-trip through Value to normalize key order.
    let value = serde_json::to_value(params)?;
    let canonical = serde_json::to_string(&value)?;
    Ok(blake3::hash(canonical.as_bytes()).to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ParamsA {
        interval_sec: f64,
        max_frames: Option<u32>,
    }

    #[derive(Serialize)]
    struct ParamsAReordered {
        max_frames: Option<u32>,
        interval_sec: f64,
    }

    #[test]
    fn test_fingerprint_is_field_order_independent() {
        let a = fingerprint_params(&ParamsA {
            interval_sec: 3.0,
            max_frames: Some(30),
        })
        .unwrap();
        let b = fingerprint_params(&ParamsAReordered {
            max_frames: Some(30),
            interval_sec: 3.0,
        })
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_is_parameter_sensitive() {
        let a = fingerprint_params(&ParamsA {
            interval_sec: 3.0,
            max_frames: None,
        })
        .unwrap();
        let b = fingerprint_params(&ParamsA {
            interval_sec: 5.0,
            max_frames: None,
        })
        .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let p = ParamsA {
            interval_sec: 3.0,
            max_frames: Some(30),
        };
        assert_eq!(
            fingerprint_params(&p).unwrap(),
            fingerprint_params(&p).unwrap()
        );
    }
}
