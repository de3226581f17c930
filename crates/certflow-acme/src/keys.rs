//! Account key decoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("private key is empty")]
    Empty,

    #[error("invalid base64 private key: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid PEM private key: {0}")]
    Pem(String),
}

/// Decode a stored account key into DER bytes
///
/// Keys are stored base64-encoded; PEM input is accepted as well.
pub fn decode_private_key(stored: &str) -> Result<Vec<u8>, KeyError> {
    let stored = stored.trim();
    if stored.is_empty() {
        return Err(KeyError::Empty);
    }

    if stored.starts_with("-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(stored.as_bytes())
            .map_err(|e| KeyError::Pem(e.to_string()))?;
        if !pem.label.contains("PRIVATE KEY") {
            return Err(KeyError::Pem(format!("unexpected PEM label '{}'", pem.label)));
        }
        return Ok(pem.contents);
    }

    let compact: String = stored.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD.decode(compact)?;
    if der.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(der)
}

/// Encode a DER account key the way keys are stored
pub fn encode_private_key(der: &[u8]) -> String {
    STANDARD.encode(der)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_key() {
        let der = vec![0x30, 0x81, 0x87, 0x02, 0x01, 0x00];
        let stored = encode_private_key(&der);
        assert_eq!(decode_private_key(&stored).unwrap(), der);
    }

    #[test]
    fn test_decode_wrapped_base64_key() {
        let der: Vec<u8> = (0u8..120).collect();
        let encoded = STANDARD.encode(&der);
        let wrapped = format!("{}\n{}", &encoded[..64], &encoded[64..]);
        assert_eq!(decode_private_key(&wrapped).unwrap(), der);
    }

    #[test]
    fn test_decode_pem_key() {
        let key = rcgen::KeyPair::generate().unwrap();
        let der = decode_private_key(&key.serialize_pem()).unwrap();
        assert_eq!(der, key.serialize_der());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_private_key("   "), Err(KeyError::Empty)));
        assert!(matches!(
            decode_private_key("not base64!!"),
            Err(KeyError::Base64(_))
        ));
    }
}
