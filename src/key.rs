//! Key encoding.
//!
//! Every key type maps to a byte string the backend stores and scans by.
//! Byte-like keys (`String`, `Vec<u8>`) are stored as-is; any other type
//! implements [`Key`] itself, and must do so deterministically: logically
//! equal keys have to produce identical bytes, otherwise lookups and prefix
//! scans silently diverge.
//!
//! Prefix decorators join a namespace and a key on their encoded form and
//! decode the result back into a key. Encodings that are not closed under
//! byte concatenation (fixed-width integers, length-tagged formats) cannot be
//! namespaced that way; this is a property of the encoding and is not
//! checked at runtime.

use crate::error::{CodecError, Error, Result};

/// A type that can serve as a store key.
pub trait Key: Sized {
    fn to_key_bytes(&self) -> Result<Vec<u8>>;

    fn from_key_bytes(bytes: &[u8]) -> Result<Self>;
}

/// Byte-like types whose representation is their storage form.
pub trait Bytes: Sized {
    fn raw(&self) -> &[u8];

    fn from_raw(bytes: Vec<u8>) -> Result<Self>;
}

impl Bytes for Vec<u8> {
    fn raw(&self) -> &[u8] {
        self
    }

    fn from_raw(bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes)
    }
}

impl Bytes for String {
    fn raw(&self) -> &[u8] {
        self.as_bytes()
    }

    fn from_raw(bytes: Vec<u8>) -> Result<Self> {
        String::from_utf8(bytes).map_err(|e| Error::Decode(CodecError::Utf8(e)))
    }
}

macro_rules! bytes_key {
    ($($t:ty),*) => {
        $(
            impl Key for $t {
                fn to_key_bytes(&self) -> Result<Vec<u8>> {
                    Ok(self.raw().to_vec())
                }

                fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
                    <$t as Bytes>::from_raw(bytes.to_vec())
                }
            }
        )*
    };
}

bytes_key!(String, Vec<u8>);

// Big-endian so that byte order is numeric order.
macro_rules! unsigned_key {
    ($($t:ty),*) => {
        $(
            impl Key for $t {
                fn to_key_bytes(&self) -> Result<Vec<u8>> {
                    Ok(self.to_be_bytes().to_vec())
                }

                fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
                    let arr = fixed_width(bytes)?;
                    Ok(<$t>::from_be_bytes(arr))
                }
            }
        )*
    };
}

unsigned_key!(u16, u32, u64);

impl Key for i64 {
    fn to_key_bytes(&self) -> Result<Vec<u8>> {
        Ok(((*self as u64) ^ (1 << 63)).to_be_bytes().to_vec())
    }

    fn from_key_bytes(bytes: &[u8]) -> Result<Self> {
        let arr = fixed_width(bytes)?;
        Ok((u64::from_be_bytes(arr) ^ (1 << 63)) as i64)
    }
}

fn fixed_width<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    <[u8; N]>::try_from(bytes).map_err(|_| {
        Error::Decode(CodecError::Length {
            expected: N,
            actual: bytes.len(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_are_identity() {
        let k = "users/42".to_string();
        assert_eq!(k.to_key_bytes().unwrap(), b"users/42".to_vec());
        assert_eq!(String::from_key_bytes(b"users/42").unwrap(), k);
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let err = String::from_key_bytes(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, Error::Decode(CodecError::Utf8(_))));
    }

    #[test]
    fn integer_keys_sort_numerically() {
        let mut values = vec![i64::MIN, -300, -1, 0, 1, 276, 34, i64::MAX];
        let mut encoded: Vec<Vec<u8>> = values.iter().map(|v| v.to_key_bytes().unwrap()).collect();
        values.sort();
        encoded.sort();
        let decoded: Vec<i64> = encoded
            .iter()
            .map(|b| i64::from_key_bytes(b).unwrap())
            .collect();
        assert_eq!(decoded, values);

        let a = 34u64.to_key_bytes().unwrap();
        let b = 276u64.to_key_bytes().unwrap();
        assert!(a < b);
        assert!(0u64.to_key_bytes().unwrap() < u64::MAX.to_key_bytes().unwrap());
    }

    #[test]
    fn wrong_width_is_rejected() {
        let err = u32::from_key_bytes(&[0, 1, 2]).unwrap_err();
        match err {
            Error::Decode(CodecError::Length { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
