//! Recursive length prefix encoding, enough to serialize legacy transactions.

pub fn bytes(b: &[u8]) -> Vec<u8> {
    if b.len() == 1 && b[0] < 0x80 {
        return vec![b[0]];
    }
    let mut out = length_prefix(b.len(), 0x80);
    out.extend_from_slice(b);
    out
}

/// Integers are minimal big-endian strings; zero encodes as the empty string.
pub fn uint(v: u128) -> Vec<u8> {
    bytes(trim_leading_zeros(&v.to_be_bytes()))
}

/// `items` must already be encoded.
pub fn list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload = items.concat();
    let mut out = length_prefix(payload.len(), 0xc0);
    out.extend_from_slice(&payload);
    out
}

pub fn trim_leading_zeros(b: &[u8]) -> &[u8] {
    let first = b.iter().position(|&x| x != 0).unwrap_or(b.len());
    &b[first..]
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = (len as u64).to_be_bytes();
        let len_bytes = trim_leading_zeros(&len_bytes);
        let mut out = vec![offset + 55 + len_bytes.len() as u8];
        out.extend_from_slice(len_bytes);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings() {
        assert_eq!(bytes(b"dog"), vec![0x83, b'd', b'o', b'g']);
        assert_eq!(bytes(b""), vec![0x80]);
        assert_eq!(bytes(&[0x0f]), vec![0x0f]);
        assert_eq!(bytes(&[0x80]), vec![0x81, 0x80]);

        let long = b"Lorem ipsum dolor sit amet, consectetur adipisicing elit";
        let encoded = bytes(long);
        assert_eq!(&encoded[..2], &[0xb8, 0x38]);
        assert_eq!(&encoded[2..], &long[..]);
    }

    #[test]
    fn test_integers() {
        assert_eq!(uint(0), vec![0x80]);
        assert_eq!(uint(15), vec![0x0f]);
        assert_eq!(uint(1024), vec![0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_lists() {
        assert_eq!(list(&[]), vec![0xc0]);
        assert_eq!(
            list(&[bytes(b"cat"), bytes(b"dog")]),
            vec![0xc8, 0x83, b'c', b'a', b't', 0x83, b'd', b'o', b'g']
        );
        // [ [], [[]], [ [], [[]] ] ]
        let empty = list(&[]);
        let one = list(&[empty.clone()]);
        let two = list(&[empty.clone(), one.clone()]);
        assert_eq!(
            list(&[empty, one, two]),
            vec![0xc7, 0xc0, 0xc1, 0xc0, 0xc3, 0xc0, 0xc1, 0xc0]
        );
    }
}
