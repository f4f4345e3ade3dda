use sha2::Digest;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

const HASH_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashKind {
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(format!(
                "unsupported checksum type `{raw}`; expected one of md5, sha1, sha224, sha256, sha384, sha512"
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("checksum is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("{kind} checksum must be {expected} bytes, got {actual}")]
    WrongLength {
        kind: HashKind,
        expected: usize,
        actual: usize,
    },
}

/// Expected digest of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    kind: HashKind,
    digest: Vec<u8>,
}

impl Checksum {
    pub fn from_hex(kind: HashKind, raw: &str) -> Result<Self, ChecksumError> {
        let digest = hex::decode(raw.trim())?;
        if digest.len() != kind.digest_len() {
            return Err(ChecksumError::WrongLength {
                kind,
                expected: kind.digest_len(),
                actual: digest.len(),
            });
        }
        Ok(Self { kind, digest })
    }

    pub fn kind(&self) -> HashKind {
        self.kind
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Hashes `path` and compares it to the expected digest. `Ok(None)` means
    /// the file matches; `Ok(Some(actual))` carries the mismatching digest.
    pub fn check_file(&self, path: &Path) -> std::io::Result<Option<String>> {
        let actual = digest_file(self.kind, path)?;
        if actual == self.digest {
            Ok(None)
        } else {
            Ok(Some(hex::encode(actual)))
        }
    }
}

pub fn digest_file(kind: HashKind, path: &Path) -> std::io::Result<Vec<u8>> {
    let reader = BufReader::new(File::open(path)?);
    match kind {
        HashKind::Md5 => digest_reader::<md5::Md5>(reader),
        HashKind::Sha1 => digest_reader::<sha1::Sha1>(reader),
        HashKind::Sha224 => digest_reader::<sha2::Sha224>(reader),
        HashKind::Sha256 => digest_reader::<sha2::Sha256>(reader),
        HashKind::Sha384 => digest_reader::<sha2::Sha384>(reader),
        HashKind::Sha512 => digest_reader::<sha2::Sha512>(reader),
    }
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<Vec<u8>> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn known_digests_of_small_file() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("abc.txt");
        fs::write(&path, b"abc").expect("write");

        assert_eq!(
            hex::encode(digest_file(HashKind::Md5, &path).expect("md5")),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            hex::encode(digest_file(HashKind::Sha1, &path).expect("sha1")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex::encode(digest_file(HashKind::Sha256, &path).expect("sha256")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn check_file_reports_actual_digest_on_mismatch() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("abc.txt");
        fs::write(&path, b"abc").expect("write");

        let good = Checksum::from_hex(HashKind::Md5, "900150983CD24FB0D6963F7D28E17F72")
            .expect("uppercase hex");
        assert_eq!(good.check_file(&path).expect("check"), None);

        let bad = Checksum::from_hex(HashKind::Md5, &"00".repeat(16)).expect("zero digest");
        assert_eq!(
            bad.check_file(&path).expect("check").as_deref(),
            Some("900150983cd24fb0d6963f7d28e17f72")
        );
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert!(matches!(
            Checksum::from_hex(HashKind::Sha256, "xyz"),
            Err(ChecksumError::InvalidHex(_))
        ));
        assert!(matches!(
            Checksum::from_hex(HashKind::Sha256, "abcd"),
            Err(ChecksumError::WrongLength {
                expected: 32,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn hash_kind_parses_common_spellings() {
        assert_eq!("SHA-256".parse::<HashKind>(), Ok(HashKind::Sha256));
        assert_eq!("md5".parse::<HashKind>(), Ok(HashKind::Md5));
        assert!("crc32".parse::<HashKind>().is_err());
    }
}
