//! Encryption of spool files at rest.
//!
//! Only stream ciphers (or block ciphers in a streaming mode) are supported:
//! the spool writer encrypts chunk by chunk as bytes arrive, and the reader
//! decrypts sequentially from offset 0 after every reset.
//!
//! Key material is generated per coordinator, kept in memory only, and wiped
//! on drop. Losing it makes the spool file unreadable.

use std::io::{Read, Write};

use aes::{Aes128, Aes256};
use chacha20::ChaCha20;
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use rand::RngCore;
use streamcache_common::{Error, Result};
use zeroize::Zeroizing;

/// A supported spool encryption transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpoolCipher {
    /// `AES/CTR/NoPadding`: AES-128 in counter mode.
    Aes128Ctr,
    /// `AES-256/CTR/NoPadding`: AES-256 in counter mode.
    Aes256Ctr,
    /// `ChaCha20`: the ChaCha20 stream cipher (IETF variant, 96-bit nonce).
    ChaCha20,
}

impl SpoolCipher {
    /// Resolves a transformation name (case-insensitive).
    ///
    /// Block modes that need padding (e.g. `AES/CBC/PKCS5Padding`) are rejected,
    /// since spool files are written and read as streams.
    pub fn from_name(name: &str) -> Result<SpoolCipher> {
        match name.trim().to_ascii_uppercase().as_str() {
            "AES/CTR/NOPADDING" | "AES-128/CTR/NOPADDING" => Ok(SpoolCipher::Aes128Ctr),
            "AES-256/CTR/NOPADDING" => Ok(SpoolCipher::Aes256Ctr),
            "CHACHA20" => Ok(SpoolCipher::ChaCha20),
            _ => Err(Error::configuration(
                "spoolCipher",
                format!("invalid cipher name '{name}', expected a streaming cipher"),
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SpoolCipher::Aes128Ctr => "AES/CTR/NoPadding",
            SpoolCipher::Aes256Ctr => "AES-256/CTR/NoPadding",
            SpoolCipher::ChaCha20 => "ChaCha20",
        }
    }

    fn key_len(self) -> usize {
        match self {
            SpoolCipher::Aes128Ctr => 16,
            SpoolCipher::Aes256Ctr | SpoolCipher::ChaCha20 => 32,
        }
    }

    fn iv_len(self) -> usize {
        match self {
            SpoolCipher::Aes128Ctr | SpoolCipher::Aes256Ctr => 16,
            SpoolCipher::ChaCha20 => 12,
        }
    }
}

impl std::str::FromStr for SpoolCipher {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SpoolCipher::from_name(s)
    }
}

impl std::fmt::Display for SpoolCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Key and IV of one spool file.
///
/// Shared only between the coordinator that wrote the file and the views it
/// produced. Never serialized.
#[derive(Clone)]
pub struct EncryptionContext {
    cipher: SpoolCipher,
    key: Zeroizing<Vec<u8>>,
    iv: Vec<u8>,
}

impl EncryptionContext {
    /// Generates fresh random key material for `cipher`.
    pub fn generate(cipher: SpoolCipher) -> EncryptionContext {
        let mut rng = rand::rng();
        let mut key = Zeroizing::new(vec![0u8; cipher.key_len()]);
        rng.fill_bytes(&mut key);
        let mut iv = vec![0u8; cipher.iv_len()];
        rng.fill_bytes(&mut iv);
        EncryptionContext { cipher, key, iv }
    }

    pub fn cipher(&self) -> SpoolCipher {
        self.cipher
    }

    /// Creates a keystream positioned at the start of the spool file.
    pub fn keystream(&self) -> Keystream {
        let key = self.key.as_slice();
        let iv = self.iv.as_slice();
        match self.cipher {
            SpoolCipher::Aes128Ctr => {
                Keystream::Aes128Ctr(Ctr128BE::<Aes128>::new(key.into(), iv.into()))
            }
            SpoolCipher::Aes256Ctr => {
                Keystream::Aes256Ctr(Ctr128BE::<Aes256>::new(key.into(), iv.into()))
            }
            SpoolCipher::ChaCha20 => Keystream::ChaCha20(ChaCha20::new(key.into(), iv.into())),
        }
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("cipher", &self.cipher)
            .finish_non_exhaustive()
    }
}

/// A positioned keystream. Encryption and decryption are the same operation.
pub enum Keystream {
    Aes128Ctr(Ctr128BE<Aes128>),
    Aes256Ctr(Ctr128BE<Aes256>),
    ChaCha20(ChaCha20),
}

impl Keystream {
    /// Applies the keystream to `buf` in place.
    ///
    /// Fails, leaving `buf` untouched, once the cipher's block counter would
    /// run past its end (256 GiB for ChaCha20).
    pub fn apply(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        let result = match self {
            Keystream::Aes128Ctr(c) => c.try_apply_keystream(buf),
            Keystream::Aes256Ctr(c) => c.try_apply_keystream(buf),
            Keystream::ChaCha20(c) => c.try_apply_keystream(buf),
        };
        result.map_err(|_| std::io::Error::other("spool cipher keystream exhausted"))
    }
}

/// Encrypts everything written through it.
pub struct CipherWriter<W> {
    inner: W,
    keystream: Keystream,
    scratch: Vec<u8>,
}

impl<W: Write> CipherWriter<W> {
    pub fn new(inner: W, context: &EncryptionContext) -> CipherWriter<W> {
        CipherWriter {
            inner,
            keystream: context.keystream(),
            scratch: Vec::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CipherWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.scratch.clear();
        self.scratch.extend_from_slice(buf);
        self.keystream.apply(&mut self.scratch)?;
        self.inner.write_all(&self.scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Decrypts everything read through it.
pub struct CipherReader<R> {
    inner: R,
    keystream: Keystream,
}

impl<R: Read> CipherReader<R> {
    pub fn new(inner: R, context: &EncryptionContext) -> CipherReader<R> {
        CipherReader {
            inner,
            keystream: context.keystream(),
        }
    }
}

impl<R: Read> Read for CipherReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.keystream.apply(&mut buf[..n])?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use super::{CipherReader, CipherWriter, EncryptionContext, Keystream, SpoolCipher};

    #[test]
    fn test_cipher_names() {
        assert_eq!(
            SpoolCipher::from_name("aes/ctr/nopadding").unwrap(),
            SpoolCipher::Aes128Ctr
        );
        assert_eq!(
            "ChaCha20".parse::<SpoolCipher>().unwrap(),
            SpoolCipher::ChaCha20
        );
        assert_eq!(
            SpoolCipher::from_name(SpoolCipher::Aes256Ctr.name()).unwrap(),
            SpoolCipher::Aes256Ctr
        );
        assert!(SpoolCipher::from_name("RC2").unwrap_err().is_configuration());
    }

    #[test]
    fn test_encrypt_decrypt_in_chunks() {
        let plain = b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".repeat(10);
        for cipher in [
            SpoolCipher::Aes128Ctr,
            SpoolCipher::Aes256Ctr,
            SpoolCipher::ChaCha20,
        ] {
            let context = EncryptionContext::generate(cipher);
            let mut writer = CipherWriter::new(Vec::new(), &context);
            for chunk in plain.chunks(7) {
                writer.write_all(chunk).unwrap();
            }
            let encrypted = writer.into_inner();
            assert_eq!(encrypted.len(), plain.len());
            assert!(!encrypted.windows(3).any(|w| w == b"aaa"));

            let mut reader = CipherReader::new(encrypted.as_slice(), &context);
            let mut decrypted = Vec::new();
            let mut buf = [0u8; 5];
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                decrypted.extend_from_slice(&buf[..n]);
            }
            assert_eq!(decrypted, plain);
        }
    }

    #[test]
    fn test_contexts_do_not_share_keys() {
        let plain = [0u8; 64];
        let a = EncryptionContext::generate(SpoolCipher::Aes128Ctr);
        let b = EncryptionContext::generate(SpoolCipher::Aes128Ctr);
        let mut out_a = plain;
        let mut out_b = plain;
        a.keystream().apply(&mut out_a).unwrap();
        b.keystream().apply(&mut out_b).unwrap();
        assert_ne!(out_a, out_b);
    }

    #[test]
    fn test_exhausted_keystream_is_an_error() {
        use chacha20::ChaCha20;
        use ctr::cipher::{KeyIvInit, StreamCipherSeek};

        let mut cipher = ChaCha20::new((&[7u8; 32]).into(), (&[9u8; 12]).into());
        cipher.seek((u32::MAX as u64 - 1) * 64);
        let mut writer = CipherWriter {
            inner: Vec::new(),
            keystream: Keystream::ChaCha20(cipher),
            scratch: Vec::new(),
        };
        let e = writer.write(&[0u8; 4096]).unwrap_err();
        assert_eq!(e.kind(), std::io::ErrorKind::Other);
        assert!(streamcache_common::Error::io("spool write", e).is_io());
        assert!(writer.into_inner().is_empty());
    }
}
