//! Fixed-width identifiers of the lock ledger.
//!
//! Both types travel as lowercase hex strings (TOML config, snapshot
//! index, blob keys); an optional `0x` prefix is accepted when parsing.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Seconds in one day; lock ticks are derived from it.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Parse exactly `N` bytes of hex.
fn parse_fixed<const N: usize>(s: &str, what: &str) -> Result<[u8; N]> {
    let raw = hex::decode(s.strip_prefix("0x").unwrap_or(s))?;
    if raw.len() != N {
        bail!("{}: expected {} bytes, got {}", what, N, raw.len());
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&raw);
    Ok(out)
}

/// Display / Debug / FromStr / serde-as-hex for a byte-array newtype.
macro_rules! hex_newtype {
    ($name:ident, $len:expr) => {
        impl $name {
            pub fn from_bytes(b: [u8; $len]) -> Self {
                $name(b)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_fixed::<$len>(s, stringify!($name)).map($name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Participant / revenue / burn-sink address (20 bytes).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

hex_newtype!(Address, 20);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// First 20 bytes of a digest, used for composite merge keys.
    pub fn from_digest(h: &Hash) -> Self {
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&h.0[..20]);
        Address(arr)
    }
}

/// SHA3-512 digest: block hashes and cache blob ids.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(pub [u8; 64]);

hex_newtype!(Hash, 64);

impl Hash {
    pub fn zero() -> Self {
        Hash([0u8; 64])
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::zero()
    }
}
