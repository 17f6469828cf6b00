//! Algorand BIP-44 Derivation Paths
//!
//! Parses and formats `m/44'/283'/{account}'/{change}/{key_index}` paths:
//! - Purpose, coin type and account must be hardened
//! - Change and key index must be soft

use std::fmt;
use thiserror::Error;

use crate::crypto::port::{ALGORAND_COIN_TYPE, BIP44_PURPOSE, HARDENED};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("path must start with 'm'")]
    MissingRoot,
    #[error("invalid path component: {0}")]
    InvalidComponent(String),
    #[error("expected 5 components, got {0}")]
    WrongDepth(usize),
    #[error("component {position} must be {expected}")]
    WrongHardening { position: usize, expected: &'static str },
    #[error("expected {expected} at position {position}, got {actual}")]
    UnexpectedValue { position: usize, expected: u32, actual: u32 },
    #[error("index {0} is outside the 31-bit index space")]
    IndexOutOfRange(u32),
}

/// Single component of a derivation path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationComponent {
    pub index: u32,
    pub hardened: bool,
}

impl DerivationComponent {
    pub fn new(index: u32, hardened: bool) -> Self {
        Self { index, hardened }
    }

    /// Get the full index including hardened bit
    pub fn full_index(&self) -> u32 {
        if self.hardened {
            self.index | HARDENED
        } else {
            self.index
        }
    }
}

impl fmt::Display for DerivationComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// Parsed Algorand address path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivationPath {
    pub account: u32,
    pub change: u32,
    pub key_index: u32,
}

impl DerivationPath {
    /// Each index must fit in 31 bits; the top bit is the hardening flag
    pub fn new(account: u32, change: u32, key_index: u32) -> Result<Self, PathError> {
        if let Some(&index) = [account, change, key_index].iter().find(|&&index| index >= HARDENED) {
            return Err(PathError::IndexOutOfRange(index));
        }
        Ok(Self { account, change, key_index })
    }

    pub fn components(&self) -> [DerivationComponent; 5] {
        [
            DerivationComponent::new(BIP44_PURPOSE, true),
            DerivationComponent::new(ALGORAND_COIN_TYPE, true),
            DerivationComponent::new(self.account, true),
            DerivationComponent::new(self.change, false),
            DerivationComponent::new(self.key_index, false),
        ]
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for component in self.components() {
            write!(f, "/{}", component)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DerivationPath {
    type Err = PathError;

    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let components = parse_components(path)?;
        if components.len() != 5 {
            return Err(PathError::WrongDepth(components.len()));
        }

        for (position, component) in components.iter().enumerate() {
            let should_harden = position < 3;
            if component.hardened != should_harden {
                return Err(PathError::WrongHardening {
                    position,
                    expected: if should_harden { "hardened" } else { "soft" },
                });
            }
        }

        for (position, expected) in [(0, BIP44_PURPOSE), (1, ALGORAND_COIN_TYPE)] {
            if components[position].index != expected {
                return Err(PathError::UnexpectedValue {
                    position,
                    expected,
                    actual: components[position].index,
                });
            }
        }

        Self::new(components[2].index, components[3].index, components[4].index)
    }
}

fn parse_components(path: &str) -> Result<Vec<DerivationComponent>, PathError> {
    let mut parts = path.trim().split('/');
    match parts.next() {
        Some("m") | Some("M") => {}
        _ => return Err(PathError::MissingRoot),
    }

    parts.map(parse_component).collect()
}

fn parse_component(part: &str) -> Result<DerivationComponent, PathError> {
    let (digits, hardened) = match part.strip_suffix('\'').or_else(|| part.strip_suffix('h')) {
        Some(digits) => (digits, true),
        None => (part, false),
    };

    let index: u32 = digits
        .parse()
        .map_err(|_| PathError::InvalidComponent(part.to_string()))?;
    if index >= HARDENED {
        return Err(PathError::InvalidComponent(part.to_string()));
    }

    Ok(DerivationComponent::new(index, hardened))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(DerivationPath::new(0, 0, 0).unwrap().to_string(), "m/44'/283'/0'/0/0");
        assert_eq!(DerivationPath::new(6, 0, 2).unwrap().to_string(), "m/44'/283'/6'/0/2");
    }

    #[test]
    fn test_indices_must_fit_31_bits() {
        assert_eq!(DerivationPath::new(HARDENED, 0, 0), Err(PathError::IndexOutOfRange(HARDENED)));
        assert_eq!(DerivationPath::new(0, HARDENED + 1, 0), Err(PathError::IndexOutOfRange(HARDENED + 1)));
        assert_eq!(DerivationPath::new(0, 0, u32::MAX), Err(PathError::IndexOutOfRange(u32::MAX)));
        assert!(DerivationPath::new(HARDENED - 1, 0, HARDENED - 1).is_ok());
    }

    #[test]
    fn test_parse() {
        let path: DerivationPath = "m/44'/283'/3'/0/9".parse().unwrap();
        assert_eq!(path, DerivationPath::new(3, 0, 9).unwrap());

        let h_notation: DerivationPath = "m/44h/283h/1h/0/0".parse().unwrap();
        assert_eq!(h_notation.account, 1);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("44'/283'".parse::<DerivationPath>(), Err(PathError::MissingRoot));
        assert_eq!(
            "m/44'/283'/0'".parse::<DerivationPath>(),
            Err(PathError::WrongDepth(3))
        );
        assert_eq!(
            "m/44'/60'/0'/0/0".parse::<DerivationPath>(),
            Err(PathError::UnexpectedValue { position: 1, expected: 283, actual: 60 })
        );
        assert!(matches!(
            "m/44'/283'/0/0/0".parse::<DerivationPath>(),
            Err(PathError::WrongHardening { position: 2, .. })
        ));
        assert!(matches!(
            "m/44'/283'/x'/0/0".parse::<DerivationPath>(),
            Err(PathError::InvalidComponent(_))
        ));
    }

    #[test]
    fn test_full_index() {
        let components = DerivationPath::new(2, 0, 5).unwrap().components();
        assert_eq!(components[2].full_index(), HARDENED + 2);
        assert_eq!(components[4].full_index(), 5);
    }
}
