//! Particle type names and numbers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of particle types carried in snapshot headers.
pub const NUM_PART_TYPES: usize = 6;

/// A particle type, `0..=5`, stored on disk as the `PartType{N}` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartType(u8);

impl PartType {
    pub const GAS: PartType = PartType(0);
    pub const DM: PartType = PartType(1);
    pub const TRACERS: PartType = PartType(3);
    pub const STARS: PartType = PartType(4);
    pub const BLACK_HOLES: PartType = PartType(5);

    pub fn new(num: usize) -> Result<PartType> {
        if num >= NUM_PART_TYPES {
            return Err(Error::InvalidArgument(format!(
                "particle type number {num} out of range 0..{NUM_PART_TYPES}"
            )));
        }
        Ok(PartType(num as u8))
    }

    /// Column of this type in per-type tables such as `SubhaloLenType`.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn group_name(self) -> String {
        format!("PartType{}", self.0)
    }
}

impl FromStr for PartType {
    type Err = Error;

    fn from_str(s: &str) -> Result<PartType> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let num = s
                .parse::<usize>()
                .map_err(|_| Error::InvalidArgument(format!("unknown particle type [{s}]")))?;
            return PartType::new(num);
        }
        match s.to_ascii_lowercase().as_str() {
            "gas" | "cells" => Ok(PartType::GAS),
            "dm" | "darkmatter" => Ok(PartType::DM),
            "tracer" | "tracers" | "tracermc" | "trmc" => Ok(PartType::TRACERS),
            "star" | "stars" | "stellar" | "wind" => Ok(PartType::STARS),
            "bh" | "bhs" | "blackhole" | "blackholes" => Ok(PartType::BLACK_HOLES),
            _ => Err(Error::InvalidArgument(format!("unknown particle type [{s}]"))),
        }
    }
}

impl TryFrom<String> for PartType {
    type Error = Error;

    fn try_from(s: String) -> Result<PartType> {
        s.parse()
    }
}

impl From<PartType> for String {
    fn from(p: PartType) -> String {
        p.0.to_string()
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
