//! Streamer flags and command-line construction.
//!
//! Flags are given as bare letters (`X`, `U`, ...) and expanded to `-X`.
//! Two letters take a value from dedicated options: `t` (TTL) and `u` (RTP).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::endpoint::{BindTarget, Endpoint};

/// Letters the streamer accepts as pass-through flags.
pub const ALLOWED_FLAGS: &[char] = &[
    'X', 'T', 'f', 'p', 'C', 'P', 's', 'n', 'k', 'd', 'a', 'r', 'O', 'S', 'u', 'U', 'm', 'R', 'w',
];

const TTL_FLAG: char = 't';
const RTP_FLAG: char = 'u';

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FlagError {
    #[error("unknown streamer flag '{0}' (expected one of: X T f p C P s n k d a r O S u U m R w)")]
    Unknown(String),
}

/// A single validated streamer flag letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StreamerFlag(char);

impl StreamerFlag {
    pub fn letter(self) -> char {
        self.0
    }
}

impl FromStr for StreamerFlag {
    type Err = FlagError;

    /// Accepts `X` or `-X`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('-');
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if ALLOWED_FLAGS.contains(&c) => Ok(Self(c)),
            _ => Err(FlagError::Unknown(s.to_string())),
        }
    }
}

impl TryFrom<String> for StreamerFlag {
    type Error = FlagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamerFlag> for String {
    fn from(flag: StreamerFlag) -> Self {
        flag.0.to_string()
    }
}

impl fmt::Display for StreamerFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pass-through flags plus the options that feed valued flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerOptions {
    #[serde(default)]
    pub flags: Vec<StreamerFlag>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub rtp: Option<String>,
}

impl StreamerOptions {
    /// Expand to argument strings.
    ///
    /// Letters keep their given order with duplicates dropped. A TTL adds `t`
    /// and an RTP value adds `u` when they were not listed. A valued letter
    /// becomes two arguments (`-t`, `64`); every other letter becomes `-<letter>`.
    pub fn expand(&self) -> Vec<String> {
        let mut letters: Vec<char> = Vec::with_capacity(self.flags.len() + 2);
        for flag in &self.flags {
            if !letters.contains(&flag.letter()) {
                letters.push(flag.letter());
            }
        }
        if self.ttl.is_some() && !letters.contains(&TTL_FLAG) {
            letters.push(TTL_FLAG);
        }
        if self.rtp.is_some() && !letters.contains(&RTP_FLAG) {
            letters.push(RTP_FLAG);
        }

        let mut args = Vec::with_capacity(letters.len() * 2);
        for letter in letters {
            args.push(format!("-{letter}"));
            match letter {
                TTL_FLAG => args.extend(self.ttl.map(|ttl| ttl.to_string())),
                RTP_FLAG => args.extend(self.rtp.clone()),
                _ => {}
            }
        }
        args
    }
}

/// A fully-built streamer command: program plus argument vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamerInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl StreamerInvocation {
    /// `<program> <flags...> <file> <ip>:<port>[@<bind ip>][:<bind port>]`
    pub fn new(
        program: &str,
        options: &StreamerOptions,
        file: &str,
        connect: Endpoint,
        bind: BindTarget,
    ) -> Self {
        let mut args = options.expand();
        args.push(file.to_string());
        args.push(format!("{connect}{}", bind.suffix()));
        Self {
            program: program.to_string(),
            args,
        }
    }

    /// The destination argument (last in the vector).
    pub fn destination(&self) -> &str {
        self.args.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for StreamerInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn flags(letters: &[&str]) -> Vec<StreamerFlag> {
        letters.iter().map(|l| l.parse().unwrap()).collect()
    }

    #[test]
    fn parses_allowed_letters_with_or_without_dash() {
        assert_eq!("X".parse::<StreamerFlag>().unwrap().letter(), 'X');
        assert_eq!("-U".parse::<StreamerFlag>().unwrap().letter(), 'U');
    }

    #[test]
    fn rejects_unknown_or_multi_letter_flags() {
        for bad in ["z", "XU", "", "-", "t"] {
            assert!(bad.parse::<StreamerFlag>().is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn flag_letters_are_case_sensitive() {
        assert_ne!(
            "p".parse::<StreamerFlag>().unwrap(),
            "P".parse::<StreamerFlag>().unwrap()
        );
    }

    #[test]
    fn expands_plain_flags_in_order() {
        let opts = StreamerOptions {
            flags: flags(&["X", "U", "X"]),
            ..Default::default()
        };
        assert_eq!(opts.expand(), vec!["-X", "-U"]);
    }

    #[test]
    fn ttl_and_rtp_add_valued_flags() {
        let opts = StreamerOptions {
            flags: flags(&["U"]),
            ttl: Some(20),
            rtp: Some("12".into()),
        };
        assert_eq!(opts.expand(), vec!["-U", "-t", "20", "-u", "12"]);
    }

    #[test]
    fn listed_u_takes_rtp_value_in_place() {
        let opts = StreamerOptions {
            flags: flags(&["u", "U"]),
            ttl: None,
            rtp: Some("7".into()),
        };
        assert_eq!(opts.expand(), vec!["-u", "7", "-U"]);
    }

    #[test]
    fn bare_u_without_rtp_is_plain() {
        let opts = StreamerOptions {
            flags: flags(&["u"]),
            ..Default::default()
        };
        assert_eq!(opts.expand(), vec!["-u"]);
    }

    #[test]
    fn builds_full_invocation() {
        let opts = StreamerOptions {
            flags: flags(&["X", "U"]),
            ..Default::default()
        };
        let inv = StreamerInvocation::new(
            "multicat",
            &opts,
            "promo.ts",
            Endpoint::new(Ipv4Addr::new(239, 0, 0, 1), 5001),
            BindTarget {
                ip: Some(Ipv4Addr::new(10, 10, 111, 2)),
                port: None,
            },
        );
        assert_eq!(
            inv.args,
            vec!["-X", "-U", "promo.ts", "239.0.0.1:5001@10.10.111.2"]
        );
        assert_eq!(inv.destination(), "239.0.0.1:5001@10.10.111.2");
        assert_eq!(
            inv.to_string(),
            "multicat -X -U promo.ts 239.0.0.1:5001@10.10.111.2"
        );
    }
}
