//! Request models for the line protocol
//!
//! Parses one text line into a typed command.

use crate::cache::MAX_KEY_LENGTH;
use crate::error::{CacheError, Result};

const GET_USAGE: &str = "GET <key> [-f]";
const SET_USAGE: &str = "SET <key> <value> [-e <seconds>] [-f]";
const DEL_USAGE: &str = "DEL <key> [-f]";
const STATS_USAGE: &str = "STATS [-f]";
const PING_USAGE: &str = "PING";

/// A parsed client command.
///
/// `frequent_access` selects the sync cache instead of the main one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get {
        key: String,
        frequent_access: bool,
    },
    Set {
        key: String,
        value: String,
        /// Seconds until expiration, `None` means the server default
        expires_in: Option<u64>,
        frequent_access: bool,
    },
    Delete {
        key: String,
        frequent_access: bool,
    },
    Stats {
        frequent_access: bool,
    },
    Ping,
}

// Positional arguments and options pulled out of a command line
struct Tokens<'a> {
    args: Vec<&'a str>,
    frequent_access: bool,
    expires_in: Option<&'a str>,
}

impl Request {
    /// Parses `line` as `<COMMAND> [args...] [options...]`.
    ///
    /// Command names are case-insensitive and options may appear anywhere
    /// after the command name.
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| CacheError::InvalidCommand(String::new()))?
            .to_ascii_uppercase();
        let rest: Vec<&str> = words.collect();

        match name.as_str() {
            "GET" => {
                let tokens = tokenize("GET", GET_USAGE, &rest)?;
                reject_expiration("GET", GET_USAGE, &tokens)?;
                let [key] = exact::<1>("GET", GET_USAGE, &tokens)?;
                Ok(Request::Get {
                    key: validate_key("GET", GET_USAGE, key)?,
                    frequent_access: tokens.frequent_access,
                })
            }
            "SET" => {
                let tokens = tokenize("SET", SET_USAGE, &rest)?;
                let [key, value] = exact::<2>("SET", SET_USAGE, &tokens)?;
                let expires_in = tokens
                    .expires_in
                    .map(|raw| parse_seconds("SET", SET_USAGE, raw))
                    .transpose()?;
                Ok(Request::Set {
                    key: validate_key("SET", SET_USAGE, key)?,
                    value: value.to_string(),
                    expires_in,
                    frequent_access: tokens.frequent_access,
                })
            }
            "DEL" => {
                let tokens = tokenize("DEL", DEL_USAGE, &rest)?;
                reject_expiration("DEL", DEL_USAGE, &tokens)?;
                let [key] = exact::<1>("DEL", DEL_USAGE, &tokens)?;
                Ok(Request::Delete {
                    key: validate_key("DEL", DEL_USAGE, key)?,
                    frequent_access: tokens.frequent_access,
                })
            }
            "STATS" => {
                let tokens = tokenize("STATS", STATS_USAGE, &rest)?;
                reject_expiration("STATS", STATS_USAGE, &tokens)?;
                exact::<0>("STATS", STATS_USAGE, &tokens)?;
                Ok(Request::Stats {
                    frequent_access: tokens.frequent_access,
                })
            }
            "PING" => {
                if !rest.is_empty() {
                    return Err(usage("PING", PING_USAGE));
                }
                Ok(Request::Ping)
            }
            _ => Err(CacheError::InvalidCommand(name)),
        }
    }
}

fn usage(command: &'static str, usage: &'static str) -> CacheError {
    CacheError::InvalidUsage { command, usage }
}

fn tokenize<'a>(command: &'static str, usage_text: &'static str, words: &[&'a str]) -> Result<Tokens<'a>> {
    let mut tokens = Tokens {
        args: Vec::new(),
        frequent_access: false,
        expires_in: None,
    };

    let mut words = words.iter();
    while let Some(&word) = words.next() {
        match word {
            "-f" | "--frequent-access" => tokens.frequent_access = true,
            "-e" | "--expires-in" => {
                let value = *words.next().ok_or_else(|| usage(command, usage_text))?;
                tokens.expires_in = Some(value);
            }
            _ => tokens.args.push(word),
        }
    }
    Ok(tokens)
}

fn reject_expiration(command: &'static str, usage_text: &'static str, tokens: &Tokens<'_>) -> Result<()> {
    match tokens.expires_in {
        Some(_) => Err(usage(command, usage_text)),
        None => Ok(()),
    }
}

fn exact<'a, const N: usize>(
    command: &'static str,
    usage_text: &'static str,
    tokens: &Tokens<'a>,
) -> Result<[&'a str; N]> {
    <[&str; N]>::try_from(tokens.args.as_slice()).map_err(|_| usage(command, usage_text))
}

fn validate_key(command: &'static str, usage_text: &'static str, key: &str) -> Result<String> {
    if key.len() > MAX_KEY_LENGTH {
        return Err(usage(command, usage_text));
    }
    Ok(key.to_string())
}

fn parse_seconds(command: &'static str, usage_text: &'static str, raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(usage(command, usage_text)),
    }
}
