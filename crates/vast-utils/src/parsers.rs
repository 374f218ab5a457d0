use crate::errors::{ParseError, Result, UtilsError};
use std::collections::BTreeMap;

/// Trait for parsing different types of commands/inputs
pub trait Parser<T> {
    type Output;

    fn parse(&self, input: &str) -> Result<Self::Output>;
}

/// Docker-style environment string parser.
///
/// Accepts `-e KEY=VALUE`, bare `KEY=VALUE` and `-p HOST:CONTAINER` port
/// mappings. Port mappings are kept as keys of the form `-p 8080:8080` with
/// the value `"1"`, which is how the backend expects them.
pub struct EnvParser;

impl Parser<String> for EnvParser {
    type Output = BTreeMap<String, String>;

    fn parse(&self, input: &str) -> Result<Self::Output> {
        let mut env = BTreeMap::new();
        let mut words = input.split_whitespace();

        while let Some(word) = words.next() {
            match word {
                "-e" => {
                    let pair = words.next().ok_or_else(|| {
                        ParseError::MissingField("KEY=VALUE after -e".to_string())
                    })?;
                    let (key, value) = split_pair(pair)?;
                    env.insert(key, value);
                }
                "-p" => {
                    let mapping = words.next().ok_or_else(|| {
                        ParseError::MissingField("port mapping after -p".to_string())
                    })?;
                    env.insert(format!("-p {}", mapping), "1".to_string());
                }
                pair => {
                    let (key, value) = split_pair(pair)?;
                    env.insert(key, value);
                }
            }
        }

        Ok(env)
    }
}

fn split_pair(pair: &str) -> Result<(String, String)> {
    match pair.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(UtilsError::Parse(ParseError::InvalidFormat(format!(
            "expected KEY=VALUE, got {:?}",
            pair
        )))),
    }
}

/// Parse ids separated by commas and/or whitespace, e.g. `"1,2 3"`.
pub fn parse_id_list(input: &str) -> Result<Vec<u64>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                UtilsError::Parse(ParseError::InvalidValue(format!("not an id: {:?}", part)))
            })
        })
        .collect()
}

// Convenience function
pub fn parse_env(input: &str) -> Result<BTreeMap<String, String>> {
    EnvParser.parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parsing() {
        let env = parse_env("-e A=1 -p 8080:8080 B=2").unwrap();

        assert_eq!(env.len(), 3);
        assert_eq!(env["A"], "1");
        assert_eq!(env["-p 8080:8080"], "1");
        assert_eq!(env["B"], "2");
    }

    #[test]
    fn test_env_value_may_contain_equals() {
        let env = parse_env("-e OPTS=a=b").unwrap();
        assert_eq!(env["OPTS"], "a=b");
    }

    #[test]
    fn test_env_errors() {
        assert!(parse_env("-e").is_err());
        assert!(parse_env("-p").is_err());
        assert!(parse_env("NOVALUE").is_err());
        assert!(parse_env("=x").is_err());
        assert!(parse_env("").unwrap().is_empty());
    }

    #[test]
    fn test_id_list() {
        assert_eq!(parse_id_list("1,2 3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_id_list(" 42 ,, ").unwrap(), vec![42]);
        assert!(parse_id_list("1,abc").is_err());
    }
}
