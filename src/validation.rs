use regex::Regex;
use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use thiserror::Error;

/// The expected shape of a command's standard output
#[derive(Clone, Debug)]
pub enum ValidationRule {
    ExactMatch(String),
    RegexMatch(Regex),
    AddressFormat,
    DirectiveLines,
    PositiveNumber,
}

/// Why an output did not have the expected shape
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("expected {expected:?}, got {got:?}")]
    OutputMismatch { expected: String, got: String },
    #[error("could not obtain a valid IP, got {got:?}")]
    InvalidAddress { got: String },
    #[error("line {line_number} is not safe to evaluate in a shell: {line:?}")]
    MalformedDirective { line_number: usize, line: String },
    #[error("expected a number greater than zero, got {got:?}")]
    NotPositive { got: String },
}

impl ValidationRule {
    pub fn exact<S>(expected: S) -> ValidationRule
    where
        S: Into<String>,
    {
        Self::ExactMatch(expected.into())
    }

    pub fn regex(pattern: &str) -> Result<ValidationRule, regex::Error> {
        Ok(Self::RegexMatch(Regex::new(pattern)?))
    }

    pub fn check(&self, output: &str) -> Result<(), Mismatch> {
        let got = trim_output(output);

        match self {
            Self::ExactMatch(expected) => {
                if got == expected {
                    Ok(())
                } else {
                    Err(Mismatch::OutputMismatch {
                        expected: expected.clone(),
                        got: got.to_owned(),
                    })
                }
            }
            Self::RegexMatch(regex) => {
                if regex.is_match(got) {
                    Ok(())
                } else {
                    Err(Mismatch::OutputMismatch {
                        expected: format!("match for /{}/", regex.as_str()),
                        got: got.to_owned(),
                    })
                }
            }
            Self::AddressFormat => parse_address(got).map(|_| ()),
            Self::DirectiveLines => check_directive_lines(got),
            Self::PositiveNumber => match got.parse::<u64>() {
                Ok(n) if n > 0 => Ok(()),
                _ => Err(Mismatch::NotPositive {
                    got: got.to_owned(),
                }),
            },
        }
    }
}

impl Display for ValidationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactMatch(expected) => write!(f, "exactly {:?}", expected),
            Self::RegexMatch(regex) => write!(f, "matching /{}/", regex.as_str()),
            Self::AddressFormat => write!(f, "an IPv4 address"),
            Self::DirectiveLines => write!(f, "shell-evaluable directive lines"),
            Self::PositiveNumber => write!(f, "a number greater than zero"),
        }
    }
}

/// Remove the trailing newline (and any other trailing whitespace)
pub fn trim_output(output: &str) -> &str {
    output.trim_end()
}

/// Parse a dotted quad
///
/// Zero-padded octets such as `192.168.042.010` are accepted, unlike
/// `Ipv4Addr::from_str`.
pub fn parse_address(output: &str) -> Result<Ipv4Addr, Mismatch> {
    let invalid = || Mismatch::InvalidAddress {
        got: output.to_owned(),
    };

    let octets = output
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse::<u8>().map_err(|_err| invalid())
        })
        .collect::<Result<Vec<_>, _>>()?;

    match octets.as_slice() {
        [a, b, c, d] => Ok(Ipv4Addr::new(*a, *b, *c, *d)),
        _ => Err(invalid()),
    }
}

fn directive_regex() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| {
        Regex::new(r"^(#.*|export [A-Za-z_]+=.*|\s*)$").expect("directive pattern is valid")
    })
}

/// Comment, `export NAME=value` assignment or blank
pub fn is_directive_line(line: &str) -> bool {
    directive_regex().is_match(line)
}

pub fn check_directive_lines(output: &str) -> Result<(), Mismatch> {
    for (i, line) in output.lines().enumerate() {
        if !is_directive_line(line) {
            return Err(Mismatch::MalformedDirective {
                line_number: i + 1,
                line: line.to_owned(),
            });
        }
    }

    Ok(())
}
