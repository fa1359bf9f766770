//! Student email parser.
//!
//! # Invariants
//! - `parse_at` is a pure function of its inputs and the parser config.
//! - `section` is always one uppercase ASCII letter on success.
//! - `academic_year` always lies inside the configured window.

use crate::config::ParserConfig;
use crate::identity::grammar::{decode, DecodeError, Field, STUDENT_LOCAL_PART};
use crate::identity::tables::CodeTables;
use crate::model::identity::AcademicIdentity;
use chrono::{Datelike, Local};
use log::debug;
use once_cell::sync::Lazy;
use std::error::Error;
use std::fmt::{Display, Formatter};

static DEFAULT_PARSER: Lazy<IdentityParser> = Lazy::new(IdentityParser::default);

/// Why an email was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidFormatReason {
    /// Domain after `@` is not the institutional domain.
    ForeignDomain,
    /// Missing `@`, empty local part, or more than one `@`.
    MalformedAddress,
    /// Local part contains non-ASCII characters.
    NonAsciiLocalPart,
    /// Local part is shorter than the mandatory fields.
    TooShort { len: usize, min: usize },
    /// A field position falls outside the local part.
    FieldOutOfBounds(Field),
    /// Admission year code is not two decimal digits.
    NonNumericYear(String),
    /// Section position holds something other than a letter.
    SectionNotLetter(char),
}

impl InvalidFormatReason {
    /// Stable short code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ForeignDomain => "foreign_domain",
            Self::MalformedAddress => "malformed_address",
            Self::NonAsciiLocalPart => "non_ascii_local_part",
            Self::TooShort { .. } => "too_short",
            Self::FieldOutOfBounds(_) => "field_out_of_bounds",
            Self::NonNumericYear(_) => "non_numeric_year",
            Self::SectionNotLetter(_) => "section_not_letter",
        }
    }
}

impl Display for InvalidFormatReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignDomain => write!(f, "email is not an institutional student address"),
            Self::MalformedAddress => write!(f, "email address is malformed"),
            Self::NonAsciiLocalPart => write!(f, "local part must be ASCII"),
            Self::TooShort { len, min } => {
                write!(f, "local part has {len} characters, expected at least {min}")
            }
            Self::FieldOutOfBounds(field) => {
                write!(f, "{} falls outside the local part", field.as_str())
            }
            Self::NonNumericYear(code) => {
                write!(f, "admission year code `{code}` is not numeric")
            }
            Self::SectionNotLetter(ch) => write!(f, "section `{ch}` is not a letter"),
        }
    }
}

/// Identity parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityParseError {
    InvalidFormat(InvalidFormatReason),
}

impl IdentityParseError {
    pub fn reason(&self) -> &InvalidFormatReason {
        match self {
            Self::InvalidFormat(reason) => reason,
        }
    }
}

impl Display for IdentityParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat(reason) => write!(f, "invalid student email format: {reason}"),
        }
    }
}

impl Error for IdentityParseError {}

impl From<InvalidFormatReason> for IdentityParseError {
    fn from(value: InvalidFormatReason) -> Self {
        Self::InvalidFormat(value)
    }
}

impl From<DecodeError> for InvalidFormatReason {
    fn from(value: DecodeError) -> Self {
        match value {
            DecodeError::TooShort { len, min } => Self::TooShort { len, min },
            DecodeError::OutOfBounds(field) => Self::FieldOutOfBounds(field),
        }
    }
}

/// Decoder for institutional student emails.
#[derive(Debug, Clone)]
pub struct IdentityParser {
    config: ParserConfig,
    tables: CodeTables,
    domain: String,
}

impl Default for IdentityParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl IdentityParser {
    /// Builds a parser; lookup tables are merged once here.
    ///
    /// `config` is assumed validated (see `ParserConfig::validate`).
    pub fn new(config: ParserConfig) -> Self {
        let tables = CodeTables::with_overrides(&config.extra_programs, &config.extra_branches);
        let domain = config.institutional_domain.trim().to_ascii_lowercase();
        Self {
            config,
            tables,
            domain,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parses `email` against the current local calendar year.
    pub fn parse(&self, email: &str) -> Result<AcademicIdentity, IdentityParseError> {
        self.parse_at(email, Local::now().year())
    }

    /// Parses `email` as if the calendar year were `current_year`.
    pub fn parse_at(
        &self,
        email: &str,
        current_year: i32,
    ) -> Result<AcademicIdentity, IdentityParseError> {
        self.decode_identity(email, current_year).map_err(|reason| {
            debug!(
                "event=identity_parse module=identity status=error reason={}",
                reason.code()
            );
            IdentityParseError::InvalidFormat(reason)
        })
    }

    fn decode_identity(
        &self,
        email: &str,
        current_year: i32,
    ) -> Result<AcademicIdentity, InvalidFormatReason> {
        let local = self.local_part(email)?.to_ascii_lowercase();
        let fields = decode(STUDENT_LOCAL_PART, local.as_str())?;
        let field = |name: Field| {
            fields
                .get(name)
                .ok_or(InvalidFormatReason::FieldOutOfBounds(name))
        };

        let program_code = field(Field::Program)?;
        let admission_year_code = field(Field::AdmissionYear)?;
        let branch_code = field(Field::Branch)?;
        let section_raw = field(Field::Section)?;
        let roll_number = field(Field::RollNumber)?;

        let year_offset = parse_year_code(admission_year_code)?;
        let section = parse_section(section_raw)?;

        let class_name = self
            .tables
            .program_label(program_code)
            .unwrap_or(self.config.default_class_label.as_str())
            .to_string();
        let branch = self
            .tables
            .branch_label(branch_code)
            .map(str::to_string)
            .unwrap_or_else(|| branch_code.to_ascii_uppercase());

        let admission_year = self.config.century_base.saturating_add(year_offset);
        let academic_year = self.academic_year(admission_year, current_year);

        Ok(AcademicIdentity {
            program_code: program_code.to_string(),
            class_name,
            branch_code: branch_code.to_string(),
            branch,
            admission_year_code: admission_year_code.to_string(),
            admission_year,
            academic_year,
            section,
            roll_number: roll_number.to_string(),
        })
    }

    fn local_part<'a>(&self, email: &'a str) -> Result<&'a str, InvalidFormatReason> {
        let (local, domain) = email
            .trim()
            .rsplit_once('@')
            .ok_or(InvalidFormatReason::MalformedAddress)?;
        if !domain.eq_ignore_ascii_case(self.domain.as_str()) {
            return Err(InvalidFormatReason::ForeignDomain);
        }
        if local.is_empty() || local.contains('@') {
            return Err(InvalidFormatReason::MalformedAddress);
        }
        if !local.is_ascii() {
            return Err(InvalidFormatReason::NonAsciiLocalPart);
        }
        Ok(local)
    }

    /// `current - admission + 1`, clamped to the configured window.
    fn academic_year(&self, admission_year: i32, current_year: i32) -> u8 {
        let min = self.config.min_academic_year;
        let max = self.config.max_academic_year;
        let raw = current_year
            .saturating_sub(admission_year)
            .saturating_add(1);
        if raw <= i32::from(min) {
            min
        } else if raw >= i32::from(max) {
            max
        } else {
            u8::try_from(raw).unwrap_or(max)
        }
    }
}

fn parse_year_code(code: &str) -> Result<i32, InvalidFormatReason> {
    if code.is_empty() || !code.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(InvalidFormatReason::NonNumericYear(code.to_string()));
    }
    code.parse::<i32>()
        .map_err(|_| InvalidFormatReason::NonNumericYear(code.to_string()))
}

fn parse_section(raw: &str) -> Result<char, InvalidFormatReason> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) if ch.is_ascii_alphabetic() => Ok(ch.to_ascii_uppercase()),
        (Some(ch), _) => Err(InvalidFormatReason::SectionNotLetter(ch)),
        (None, _) => Err(InvalidFormatReason::FieldOutOfBounds(Field::Section)),
    }
}

/// Parses with the built-in configuration and the current calendar year.
pub fn parse_student_email(email: &str) -> Result<AcademicIdentity, IdentityParseError> {
    DEFAULT_PARSER.parse(email)
}
