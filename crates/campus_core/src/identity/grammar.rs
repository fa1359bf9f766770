//! Field-width grammar for student email local parts.
//!
//! The layout `program[2] year[2] branch[3] filler?[1] section[1] roll[*]`
//! lives in [`STUDENT_LOCAL_PART`]; format revisions change the table, not the
//! decoder.

/// Named field produced by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Program,
    AdmissionYear,
    Branch,
    Section,
    RollNumber,
}

impl Field {
    const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            Self::Program => 0,
            Self::AdmissionYear => 1,
            Self::Branch => 2,
            Self::Section => 3,
            Self::RollNumber => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::AdmissionYear => "admission_year",
            Self::Branch => "branch",
            Self::Section => "section",
            Self::RollNumber => "roll_number",
        }
    }
}

/// One step of the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Exactly `width` characters.
    Fixed { field: Field, width: usize },
    /// Skips one character when it is an ASCII digit; consumes nothing otherwise.
    OptionalDigit,
    /// Everything left, possibly empty.
    Rest { field: Field },
}

/// Student email local-part layout.
pub const STUDENT_LOCAL_PART: &[Segment] = &[
    Segment::Fixed {
        field: Field::Program,
        width: 2,
    },
    Segment::Fixed {
        field: Field::AdmissionYear,
        width: 2,
    },
    Segment::Fixed {
        field: Field::Branch,
        width: 3,
    },
    Segment::OptionalDigit,
    Segment::Fixed {
        field: Field::Section,
        width: 1,
    },
    Segment::Rest {
        field: Field::RollNumber,
    },
];

/// Decoder failure before any field semantics are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Input is shorter than the sum of fixed widths.
    TooShort { len: usize, min: usize },
    /// A fixed field starts or ends past the input after optional skips.
    OutOfBounds(Field),
}

/// Field slices captured by [`decode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodedFields<'a> {
    values: [Option<&'a str>; Field::COUNT],
}

impl<'a> DecodedFields<'a> {
    pub fn get(&self, field: Field) -> Option<&'a str> {
        self.values[field.index()]
    }

    fn set(&mut self, field: Field, value: &'a str) {
        self.values[field.index()] = Some(value);
    }
}

/// Minimum input length accepted by `grammar`.
pub fn min_len(grammar: &[Segment]) -> usize {
    grammar
        .iter()
        .map(|segment| match segment {
            Segment::Fixed { width, .. } => *width,
            Segment::OptionalDigit | Segment::Rest { .. } => 0,
        })
        .sum()
}

/// Walks `grammar` over an ASCII `input`.
///
/// Callers must reject non-ASCII input first; positions are byte offsets.
pub fn decode<'a>(grammar: &[Segment], input: &'a str) -> Result<DecodedFields<'a>, DecodeError> {
    let min = min_len(grammar);
    if input.len() < min {
        return Err(DecodeError::TooShort {
            len: input.len(),
            min,
        });
    }

    let bytes = input.as_bytes();
    let mut cursor = 0usize;
    let mut fields = DecodedFields::default();

    for segment in grammar {
        match *segment {
            Segment::Fixed { field, width } => {
                let end = cursor + width;
                let value = input
                    .get(cursor..end)
                    .ok_or(DecodeError::OutOfBounds(field))?;
                fields.set(field, value);
                cursor = end;
            }
            Segment::OptionalDigit => {
                if bytes.get(cursor).is_some_and(u8::is_ascii_digit) {
                    cursor += 1;
                }
            }
            Segment::Rest { field } => {
                fields.set(field, input.get(cursor..).unwrap_or_default());
                cursor = input.len();
            }
        }
    }

    Ok(fields)
}
