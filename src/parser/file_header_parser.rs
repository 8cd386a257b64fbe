use crate::errors::HprofHistoError;
use crate::errors::HprofHistoError::{InvalidIdSize, UnsupportedFormat};
use crate::parser::primitive_parsers::{parse_c_string, parse_u32, parse_u64};
use nom::IResult;
use nom::Parser;
use nom::combinator::map;

const SUPPORTED_FORMATS: [&str; 2] = ["JAVA PROFILE 1.0.1", "JAVA PROFILE 1.0.2"];

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FileHeader {
    pub format: String,
    pub size_pointers: u32,
    pub timestamp: u64,
}

impl FileHeader {
    fn from_bytes(format_b: &[u8], size_pointers: u32, timestamp: u64) -> Self {
        Self {
            format: String::from_utf8_lossy(format_b).to_string(),
            size_pointers,
            timestamp,
        }
    }

    pub fn validate(self) -> Result<Self, HprofHistoError> {
        if !SUPPORTED_FORMATS.contains(&self.format.as_str()) {
            return Err(UnsupportedFormat {
                format: self.format,
            });
        }
        if self.size_pointers != 4 && self.size_pointers != 8 {
            return Err(InvalidIdSize {
                id_size: self.size_pointers,
            });
        }
        Ok(self)
    }
}

pub fn parse_file_header(i: &[u8]) -> IResult<&[u8], FileHeader> {
    map(
        (parse_c_string, parse_u32, parse_u64),
        |(format, size_pointers, timestamp)| {
            FileHeader::from_bytes(format, size_pointers, timestamp)
        },
    )
    .parse(i)
}
