//! PDF date strings (ISO 32000-1 §7.9.4): `D:YYYYMMDDHHmmSSOHH'mm'`. Parsing
//! and formatting go through `jiff`, the teacher's primary date dependency;
//! every field past the year is optional and defaults per the spec (month/day
//! to 1, hour/minute/second to 0, no explicit offset meaning local/unknown
//! time, recorded here as UTC).

use jiff::civil::DateTime;
use jiff::tz::{Offset, TimeZone};
use jiff::Zoned;

use crate::error::{Error, ParseError};
use crate::Result;

/// Parses a PDF date string, with or without the leading `D:` prefix.
///
/// Accepts any prefix-truncated form (`D:1998`, `D:199812`, ...) per the
/// spec's "later fields may be omitted" rule, and both `O` forms (`Z` or
/// `+HH'mm'`/`-HH'mm'`) for the timezone relation.
pub fn parse(s: &str) -> Result<Zoned> {
    let digits = s.strip_prefix("D:").unwrap_or(s);
    let syntax_err = |msg: &str| Error::Parse(ParseError::Syntax { offset: 0, message: format!("PDF date: {msg}") });

    if digits.len() < 4 {
        return Err(syntax_err("year field missing"));
    }
    let field = |range: std::ops::Range<usize>, default: i16| -> Result<i16> {
        match digits.get(range.clone()) {
            Some(part) if part.len() == range.len() => {
                part.parse().map_err(|_| syntax_err("non-numeric field"))
            }
            None => Ok(default),
            Some(_) => Err(syntax_err("truncated field")),
        }
    };

    let year = field(0..4, 0)?;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;

    let naive = DateTime::new(year, month as i8, day as i8, hour as i8, minute as i8, second as i8, 0)
        .map_err(|_| syntax_err("field out of range"))?;

    let offset = match digits.as_bytes().get(14) {
        None | Some(b'Z') => Offset::UTC,
        Some(sign @ (b'+' | b'-')) => {
            let oh: i8 = field(15..17, 0)? as i8;
            let om: i8 = field(18..20, 0)? as i8;
            let seconds = (oh as i32 * 3600 + om as i32 * 60) * if *sign == b'-' { -1 } else { 1 };
            Offset::from_seconds(seconds).map_err(|_| syntax_err("offset out of range"))?
        }
        Some(_) => return Err(syntax_err("invalid timezone relation byte")),
    };

    naive.to_zoned(TimeZone::fixed(offset)).map_err(|_| syntax_err("date/offset combination invalid"))
}

/// Formats `when` as `D:YYYYMMDDHHmmSSOHH'mm'`, matching the form every PDF
/// writer in the wild actually emits (explicit offset, never bare `Z`).
pub fn format(when: &Zoned) -> String {
    let offset = when.offset();
    let total_minutes = offset.seconds() / 60;
    let sign = if total_minutes < 0 { '-' } else { '+' };
    let oh = (total_minutes.abs()) / 60;
    let om = (total_minutes.abs()) % 60;

    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{sign}{:02}'{:02}'",
        when.year(),
        when.month(),
        when.day(),
        when.hour(),
        when.minute(),
        when.second(),
        oh,
        om,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_precision_date_with_explicit_offset() {
        let z = parse("D:19981223195200-08'00'").unwrap();
        assert_eq!(z.year(), 1998);
        assert_eq!(z.month(), 12);
        assert_eq!(z.day(), 23);
        assert_eq!(z.hour(), 19);
        assert_eq!(z.offset().seconds(), -8 * 3600);
    }

    #[test]
    fn parses_year_only_date_defaulting_the_rest() {
        let z = parse("D:1998").unwrap();
        assert_eq!(z.year(), 1998);
        assert_eq!(z.month(), 1);
        assert_eq!(z.day(), 1);
    }

    #[test]
    fn format_round_trips_through_parse() {
        let z = parse("D:20230615103045+05'30'").unwrap();
        let text = format(&z);
        let reparsed = parse(&text).unwrap();
        assert_eq!(z, reparsed);
    }

    #[test]
    fn rejects_a_string_with_no_year() {
        assert!(parse("D:").is_err());
    }
}
