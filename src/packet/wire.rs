/*
Scalar encodings shared by every packet body. Everything is big-endian.

Strings are Qt flavored: an i32 byte length followed by raw UTF-8. A length
of -1 denotes the null string, which is distinct from the empty string
(length 0) and must survive a round trip.

Datetimes are a julian day (i64), milliseconds past midnight (u32) and a
time-spec byte; when the time-spec is 2 an i32 offset in seconds follows.
The julian origin is 2451545 (2000-01-01); dates before 2000 never appear
on this wire.
*/
use std::io::{Cursor, Write};

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};

use super::{ParseError, Result};

pub(crate) const JULIAN_ORIGIN: i64 = 2451545;

pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, wanted: usize) -> std::result::Result<&'a [u8], ParseError> {
        let left = self.buf.len() - self.pos;
        if wanted > left {
            return Err(ParseError::Truncated { wanted, left });
        }
        let bytes = &self.buf[self.pos..self.pos + wanted];
        self.pos += wanted;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> std::result::Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> std::result::Result<bool, ParseError> {
        Ok(self.u8()? != 0)
    }

    pub fn u16(&mut self) -> std::result::Result<u16, ParseError> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn u32(&mut self) -> std::result::Result<u32, ParseError> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn i32(&mut self) -> std::result::Result<i32, ParseError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn u64(&mut self) -> std::result::Result<u64, ParseError> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn i64(&mut self) -> std::result::Result<i64, ParseError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn f64(&mut self) -> std::result::Result<f64, ParseError> {
        Ok(f64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub fn string(&mut self) -> std::result::Result<Option<String>, ParseError> {
        let length = self.i32()?;
        match length {
            -1 => Ok(None),
            n if n < 0 => Err(ParseError::BadStringLength(n)),
            n => {
                let bytes = self.take(n as usize)?;
                Ok(Some(std::str::from_utf8(bytes)?.to_string()))
            }
        }
    }

    pub fn datetime(&mut self) -> std::result::Result<WireDateTime, ParseError> {
        let julian_day = self.i64()?;
        let msecs = self.u32()?;
        let time_spec = self.u8()?;
        let offset_seconds = if time_spec == 2 { self.i32()? } else { 0 };
        Ok(WireDateTime {
            julian_day,
            msecs,
            time_spec,
            offset_seconds,
        })
    }
}

pub(crate) trait WireWrite {
    fn put_u8(&mut self, value: u8) -> Result;
    fn put_bool(&mut self, value: bool) -> Result;
    fn put_u16(&mut self, value: u16) -> Result;
    fn put_u32(&mut self, value: u32) -> Result;
    fn put_i32(&mut self, value: i32) -> Result;
    fn put_u64(&mut self, value: u64) -> Result;
    fn put_i64(&mut self, value: i64) -> Result;
    fn put_f64(&mut self, value: f64) -> Result;
    fn put_string(&mut self, value: Option<&str>) -> Result;
    fn put_datetime(&mut self, value: &WireDateTime) -> Result;
}

impl WireWrite for Cursor<&mut [u8]> {
    fn put_u8(&mut self, value: u8) -> Result {
        Ok(self.write_all(&[value])?)
    }

    fn put_bool(&mut self, value: bool) -> Result {
        self.put_u8(value as u8)
    }

    fn put_u16(&mut self, value: u16) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_u32(&mut self, value: u32) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_i32(&mut self, value: i32) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_u64(&mut self, value: u64) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_i64(&mut self, value: i64) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_f64(&mut self, value: f64) -> Result {
        Ok(self.write_all(&value.to_be_bytes())?)
    }

    fn put_string(&mut self, value: Option<&str>) -> Result {
        match value {
            None => self.put_i32(-1),
            Some(s) => {
                self.put_i32(s.len() as i32)?;
                Ok(self.write_all(s.as_bytes())?)
            }
        }
    }

    fn put_datetime(&mut self, value: &WireDateTime) -> Result {
        self.put_i64(value.julian_day)?;
        self.put_u32(value.msecs)?;
        self.put_u8(value.time_spec)?;
        if value.time_spec == 2 {
            self.put_i32(value.offset_seconds)?;
        }
        Ok(())
    }
}

/// A calendar timestamp exactly as it appears on the wire.
///
/// Keeping the raw fields rather than a converted value lets a decoded
/// packet re-encode byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireDateTime {
    pub julian_day: i64,
    pub msecs: u32,
    pub time_spec: u8,
    pub offset_seconds: i32,
}

fn julian_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

impl WireDateTime {
    pub fn from_utc(when: DateTime<Utc>) -> Self {
        let date = when.date_naive();
        let julian_day = (date - julian_epoch()).num_days() + JULIAN_ORIGIN;
        let msecs = when.time().num_seconds_from_midnight() * 1000;
        WireDateTime {
            julian_day,
            msecs,
            time_spec: 1,
            offset_seconds: 0,
        }
    }

    pub fn to_utc(self) -> DateTime<Utc> {
        let midnight = julian_epoch().and_hms_opt(0, 0, 0).unwrap();
        let naive = midnight
            + Duration::days(self.julian_day - JULIAN_ORIGIN)
            + Duration::milliseconds(i64::from(self.msecs));
        DateTime::from_naive_utc_and_offset(naive, Utc)
    }
}

/// Reconstruct a time-of-day field (milliseconds since UTC midnight) into a
/// full timestamp using the receiver's current UTC day.
pub fn time_from_millis(msecs: u32) -> DateTime<Utc> {
    let midnight = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap();
    DateTime::from_naive_utc_and_offset(midnight + Duration::milliseconds(i64::from(msecs)), Utc)
}

pub fn millis_since_midnight(when: DateTime<Utc>) -> u32 {
    when.time().num_seconds_from_midnight() * 1000 + when.timestamp_subsec_millis()
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn null_and_empty_strings_are_distinct() {
        let mut buf = [0u8; 16];
        let mut w = Cursor::new(&mut buf[..]);
        w.put_string(None).unwrap();
        w.put_string(Some("")).unwrap();
        let written = w.position() as usize;

        let mut r = Reader::new(&buf[..written]);
        assert_eq!(r.string().unwrap(), None);
        assert_eq!(r.string().unwrap(), Some(String::new()));
    }

    #[test]
    fn truncated_string_fails() {
        // declares 10 bytes of payload, provides 2
        let bytes = [0, 0, 0, 10, b'A', b'B'];
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            r.string(),
            Err(ParseError::Truncated { wanted: 10, left: 2 })
        ));
    }

    #[test]
    fn datetime_round_trip() {
        let when = Utc.with_ymd_and_hms(2024, 6, 1, 12, 34, 56).unwrap();
        let wire = WireDateTime::from_utc(when);
        assert_eq!(wire.time_spec, 1);
        assert_eq!(wire.to_utc(), when);
    }

    #[test]
    fn julian_origin_is_y2k() {
        let wire = WireDateTime {
            julian_day: JULIAN_ORIGIN,
            msecs: 0,
            time_spec: 1,
            offset_seconds: 0,
        };
        assert_eq!(
            wire.to_utc(),
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
