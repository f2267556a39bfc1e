//! `TimingSample`, the CSV row schema spec.md §3/§6 describes: this crate
//! owns the record and a row-level parser/formatter, but not file I/O (an
//! external generator/attack CLI is out of scope per spec.md §1).

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::biguint::BigUint;
use crate::error::{Error, Result};

/// One observed `(message, signing duration)` pair, with an optional
/// debug classification column.
///
/// `step4` mirrors spec.md §6's CSV schema: "either 1 or 2, debug
/// classification of the last bit processed, optional for replay". It plays
/// no role in the attack itself — [`crate::attack`] derives its own
/// partition from `duration` — it only round-trips through `parse_row`/
/// `to_row` for tooling built on top of this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingSample {
    pub message: BigUint,
    pub duration: Duration,
    pub step4: Option<u8>,
}

impl TimingSample {
    pub fn new(message: BigUint, duration: Duration) -> Self {
        TimingSample {
            message,
            duration,
            step4: None,
        }
    }

    pub fn with_step4(mut self, step4: u8) -> Self {
        self.step4 = Some(step4);
        self
    }

    /// Parses one CSV data row: `message,duration_ns,step4` where `step4` is
    /// either `1`, `2`, or empty.
    pub fn parse_row(row: &str) -> Result<Self> {
        let mut fields = row.trim_end_matches(['\r', '\n']).split(',');

        let message = fields
            .next()
            .ok_or(Error::MalformedInput("missing message column"))?
            .parse::<BigUint>()
            .map_err(|_| Error::MalformedInput("message column is not a decimal integer"))?;

        let duration_ns: u64 = fields
            .next()
            .ok_or(Error::MalformedInput("missing duration column"))?
            .parse()
            .map_err(|_| Error::MalformedInput("duration column is not a nonnegative integer"))?;

        let step4 = match fields.next() {
            None | Some("") => None,
            Some(raw) => {
                let v: u8 = raw
                    .parse()
                    .map_err(|_| Error::MalformedInput("step4 column is not 1 or 2"))?;
                if v != 1 && v != 2 {
                    return Err(Error::MalformedInput("step4 column is not 1 or 2"));
                }
                Some(v)
            }
        };

        if fields.next().is_some() {
            return Err(Error::MalformedInput("too many columns"));
        }

        Ok(TimingSample {
            message,
            duration: Duration::from_nanos(duration_ns),
            step4,
        })
    }

    /// Renders this sample back to a CSV data row (no trailing newline).
    pub fn to_row(&self) -> String {
        match self.step4 {
            Some(v) => format!("{},{},{}", self.message, self.duration.as_nanos(), v),
            None => format!("{},{},", self.message, self.duration.as_nanos()),
        }
    }
}
