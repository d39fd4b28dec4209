use std::str::FromStr;

use crate::prelude::*;

pub fn non_zero_usize(value: &str) -> Result<usize> {
    match FromStr::from_str(value)? {
        value if value >= 1 => Ok(value),
        _ => Err(anyhow!("expected a positive number")),
    }
}

pub fn non_zero_u32(value: &str) -> Result<u32> {
    match FromStr::from_str(value)? {
        value if value >= 1 => Ok(value),
        _ => Err(anyhow!("expected a positive number")),
    }
}

pub fn non_zero_duration(value: &str) -> Result<StdDuration> {
    match humantime::parse_duration(value)? {
        value if !value.is_zero() => Ok(value),
        _ => Err(anyhow!("expected a positive duration")),
    }
}

pub fn non_negative_f64(value: &str) -> Result<f64> {
    match f64::from_str(value)? {
        value if value.is_finite() && value >= 0.0 => Ok(value),
        value => Err(anyhow!("{} is not a finite non-negative number", value)),
    }
}

pub fn percentage(value: &str) -> Result<usize> {
    match FromStr::from_str(value)? {
        value if value <= 100 => Ok(value),
        value => Err(anyhow!("{}% is out of range", value)),
    }
}
