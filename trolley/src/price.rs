use std::fmt;

use thiserror::Error;

/// Most decimal places a price snapshot may carry. Keeps line totals well
/// inside `i64` even for the largest carts.
const MAX_SCALE: u32 = 9;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    #[error("not a decimal amount: {0:?}")]
    Invalid(String),
    #[error("too many decimal places (limit {MAX_SCALE})")]
    TooPrecise,
    #[error("amount out of range")]
    OutOfRange,
}

/// Exact non-negative decimal amount, stored as an integer mantissa plus a
/// decimal scale, so `19.99` is `(1999, 2)`. Arithmetic is exact or fails;
/// floats never enter the math.
#[derive(Clone, Copy, Debug)]
pub struct Price {
    mantissa: i64,
    scale: u32,
}

impl Price {
    pub const ZERO: Price = Price { mantissa: 0, scale: 0 };

    /// Parses digits with an optional single decimal point. Signs, exponents
    /// and whitespace are rejected, which also makes negative amounts
    /// unrepresentable.
    pub fn parse(input: &str) -> Result<Self, PriceError> {
        let (int_part, frac_part) = match input.split_once('.') {
            Some((int_part, frac_part)) => (int_part, frac_part),
            None => (input, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(PriceError::Invalid(input.to_string()));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(PriceError::Invalid(input.to_string()));
        }
        if frac_part.len() as u32 > MAX_SCALE {
            return Err(PriceError::TooPrecise);
        }
        let mantissa = format!("{int_part}{frac_part}")
            .parse::<i64>()
            .map_err(|_| PriceError::OutOfRange)?;
        Ok(Price { mantissa, scale: frac_part.len() as u32 })
    }

    pub fn is_positive(&self) -> bool {
        self.mantissa > 0
    }

    pub fn checked_add(self, other: Price) -> Option<Price> {
        let scale = self.scale.max(other.scale);
        let left = self.rescaled(scale)?;
        let right = other.rescaled(scale)?;
        Some(Price { mantissa: left.mantissa.checked_add(right.mantissa)?, scale })
    }

    pub fn checked_mul_u32(self, factor: u32) -> Option<Price> {
        Some(Price {
            mantissa: self.mantissa.checked_mul(i64::from(factor))?,
            scale: self.scale,
        })
    }

    fn rescaled(self, scale: u32) -> Option<Price> {
        let factor = 10i64.checked_pow(scale - self.scale)?;
        Some(Price { mantissa: self.mantissa.checked_mul(factor)?, scale })
    }

    fn normalized(self) -> (i64, u32) {
        let mut mantissa = self.mantissa;
        let mut scale = self.scale;
        while scale > 0 && mantissa % 10 == 0 {
            mantissa /= 10;
            scale -= 1;
        }
        (mantissa, scale)
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Price {}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.mantissa);
        }
        let divisor = 10i64.pow(self.scale);
        let units = self.mantissa / divisor;
        let frac = self.mantissa % divisor;
        write!(f, "{units}.{frac:0width$}", width = self.scale as usize)
    }
}
