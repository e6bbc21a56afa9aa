//! Signed 64.64 fixed-point arithmetic.
//!
//! ## Overview
//!
//! Every price, strike and rate in the engine is a signed 64.64 fixed-point
//! value: the high 64 bits of an `i128` carry the sign and integer part, the
//! low 64 bits carry the fraction. Sizes and collateral amounts are unsigned
//! 256-bit integers ([`U256`]).
//!
//! ## Why Fixed-Point?
//!
//! Floating-point arithmetic can produce different results on different
//! hardware, breaking determinism. Fixed-point ensures identical results
//! everywhere; wide intermediates run on [`U256`] so products never wrap.
//!
//! ## Examples
//!
//! ```
//! use thetacore::types::fixed::Fixed64;
//!
//! let price: Fixed64 = "0.25".parse().unwrap();
//! let size = alloy_primitives::U256::from(1_000u64);
//! assert_eq!(price.mulu(size).unwrap(), alloy_primitives::U256::from(250u64));
//! ```

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Scaling factor exponent: values are scaled by 2^64.
pub const FRACTIONAL_BITS: u32 = 64;

/// A signed 64.64 fixed-point number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed64(pub i128);

// ============================================================================
// Constants
// ============================================================================

impl Fixed64 {
    /// Zero.
    pub const ZERO: Fixed64 = Fixed64(0);

    /// One (2^64).
    pub const ONE: Fixed64 = Fixed64(1i128 << 64);

    /// Largest representable value. Doubles as the cancellation sentinel on
    /// auction clearing prices.
    pub const MAX: Fixed64 = Fixed64(i128::MAX);

    /// One half.
    pub const HALF: Fixed64 = Fixed64(1i128 << 63);
}

/// ln(2) in 64.64.
const LN2: Fixed64 = Fixed64(12786308645202655660);
/// log2(e) in 64.64.
const LOG2E: Fixed64 = Fixed64(26613026195688644983);
/// 1 / sqrt(2π) in 64.64.
const INV_SQRT_2PI: Fixed64 = Fixed64(7359186146747302596);

// Zelen & Severo rational approximation of the standard normal CDF.
const CDF_P: Fixed64 = Fixed64(4273038846047820584);
const CDF_B: [Fixed64; 5] = [
    Fixed64(5891549345779789371),
    Fixed64(-6577440832507964494),
    Fixed64(32862467576799067950),
    Fixed64(-33596242918879593516),
    Fixed64(24539231939563107688),
];

// Beasley-Springer-Moro inverse CDF: central rational part ...
const ICDF_A: [Fixed64; 4] = [
    Fixed64(46239129609814780513),
    Fixed64(-343386152466667905182),
    Fixed64(763532831528123358881),
    Fixed64(-469304731940299481103),
];
const ICDF_B: [Fixed64; 4] = [
    Fixed64(-156308687548092680930),
    Fixed64(425812971477671891520),
    Fixed64(-388529769682629886924),
    Fixed64(57753603115416346544),
];
// ... and tail polynomial coefficients c1..c9.
const ICDF_C: [Fixed64; 9] = [
    Fixed64(6225323852634628061),
    Fixed64(18007140067869026233),
    Fixed64(2966199027681264616),
    Fixed64(509939598626950605),
    Fixed64(70846066071911467),
    Fixed64(7289962356115526),
    Fixed64(593556976611393),
    Fixed64(5327728420575),
    Fixed64(7305492070581),
];

/// Central-region cutoff 0.42 for the inverse CDF.
const ICDF_CENTRAL: Fixed64 = Fixed64(7747632510958011679);

// ============================================================================
// Construction and rendering
// ============================================================================

impl Fixed64 {
    /// Convert a small integer into 64.64.
    ///
    /// # Example
    ///
    /// ```
    /// use thetacore::types::fixed::Fixed64;
    /// assert_eq!(Fixed64::from_int(3).0, 3i128 << 64);
    /// ```
    pub const fn from_int(n: i64) -> Fixed64 {
        Fixed64((n as i128) << 64)
    }

    /// Build the 64.64 value `num / den`. The denominator must be positive.
    pub fn from_ratio(num: i128, den: i128) -> Result<Fixed64> {
        if den <= 0 {
            return Err(if den == 0 {
                Error::DivisionByZero
            } else {
                Error::InvalidArgument
            });
        }
        let mag = (U256::from(num.unsigned_abs()) << 64) / U256::from(den as u128);
        signed_from_u256(mag, num < 0)
    }

    /// Build the 64.64 value `num / den` from 256-bit operands.
    ///
    /// Used for ratios of collateral amounts, e.g. `assets / total_assets`.
    pub fn from_u256_ratio(num: U256, den: U256) -> Result<Fixed64> {
        if den.is_zero() {
            return Err(Error::DivisionByZero);
        }
        if num > U256::MAX >> 64 {
            return Err(Error::Overflow);
        }
        signed_from_u256((num << 64) / den, false)
    }

    /// Truncate to the integer part (toward negative infinity).
    pub const fn to_int(self) -> i64 {
        (self.0 >> 64) as i64
    }

    /// Sign test.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Zero test.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Absolute value.
    pub fn abs(self) -> Fixed64 {
        Fixed64(self.0.abs())
    }

    /// Negation.
    pub fn neg(self) -> Fixed64 {
        Fixed64(-self.0)
    }
}

impl FromStr for Fixed64 {
    type Err = Error;

    /// Parse a decimal string ("2000", "0.078", "-1.5") into 64.64.
    ///
    /// Conversion goes through [`rust_decimal`] so the mantissa/scale split is
    /// exact; the final binary division truncates toward zero.
    fn from_str(s: &str) -> Result<Fixed64> {
        let d = Decimal::from_str(s).map_err(|_| Error::InvalidArgument)?;
        let den = 10i128
            .checked_pow(d.scale())
            .ok_or(Error::Overflow)?;
        Fixed64::from_ratio(d.mantissa(), den)
    }
}

impl fmt::Display for Fixed64 {
    /// Render with up to 18 fractional digits, trailing zeros trimmed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mag = self.0.unsigned_abs();
        let int = mag >> 64;
        let frac = mag & ((1u128 << 64) - 1);
        let digits = u128::try_from((U256::from(frac) * pow10(18)) >> 64).expect("18 digits fit");
        let sign = if self.0 < 0 { "-" } else { "" };
        if digits == 0 {
            return write!(f, "{sign}{int}");
        }
        let s = format!("{digits:018}");
        write!(f, "{sign}{int}.{}", s.trim_end_matches('0'))
    }
}

// ============================================================================
// Checked arithmetic
// ============================================================================

impl Fixed64 {
    /// Checked addition.
    pub fn checked_add(self, rhs: Fixed64) -> Result<Fixed64> {
        self.0.checked_add(rhs.0).map(Fixed64).ok_or(Error::Overflow)
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Fixed64) -> Result<Fixed64> {
        self.0.checked_sub(rhs.0).map(Fixed64).ok_or(Error::Overflow)
    }

    /// Checked multiplication with a 256-bit intermediate.
    pub fn mul(self, rhs: Fixed64) -> Result<Fixed64> {
        let neg = (self.0 < 0) != (rhs.0 < 0);
        let a = U256::from(self.0.unsigned_abs());
        let b = U256::from(rhs.0.unsigned_abs());
        let p = a.checked_mul(b).ok_or(Error::Overflow)? >> 64;
        signed_from_u256(p, neg)
    }

    /// Checked division with a 256-bit intermediate.
    pub fn div(self, rhs: Fixed64) -> Result<Fixed64> {
        if rhs.0 == 0 {
            return Err(Error::DivisionByZero);
        }
        let neg = (self.0 < 0) != (rhs.0 < 0);
        let num = U256::from(self.0.unsigned_abs()) << 64;
        let q = num / U256::from(rhs.0.unsigned_abs());
        signed_from_u256(q, neg)
    }

    /// Multiply a non-negative 64.64 value by an unsigned 256-bit amount,
    /// truncating the fraction. This is the price-times-size primitive.
    pub fn mulu(self, rhs: U256) -> Result<U256> {
        if self.0 < 0 {
            return Err(Error::InvalidArgument);
        }
        let p = U256::from(self.0 as u128)
            .checked_mul(rhs)
            .ok_or(Error::Overflow)?;
        Ok(p >> 64)
    }

    /// Divide an unsigned 256-bit amount by a positive 64.64 value,
    /// truncating. Inverse of [`Fixed64::mulu`] up to rounding.
    pub fn divu(self, rhs: U256) -> Result<U256> {
        if self.0 == 0 {
            return Err(Error::DivisionByZero);
        }
        if self.0 < 0 {
            return Err(Error::InvalidArgument);
        }
        if rhs > U256::MAX >> 64 {
            return Err(Error::Overflow);
        }
        Ok((rhs << 64) / U256::from(self.0 as u128))
    }
}

/// Narrow a 256-bit magnitude back into a signed 64.64 value.
fn signed_from_u256(mag: U256, neg: bool) -> Result<Fixed64> {
    let m = u128::try_from(mag).map_err(|_| Error::Overflow)?;
    if neg {
        if m > 1u128 << 127 {
            return Err(Error::Overflow);
        }
        // m == 2^127 maps onto i128::MIN through the wrapping negation.
        Ok(Fixed64((m as i128).wrapping_neg()))
    } else {
        if m > i128::MAX as u128 {
            return Err(Error::Overflow);
        }
        Ok(Fixed64(m as i128))
    }
}

/// 10^n as a [`U256`].
pub fn pow10(n: u32) -> U256 {
    U256::from(10u64).pow(U256::from(n))
}

// ============================================================================
// Roots, exponentials, logarithms
// ============================================================================

/// Floor integer square root of a 256-bit value (Newton iteration).
fn isqrt(n: U256) -> U256 {
    if n.is_zero() {
        return n;
    }
    let mut x = U256::from(1u64) << n.bit_len().div_ceil(2);
    loop {
        let next = (x + n / x) >> 1;
        if next >= x {
            return x;
        }
        x = next;
    }
}

/// `(a * b) >> 64` on u128 operands known to fit after the shift.
fn mul_shift(a: u128, b: u128) -> u128 {
    u128::try_from((U256::from(a) * U256::from(b)) >> 64).expect("product fits after shift")
}

impl Fixed64 {
    /// Square root of a non-negative value.
    pub fn sqrt(self) -> Result<Fixed64> {
        if self.0 < 0 {
            return Err(Error::InvalidArgument);
        }
        let r = isqrt(U256::from(self.0 as u128) << 64);
        signed_from_u256(r, false)
    }

    /// Binary logarithm of a positive value.
    pub fn log2(self) -> Result<Fixed64> {
        if self.0 <= 0 {
            return Err(Error::InvalidArgument);
        }
        let msb = 127 - self.0.leading_zeros() as i32;
        let mut result = ((msb as i128) - 64) << 64;
        // Normalize the mantissa into [1, 2) and extract fraction bits by
        // repeated squaring.
        let mut ux = if msb >= 64 {
            (self.0 as u128) >> (msb - 64)
        } else {
            (self.0 as u128) << (64 - msb)
        };
        let mut bit = 1i128 << 63;
        for _ in 0..64 {
            ux = mul_shift(ux, ux);
            if ux >= 2u128 << 64 {
                ux >>= 1;
                result += bit;
            }
            bit >>= 1;
        }
        Ok(Fixed64(result))
    }

    /// Natural logarithm of a positive value.
    pub fn ln(self) -> Result<Fixed64> {
        self.log2()?.mul(LN2)
    }

    /// Base-2 exponential. Underflows to zero, overflows to an error.
    pub fn exp2(self) -> Result<Fixed64> {
        if self.0 >= 63i128 << 64 {
            return Err(Error::Overflow);
        }
        if self.0 < -(64i128 << 64) {
            return Ok(Fixed64::ZERO);
        }
        let n = self.0 >> 64; // floor, also for negatives
        let frac = (self.0 - (n << 64)) as u128;
        // Multiply together 2^(2^-i) factors for every set fraction bit; the
        // factors come from successive square roots of two.
        let mut r: u128 = 1u128 << 64;
        let mut t: u128 = 2u128 << 64;
        for i in 1..=64u32 {
            t = u128::try_from(isqrt(U256::from(t) << 64)).expect("sqrt fits");
            if frac & (1u128 << (64 - i)) != 0 {
                r = mul_shift(r, t);
            }
        }
        let raw = if n >= 0 {
            let shifted = U256::from(r) << n as usize;
            u128::try_from(shifted).map_err(|_| Error::Overflow)?
        } else {
            let shift = (-n) as u32;
            if shift >= 128 {
                0
            } else {
                r >> shift
            }
        };
        if raw > i128::MAX as u128 {
            return Err(Error::Overflow);
        }
        Ok(Fixed64(raw as i128))
    }

    /// Natural exponential.
    pub fn exp(self) -> Result<Fixed64> {
        self.mul(LOG2E)?.exp2()
    }
}

// ============================================================================
// Standard normal distribution
// ============================================================================

/// Standard normal CDF Φ(x), Zelen & Severo rational approximation.
pub fn std_normal_cdf(x: Fixed64) -> Result<Fixed64> {
    if x.0 < 0 {
        return Fixed64::ONE.checked_sub(std_normal_cdf(x.neg())?);
    }
    if x >= Fixed64::from_int(10) {
        return Ok(Fixed64::ONE);
    }
    let t = Fixed64::ONE.div(Fixed64::ONE.checked_add(CDF_P.mul(x)?)?)?;
    let mut poly = CDF_B[4];
    for c in [CDF_B[3], CDF_B[2], CDF_B[1], CDF_B[0]] {
        poly = poly.mul(t)?.checked_add(c)?;
    }
    let poly = poly.mul(t)?;
    let pdf = INV_SQRT_2PI.mul(x.mul(x)?.half().neg().exp()?)?;
    Fixed64::ONE.checked_sub(pdf.mul(poly)?)
}

/// Inverse standard normal CDF Φ⁻¹(p), Beasley-Springer-Moro.
///
/// The domain is the open interval (0, 1).
pub fn std_normal_inv_cdf(p: Fixed64) -> Result<Fixed64> {
    if p.0 <= 0 || p >= Fixed64::ONE {
        return Err(Error::InvalidArgument);
    }
    let r = p.checked_sub(Fixed64::HALF)?;
    if r.abs() <= ICDF_CENTRAL {
        let y = r.mul(r)?;
        let mut num = ICDF_A[3];
        for c in [ICDF_A[2], ICDF_A[1], ICDF_A[0]] {
            num = num.mul(y)?.checked_add(c)?;
        }
        let mut den = ICDF_B[3];
        for c in [ICDF_B[2], ICDF_B[1], ICDF_B[0]] {
            den = den.mul(y)?.checked_add(c)?;
        }
        let den = den.mul(y)?.checked_add(Fixed64::ONE)?;
        return num.mul(r)?.div(den);
    }
    // Tail region: s = ln(-ln(q)) over the tail probability q.
    let q = if r.0 > 0 {
        Fixed64::ONE.checked_sub(p)?
    } else {
        p
    };
    let s = q.ln()?.neg().ln()?;
    let mut x = ICDF_C[8];
    for c in ICDF_C[..8].iter().rev() {
        x = x.mul(s)?.checked_add(*c)?;
    }
    Ok(if r.0 > 0 { x } else { x.neg() })
}

impl Fixed64 {
    /// Halve by arithmetic shift.
    pub fn half(self) -> Fixed64 {
        Fixed64(self.0 >> 1)
    }
}

// ============================================================================
// Two-significant-digit snapping
// ============================================================================

impl Fixed64 {
    /// Round a positive value up to two significant decimal digits.
    ///
    /// The policy: take the largest power of ten no greater than one tenth of
    /// the value, divide by it, round the quotient up to an integer, multiply
    /// back. Examples: 24450 → 25000, 1.419 → 1.5, 0.07745 → 0.078.
    pub fn snap_up(self) -> Result<Fixed64> {
        self.snap(true)
    }

    /// Round a positive value down to two significant decimal digits.
    pub fn snap_down(self) -> Result<Fixed64> {
        self.snap(false)
    }

    fn snap(self, up: bool) -> Result<Fixed64> {
        if self.0 <= 0 {
            return Err(Error::InvalidArgument);
        }
        let raw = U256::from(self.0 as u128);
        let two64 = U256::from(1u64) << 64;
        if self >= Fixed64::from_int(10) {
            // Largest 10^k with 10^k <= value / 10.
            let mut k = 0u32;
            while pow10(k + 2) << 64 <= raw {
                k += 1;
            }
            let unit = pow10(k) << 64;
            let n = if up {
                (raw + unit - U256::from(1u64)) / unit
            } else {
                raw / unit
            };
            return signed_from_u256(n * unit, false);
        }
        // Fractional scale: smallest m >= 1 with value * 10^m >= 10.
        let ten = U256::from(10u64) << 64;
        let mut m = 1u32;
        while raw * pow10(m) < ten {
            m += 1;
        }
        let scaled = raw * pow10(m);
        let n = if up {
            (scaled + two64 - U256::from(1u64)) / two64
        } else {
            scaled / two64
        };
        let den = pow10(m);
        // The materializing division rounds toward the original value so the
        // snap is idempotent on its own output.
        let out = if up {
            (n << 64) / den
        } else {
            ((n << 64) + den - U256::from(1u64)) / den
        };
        signed_from_u256(out, false)
    }
}

// ============================================================================
// Decimal-scale and contract/collateral conversion
// ============================================================================

/// Re-base an unsigned amount from one token's decimals to another's.
pub fn to_base_token_amount(from_decimals: u8, to_decimals: u8, value: U256) -> Result<U256> {
    if from_decimals > 36 || to_decimals > 36 {
        return Err(Error::DecimalsMismatch);
    }
    if to_decimals >= from_decimals {
        value
            .checked_mul(pow10((to_decimals - from_decimals) as u32))
            .ok_or(Error::Overflow)
    } else {
        Ok(value / pow10((from_decimals - to_decimals) as u32))
    }
}

/// Convert an option contract size into the collateral backing it.
///
/// Calls are collateralised 1:1 in the underlying; puts lock the strike value
/// in the base token.
pub fn contracts_to_collateral(
    size: U256,
    is_call: bool,
    underlying_decimals: u8,
    base_decimals: u8,
    strike: Fixed64,
) -> Result<U256> {
    if is_call {
        Ok(size)
    } else {
        to_base_token_amount(underlying_decimals, base_decimals, strike.mulu(size)?)
    }
}

/// Convert a collateral amount into the option contract size it can back.
/// Inverse of [`contracts_to_collateral`].
pub fn collateral_to_contracts(
    collateral: U256,
    is_call: bool,
    underlying_decimals: u8,
    base_decimals: u8,
    strike: Fixed64,
) -> Result<U256> {
    if is_call {
        Ok(collateral)
    } else {
        strike.divu(to_base_token_amount(
            base_decimals,
            underlying_decimals,
            collateral,
        )?)
    }
}

/// Compare two fixed-point values with a raw-representation tolerance.
///
/// Transcendental results and snapped fractions are exact only up to a few
/// ulps of the 2^-64 scale; tests use this the way an integer engine uses
/// epsilon comparisons.
pub fn approx_eq(a: Fixed64, b: Fixed64, tolerance: u128) -> bool {
    a.0.abs_diff(b.0) <= tolerance
}

// ============================================================================
// Unit Tests
// ============================================================================
