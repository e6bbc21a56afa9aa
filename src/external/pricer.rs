//! The external pricer contract surface.
//!
//! The pricer supplies spot, time to maturity, Black-Scholes valuations and
//! delta-implied strikes, all in 64.64 fixed point. Only the interface is
//! contracted; [`BlackScholesPricer`] is a deterministic reference
//! implementation over the crate's own fixed-point math, driven by a
//! settable spot and implied volatility.

use crate::error::{Error, Result};
use crate::types::fixed::{std_normal_cdf, std_normal_inv_cdf, Fixed64};

/// Seconds in the annualisation basis (365 days).
const SECONDS_PER_YEAR: i128 = 31_536_000;

/// The pricing surface consumed by the epoch controller.
pub trait Pricer {
    /// Current spot price of the underlying in base units.
    fn latest_answer(&self) -> Result<Fixed64>;

    /// Annualised time to maturity.
    fn time_to_maturity(&self, now: u64, expiry: u64) -> Result<Fixed64>;

    /// Strike at which the option has the given Black-Scholes delta.
    fn delta_strike(&self, is_call: bool, now: u64, expiry: u64, delta: Fixed64) -> Result<Fixed64>;

    /// Snap a strike onto the coarse strike grid.
    fn snap_to_grid(&self, is_call: bool, strike: Fixed64) -> Result<Fixed64>;

    /// Black-Scholes option value in base units.
    fn black_scholes(
        &self,
        spot: Fixed64,
        strike: Fixed64,
        time_to_maturity: Fixed64,
        is_call: bool,
    ) -> Result<Fixed64>;
}

/// Reference pricer with settable spot and flat implied volatility.
#[derive(Debug, Clone)]
pub struct BlackScholesPricer {
    spot: Fixed64,
    volatility: Fixed64,
}

impl BlackScholesPricer {
    pub fn new(spot: Fixed64, volatility: Fixed64) -> Self {
        Self { spot, volatility }
    }

    /// Move the spot (tests and the demo driver).
    pub fn set_spot(&mut self, spot: Fixed64) {
        self.spot = spot;
    }

    /// Move the implied volatility.
    pub fn set_volatility(&mut self, volatility: Fixed64) {
        self.volatility = volatility;
    }

    /// d1 of the Black-Scholes formula.
    fn d1(&self, spot: Fixed64, strike: Fixed64, tau: Fixed64) -> Result<Fixed64> {
        let sigma_sqrt_tau = self.volatility.mul(tau.sqrt()?)?;
        if sigma_sqrt_tau.is_zero() {
            return Err(Error::DivisionByZero);
        }
        let half_var = self.volatility.mul(self.volatility)?.mul(tau)?.half();
        spot.div(strike)?.ln()?.checked_add(half_var)?.div(sigma_sqrt_tau)
    }
}

impl Pricer for BlackScholesPricer {
    fn latest_answer(&self) -> Result<Fixed64> {
        Ok(self.spot)
    }

    fn time_to_maturity(&self, now: u64, expiry: u64) -> Result<Fixed64> {
        if expiry <= now {
            return Err(Error::InvalidArgument);
        }
        Fixed64::from_ratio((expiry - now) as i128, SECONDS_PER_YEAR)
    }

    fn delta_strike(&self, is_call: bool, now: u64, expiry: u64, delta: Fixed64) -> Result<Fixed64> {
        if delta.0 <= 0 || delta >= Fixed64::ONE {
            return Err(Error::InvalidArgument);
        }
        let tau = self.time_to_maturity(now, expiry)?;
        let sigma_sqrt_tau = self.volatility.mul(tau.sqrt()?)?;
        let half_var = self.volatility.mul(self.volatility)?.mul(tau)?.half();
        // Solve N(d1) = delta (calls) or N(d1) = 1 - delta (puts) for the
        // strike; a lower delta lands further out of the money either way.
        let mut d1 = std_normal_inv_cdf(delta)?;
        if !is_call {
            d1 = d1.neg();
        }
        let exponent = half_var.checked_sub(sigma_sqrt_tau.mul(d1)?)?;
        self.spot.mul(exponent.exp()?)
    }

    fn snap_to_grid(&self, is_call: bool, strike: Fixed64) -> Result<Fixed64> {
        // Calls snap away from the money upward, puts downward.
        if is_call {
            strike.snap_up()
        } else {
            strike.snap_down()
        }
    }

    fn black_scholes(
        &self,
        spot: Fixed64,
        strike: Fixed64,
        time_to_maturity: Fixed64,
        is_call: bool,
    ) -> Result<Fixed64> {
        if spot.0 <= 0 || strike.0 <= 0 || time_to_maturity.0 <= 0 {
            return Err(Error::InvalidArgument);
        }
        let d1 = self.d1(spot, strike, time_to_maturity)?;
        let d2 = d1.checked_sub(self.volatility.mul(time_to_maturity.sqrt()?)?)?;
        if is_call {
            let a = spot.mul(std_normal_cdf(d1)?)?;
            let b = strike.mul(std_normal_cdf(d2)?)?;
            a.checked_sub(b)
        } else {
            let a = strike.mul(std_normal_cdf(d2.neg())?)?;
            let b = spot.mul(std_normal_cdf(d1.neg())?)?;
            a.checked_sub(b)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::calendar::DAY;
    use crate::types::fixed::approx_eq;

    fn fx(s: &str) -> Fixed64 {
        s.parse().expect("literal parses")
    }

    fn pricer() -> BlackScholesPricer {
        BlackScholesPricer::new(fx("2000"), fx("0.9"))
    }

    #[test]
    fn test_time_to_maturity() {
        let p = pricer();
        // One week out of a 365 day year.
        let tau = p.time_to_maturity(0, 7 * DAY).unwrap();
        assert!(approx_eq(tau, Fixed64::from_ratio(7, 365).unwrap(), 4));
        assert!(p.time_to_maturity(10, 10).is_err());
    }

    #[test]
    fn test_black_scholes_call_value_bounds() {
        let p = pricer();
        let tau = p.time_to_maturity(0, 7 * DAY).unwrap();
        let value = p.black_scholes(fx("2000"), fx("2200"), tau, true).unwrap();
        // An OTM weekly call is worth something but far less than spot.
        assert!(value.0 > 0);
        assert!(value < fx("200"));
        // A deeper OTM strike is worth less.
        let further = p.black_scholes(fx("2000"), fx("2600"), tau, true).unwrap();
        assert!(further < value);
    }

    #[test]
    fn test_black_scholes_put_call_parity() {
        let p = pricer();
        let tau = p.time_to_maturity(0, 7 * DAY).unwrap();
        let call = p.black_scholes(fx("2000"), fx("2100"), tau, true).unwrap();
        let put = p.black_scholes(fx("2000"), fx("2100"), tau, false).unwrap();
        // call - put = spot - strike (zero rates)
        let lhs = call.checked_sub(put).unwrap();
        assert!(approx_eq(lhs, fx("-100"), 1 << 40));
    }

    #[test]
    fn test_delta_strike_ordering() {
        let p = pricer();
        let expiry = 7 * DAY;
        // A 40-delta call strike sits above spot and below the 20-delta one.
        let k40 = p.delta_strike(true, 0, expiry, fx("0.4")).unwrap();
        let k20 = p.delta_strike(true, 0, expiry, fx("0.2")).unwrap();
        assert!(k40 > fx("2000"));
        assert!(k20 > k40);
        // Put strikes mirror below spot: lower delta sits further down.
        let p40 = p.delta_strike(false, 0, expiry, fx("0.4")).unwrap();
        let p20 = p.delta_strike(false, 0, expiry, fx("0.2")).unwrap();
        assert!(p40 < fx("2000"));
        assert!(p20 < p40);
    }

    #[test]
    fn test_delta_strike_round_trips_through_delta() {
        let p = pricer();
        let expiry = 7 * DAY;
        let delta = fx("0.3");
        let strike = p.delta_strike(true, 0, expiry, delta).unwrap();
        // Recompute N(d1) at that strike and compare to the target delta.
        let tau = p.time_to_maturity(0, expiry).unwrap();
        let d1 = p.d1(fx("2000"), strike, tau).unwrap();
        let recovered = std_normal_cdf(d1).unwrap();
        assert!(approx_eq(recovered, delta, 1 << 50));
    }

    #[test]
    fn test_snap_to_grid_direction() {
        let p = pricer();
        assert_eq!(p.snap_to_grid(true, fx("2133")).unwrap(), fx("2200"));
        assert_eq!(p.snap_to_grid(false, fx("1877")).unwrap(), fx("1800"));
    }
}
