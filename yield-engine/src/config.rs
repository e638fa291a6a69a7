//! Configuration for the yield engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Yield engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldConfig {
    /// Cycle length in hours
    pub cycle_hours: i64,

    /// Yield per cycle as a fraction of stability
    pub rate: Decimal,

    /// Days an entry keeps accruing after creation or renewal
    pub deadline_days: i64,
}

impl Default for YieldConfig {
    fn default() -> Self {
        Self {
            cycle_hours: 3,
            // stability × 0.000041666 per cycle ≈ 1% of stability per day
            rate: Decimal::new(41_666, 9),
            deadline_days: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rate() {
        let config = YieldConfig::default();
        assert_eq!(config.cycle_hours, 3);
        assert_eq!(config.rate.to_string(), "0.000041666");
    }
}
