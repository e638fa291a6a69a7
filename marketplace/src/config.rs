//! Configuration for the marketplace

use parcel_core::{Asset, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Marketplace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Platform commission account at the wallet store
    pub platform_account: UserId,

    /// Reference-unit rates for currencies and yield assets
    pub rates: RateTable,

    /// Default price floors by age bracket
    pub floors: FloorConfig,

    /// Underpriced-sale cooldown duration (hours)
    pub cooldown_hours: i64,

    /// Hard deadline for a single wallet call (milliseconds)
    pub ledger_deadline_ms: u64,

    /// Shortest grace period a seller may grant (days)
    pub grace_days_min: i64,

    /// Longest grace period a seller may grant (days)
    pub grace_days_max: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            platform_account: UserId::new(2_000_000),
            rates: RateTable::default(),
            floors: FloorConfig::default(),
            cooldown_hours: 24,
            ledger_deadline_ms: 5_000,
            grace_days_min: 1,
            grace_days_max: 30,
        }
    }
}

impl MarketConfig {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Validation(format!("failed to read config: {}", e)))?;
        let config: MarketConfig = toml::from_str(&content)
            .map_err(|e| crate::Error::Validation(format!("failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults with environment overrides
    pub fn from_env() -> crate::Result<Self> {
        let mut config = MarketConfig::default();

        if let Ok(account) = std::env::var("MARKET_PLATFORM_ACCOUNT") {
            let id = account.parse::<u64>().map_err(|e| {
                crate::Error::Validation(format!("MARKET_PLATFORM_ACCOUNT: {}", e))
            })?;
            config.platform_account = UserId::new(id);
        }

        if let Ok(deadline) = std::env::var("MARKET_LEDGER_DEADLINE_MS") {
            config.ledger_deadline_ms = deadline.parse::<u64>().map_err(|e| {
                crate::Error::Validation(format!("MARKET_LEDGER_DEADLINE_MS: {}", e))
            })?;
        }

        Ok(config)
    }
}

/// Rates expressing currencies and yield assets in a common reference unit
///
/// Parcel value is `stability × rate(class yield asset)` and a
/// two-currency price is `irr + psc × psc_rate`, both in the reference
/// unit, so floor percentages compare like for like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateTable {
    /// Reference-unit value of 1 PSC
    pub psc: Decimal,

    /// Reference-unit value of 1 yellow (residential yield)
    pub yellow: Decimal,

    /// Reference-unit value of 1 red (commercial yield)
    pub red: Decimal,

    /// Reference-unit value of 1 blue (educational yield)
    pub blue: Decimal,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            psc: Decimal::ONE,
            yellow: Decimal::new(1, 1), // 0.1
            red: Decimal::new(2, 1),    // 0.2
            blue: Decimal::new(3, 1),   // 0.3
        }
    }
}

impl RateTable {
    /// Rate for an asset; IRR is the reference unit itself
    pub fn rate_of(&self, asset: Asset) -> Decimal {
        match asset {
            Asset::Psc => self.psc,
            Asset::Irr => Decimal::ONE,
            Asset::Yellow => self.yellow,
            Asset::Red => self.red,
            Asset::Blue => self.blue,
        }
    }
}

/// Default minimum-price percentages by age bracket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloorConfig {
    /// Floor for verified adult users (percent)
    pub public_pct: Decimal,

    /// Floor for minors (percent)
    pub minor_pct: Decimal,
}

impl Default for FloorConfig {
    fn default() -> Self {
        Self {
            public_pct: Decimal::from(80),
            minor_pct: Decimal::from(110),
        }
    }
}

impl FloorConfig {
    /// Default floor for a bracket
    pub fn default_for(&self, bracket: parcel_core::AgeBracket) -> Decimal {
        match bracket {
            parcel_core::AgeBracket::Adult => self.public_pct,
            parcel_core::AgeBracket::Minor => self.minor_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parcel_core::AgeBracket;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.cooldown_hours, 24);
        assert_eq!(config.grace_days_max, 30);
        assert_eq!(config.floors.default_for(AgeBracket::Adult), Decimal::from(80));
        assert_eq!(config.floors.default_for(AgeBracket::Minor), Decimal::from(110));
    }

    #[test]
    fn test_default_rates_follow_class_coefficients() {
        let rates = RateTable::default();
        assert_eq!(rates.rate_of(Asset::Yellow).to_string(), "0.1");
        assert_eq!(rates.rate_of(Asset::Red).to_string(), "0.2");
        assert_eq!(rates.rate_of(Asset::Blue).to_string(), "0.3");
        assert_eq!(rates.rate_of(Asset::Irr), Decimal::ONE);
    }
}
