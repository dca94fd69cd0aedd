use serde::{Deserialize, Serialize};

use common::{Error, InstrumentMeta, Result};

/// Top-level strategy config file (TOML).
///
/// Example `config/strategies.toml`:
/// ```toml
/// [[strategy]]
/// name = "EURUSD MACD pullback"
/// symbol = "EURUSD"
/// tag = 240517
/// atr_period = 14
/// sl_multiplier = 1.5
/// reward_ratio = 2.0
/// macd_fast = 12
/// macd_slow = 26
/// macd_signal = 9
/// trend_period = 200
/// risk_percent = 1.0
/// max_slippage_points = 10
///
/// [[instrument]]
/// symbol = "EURUSD"
/// point_size = 0.00001
/// price_digits = 5
/// tick_size = 0.00001
/// tick_value = 1.0
/// volume_min = 0.01
/// volume_max = 100.0
/// volume_step = 0.01
/// min_stop_distance_points = 10
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyFileConfig {
    #[serde(rename = "strategy")]
    pub strategies: Vec<StrategyConfig>,
    /// Instrument specifications for the paper broker.
    #[serde(rename = "instrument", default)]
    pub instruments: Vec<InstrumentSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Human-readable name shown in logs.
    pub name: String,
    /// Instrument this strategy trades, e.g. "EURUSD".
    pub symbol: String,
    /// Identifier stamped on every order; positions carrying it belong to
    /// this strategy.
    pub tag: u64,
    /// ATR lookback.
    pub atr_period: usize,
    /// Stop-loss distance in ATRs.
    pub sl_multiplier: f64,
    /// Take-profit distance as a multiple of the stop-loss distance.
    pub reward_ratio: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Trend filter EMA period.
    pub trend_period: usize,
    /// Percent of equity risked per trade.
    pub risk_percent: f64,
    /// Allowed deviation from the quoted ask at fill, in points.
    pub max_slippage_points: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InstrumentSpec {
    pub symbol: String,
    #[serde(flatten)]
    pub meta: InstrumentMeta,
}

impl StrategyConfig {
    /// Startup-time checks. A strategy that fails here must not run.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(Error::Config(format!("strategy '{}': {msg}", self.name)));

        if self.symbol.trim().is_empty() {
            return fail("symbol must not be empty".into());
        }
        let periods = [
            ("tag", self.tag as usize),
            ("atr_period", self.atr_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("trend_period", self.trend_period),
            ("max_slippage_points", self.max_slippage_points as usize),
        ];
        for (key, value) in periods {
            if value == 0 {
                return fail(format!("{key} must be positive"));
            }
        }
        let ratios = [
            ("sl_multiplier", self.sl_multiplier),
            ("reward_ratio", self.reward_ratio),
            ("risk_percent", self.risk_percent),
        ];
        for (key, value) in ratios {
            if !(value.is_finite() && value > 0.0) {
                return fail(format!("{key} must be positive, got {value}"));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return fail(format!(
                "macd_fast ({}) must be less than macd_slow ({})",
                self.macd_fast, self.macd_slow
            ));
        }
        Ok(())
    }
}

impl StrategyFileConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read strategy config at '{path}': {e}"))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let cfg: StrategyFileConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(Error::Config("no [[strategy]] entries configured".into()));
        }
        for (i, s) in self.strategies.iter().enumerate() {
            s.validate()?;
            if self.strategies[..i].iter().any(|o| o.symbol == s.symbol) {
                return Err(Error::Config(format!(
                    "symbol '{}' is configured more than once",
                    s.symbol
                )));
            }
        }
        Ok(())
    }

    pub fn instrument(&self, symbol: &str) -> Option<&InstrumentMeta> {
        self.instruments
            .iter()
            .find(|i| i.symbol == symbol)
            .map(|i| &i.meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[strategy]]
        name = "EURUSD pullback"
        symbol = "EURUSD"
        tag = 240517
        atr_period = 14
        sl_multiplier = 1.5
        reward_ratio = 2.0
        macd_fast = 12
        macd_slow = 26
        macd_signal = 9
        trend_period = 200
        risk_percent = 1.0
        max_slippage_points = 10

        [[instrument]]
        symbol = "EURUSD"
        point_size = 0.00001
        price_digits = 5
        tick_size = 0.00001
        tick_value = 1.0
        volume_min = 0.01
        volume_max = 100.0
        volume_step = 0.01
        min_stop_distance_points = 10
    "#;

    fn sample() -> StrategyConfig {
        StrategyFileConfig::parse(SAMPLE).unwrap().strategies.remove(0)
    }

    #[test]
    fn parses_sample_file() {
        let file = StrategyFileConfig::parse(SAMPLE).unwrap();
        assert_eq!(file.strategies.len(), 1);
        assert_eq!(file.strategies[0].tag, 240517);
        let meta = file.instrument("EURUSD").unwrap();
        assert_eq!(meta.price_digits, 5);
        assert_eq!(meta.min_stop_distance_points, 10);
        assert!(file.instrument("GBPUSD").is_none());
    }

    #[test]
    fn rejects_fast_not_below_slow() {
        let mut cfg = sample();
        cfg.macd_fast = 26;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("macd_fast"), "{err}");
    }

    #[test]
    fn rejects_non_positive_values() {
        let mut cfg = sample();
        cfg.risk_percent = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.atr_period = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.sl_multiplier = -1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = sample();
        cfg.reward_ratio = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_symbols() {
        let mut file = StrategyFileConfig::parse(SAMPLE).unwrap();
        file.strategies.push(sample());
        assert!(matches!(file.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            StrategyFileConfig::parse("[[strategy]]\nname = 3"),
            Err(Error::Toml(_))
        ));
    }
}
