//! Allocator configuration parameters.
//!
//! [`AllocatorConfig`] is chosen once at construction and is immutable
//! afterwards. Benchmarks and embedding applications can also build it
//! from a compact option string, see [`AllocatorConfig::from_options`].

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::region::Region;

/// Placement policy of the free-list strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fit {
    /// Lowest-addressed free block that can hold the request.
    #[default]
    First,
    /// Free block leaving the smallest remainder; ties go to the lowest address.
    Best,
}

/// Allocation strategy selected at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StrategyKind {
    /// Monotonic cursor; memory comes back only on `reset()`.
    Bump,
    /// Ordered free blocks with coalescing on free.
    FreeList {
        /// How a free block is chosen.
        fit: Fit,
    },
    /// Power-of-two slot pools backed by a free-list.
    Pooled {
        /// Smallest slot size in bytes.
        min_class: usize,
        /// Largest slot size in bytes. Larger requests go to the backing free-list.
        max_class: usize,
    },
}

impl StrategyKind {
    /// Pooled strategy with the default class range.
    pub fn pooled() -> Self {
        Self::Pooled {
            min_class: AllocatorConfig::DEFAULT_MIN_CLASS,
            max_class: AllocatorConfig::DEFAULT_MAX_CLASS,
        }
    }
}

impl Default for StrategyKind {
    fn default() -> Self {
        Self::FreeList { fit: Fit::First }
    }
}

/// What happens when the strategy cannot place a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Growth {
    /// Fail with `OutOfMemory`.
    #[default]
    Fixed,
    /// Acquire one more region doubling the backing capacity, then retry once.
    Growable,
}

/// How `free` reports caller misuse (`DoubleFree`, `ForeignSpan`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MisusePolicy {
    /// Return the error to the caller and log it at `warn`.
    ///
    /// This is the default in every build profile, so a double free or a
    /// foreign span is an ordinary `Err` that callers and tests can match on
    /// whether or not debug assertions are enabled. Choose [`Panic`](Self::Panic)
    /// for debug runs that should stop at the first misuse.
    #[default]
    Report,
    /// Panic at the point of misuse.
    Panic,
    /// Accept stale and foreign frees as no-ops without touching the ledger.
    Trust,
}

/// Configuration for an [`Allocator`](crate::allocator::Allocator) or
/// [`Arena`](crate::arena::Arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Placement strategy.
    pub strategy: StrategyKind,
    /// Behaviour on exhaustion.
    pub growth: Growth,
    /// Capacity of the first region in bytes. Default: 64 KiB.
    pub region_size: usize,
    /// Misuse reporting policy.
    pub misuse: MisusePolicy,
}

impl AllocatorConfig {
    /// Default region size: 64 KiB.
    pub const DEFAULT_REGION_SIZE: usize = 64 * 1024;

    /// Default smallest pool class.
    pub const DEFAULT_MIN_CLASS: usize = 16;

    /// Default largest pool class.
    pub const DEFAULT_MAX_CLASS: usize = 4096;

    /// Config with the given strategy and default values elsewhere.
    pub fn new(strategy: StrategyKind) -> Self {
        Self {
            strategy,
            growth: Growth::Fixed,
            region_size: Self::DEFAULT_REGION_SIZE,
            misuse: MisusePolicy::Report,
        }
    }

    /// Set the growth policy.
    pub fn with_growth(mut self, growth: Growth) -> Self {
        self.growth = growth;
        self
    }

    /// Set the first region's size.
    pub fn with_region_size(mut self, region_size: usize) -> Self {
        self.region_size = region_size;
        self
    }

    /// Set the misuse policy.
    pub fn with_misuse(mut self, misuse: MisusePolicy) -> Self {
        self.misuse = misuse;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_size == 0 || self.region_size > Region::MAX_CAPACITY {
            return Err(ConfigError::RegionSize {
                configured: self.region_size,
            });
        }
        if let StrategyKind::Pooled {
            min_class,
            max_class,
        } = self.strategy
        {
            for class in [min_class, max_class] {
                if !class.is_power_of_two() {
                    return Err(ConfigError::ClassNotPowerOfTwo { class });
                }
            }
            if min_class > max_class || max_class > self.region_size {
                return Err(ConfigError::ClassRange {
                    min: min_class,
                    max: max_class,
                    region_size: self.region_size,
                });
            }
        }
        Ok(())
    }

    /// Parse a comma-separated `key=value` option string.
    ///
    /// Recognised keys: `strategy` (`bump`, `freelist`, `pooled`), `fit`
    /// (`first`, `best`), `growth` (`fixed`, `growable`), `region_size`
    /// (bytes, optional `k`/`m` suffix), `min_class`, `max_class`, `misuse`
    /// (`report`, `panic`, `trust`). Unset keys keep their defaults. The
    /// result is validated.
    ///
    /// ```
    /// use memutils_core::config::{AllocatorConfig, Growth, StrategyKind};
    ///
    /// let config = AllocatorConfig::from_options("strategy=bump,growth=growable,region_size=4k").unwrap();
    /// assert_eq!(config.strategy, StrategyKind::Bump);
    /// assert_eq!(config.growth, Growth::Growable);
    /// assert_eq!(config.region_size, 4096);
    /// ```
    pub fn from_options(options: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut fit: Option<Fit> = None;
        let mut min_class: Option<usize> = None;
        let mut max_class: Option<usize> = None;

        for pair in options.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
                key: pair.to_string(),
                value: String::new(),
            })?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "strategy" => config.strategy = value.parse()?,
                "fit" => fit = Some(value.parse()?),
                "growth" => config.growth = value.parse()?,
                "misuse" => config.misuse = value.parse()?,
                "region_size" => config.region_size = parse_bytes(key, value)?,
                "min_class" => min_class = Some(parse_bytes(key, value)?),
                "max_class" => max_class = Some(parse_bytes(key, value)?),
                _ => {
                    return Err(ConfigError::UnknownOption {
                        key: key.to_string(),
                    })
                }
            }
        }

        match &mut config.strategy {
            StrategyKind::FreeList { fit: f } => {
                if let Some(fit) = fit {
                    *f = fit;
                }
            }
            StrategyKind::Pooled {
                min_class: lo,
                max_class: hi,
            } => {
                *lo = min_class.unwrap_or(*lo);
                *hi = max_class.unwrap_or(*hi);
            }
            StrategyKind::Bump => {}
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new(StrategyKind::default())
    }
}

fn parse_bytes(key: &str, value: &str) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    };
    let lower = value.to_ascii_lowercase();
    let (digits, scale) = match lower.as_bytes().last() {
        Some(b'k') => (&lower[..lower.len() - 1], 1024),
        Some(b'm') => (&lower[..lower.len() - 1], 1024 * 1024),
        _ => (lower.as_str(), 1),
    };
    digits
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .ok_or_else(invalid)
}

// ── FromStr / Display ──────────────────────────────────────────────

impl FromStr for StrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bump" => Ok(Self::Bump),
            "freelist" | "free-list" => Ok(Self::FreeList { fit: Fit::First }),
            "pooled" | "pool" => Ok(Self::pooled()),
            _ => Err(ConfigError::InvalidValue {
                key: "strategy".into(),
                value: s.into(),
            }),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bump => write!(f, "bump"),
            Self::FreeList { fit } => write!(f, "freelist({fit})"),
            Self::Pooled {
                min_class,
                max_class,
            } => write!(f, "pooled({min_class}..={max_class})"),
        }
    }
}

impl FromStr for Fit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "first-fit" => Ok(Self::First),
            "best" | "best-fit" => Ok(Self::Best),
            _ => Err(ConfigError::InvalidValue {
                key: "fit".into(),
                value: s.into(),
            }),
        }
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first-fit"),
            Self::Best => write!(f, "best-fit"),
        }
    }
}

impl FromStr for Growth {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "growable" => Ok(Self::Growable),
            _ => Err(ConfigError::InvalidValue {
                key: "growth".into(),
                value: s.into(),
            }),
        }
    }
}

impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Growable => write!(f, "growable"),
        }
    }
}

impl FromStr for MisusePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" => Ok(Self::Report),
            "panic" => Ok(Self::Panic),
            "trust" => Ok(Self::Trust),
            _ => Err(ConfigError::InvalidValue {
                key: "misuse".into(),
                value: s.into(),
            }),
        }
    }
}

impl fmt::Display for MisusePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report => write!(f, "report"),
            Self::Panic => write!(f, "panic"),
            Self::Trust => write!(f, "trust"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = AllocatorConfig::default();
        assert_eq!(config.region_size, 64 * 1024);
        assert_eq!(config.strategy, StrategyKind::FreeList { fit: Fit::First });
        assert_eq!(config.misuse, MisusePolicy::Report);
        config.validate().unwrap();
    }

    #[test]
    fn zero_region_size_rejected() {
        let config = AllocatorConfig::new(StrategyKind::Bump).with_region_size(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::RegionSize { configured: 0 })
        );
    }

    #[test]
    fn pool_classes_must_be_powers_of_two() {
        let config = AllocatorConfig::new(StrategyKind::Pooled {
            min_class: 24,
            max_class: 256,
        });
        assert_eq!(
            config.validate(),
            Err(ConfigError::ClassNotPowerOfTwo { class: 24 })
        );
    }

    #[test]
    fn pool_max_class_must_fit_region() {
        let config = AllocatorConfig::new(StrategyKind::Pooled {
            min_class: 16,
            max_class: 8192,
        })
        .with_region_size(4096);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ClassRange { .. })
        ));
    }

    #[test]
    fn options_parse_all_keys() {
        let config = AllocatorConfig::from_options(
            "strategy=pooled, growth=growable, region_size=1m, min_class=32, max_class=1k, misuse=trust",
        )
        .unwrap();
        assert_eq!(
            config.strategy,
            StrategyKind::Pooled {
                min_class: 32,
                max_class: 1024
            }
        );
        assert_eq!(config.growth, Growth::Growable);
        assert_eq!(config.region_size, 1024 * 1024);
        assert_eq!(config.misuse, MisusePolicy::Trust);
    }

    #[test]
    fn options_fit_applies_to_freelist() {
        let config = AllocatorConfig::from_options("strategy=freelist,fit=best").unwrap();
        assert_eq!(config.strategy, StrategyKind::FreeList { fit: Fit::Best });
    }

    #[test]
    fn options_reject_unknown_key() {
        let err = AllocatorConfig::from_options("colour=blue").unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownOption {
                key: "colour".into()
            }
        );
    }

    #[test]
    fn options_reject_bad_number() {
        let err = AllocatorConfig::from_options("region_size=lots").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn empty_options_yield_default() {
        assert_eq!(
            AllocatorConfig::from_options("").unwrap(),
            AllocatorConfig::default()
        );
    }

    #[test]
    fn strategy_display_round_trips_through_name() {
        assert_eq!(StrategyKind::Bump.to_string(), "bump");
        assert_eq!("growable".parse::<Growth>().unwrap(), Growth::Growable);
        assert_eq!("best-fit".parse::<Fit>().unwrap(), Fit::Best);
    }
}
