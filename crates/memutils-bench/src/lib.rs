//! Benchmark profiles and utilities for the memutils allocators.
//!
//! - [`default_profiles`]: one profile per strategy, built from option strings
//! - [`selected_profiles`]: the defaults, or a single profile taken from
//!   the [`PROFILE_ENV`] environment variable
//! - [`size_sequence`]: deterministic request sizes via seed
//! - [`init_tracing`]: opt-in log output controlled by `RUST_LOG`

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use memutils_core::{AllocatorConfig, ConfigError};

/// Environment variable holding an option string that replaces the default
/// profiles, e.g. `strategy=pooled,growth=growable,region_size=1m`.
pub const PROFILE_ENV: &str = "MEMUTILS_BENCH_PROFILE";

/// Option strings of the default profiles, by name.
const DEFAULT_OPTIONS: &[(&str, &str)] = &[
    ("bump", "strategy=bump,region_size=1m"),
    ("freelist_first", "strategy=freelist,fit=first,region_size=1m"),
    ("freelist_best", "strategy=freelist,fit=best,region_size=1m"),
    ("pooled", "strategy=pooled,min_class=16,max_class=4k,region_size=1m"),
];

/// A named allocator configuration to benchmark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    /// Label used in benchmark ids.
    pub name: String,
    /// Configuration handed to the allocator under test.
    pub config: AllocatorConfig,
}

impl Profile {
    /// Build a profile from an option string.
    pub fn parse(name: &str, options: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.to_string(),
            config: AllocatorConfig::from_options(options)?,
        })
    }
}

/// One profile per strategy, each with a 1 MiB fixed region.
pub fn default_profiles() -> Result<Vec<Profile>, ConfigError> {
    DEFAULT_OPTIONS
        .iter()
        .map(|(name, options)| Profile::parse(name, options))
        .collect()
}

/// Profiles for this run: the single profile in [`PROFILE_ENV`] if set,
/// otherwise [`default_profiles`].
pub fn selected_profiles() -> Result<Vec<Profile>, ConfigError> {
    match std::env::var(PROFILE_ENV) {
        Ok(options) => Ok(vec![Profile::parse("env", &options)?]),
        Err(_) => default_profiles(),
    }
}

/// Generate `n` deterministic request sizes in `1..=max`.
///
/// Sizes are skewed towards small requests: three out of four fall in the
/// lowest eighth of the range, which is the mix pooled allocators target.
pub fn size_sequence(n: usize, max: usize, seed: u64) -> Vec<usize> {
    let max = max.max(1);
    let small = (max / 8).max(1);
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let r = (state >> 33) as usize;
            let bound = if r % 4 == 0 { max } else { small };
            1 + r % bound
        })
        .collect()
}

/// Install a formatting subscriber when `RUST_LOG` is set.
///
/// Benchmarks stay silent by default; `RUST_LOG=memutils_core=debug` shows
/// region acquisition and growth. Calling this more than once is harmless.
pub fn init_tracing() {
    if std::env::var_os("RUST_LOG").is_none() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("bench tracing enabled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use memutils_core::{Growth, StrategyKind};

    #[test]
    fn default_profiles_validate() {
        let profiles = default_profiles().unwrap();
        assert_eq!(profiles.len(), 4);
        for p in &profiles {
            assert_eq!(p.config.region_size, 1 << 20);
            p.config.validate().unwrap();
        }
        assert_eq!(profiles[0].config.strategy, StrategyKind::Bump);
    }

    #[test]
    fn profile_parse_reports_bad_options() {
        assert!(Profile::parse("bad", "strategy=slab").is_err());
        let p = Profile::parse("grow", "growth=growable").unwrap();
        assert_eq!(p.config.growth, Growth::Growable);
    }

    #[test]
    fn size_sequence_is_bounded() {
        let sizes = size_sequence(1000, 512, 7);
        assert_eq!(sizes.len(), 1000);
        assert!(sizes.iter().all(|&s| (1..=512).contains(&s)));
        let small = sizes.iter().filter(|&&s| s <= 64).count();
        assert!(small > 500, "expected a small-request skew, got {small}");
    }

    #[test]
    fn size_sequence_deterministic() {
        assert_eq!(size_sequence(50, 100, 42), size_sequence(50, 100, 42));
        assert_ne!(size_sequence(50, 100, 42), size_sequence(50, 100, 43));
    }
}
