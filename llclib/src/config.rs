use serde::Deserialize;

/// Configuration for a single simulated last-level cache
#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    pub name: String,
    pub line_size: u64,
    pub num_sets: usize,
    pub associativity: usize,
    #[serde(default = "ReplacementPolicyConfig::default")]
    pub policy: ReplacementPolicyConfig,
    /// Seed for the engine-owned generator used by the random and bimodal
    /// policies. Fixing it makes a run reproducible.
    #[serde(default)]
    pub seed: u64,
    /// Promote hits by decaying the re-reference prediction instead of
    /// resetting it to zero. Only meaningful for the contestant policy.
    #[serde(default)]
    pub frequency_promotion: bool,
}

/// The replacement policy - lru, random, or contestant. Defaults to lru.
#[derive(Debug, Copy, Clone, Deserialize)]
pub enum ReplacementPolicyConfig {
    #[serde(alias = "lru")]
    Lru,
    #[serde(alias = "random")]
    Random,
    #[serde(alias = "contestant", alias = "drrip")]
    Contestant,
}

impl Default for ReplacementPolicyConfig {
    fn default() -> Self {
        ReplacementPolicyConfig::Lru
    }
}

impl CacheConfig {
    /// Checks the geometry constraints the mask-based address decode relies
    /// on. The replacement engine itself only rejects zero-sized geometry.
    pub fn validate(&self) -> Result<(), String> {
        if self.num_sets == 0 || !self.num_sets.is_power_of_two() {
            return Err(format!(
                "num_sets must be a non-zero power of two, got {}",
                self.num_sets
            ));
        }
        if self.line_size == 0 || !self.line_size.is_power_of_two() {
            return Err(format!(
                "line_size must be a non-zero power of two, got {}",
                self.line_size
            ));
        }
        if self.associativity < 2 {
            return Err(format!(
                "associativity must be at least 2, got {}",
                self.associativity
            ));
        }
        Ok(())
    }
}
