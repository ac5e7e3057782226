use std::io::{self, Write};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Number of distinct re-reference prediction values. Two bits per line, so
/// predictions range over `0..RRIP_MAX`, with `RRIP_MAX - 1` meaning a distant
/// re-reference (the preferred eviction candidate).
pub const RRIP_MAX: u8 = 4;

/// Number of leader sets dedicated to each of the two duelling insertion
/// policies.
const LEADER_SETS: usize = 32;

/// Reciprocal of the probability that a bimodal insertion uses the long
/// re-reference interval instead of the distant one.
const EPSILON: u32 = 16;

/// Upper bound of the policy selector counter. The selector saturates at both
/// ends and starts at the midpoint.
pub const PSEL_MAX: u32 = 1024;

/// Request metadata forwarded to the replacement policy on every call.
///
/// The built-in policies decide from the set and way alone, but richer
/// policies can consult the requesting thread, the program counter, and the
/// access type, so the cache forwards all of them unconditionally.
#[derive(Debug, Copy, Clone)]
pub struct AccessContext {
    pub thread_id: u32,
    pub pc: u64,
    pub paddr: u64,
    pub access_type: u32,
}

/// Read-only view of the line that was hit or filled, passed to
/// `update_on_access`. None of the built-in policies consult it.
#[derive(Debug, Copy, Clone)]
pub struct LineSnapshot {
    pub tag: u64,
    pub dirty: bool,
}

/// A generic trait for implementing replacement policies. Used to parameterise
/// a Cache.
///
/// The cache calls `select_victim` on a miss once the set is full, then
/// `update_on_access` for every access, hit or miss, with the way that was hit
/// or filled. Implementations own all of their per-line state; nothing is
/// shared between policy instances, so separate caches stay independent.
pub trait ReplacementPolicy {
    /// Chooses the way to evict from a full set.
    ///
    /// Returning `None` asks the cache to bypass: the fetched line is not
    /// inserted and no state changes. The built-in policies never bypass.
    ///
    /// # Arguments
    ///
    /// * `set`: The index of the set needing an eviction
    /// * `ctx`: The access that caused the miss
    ///
    /// returns: Option<usize>
    fn select_victim(&mut self, set: usize, ctx: &AccessContext) -> Option<usize>;

    /// Updates per-line bookkeeping after an access.
    ///
    /// Called on every hit with the way that matched, and on every miss with
    /// the way that was filled, after `select_victim`.
    ///
    /// # Arguments
    ///
    /// * `set`: The index of the accessed set
    /// * `way`: The way that was hit or filled
    /// * `hit`: Whether the access hit in the cache
    /// * `line`: A read-only view of the hit or filled line
    /// * `ctx`: The access being recorded
    ///
    /// returns: ()
    fn update_on_access(
        &mut self,
        set: usize,
        way: usize,
        hit: bool,
        line: &LineSnapshot,
        ctx: &AccessContext,
    );

    /// Writes the statistics banner followed by any policy-specific counters.
    fn print_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        write_stats_banner(out)
    }
}

fn write_stats_banner(out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "==========================================================")?;
    writeln!(out, "=========== Replacement Policy Statistics ================")?;
    writeln!(out, "==========================================================")
}

fn check_geometry(num_sets: usize, associativity: usize) -> Result<(), String> {
    if num_sets == 0 {
        return Err("a cache needs at least one set".to_string());
    }
    if associativity == 0 {
        return Err("a cache needs at least one way per set".to_string());
    }
    Ok(())
}

/// True least-recently-used replacement.
///
/// Each line carries its position in a per-set recency stack: position 0 is
/// the most recently used line, position `associativity - 1` the least. The
/// positions within a set are always a permutation of `0..associativity`, and
/// the victim is the line at the bottom of the stack.
pub struct TrueLru {
    num_sets: usize,
    associativity: usize,
    // Flat table of stack positions, indexed by set * associativity + way
    stack_positions: Vec<u32>,
}

impl TrueLru {
    pub fn new(num_sets: usize, associativity: usize) -> Result<Self, String> {
        check_geometry(num_sets, associativity)?;
        let mut stack_positions = vec![0u32; num_sets * associativity];
        for set in 0..num_sets {
            for way in 0..associativity {
                // Way 0 starts most recently used, the last way starts least
                stack_positions[set * associativity + way] = way as u32;
            }
        }
        Ok(Self {
            num_sets,
            associativity,
            stack_positions,
        })
    }

    #[cfg(test)]
    pub(crate) fn stack_position(&self, set: usize, way: usize) -> u32 {
        self.stack_positions[set * self.associativity + way]
    }
}

impl ReplacementPolicy for TrueLru {
    fn select_victim(&mut self, set: usize, _ctx: &AccessContext) -> Option<usize> {
        assert!(set < self.num_sets, "set index {set} out of range");
        let base = set * self.associativity;
        let bottom = (self.associativity - 1) as u32;
        for way in 0..self.associativity {
            if self.stack_positions[base + way] == bottom {
                return Some(way);
            }
        }
        unreachable!("recency stack lost its bottom entry");
    }

    fn update_on_access(
        &mut self,
        set: usize,
        way: usize,
        _hit: bool,
        _line: &LineSnapshot,
        _ctx: &AccessContext,
    ) {
        assert!(set < self.num_sets, "set index {set} out of range");
        assert!(way < self.associativity, "way index {way} out of range");
        let base = set * self.associativity;
        let touched = self.stack_positions[base + way];
        // Everything more recent than the touched line moves one step towards
        // the bottom, then the touched line becomes the most recent. A fill is
        // a touch of the new way, so hits and misses are treated the same.
        for other in 0..self.associativity {
            if self.stack_positions[base + other] < touched {
                self.stack_positions[base + other] += 1;
            }
        }
        self.stack_positions[base + way] = 0;
    }
}

/// Uniform random replacement.
///
/// No per-line state at all; eviction draws from an engine-owned seedable
/// generator so runs are reproducible and separate caches are independent.
pub struct RandomEviction {
    num_sets: usize,
    associativity: usize,
    rng: ChaCha8Rng,
}

impl RandomEviction {
    pub fn new(num_sets: usize, associativity: usize, seed: u64) -> Result<Self, String> {
        check_geometry(num_sets, associativity)?;
        Ok(Self {
            num_sets,
            associativity,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }
}

impl ReplacementPolicy for RandomEviction {
    fn select_victim(&mut self, set: usize, _ctx: &AccessContext) -> Option<usize> {
        assert!(set < self.num_sets, "set index {set} out of range");
        Some(self.rng.next_u32() as usize % self.associativity)
    }

    fn update_on_access(
        &mut self,
        set: usize,
        way: usize,
        _hit: bool,
        _line: &LineSnapshot,
        _ctx: &AccessContext,
    ) {
        // Random replacement keeps no bookkeeping
        assert!(set < self.num_sets, "set index {set} out of range");
        assert!(way < self.associativity, "way index {way} out of range");
    }
}

/// Which role a set plays in the duel between the two insertion policies.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SetRole {
    SrripLeader,
    BrripLeader,
    Follower,
}

/// Leaders are spread across the cache with two coprime strides so the two
/// populations never collide on power-of-two set counts. A set matching both
/// predicates counts as an SRRIP leader.
fn classify(set: usize) -> SetRole {
    if set % 33 == 0 && set < 33 * LEADER_SETS {
        SetRole::SrripLeader
    } else if set % 31 == 0 && set > 0 && set <= 31 * LEADER_SETS {
        SetRole::BrripLeader
    } else {
        SetRole::Follower
    }
}

/// Dynamic re-reference interval prediction (DRRIP).
///
/// Every line carries a two-bit re-reference prediction value; the victim is
/// the lowest-indexed way predicted for a distant re-reference, ageing the
/// whole set when none qualifies. Insertion duels two policies: SRRIP always
/// inserts with the long interval, BRRIP mostly inserts with the distant one.
/// A few leader sets are pinned to one policy each, and the saturating policy
/// selector counts their comparative misses; every other set follows whichever
/// side the selector favours.
pub struct DynamicRrip {
    num_sets: usize,
    associativity: usize,
    // Flat table of predictions, indexed by set * associativity + way
    rrpv: Vec<u8>,
    /// Saturating selector in `0..=PSEL_MAX`. At or above the midpoint the
    /// static insertion is applied to followers, below it the bimodal one.
    psel: u32,
    /// When set, hits decay the prediction by one instead of resetting it to
    /// zero, favouring frequently re-used lines over recently used ones.
    frequency_promotion: bool,
    rng: ChaCha8Rng,
    // Miss accounting, reported by print_stats
    srrip_leader_misses: u64,
    brrip_leader_misses: u64,
    srrip_follower_misses: u64,
    brrip_follower_misses: u64,
}

impl DynamicRrip {
    pub fn new(
        num_sets: usize,
        associativity: usize,
        seed: u64,
        frequency_promotion: bool,
    ) -> Result<Self, String> {
        check_geometry(num_sets, associativity)?;
        Ok(Self {
            num_sets,
            associativity,
            // Untouched lines start distant, so they are evicted first
            rrpv: vec![RRIP_MAX - 1; num_sets * associativity],
            psel: PSEL_MAX / 2,
            frequency_promotion,
            rng: ChaCha8Rng::seed_from_u64(seed),
            srrip_leader_misses: 0,
            brrip_leader_misses: 0,
            srrip_follower_misses: 0,
            brrip_follower_misses: 0,
        })
    }

    fn promote_on_hit(&mut self, index: usize) {
        if self.frequency_promotion {
            if self.rrpv[index] > 0 {
                self.rrpv[index] -= 1;
            }
        } else {
            self.rrpv[index] = 0;
        }
    }

    fn update_srrip(&mut self, index: usize, hit: bool) {
        if hit {
            self.promote_on_hit(index);
        } else {
            // Static insertion: always the long re-reference interval
            self.rrpv[index] = RRIP_MAX - 2;
        }
    }

    fn update_brrip(&mut self, index: usize, hit: bool) {
        if hit {
            self.promote_on_hit(index);
        } else if self.rng.next_u32() % EPSILON == EPSILON - 1 {
            // Bimodal insertion: occasionally long
            self.rrpv[index] = RRIP_MAX - 2;
        } else {
            // but mostly distant, which keeps a thrashing working set from
            // flushing the whole cache
            self.rrpv[index] = RRIP_MAX - 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn psel(&self) -> u32 {
        self.psel
    }

    #[cfg(test)]
    pub(crate) fn force_psel(&mut self, value: u32) {
        assert!(value <= PSEL_MAX);
        self.psel = value;
    }

    #[cfg(test)]
    pub(crate) fn rrpv(&self, set: usize, way: usize) -> u8 {
        self.rrpv[set * self.associativity + way]
    }
}

impl ReplacementPolicy for DynamicRrip {
    fn select_victim(&mut self, set: usize, _ctx: &AccessContext) -> Option<usize> {
        assert!(set < self.num_sets, "set index {set} out of range");
        let base = set * self.associativity;
        // Age the whole set until a distant line appears. Ageing only runs
        // when every prediction is below the maximum, so values never leave
        // 0..RRIP_MAX and the loop resolves within RRIP_MAX - 1 passes.
        loop {
            for way in 0..self.associativity {
                if self.rrpv[base + way] == RRIP_MAX - 1 {
                    return Some(way);
                }
            }
            for way in 0..self.associativity {
                self.rrpv[base + way] += 1;
            }
        }
    }

    fn update_on_access(
        &mut self,
        set: usize,
        way: usize,
        hit: bool,
        _line: &LineSnapshot,
        _ctx: &AccessContext,
    ) {
        assert!(set < self.num_sets, "set index {set} out of range");
        assert!(way < self.associativity, "way index {way} out of range");
        let index = set * self.associativity + way;
        match classify(set) {
            SetRole::SrripLeader => {
                self.update_srrip(index, hit);
                if !hit {
                    // A miss on a static leader is a vote towards the bimodal
                    // side of the selector
                    if self.psel > 0 {
                        self.psel -= 1;
                    }
                    self.srrip_leader_misses += 1;
                }
            }
            SetRole::BrripLeader => {
                self.update_brrip(index, hit);
                if !hit {
                    if self.psel < PSEL_MAX {
                        self.psel += 1;
                    }
                    self.brrip_leader_misses += 1;
                }
            }
            SetRole::Follower => {
                // The midpoint goes to the static policy
                if self.psel >= PSEL_MAX / 2 {
                    self.update_srrip(index, hit);
                    if !hit {
                        self.srrip_follower_misses += 1;
                    }
                } else {
                    self.update_brrip(index, hit);
                    if !hit {
                        self.brrip_follower_misses += 1;
                    }
                }
            }
        }
    }

    fn print_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        write_stats_banner(out)?;
        writeln!(out, "policy selector: {} / {}", self.psel, PSEL_MAX)?;
        writeln!(
            out,
            "leader misses:   srrip={} brrip={}",
            self.srrip_leader_misses, self.brrip_leader_misses
        )?;
        writeln!(
            out,
            "follower misses: srrip={} brrip={}",
            self.srrip_follower_misses, self.brrip_follower_misses
        )
    }
}
