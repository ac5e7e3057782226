use std::io::{self, Write};

use crate::replacement::{
    AccessContext, DynamicRrip, LineSnapshot, RandomEviction, ReplacementPolicy, TrueLru,
};

/// Access type codes as they appear in trace records: 0 instruction fetch,
/// 1 load, 2 store, 3 writeback. The replacement policies treat the type as
/// opaque; the cache itself only interprets stores, to maintain dirty bits.
pub const ACCESS_STORE: u32 = 2;

/// A generic trait for the cache model
///
/// Technically not required as we're using static dispatch instead of dyn, but
/// it keeps the surface the simulator relies on in one place with no overhead
pub trait CacheModel {
    /// Converts an address into a set index and a tag.
    ///
    /// The set index can be used directly to index the sets; the tag is the
    /// address stripped of its set and line-offset bits.
    ///
    /// # Arguments
    ///
    /// * `address`: The physical address being accessed
    ///
    /// returns: (u64, u64)
    fn address_to_set_and_tag(&self, address: u64) -> (u64, u64);

    /// Performs one access, returning true on a hit and false otherwise.
    ///
    /// On both hits and misses the replacement policy is kept up to date. On a
    /// miss the lowest-indexed invalid way is filled first; only a full set
    /// consults the policy for a victim, and a bypass decision leaves the set
    /// untouched.
    ///
    /// # Arguments
    ///
    /// * `ctx`: The access to perform, including the physical address
    ///
    /// returns: bool
    fn access(&mut self, ctx: &AccessContext) -> bool;

    /// Gets the number of lines never filled. Useful for analysing cache
    /// utilisation or debugging
    fn uninitialised_line_count(&self) -> usize;

    /// Writes the replacement-policy statistics to the given sink
    fn print_stats(&self, out: &mut dyn Write) -> io::Result<()>;
}

#[derive(Clone, Default)]
struct CacheLine {
    tag: u64,
    valid: bool,
    dirty: bool,
}

/// A set-associative tag store, parameterised by a replacement policy
///
/// One solid implementation which is easy to extend with more replacement
/// policies without compromising on performance: monomorphisation and inlining
/// of the policy functions get close to what specialised implementations for
/// each policy would achieve
pub struct Cache<R: ReplacementPolicy> {
    set_mask: u64,
    alignment_bits: u8,
    set_bits: u8,
    associativity: usize,
    lines: Vec<CacheLine>,
    policy: R,
}

impl<R: ReplacementPolicy> Cache<R> {
    /// Creates a cache with the given geometry. Both `line_size` and
    /// `num_sets` must be powers of two for the mask-based address decode;
    /// the configuration layer validates this before construction.
    pub fn new(line_size: u64, num_sets: usize, associativity: usize, policy: R) -> Self {
        let alignment_bits = line_size.trailing_zeros() as u8;
        let set_bits = num_sets.trailing_zeros() as u8;
        Self {
            set_mask: num_sets as u64 - 1,
            alignment_bits,
            set_bits,
            associativity,
            lines: vec![CacheLine::default(); num_sets * associativity],
            policy,
        }
    }

    fn find_invalid(&self, set: usize) -> Option<usize> {
        let base = set * self.associativity;
        (0..self.associativity).find(|way| !self.lines[base + way].valid)
    }
}

impl<R: ReplacementPolicy> CacheModel for Cache<R> {
    fn address_to_set_and_tag(&self, address: u64) -> (u64, u64) {
        (
            (address >> self.alignment_bits) & self.set_mask,
            address >> (self.alignment_bits + self.set_bits),
        )
    }

    fn access(&mut self, ctx: &AccessContext) -> bool {
        let (set, tag) = self.address_to_set_and_tag(ctx.paddr);
        let set = set as usize;
        let base = set * self.associativity;
        // Only search the relevant set
        for way in 0..self.associativity {
            let index = base + way;
            if self.lines[index].valid && self.lines[index].tag == tag {
                if ctx.access_type == ACCESS_STORE {
                    self.lines[index].dirty = true;
                }
                let snapshot = LineSnapshot {
                    tag,
                    dirty: self.lines[index].dirty,
                };
                self.policy.update_on_access(set, way, true, &snapshot, ctx);
                return true;
            }
        }
        // Miss: fill an invalid way first, otherwise ask the policy
        let way = match self.find_invalid(set) {
            Some(way) => way,
            None => match self.policy.select_victim(set, ctx) {
                Some(way) => way,
                // Bypass: the line is not inserted and no state changes
                None => return false,
            },
        };
        let dirty = ctx.access_type == ACCESS_STORE;
        self.lines[base + way] = CacheLine {
            tag,
            valid: true,
            dirty,
        };
        let snapshot = LineSnapshot { tag, dirty };
        self.policy.update_on_access(set, way, false, &snapshot, ctx);
        false
    }

    fn uninitialised_line_count(&self) -> usize {
        self.lines.iter().filter(|line| !line.valid).count()
    }

    fn print_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        self.policy.print_stats(out)
    }
}

/// Enum over the three cache flavours provided by the library
///
/// Trait objects would reduce boilerplate here, but they are opaque to the
/// compiler, and we would be de-referencing once per trace record. Branching
/// on concrete types keeps the policy functions inlinable
pub enum GenericCache {
    Lru(Cache<TrueLru>),
    Random(Cache<RandomEviction>),
    Contestant(Cache<DynamicRrip>),
}

impl From<Cache<TrueLru>> for GenericCache {
    fn from(value: Cache<TrueLru>) -> Self {
        Self::Lru(value)
    }
}

impl From<Cache<RandomEviction>> for GenericCache {
    fn from(value: Cache<RandomEviction>) -> Self {
        Self::Random(value)
    }
}

impl From<Cache<DynamicRrip>> for GenericCache {
    fn from(value: Cache<DynamicRrip>) -> Self {
        Self::Contestant(value)
    }
}

impl CacheModel for GenericCache {
    fn address_to_set_and_tag(&self, address: u64) -> (u64, u64) {
        match self {
            GenericCache::Lru(c) => c.address_to_set_and_tag(address),
            GenericCache::Random(c) => c.address_to_set_and_tag(address),
            GenericCache::Contestant(c) => c.address_to_set_and_tag(address),
        }
    }

    fn access(&mut self, ctx: &AccessContext) -> bool {
        match self {
            GenericCache::Lru(c) => c.access(ctx),
            GenericCache::Random(c) => c.access(ctx),
            GenericCache::Contestant(c) => c.access(ctx),
        }
    }

    fn uninitialised_line_count(&self) -> usize {
        match self {
            GenericCache::Lru(c) => c.uninitialised_line_count(),
            GenericCache::Random(c) => c.uninitialised_line_count(),
            GenericCache::Contestant(c) => c.uninitialised_line_count(),
        }
    }

    fn print_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        match self {
            GenericCache::Lru(c) => c.print_stats(out),
            GenericCache::Random(c) => c.print_stats(out),
            GenericCache::Contestant(c) => c.print_stats(out),
        }
    }
}
