use std::io::{self, Write};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheModel, GenericCache};
use crate::config::{CacheConfig, ReplacementPolicyConfig};
use crate::hex::HEX_NIBBLE;
use crate::replacement::{AccessContext, DynamicRrip, RandomEviction, TrueLru};

// Trace record layout. Each record is exactly 40 bytes:
// thread id (2 hex), access type (2 hex), PC (16 hex), physical address
// (16 hex), separated by single spaces and terminated by a newline.
const ADDRESS_SIZE: usize = 16;
const TID_OFFSET: usize = 0;
const TYPE_OFFSET: usize = 3;
const PC_OFFSET: usize = 6;
const PC_UPPER: usize = PC_OFFSET + ADDRESS_SIZE;
const ADDRESS_OFFSET: usize = PC_UPPER + 1;
const ADDRESS_UPPER: usize = ADDRESS_OFFSET + ADDRESS_SIZE;
const RECORD_SIZE: usize = ADDRESS_UPPER + 1;

/// The simulator drives a configured cache over a trace and collects results.
///
/// It supports calling simulate multiple times, and will update the time taken
/// to simulate and the results accordingly
pub struct Simulator {
    cache: GenericCache,
    result: SimulationResult,
    simulation_time: Duration,
}

/// The result of a simulation. Can be serialised, and compared against stored
/// expected outputs
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub name: String,
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A cache configuration, usually resulting from parsing JSON
    ///
    /// returns: Result<Simulator, String>
    pub fn new(config: &CacheConfig) -> Result<Self, String> {
        config.validate()?;
        let cache = Self::config_to_cache(config)?;
        Ok(Self {
            cache,
            result: SimulationResult {
                name: config.name.clone(),
                accesses: 0,
                hits: 0,
                misses: 0,
            },
            simulation_time: Duration::new(0, 0),
        })
    }

    /// Simulates the cache over a byte slice of trace records.
    ///
    /// The slice must consist of whole 40-byte records. For speed the field
    /// contents are not validated; debug builds cross-check the hex parsing
    /// against the standard library.
    ///
    /// Note that reads from the byte slice are *guaranteed to be sequential*,
    /// so memory-mapped traces can advise the operating system accordingly.
    ///
    /// # Arguments
    ///
    /// * `bytes`: The input trace bytes
    ///
    /// returns: Result<&SimulationResult, String>
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<&SimulationResult, String> {
        if bytes.len() % RECORD_SIZE != 0 {
            return Err(format!(
                "trace length {} is not a multiple of the {RECORD_SIZE} byte record size",
                bytes.len()
            ));
        }
        let start = Instant::now();
        let mut i = 0;
        while i < bytes.len() {
            // Alias for clarity, no overhead when compiled
            let record = &bytes[i..i + RECORD_SIZE];
            let ctx = AccessContext {
                thread_id: parse_hex_u8((&record[TID_OFFSET..TID_OFFSET + 2]).try_into().unwrap())
                    as u32,
                access_type: parse_hex_u8(
                    (&record[TYPE_OFFSET..TYPE_OFFSET + 2]).try_into().unwrap(),
                ) as u32,
                pc: parse_hex_u64((&record[PC_OFFSET..PC_UPPER]).try_into().unwrap()),
                paddr: parse_hex_u64((&record[ADDRESS_OFFSET..ADDRESS_UPPER]).try_into().unwrap()),
            };
            if self.cache.access(&ctx) {
                self.result.hits += 1;
            } else {
                self.result.misses += 1;
            }
            self.result.accesses += 1;
            i += RECORD_SIZE;
        }
        self.simulation_time += start.elapsed();
        Ok(&self.result)
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of lines never filled
    pub fn uninitialised_line_count(&self) -> usize {
        self.cache.uninitialised_line_count()
    }

    /// Writes the replacement-policy statistics to the given sink
    pub fn print_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        self.cache.print_stats(out)
    }

    /// Creates a new cache from a cache configuration
    fn config_to_cache(config: &CacheConfig) -> Result<GenericCache, String> {
        Ok(match config.policy {
            ReplacementPolicyConfig::Lru => GenericCache::from(Cache::new(
                config.line_size,
                config.num_sets,
                config.associativity,
                TrueLru::new(config.num_sets, config.associativity)?,
            )),
            ReplacementPolicyConfig::Random => GenericCache::from(Cache::new(
                config.line_size,
                config.num_sets,
                config.associativity,
                RandomEviction::new(config.num_sets, config.associativity, config.seed)?,
            )),
            ReplacementPolicyConfig::Contestant => GenericCache::from(Cache::new(
                config.line_size,
                config.num_sets,
                config.associativity,
                DynamicRrip::new(
                    config.num_sets,
                    config.associativity,
                    config.seed,
                    config.frequency_promotion,
                )?,
            )),
        })
    }
}

/// Parses a 64-bit value from a 16 digit hexadecimal field
///
/// Parsing with the standard library is the bottleneck for small caches, so
/// the digits are folded through a lookup table generated by the build script,
/// one nibble at a time. The checks for the input format are omitted; this is
/// guaranteed not to panic, but ill-formed fields produce incorrect values.
/// Debug builds cross-check the result against the standard library.
///
/// # Arguments
///
/// * `buf`: The byte buffer holding the field
///
/// returns: u64
///
/// # Examples
///
/// ```
/// use llclib::simulator::parse_hex_u64;
/// assert_eq!(parse_hex_u64(b"000000000000000A"), 10);
/// ```
pub fn parse_hex_u64(buf: &[u8; 16]) -> u64 {
    let mut res: u64 = 0;
    let mut x = 0;
    while x < 16 {
        res = (res << 4) | HEX_NIBBLE[buf[x] as usize] as u64;
        x += 1;
    }
    debug_assert_eq!(
        {
            let field = std::str::from_utf8(buf).unwrap();
            u64::from_str_radix(field, 16).unwrap()
        },
        res
    );
    res
}

/// This exists for the same reasons as parse_hex_u64, for the two-digit
/// thread-id and access-type fields
///
/// # Examples
///
/// ```
/// use llclib::simulator::parse_hex_u8;
/// assert_eq!(parse_hex_u8(b"1F"), 31);
/// ```
pub fn parse_hex_u8(buf: &[u8; 2]) -> u8 {
    let res = (HEX_NIBBLE[buf[0] as usize] << 4) | HEX_NIBBLE[buf[1] as usize];
    debug_assert_eq!(
        {
            let field = std::str::from_utf8(buf).unwrap();
            u8::from_str_radix(field, 16).unwrap()
        },
        res
    );
    res
}
