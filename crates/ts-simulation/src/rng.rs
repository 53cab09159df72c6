//! Deterministic RNG streams.
//!
//! The session owns one generator for seeding. Work that may run on any
//! thread, or whose order must not matter, draws from a sub-stream whose seed
//! is a pure function of the global seed and the work item's identity.

use rand::SeedableRng;
use rand::rngs::StdRng;
use ts_core::AgentId;

const SESSION_DOMAIN: u64 = 0x7365_7373_696f_6e00;
const AGENT_DOMAIN: u64 = 0x6167_656e_7400_0000;
const PAIR_DOMAIN: u64 = 0x7061_6972_0000_0000;

/// SplitMix64 finalizer: a bijective avalanche over 64 bits.
fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mix(parts: &[u64]) -> u64 {
    parts.iter().fold(0, |acc, &part| splitmix64(acc ^ part))
}

/// The session's single-owner generator.
pub fn session_stream(seed: u64) -> StdRng {
    StdRng::seed_from_u64(mix(&[SESSION_DOMAIN, seed]))
}

/// Sub-stream for one agent's decision at one tick.
pub fn agent_stream(seed: u64, agent: AgentId, tick: u64) -> StdRng {
    StdRng::seed_from_u64(mix(&[AGENT_DOMAIN, seed, agent.get(), tick]))
}

/// Sub-stream for one mating pair at one tick. The initiator comes first.
pub fn pair_stream(seed: u64, initiator: AgentId, partner: AgentId, tick: u64) -> StdRng {
    StdRng::seed_from_u64(mix(&[
        PAIR_DOMAIN,
        seed,
        initiator.get(),
        partner.get(),
        tick,
    ]))
}
