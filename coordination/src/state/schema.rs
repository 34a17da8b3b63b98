//! Column family and key layout for the RocksDB debate store

/// Column family holding one JSON document per debate
pub const CF_DEBATES: &str = "debates";

/// All column family names
pub const ALL_CFS: &[&str] = &[CF_DEBATES];

/// Key prefixes for compound keys
pub mod keys {
    pub const DEBATE_PREFIX: &str = "debate:";

    /// Create a debate key
    pub fn debate(debate_id: &str) -> String {
        format!("{}{}", DEBATE_PREFIX, debate_id)
    }

    /// Parse the debate id back out of a key
    pub fn parse_debate_id(key: &str) -> Option<&str> {
        key.strip_prefix(DEBATE_PREFIX)
    }
}
