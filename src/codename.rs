//! Deterministic pseudonyms for anonymous posting.
//!
//! A codename is an adjective/noun pair picked by hashing the user's id, so
//! the same author always appears under the same name without the id ever
//! leaving the server.

use sha2::{Digest, Sha256};

const ADJECTIVES: &[&str] = &[
    "Amber", "Brave", "Bright", "Calm", "Clever", "Cosmic", "Crimson", "Curious", "Daring",
    "Eager", "Gentle", "Golden", "Hidden", "Humble", "Jolly", "Keen", "Lucky", "Mellow",
    "Misty", "Nimble", "Noble", "Patient", "Quiet", "Rapid", "Silver", "Sleepy", "Steady",
    "Sunny", "Swift", "Tidy", "Witty", "Zesty",
];

const NOUNS: &[&str] = &[
    "Badger", "Beacon", "Comet", "Cedar", "Dolphin", "Falcon", "Fern", "Fox", "Glacier",
    "Harbor", "Heron", "Koala", "Lantern", "Lynx", "Maple", "Meteor", "Otter", "Owl",
    "Panda", "Pebble", "Puffin", "Quokka", "Raven", "River", "Sparrow", "Summit", "Tiger",
    "Tortoise", "Walrus", "Willow", "Wombat", "Yak",
];

/// Codename for `user_id`, e.g. `"Swift Otter"`.
pub fn codename(user_id: &str) -> String {
    let digest = Sha256::digest(user_id.as_bytes());
    let adjective = u16::from_be_bytes([digest[0], digest[1]]) as usize % ADJECTIVES.len();
    let noun = u16::from_be_bytes([digest[2], digest[3]]) as usize % NOUNS.len();
    format!("{} {}", ADJECTIVES[adjective], NOUNS[noun])
}
