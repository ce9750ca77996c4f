pub mod kraken;
pub mod sign;

pub use kraken::KrakenClient;
pub use sign::kraken_signature;
