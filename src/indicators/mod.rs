// Technical indicators module
// Pure functions over close-price series; no state, no I/O.

pub mod ema;
pub mod extrema;
pub mod macd;
pub mod wavelet;

pub use ema::ema_series;
pub use extrema::{find_extrema, Extrema};
pub use macd::{macd, Macd};
pub use wavelet::denoise;
