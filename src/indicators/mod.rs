// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators offered by the
// dashboard. Every function returns columns of the same length as its input;
// points without enough history, or whose value is numerically undefined
// (division by a zero range, flat RSI), are `None`.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stochastic;
pub mod williams_r;
pub mod window;

pub use window::Column;
