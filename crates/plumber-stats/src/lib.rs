//! Statistics used to report training progress.
//!
//! - [`descriptive`]: summary of a sample (min, max, mean, median, spread), used for
//!   per-generation fitness summaries
//! - [`moving`]: fixed-window moving average, used for per-episode reward and length
//!   reporting of the learning agents
//!
//! # Examples
//!
//! ```
//! use plumber_stats::descriptive::DescriptiveStats;
//!
//! let fitness = [522.0, 700.0, 100.0];
//! let stats = DescriptiveStats::new(fitness).unwrap();
//! assert_eq!(stats.max, 700.0);
//! assert_eq!(stats.median, 522.0);
//! ```
//!
//! ```
//! use plumber_stats::moving::MovingAverage;
//!
//! let mut rewards = MovingAverage::new(2);
//! rewards.push(1.0);
//! rewards.push(3.0);
//! rewards.push(5.0);
//! assert_eq!(rewards.mean(), Some(4.0));
//! ```

pub mod descriptive;
pub mod moving;
