//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `setup` - Shared setup (config resolution, gateway and controller construction)
//! - `transactions` - Transaction listing and line formatting
//! - `stats` - Category statistics
//! - `browse` - Interactive session over the transaction list controller

pub mod browse;
pub mod setup;
pub mod stats;
pub mod transactions;

// Re-export command functions for main.rs
pub use browse::*;
pub use setup::*;
pub use stats::*;
pub use transactions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
