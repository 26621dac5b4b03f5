//! KV snapshot model for consuldiff.
//!
//! A [`Snapshot`] is the complete key/value mapping under a prefix at one
//! fetch instant. Snapshots are tagged with their value [`Encoding`] at the
//! type level, so a raw snapshot can never be diffed against a base64 one.
//!
//! # Example
//!
//! ```
//! use consuldiff_snapshot::{diff, Change, Raw, Snapshot};
//!
//! let previous: Snapshot<Raw> = [("a", "1"), ("b", "2")].into_iter().collect();
//! let current: Snapshot<Raw> = [("a", "1"), ("b", "3")].into_iter().collect();
//!
//! assert_eq!(
//!     diff(&previous, &current),
//!     vec![Change::modified("b", "2", "3")]
//! );
//! ```

mod diff;
mod encoding;
mod snapshot;

pub use diff::{diff, Change, ChangeSummary};
pub use encoding::{Base64, Encoding, Raw};
pub use snapshot::{KvPair, Snapshot};
