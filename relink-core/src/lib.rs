pub mod config;
pub mod detect;
pub mod error;
pub mod notify;
pub mod patch;
pub mod pipeline;
pub mod report;
pub mod store;

pub use detect::{Change, ChangeKind, ChangeSet, Detection, LinkMap, detect};
pub use error::{CoreError, Result};
pub use patch::{ConfigDocument, NameMapping, PatchOutcome, PatchResult, Patcher};
pub use relink_scanner::LinkRecord;
