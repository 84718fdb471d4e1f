pub mod client;
pub mod error;
pub mod extractor;
pub mod probe;
pub mod record;

pub use client::build_client;
pub use error::ScanError;
pub use extractor::{Extractor, PairingPolicy};
pub use probe::{Page, fetch_page, probe_sources};
pub use record::LinkRecord;
