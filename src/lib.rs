//! Garment Tagger — shared library for the enrichment CLI.
//!
//! Enriches a clothing catalog with model-inferred attributes. The online
//! path ([`pipeline`]) walks catalog rows that have no attributes yet,
//! downloads each image, asks a multimodal endpoint ([`vision`]) to
//! describe it with a fixed prompt ([`prompt`]), decodes the reply into the
//! canonical schema ([`attrs`]), and writes it back to the catalog
//! ([`store`]). The offline path ([`recon`]) joins an exported pending file
//! against batch-generated attributes and splits the result into top and
//! bottom CSVs using the [`classify`] rule.

pub mod attrs;
pub mod classify;
pub mod error;
pub mod pipeline;
pub mod prompt;
pub mod recon;
pub mod store;
pub mod vision;

/// Catalog table holding tops.
pub const SHIRTS_TABLE: &str = "shirts";

/// Catalog table holding bottoms.
pub const PANTS_TABLE: &str = "pants";

/// Every garment table, in processing order.
pub const GARMENT_TABLES: [&str; 2] = [SHIRTS_TABLE, PANTS_TABLE];

/// Default path of the batch handoff file.
pub const PENDING_FILE: &str = "urls_to_process.txt";

/// Default path of the batch attribute CSV.
pub const ATTRIBUTES_FILE: &str = "generatedAttributes.txt";

/// Default output path for the tops partition.
pub const TOPS_FILE: &str = "tops.csv";

/// Default output path for the bottoms partition.
pub const BOTTOMS_FILE: &str = "bottoms.csv";

/// Load environment files, most specific first. Missing files are fine;
/// variables already set in the environment win.
pub fn load_env_files() {
    dotenvy::from_filename(".env.local").ok();
    dotenvy::dotenv().ok();
}
