//! Query-side probes

pub mod category;
pub mod compliance;
pub mod external_id;

pub use category::{check_attribute_type_def_categories, check_type_def_categories, CategoryCensus};
pub use compliance::{check_attribute_type_def, check_type_def, DiscoverySource};
pub use external_id::{check_external_mappings, classify, survey, MappingCensus, MappingDimension};
