//! specimap-core: the read side of the specimen map.
//!
//! Records come in from the record store, facets and filters narrow them
//! down, and the layout stage turns what is left into markers and clusters
//! for the current viewport. The `wasm` module exposes all of it to the page.

pub mod catalogue;
pub mod error;
pub mod facets;
pub mod filter;
pub mod layout;
pub mod memo;
pub mod output;
pub mod record;
pub mod wasm;

pub use catalogue::{Catalogue, CatalogueConfig};
pub use error::MapError;
pub use facets::{extract, FacetConfig, FacetSet, YearRange, UNKNOWN_MAKER};
pub use filter::{apply, group, FilterTag, GroupedFilter};
pub use layout::{
    cluster, disperse, BoundingBox, ClusterConfig, ClusterIndex, DispersedPoint, DisperseConfig,
    GeoPoint, RenderNode,
};
pub use record::{RecordId, SpecimenRecord};
