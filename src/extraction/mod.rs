//! Tag extraction and field resolution
//!
//! [`TagExtractor`] turns raw markup into meta tag attribute maps plus the
//! first `<title>`; [`FieldResolver`] turns those into canonical fields.

pub mod resolve;
pub mod tags;

pub use resolve::{
    FieldResolver, FieldSource, OpenGraphData, PrecedenceTable, ResolvedFields,
};
pub use tags::{ExtractedTags, MetaTag, TagExtractor};
