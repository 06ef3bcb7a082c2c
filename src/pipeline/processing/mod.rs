// Pipeline processing: schema validation, typing, cleaning, and imputation

pub mod impute;
pub mod normalize;
pub mod profile;
pub mod quality_gate;
pub mod schema;

pub use impute::impute;
pub use normalize::{normalize, ColumnRule, NormalizedRecords, TypeRuleRegistry};
pub use profile::{profile, ColumnProfile};
pub use quality_gate::{OutlierPolicy, QualityFilter, QualityFilterConfig, QualityReport};
pub use schema::validate;
