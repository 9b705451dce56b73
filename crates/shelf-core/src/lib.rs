pub mod app_config;
pub mod attributes;
pub mod authz;
pub mod categories;
pub mod config;
pub mod error;
pub mod products;
pub mod variants;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use attributes::{
    admit_value, validate_bulk_attribute_patches, Admission, AttributeDataType, AttributePatch,
    BulkAttributePatch, DefinitionPolicyPatch, NewProductAttribute, ValuePolicy,
};
pub use authz::{
    authorize_admin, authorize_mutate, authorize_read, can_mutate, can_read, AccessDenied, Actor,
    Role,
};
pub use categories::{build_tree, CategoryNode, CategoryRecord, NewCategory};
pub use config::{load_app_config, load_app_config_from_env};
pub use error::{codes, ErrorKind, RuleViolation, ValidationError};
pub use products::{NewOption, NewOptionValue, NewProduct};
pub use variants::{
    find_duplicate_combination, validate_bulk_variant_patches, validate_price, BulkVariantPatch,
    Combination, NewVariant, OptionSchema, OptionSelection, SchemaOption, SchemaValue,
    VariantInput, VariantPatch,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
