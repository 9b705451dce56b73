mod read;
mod types;
mod write;

pub use read::{
    default_variant_id, find_variant_by_options, get_product_summary, get_variant,
    get_variant_detail, list_selected_options, list_variant_details, list_variants,
    list_variants_by_ids, load_combinations,
};
pub use types::{ProductSummaryRow, SelectedOptionRow, VariantDetail, VariantRow};
pub use write::{bulk_update_variants, create_variant, delete_variant, update_variant};
