//! Live integration tests for shelf-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/shelf-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use shelf_core::{
    codes, AttributeDataType, AttributePatch, BulkAttributePatch, BulkVariantPatch, ErrorKind,
    NewCategory, NewOption, NewOptionValue, NewProduct, NewProductAttribute, NewVariant,
    OptionSelection, ValuePolicy, VariantPatch,
};
use shelf_db::{
    bulk_update_product_attributes, bulk_update_variants, create_category, create_product,
    create_variant, define_option, define_value, delete_attribute_definition, delete_category,
    delete_product, delete_product_attribute, delete_variant, find_category_by_name_and_parent,
    find_variant_by_options, get_attribute_definition_by_key, get_variant, get_variant_detail,
    list_options, list_product_attributes, list_values, list_variants, preload_selected_options,
    set_definition_policy, set_product_attribute, update_product_attribute, update_variant,
    BatchConfig, DbError,
};

const SELLER: i64 = 7;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn option(name: &str, sort_order: i32, values: &[&str]) -> NewOption {
    NewOption {
        name: name.to_string(),
        display_name: None,
        sort_order,
        values: values
            .iter()
            .enumerate()
            .map(|(i, v)| NewOptionValue {
                value: (*v).to_string(),
                display_value: None,
                color_code: None,
                sort_order: i32::try_from(i).unwrap(),
            })
            .collect(),
    }
}

fn make_product(sku: &str, options: Vec<NewOption>) -> NewProduct {
    NewProduct {
        name: "Crew Tee".to_string(),
        brand: "Shelfwear".to_string(),
        sku: sku.to_string(),
        price: Decimal::new(2500, 2),
        currency: "USD".to_string(),
        short_description: None,
        description: None,
        images: vec![],
        tags: vec!["tees".to_string()],
        is_popular: false,
        in_stock: true,
        is_active: true,
        category_id: None,
        seller_id: None,
        options,
    }
}

/// Product with `Size ∈ {S, M, L}` (sort 0) and `Color ∈ {Black, White}` (sort 1).
async fn tee(pool: &sqlx::PgPool) -> i64 {
    create_product(
        pool,
        SELLER,
        make_product(
            "TEE-001",
            vec![
                option("Size", 0, &["S", "M", "L"]),
                option("Color", 1, &["Black", "White"]),
            ],
        ),
    )
    .await
    .expect("create_product failed")
    .id
}

fn variant(sku: &str, price: i64, size: &str, color: &str, is_default: bool) -> NewVariant {
    NewVariant {
        sku: sku.to_string(),
        price: Decimal::new(price, 0),
        stock: 0,
        images: vec![],
        allow_purchase: true,
        is_popular: false,
        is_default,
        options: vec![
            OptionSelection::new("Size", size),
            OptionSelection::new("Color", color),
        ],
    }
}

fn selection(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

async fn live_default_count(pool: &sqlx::PgPool, product_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM product_variants \
         WHERE product_id = $1 AND is_default AND deleted_at IS NULL",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await
    .expect("count defaults")
}

// ---------------------------------------------------------------------------
// Section 1: Option schema
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn define_option_is_idempotent(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;

    let first = define_option(&pool, product_id, option("Fit", 2, &["Slim"]))
        .await
        .expect("define Fit");
    let again = define_option(&pool, product_id, option("Fit", 9, &["Slim"]))
        .await
        .expect("define Fit again");
    assert_eq!(first, again);

    let options = list_options(&pool, product_id).await.expect("list options");
    let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["Size", "Color", "Fit"]);
    assert_eq!(options[2].sort_order, 2, "second define must not change the row");
}

#[sqlx::test(migrations = "../../migrations")]
async fn define_value_is_idempotent_and_ordered(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let size = list_options(&pool, product_id).await.unwrap()[0].id;

    let xl = NewOptionValue {
        value: "XL".to_string(),
        display_value: Some("Extra Large".to_string()),
        color_code: None,
        sort_order: 3,
    };
    let a = define_value(&pool, product_id, size, xl.clone()).await.unwrap();
    let b = define_value(&pool, product_id, size, xl).await.unwrap();
    assert_eq!(a, b);

    let values: Vec<String> = list_values(&pool, size)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.value)
        .collect();
    assert_eq!(values, vec!["S", "M", "L", "XL"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn define_value_rejects_option_of_another_product(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let other = create_product(
        &pool,
        SELLER,
        make_product("OTHER", vec![option("Size", 0, &["S"])]),
    )
    .await
    .unwrap()
    .id;
    let foreign_option = list_options(&pool, other).await.unwrap()[0].id;

    let err = define_value(
        &pool,
        product_id,
        foreign_option,
        NewOptionValue {
            value: "XS".to_string(),
            display_value: None,
            color_code: None,
            sort_order: 0,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref e) if e == "option"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn new_option_after_variants_exist_is_rejected(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();

    let err = define_option(&pool, product_id, option("Fit", 2, &["Slim"]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    // Re-defining an existing option is still a no-op.
    assert!(define_option(&pool, product_id, option("Size", 0, &[])).await.is_ok());
}

// ---------------------------------------------------------------------------
// Section 2: Variant manifold
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn created_variant_is_found_by_full_selection(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let mut input = variant("X", 0, "M", "Black", false);
    input.price = Decimal::new(2999, 2);
    let variant_id = create_variant(&pool, product_id, input).await.unwrap();

    let wanted = selection(&[("Size", "M"), ("Color", "Black")]);
    let found = find_variant_by_options(&pool, product_id, &wanted)
        .await
        .unwrap();
    assert_eq!(found.id, variant_id);
    assert_eq!(found.price, Decimal::new(2999, 2));

    let detail = get_variant_detail(&pool, product_id, variant_id)
        .await
        .unwrap()
        .expect("detail");
    assert_eq!(detail.product.brand, "Shelfwear");
    let options: Vec<(&str, &str)> = detail
        .selected_options
        .iter()
        .map(|o| (o.option_name.as_str(), o.value.as_str()))
        .collect();
    assert_eq!(options, vec![("Size", "M"), ("Color", "Black")]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn repeated_combination_conflicts(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    create_variant(&pool, product_id, variant("X", 30, "M", "Black", false))
        .await
        .unwrap();

    // Order of the selection does not matter.
    let mut again = variant("Y", 31, "M", "Black", false);
    again.options.reverse();
    let err = create_variant(&pool, product_id, again).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.code(), Some(codes::VARIANT_COMBINATION_EXISTS));
    assert_eq!(list_variants(&pool, product_id).await.unwrap().len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn invalid_selections_are_rejected(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;

    let mut missing = variant("X", 10, "M", "Black", false);
    missing.options.truncate(1);
    let err = create_variant(&pool, product_id, missing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let mut duplicate = variant("X", 10, "M", "Black", false);
    duplicate.options.push(OptionSelection::new("Size", "L"));
    let err = create_variant(&pool, product_id, duplicate).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let mut unknown_option = variant("X", 10, "M", "Black", false);
    unknown_option.options[1] = OptionSelection::new("Material", "Wool");
    let err = create_variant(&pool, product_id, unknown_option).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Matching is case-sensitive.
    let err = create_variant(&pool, product_id, variant("X", 10, "m", "Black", false))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = create_variant(&pool, 9_999, variant("X", 10, "M", "Black", false))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref e) if e == "product"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn newest_default_replaces_previous(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", true))
        .await
        .unwrap();
    let b = create_variant(&pool, product_id, variant("B", 10, "L", "Black", true))
        .await
        .unwrap();

    assert!(!get_variant(&pool, product_id, a).await.unwrap().unwrap().is_default);
    assert!(get_variant(&pool, product_id, b).await.unwrap().unwrap().is_default);
    assert_eq!(live_default_count(&pool, product_id).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn setting_default_twice_keeps_one_default(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", true))
        .await
        .unwrap();
    let b = create_variant(&pool, product_id, variant("B", 10, "L", "Black", false))
        .await
        .unwrap();

    let promote = VariantPatch {
        is_default: Some(true),
        ..VariantPatch::default()
    };
    update_variant(&pool, product_id, b, promote.clone()).await.unwrap();
    update_variant(&pool, product_id, b, promote).await.unwrap();

    assert!(!get_variant(&pool, product_id, a).await.unwrap().unwrap().is_default);
    assert!(get_variant(&pool, product_id, b).await.unwrap().unwrap().is_default);
    assert_eq!(live_default_count(&pool, product_id).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_patch_changes_nothing_but_updated_at(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let id = create_variant(&pool, product_id, variant("A", 10, "M", "Black", true))
        .await
        .unwrap();
    let before = get_variant(&pool, product_id, id).await.unwrap().unwrap();

    let after = update_variant(&pool, product_id, id, VariantPatch::default())
        .await
        .unwrap();

    assert_eq!(after.sku, before.sku);
    assert_eq!(after.price, before.price);
    assert_eq!(after.stock, before.stock);
    assert_eq!(after.images, before.images);
    assert_eq!(after.is_default, before.is_default);
    assert!(after.updated_at >= before.updated_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn images_patch_replaces_and_clears(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let id = create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();

    let images = vec![
        "https://cdn.example/a,1.png".to_string(),
        r#"quote"d"#.to_string(),
        r"back\slash".to_string(),
    ];
    let row = update_variant(
        &pool,
        product_id,
        id,
        VariantPatch {
            images: Some(images.clone()),
            stock: Some(0),
            ..VariantPatch::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(row.images.0, images);

    let row = update_variant(
        &pool,
        product_id,
        id,
        VariantPatch {
            images: Some(vec![]),
            ..VariantPatch::default()
        },
    )
    .await
    .unwrap();
    assert!(row.images.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_of_foreign_variant_is_not_found(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let other = create_product(
        &pool,
        SELLER,
        make_product(
            "OTHER",
            vec![option("Size", 0, &["M"]), option("Color", 1, &["Black"])],
        ),
    )
    .await
    .unwrap()
    .id;
    let foreign = create_variant(&pool, other, variant("F", 10, "M", "Black", false))
        .await
        .unwrap();

    let err = update_variant(&pool, product_id, foreign, VariantPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref e) if e == "variant"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn last_variant_cannot_be_deleted(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", true))
        .await
        .unwrap();
    let b = create_variant(&pool, product_id, variant("B", 10, "L", "Black", false))
        .await
        .unwrap();

    delete_variant(&pool, product_id, a).await.expect("delete A");
    assert_eq!(live_default_count(&pool, product_id).await, 0);

    let err = delete_variant(&pool, product_id, b).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.code(), Some(codes::LAST_VARIANT));

    let err = delete_variant(&pool, product_id, a).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleted_combination_can_be_recreated(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();
    create_variant(&pool, product_id, variant("B", 10, "L", "Black", false))
        .await
        .unwrap();
    delete_variant(&pool, product_id, a).await.unwrap();

    let again = create_variant(&pool, product_id, variant("A2", 12, "M", "Black", false))
        .await
        .expect("soft-deleted combinations are free again");
    assert_ne!(again, a);

    let tombstones: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM variant_option_values WHERE variant_id = $1 AND deleted_at IS NOT NULL",
    )
    .bind(a)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tombstones, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn every_variant_binds_one_value_per_option(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    for (size, color) in [("S", "Black"), ("M", "White"), ("L", "Black")] {
        create_variant(&pool, product_id, variant(size, 10, size, color, false))
            .await
            .unwrap();
    }

    let bad: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM product_variants pv \
         WHERE pv.product_id = $1 AND pv.deleted_at IS NULL \
           AND (SELECT COUNT(DISTINCT vov.option_id) FROM variant_option_values vov \
                JOIN product_options o ON o.id = vov.option_id AND o.product_id = pv.product_id \
                WHERE vov.variant_id = pv.id AND vov.deleted_at IS NULL) \
               <> (SELECT COUNT(*) FROM product_options WHERE product_id = pv.product_id)",
    )
    .bind(product_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(bad, 0);
}

// ---------------------------------------------------------------------------
// Section 3: Bulk variant updates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_update_with_invalid_item_writes_nothing(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();
    let b = create_variant(&pool, product_id, variant("B", 10, "L", "Black", false))
        .await
        .unwrap();

    let items = vec![
        BulkVariantPatch {
            id: a,
            patch: VariantPatch {
                price: Some(Decimal::new(11, 0)),
                ..VariantPatch::default()
            },
        },
        BulkVariantPatch {
            id: b,
            patch: VariantPatch {
                price: Some(Decimal::new(-1, 0)),
                ..VariantPatch::default()
            },
        },
    ];
    let err = bulk_update_variants(&pool, product_id, items).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    for id in [a, b] {
        let row = get_variant(&pool, product_id, id).await.unwrap().unwrap();
        assert_eq!(row.price, Decimal::new(10, 0));
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_update_last_default_wins_and_skips_strangers(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();
    let b = create_variant(&pool, product_id, variant("B", 10, "L", "Black", false))
        .await
        .unwrap();

    let promote = VariantPatch {
        is_default: Some(true),
        ..VariantPatch::default()
    };
    let items = vec![
        BulkVariantPatch {
            id: a,
            patch: promote.clone(),
        },
        BulkVariantPatch {
            id: 424_242,
            patch: promote.clone(),
        },
        BulkVariantPatch { id: b, patch: promote },
    ];
    let applied = bulk_update_variants(&pool, product_id, items).await.unwrap();

    assert_eq!(applied, vec![a, b]);
    assert!(!get_variant(&pool, product_id, a).await.unwrap().unwrap().is_default);
    assert!(get_variant(&pool, product_id, b).await.unwrap().unwrap().is_default);
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_update_rejects_duplicate_ids(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = create_variant(&pool, product_id, variant("A", 10, "M", "Black", false))
        .await
        .unwrap();

    let item = BulkVariantPatch {
        id: a,
        patch: VariantPatch::default(),
    };
    let err = bulk_update_variants(&pool, product_id, vec![item.clone(), item])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = bulk_update_variants(&pool, product_id, vec![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

// ---------------------------------------------------------------------------
// Section 4: Lookup
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn partial_selection_prefers_default_then_lowest_id(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let black = create_variant(&pool, product_id, variant("MB", 10, "M", "Black", false))
        .await
        .unwrap();
    let white = create_variant(&pool, product_id, variant("MW", 10, "M", "White", false))
        .await
        .unwrap();

    let found = find_variant_by_options(&pool, product_id, &selection(&[("Size", "M")]))
        .await
        .unwrap();
    assert_eq!(found.id, black);

    update_variant(
        &pool,
        product_id,
        white,
        VariantPatch {
            is_default: Some(true),
            ..VariantPatch::default()
        },
    )
    .await
    .unwrap();
    let found = find_variant_by_options(&pool, product_id, &selection(&[("Size", "M")]))
        .await
        .unwrap();
    assert_eq!(found.id, white);
}

#[sqlx::test(migrations = "../../migrations")]
async fn lookup_failures(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    create_variant(&pool, product_id, variant("MB", 10, "M", "Black", false))
        .await
        .unwrap();

    let err = find_variant_by_options(&pool, product_id, &BTreeMap::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let with_stray = selection(&[("Size", "M"), ("page", "2")]);
    let err = find_variant_by_options(&pool, product_id, &with_stray)
        .await
        .unwrap_err();
    match err {
        DbError::Validation(v) => assert_eq!(v.message, "Invalid option name: page"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let err = find_variant_by_options(&pool, product_id, &selection(&[("Size", "L")]))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref e) if e == "variant"));

    let err = find_variant_by_options(&pool, product_id, &selection(&[("Size", "XXL")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[sqlx::test(migrations = "../../migrations")]
async fn preloaded_options_follow_option_sort_order(pool: sqlx::PgPool) {
    let product_id = create_product(
        &pool,
        SELLER,
        make_product(
            "SORTED",
            vec![option("Color", 5, &["Black"]), option("Size", 1, &["M"])],
        ),
    )
    .await
    .unwrap()
    .id;
    let mut input = variant("A", 10, "M", "Black", false);
    input.options.reverse();
    let id = create_variant(&pool, product_id, input).await.unwrap();

    let preloaded = preload_selected_options(&pool, vec![id], BatchConfig::default()).await;
    let names: Vec<&str> = preloaded[&id].iter().map(|o| o.option_name.as_str()).collect();
    assert_eq!(names, vec!["Size", "Color"]);
}

// ---------------------------------------------------------------------------
// Section 5: Products
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn product_sku_is_unique_among_live_products(pool: sqlx::PgPool) {
    let first = tee(&pool).await;

    let err = create_product(&pool, SELLER, make_product("TEE-001", vec![]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::PRODUCT_EXISTS));

    delete_product(&pool, first).await.unwrap();
    create_product(&pool, SELLER, make_product("TEE-001", vec![]))
        .await
        .expect("sku is free after soft delete");
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_with_unknown_category_is_not_found(pool: sqlx::PgPool) {
    let mut input = make_product("CAT-1", vec![]);
    input.category_id = Some(404);
    let err = create_product(&pool, SELLER, input).await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(ref e) if e == "category"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn product_arrays_round_trip(pool: sqlx::PgPool) {
    let mut input = make_product("ARR-1", vec![]);
    input.images = vec!["https://cdn.example/a.png".into(), "b\"c".into(), "d\\e".into()];
    input.tags = vec![];
    let row = create_product(&pool, SELLER, input.clone()).await.unwrap();

    assert_eq!(row.images.0, input.images);
    assert!(row.tags.is_empty());
}

// ---------------------------------------------------------------------------
// Section 6: Attributes
// ---------------------------------------------------------------------------

fn attribute(key: &str, value: &str) -> NewProductAttribute {
    NewProductAttribute {
        attribute_key: key.to_string(),
        name: key.to_uppercase(),
        unit: None,
        value: value.to_string(),
        sort_order: None,
        data_type: None,
        value_policy: None,
        allowed_values: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn set_attribute_mints_open_definition_and_learns(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let other = create_product(&pool, SELLER, make_product("TEE-002", vec![]))
        .await
        .unwrap()
        .id;

    let row = set_product_attribute(&pool, product_id, attribute("fabric", "cotton"))
        .await
        .unwrap();
    assert_eq!(row.attribute_key, "fabric");
    assert_eq!(row.value, "cotton");

    set_product_attribute(&pool, other, attribute("fabric", "linen"))
        .await
        .unwrap();

    let definition = get_attribute_definition_by_key(&pool, "fabric")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(definition.value_policy, "open");
    assert_eq!(definition.allowed_values.0, vec!["cotton", "linen"]);

    let err = set_product_attribute(&pool, product_id, attribute("fabric", "wool"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::ATTRIBUTE_ALREADY_ASSIGNED));
    assert_eq!(err.to_string(), "Product already has this attribute assigned");
}

#[sqlx::test(migrations = "../../migrations")]
async fn closed_definition_rejects_unlisted_values(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    sqlx::query(
        "INSERT INTO attribute_definitions (key, name, value_policy, allowed_values) \
         VALUES ('material', 'Material', 'closed', '{\"cotton\",\"wool\"}')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = set_product_attribute(&pool, product_id, attribute("material", "silk"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let row = set_product_attribute(&pool, product_id, attribute("material", "wool"))
        .await
        .unwrap();

    let err = update_product_attribute(
        &pool,
        product_id,
        row.id,
        AttributePatch {
            value: "silk".into(),
            sort_order: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let definition = get_attribute_definition_by_key(&pool, "material")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(definition.allowed_values.0, vec!["cotton", "wool"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn closed_mint_seeds_allowed_values(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let other = create_product(&pool, SELLER, make_product("TEE-002", vec![]))
        .await
        .unwrap()
        .id;

    let mut material = attribute("material", "cotton");
    material.value_policy = Some(ValuePolicy::Closed);
    material.allowed_values = Some(vec!["cotton".into(), "wool".into()]);
    set_product_attribute(&pool, product_id, material).await.unwrap();

    let definition = get_attribute_definition_by_key(&pool, "material")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(definition.value_policy, "closed");
    assert_eq!(definition.allowed_values.0, vec!["cotton", "wool"]);

    let err = set_product_attribute(&pool, other, attribute("material", "silk"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    set_product_attribute(&pool, other, attribute("material", "wool"))
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn closed_mint_must_list_its_own_value(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let mut material = attribute("material", "silk");
    material.value_policy = Some(ValuePolicy::Closed);
    material.allowed_values = Some(vec!["cotton".into()]);

    let err = set_product_attribute(&pool, product_id, material).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(
        get_attribute_definition_by_key(&pool, "material").await.unwrap().is_none(),
        "rejected mint must roll back"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn closing_a_definition_freezes_learned_values(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let other = create_product(&pool, SELLER, make_product("TEE-002", vec![]))
        .await
        .unwrap()
        .id;
    set_product_attribute(&pool, product_id, attribute("fabric", "cotton"))
        .await
        .unwrap();
    let definition = get_attribute_definition_by_key(&pool, "fabric")
        .await
        .unwrap()
        .unwrap();

    let closed = set_definition_policy(&pool, definition.id, ValuePolicy::Closed)
        .await
        .unwrap();
    assert_eq!(closed.value_policy, "closed");
    assert_eq!(closed.allowed_values.0, vec!["cotton"]);

    let err = set_product_attribute(&pool, other, attribute("fabric", "linen"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = set_definition_policy(&pool, i64::MAX, ValuePolicy::Open)
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn typed_definition_rejects_unparseable_value(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let mut weight = attribute("weight", "heavy");
    weight.data_type = Some(AttributeDataType::Number);

    let err = set_product_attribute(&pool, product_id, weight.clone())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::ATTRIBUTE_DATA_TYPE_INVALID));
    assert!(
        get_attribute_definition_by_key(&pool, "weight").await.unwrap().is_none(),
        "failed mint must roll back"
    );

    weight.value = "180.5".into();
    set_product_attribute(&pool, product_id, weight).await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn attributes_list_in_sort_order_and_delete_once(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let mut late = attribute("care", "machine wash");
    late.sort_order = Some(5);
    let mut early = attribute("origin", "Portugal");
    early.sort_order = Some(1);
    let care = set_product_attribute(&pool, product_id, late).await.unwrap();
    set_product_attribute(&pool, product_id, early).await.unwrap();
    set_product_attribute(&pool, product_id, attribute("fit", "regular"))
        .await
        .unwrap();

    let keys: Vec<String> = list_product_attributes(&pool, product_id)
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.attribute_key)
        .collect();
    assert_eq!(keys, vec!["fit", "origin", "care"]);

    delete_product_attribute(&pool, product_id, care.id).await.unwrap();
    let err = delete_product_attribute(&pool, product_id, care.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[sqlx::test(migrations = "../../migrations")]
async fn bulk_attribute_update_is_all_or_nothing(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let a = set_product_attribute(&pool, product_id, attribute("fit", "regular"))
        .await
        .unwrap();
    let mut weight = attribute("weight", "180");
    weight.data_type = Some(AttributeDataType::Number);
    let b = set_product_attribute(&pool, product_id, weight).await.unwrap();

    let items = vec![
        BulkAttributePatch {
            id: a.id,
            patch: AttributePatch {
                value: "slim".into(),
                sort_order: None,
            },
        },
        BulkAttributePatch {
            id: b.id,
            patch: AttributePatch {
                value: "heavy".into(),
                sort_order: None,
            },
        },
    ];
    let err = bulk_update_product_attributes(&pool, product_id, items)
        .await
        .unwrap_err();
    match err {
        DbError::Validation(v) => assert_eq!(v.field, "items[1].value"),
        other => panic!("expected validation error, got {other:?}"),
    }
    let rows = list_product_attributes(&pool, product_id).await.unwrap();
    assert_eq!(rows[0].value, "regular");

    let items = vec![
        BulkAttributePatch {
            id: a.id,
            patch: AttributePatch {
                value: "slim".into(),
                sort_order: Some(3),
            },
        },
        BulkAttributePatch {
            id: 999_999,
            patch: AttributePatch {
                value: "x".into(),
                sort_order: None,
            },
        },
    ];
    let applied = bulk_update_product_attributes(&pool, product_id, items)
        .await
        .unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].value, "slim");
    assert_eq!(applied[0].sort_order, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn referenced_definition_cannot_be_deleted(pool: sqlx::PgPool) {
    let product_id = tee(&pool).await;
    let row = set_product_attribute(&pool, product_id, attribute("fit", "regular"))
        .await
        .unwrap();

    let err = delete_attribute_definition(&pool, row.attribute_definition_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert_eq!(err.code(), Some(codes::ATTRIBUTE_IN_USE));

    let err = delete_attribute_definition(&pool, 123_456).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Section 7: Categories
// ---------------------------------------------------------------------------

fn category(name: &str, parent_id: Option<i64>) -> NewCategory {
    NewCategory {
        name: name.to_string(),
        parent_id,
        description: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn category_rules(pool: sqlx::PgPool) {
    let apparel = create_category(&pool, category("Apparel", None)).await.unwrap();
    let tees = create_category(&pool, category("Tees", Some(apparel.id)))
        .await
        .unwrap();
    assert_eq!(tees.parent_id, Some(apparel.id));

    let err = create_category(&pool, category("Tees", Some(apparel.id)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = create_category(&pool, category("Orphans", Some(31_337)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(codes::INVALID_PARENT_CATEGORY));

    assert!(find_category_by_name_and_parent(&pool, "Tees", None)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        find_category_by_name_and_parent(&pool, "Tees", Some(apparel.id))
            .await
            .unwrap()
            .map(|c| c.id),
        Some(tees.id)
    );

    let mut input = make_product("CAT-TEE", vec![]);
    input.category_id = Some(tees.id);
    create_product(&pool, SELLER, input).await.unwrap();

    let err = delete_category(&pool, tees.id).await.unwrap_err();
    assert_eq!(err.code(), Some(codes::CATEGORY_HAS_PRODUCTS));
    let err = delete_category(&pool, apparel.id).await.unwrap_err();
    assert_eq!(err.code(), Some(codes::CATEGORY_HAS_CHILDREN));
}
