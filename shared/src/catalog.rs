use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{DomainError, DomainResult};

/// Ancestry walks stop here. Storefront pages only ever read three levels.
pub const MAX_CATEGORY_DEPTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationInput {
    pub size: String,
    pub quantity: i32,
}

/// One color of a product together with the sizes stocked in that color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeInput {
    pub color: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub variation: Vec<VariationInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantSpec {
    pub sku: String,
    pub color: String,
    pub size: String,
    pub stock: i32,
}

pub fn variant_sku(parent_sku: &str, size: &str, color: &str) -> String {
    format!("{}-{}-{}", parent_sku, size, color)
}

/// Expands the attribute payload into one child product per listed
/// (color, size) pair. Only combinations that appear in the payload are
/// created; there is no cartesian product of all sizes and colors.
pub fn expand_variants(
    parent_sku: &str,
    attributes: &[AttributeInput],
) -> DomainResult<Vec<VariantSpec>> {
    let mut specs = Vec::new();
    for attribute in attributes {
        for variation in &attribute.variation {
            if variation.quantity < 0 {
                return Err(DomainError::InvalidQuantity(variation.quantity));
            }
            specs.push(VariantSpec {
                sku: variant_sku(parent_sku, &variation.size, &attribute.color),
                color: attribute.color.clone(),
                size: variation.size.clone(),
                stock: variation.quantity,
            });
        }
    }
    Ok(specs)
}

#[derive(Debug, Clone)]
pub struct VariantStock {
    pub id: i32,
    pub color: String,
    pub size: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeOption {
    pub id: i32,
    pub size: String,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorGroup {
    pub color: String,
    pub image: Option<String>,
    pub variation: Vec<SizeOption>,
}

/// Groups sibling variants by color and attaches the image tagged with that
/// color. Images without a color are ignored. Output is ordered by color.
pub fn group_by_color(variants: &[VariantStock], images: &[(Option<String>, String)]) -> Vec<ColorGroup> {
    let mut groups: BTreeMap<String, ColorGroup> = BTreeMap::new();

    for variant in variants {
        groups
            .entry(variant.color.clone())
            .or_insert_with(|| ColorGroup {
                color: variant.color.clone(),
                image: None,
                variation: Vec::new(),
            })
            .variation
            .push(SizeOption {
                id: variant.id,
                size: variant.size.clone(),
                quantity: variant.quantity,
            });
    }

    for (color, image) in images {
        let Some(color) = color else { continue };
        groups
            .entry(color.clone())
            .or_insert_with(|| ColorGroup {
                color: color.clone(),
                image: None,
                variation: Vec::new(),
            })
            .image = Some(image.clone());
    }

    groups.into_values().collect()
}

/// Returns the category ids from the root down to `leaf`.
///
/// `parents` maps a category id to its parent id. A missing entry ends the
/// walk. A walk that revisits a node or exceeds [`MAX_CATEGORY_DEPTH`] is
/// rejected.
pub fn category_path(leaf: i32, parents: &HashMap<i32, Option<i32>>) -> DomainResult<Vec<i32>> {
    let mut path = Vec::new();
    let mut seen = HashSet::new();
    let mut current = Some(leaf);

    while let Some(id) = current {
        if !seen.insert(id) || path.len() >= MAX_CATEGORY_DEPTH {
            return Err(DomainError::CategoryCycle(leaf));
        }
        path.push(id);
        current = parents.get(&id).copied().flatten();
    }

    path.reverse();
    Ok(path)
}

/// Moving `category_id` under a parent whose root-to-parent path is
/// `parent_path` must not put the category inside its own subtree.
pub fn ensure_acyclic(category_id: i32, parent_path: &[i32]) -> DomainResult<()> {
    if parent_path.contains(&category_id) {
        return Err(DomainError::CategoryCycle(category_id));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryLevels {
    pub category_id: Option<i32>,
    pub sub_category_id: Option<i32>,
    pub sub_sub_category_id: Option<i32>,
}

impl CategoryLevels {
    pub fn from_path(path: &[i32]) -> Self {
        Self {
            category_id: path.first().copied(),
            sub_category_id: path.get(1).copied(),
            sub_sub_category_id: path.get(2).copied(),
        }
    }
}

/// A listed product is in stock when its own inventory or the inventory of
/// any of its variants still has available units.
pub fn resolve_in_stock(product_id: i32, children: &[i32], available: &HashMap<i32, i32>) -> bool {
    std::iter::once(&product_id)
        .chain(children.iter())
        .any(|id| available.get(id).copied().unwrap_or(0) > 0)
}

/// `%key%` for a case-insensitive LIKE, with the key's own wildcards taken
/// literally.
pub fn like_pattern(key: &str) -> String {
    let mut pattern = String::with_capacity(key.len() + 2);
    pattern.push('%');
    for c in key.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub fn round_rating(average: Option<&BigDecimal>) -> Option<i32> {
    average
        .and_then(|avg| avg.to_f64())
        .map(|avg| avg.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn attribute(color: &str, sizes: &[(&str, i32)]) -> AttributeInput {
        AttributeInput {
            color: color.to_string(),
            image: Some(format!("{}.png", color)),
            variation: sizes
                .iter()
                .map(|(size, quantity)| VariationInput {
                    size: size.to_string(),
                    quantity: *quantity,
                })
                .collect(),
        }
    }

    #[test]
    fn expands_only_listed_combinations() {
        let specs = expand_variants(
            "TEE",
            &[attribute("red", &[("M", 3), ("L", 0)]), attribute("blue", &[("S", 5)])],
        )
        .unwrap();

        let skus: Vec<_> = specs.iter().map(|s| s.sku.as_str()).collect();
        assert_eq!(skus, vec!["TEE-M-red", "TEE-L-red", "TEE-S-blue"]);
        assert_eq!(specs[2].stock, 5);
    }

    #[test]
    fn negative_variant_stock_is_rejected() {
        let err = expand_variants("TEE", &[attribute("red", &[("M", -1)])]).unwrap_err();
        assert_eq!(err, DomainError::InvalidQuantity(-1));
    }

    #[test]
    fn groups_variants_and_images_by_color() {
        let variants = vec![
            VariantStock { id: 11, color: "red".into(), size: "M".into(), quantity: 2 },
            VariantStock { id: 12, color: "blue".into(), size: "S".into(), quantity: 0 },
            VariantStock { id: 13, color: "red".into(), size: "L".into(), quantity: 4 },
        ];
        let images = vec![
            (Some("red".to_string()), "red.png".to_string()),
            (None, "cover.png".to_string()),
        ];

        let groups = group_by_color(&variants, &images);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].color, "blue");
        assert_eq!(groups[0].image, None);
        assert_eq!(groups[1].image.as_deref(), Some("red.png"));
        let sizes: Vec<_> = groups[1].variation.iter().map(|v| v.size.as_str()).collect();
        assert_eq!(sizes, vec!["M", "L"]);
    }

    #[test]
    fn category_path_runs_root_to_leaf() {
        let parents = HashMap::from([(1, None), (4, Some(1)), (9, Some(4))]);
        let path = category_path(9, &parents).unwrap();
        assert_eq!(path, vec![1, 4, 9]);

        let levels = CategoryLevels::from_path(&path);
        assert_eq!(levels.category_id, Some(1));
        assert_eq!(levels.sub_category_id, Some(4));
        assert_eq!(levels.sub_sub_category_id, Some(9));
    }

    #[test]
    fn category_cycle_is_detected() {
        let parents = HashMap::from([(2, Some(3)), (3, Some(2))]);
        assert_eq!(category_path(2, &parents), Err(DomainError::CategoryCycle(2)));
    }

    #[test]
    fn reparenting_under_own_descendant_is_refused() {
        // 1 -> 4 -> 9: moving 1 under 9 would close a loop
        assert_eq!(ensure_acyclic(1, &[1, 4, 9]), Err(DomainError::CategoryCycle(1)));
        assert_eq!(ensure_acyclic(4, &[4]), Err(DomainError::CategoryCycle(4)));
        assert!(ensure_acyclic(9, &[1, 4]).is_ok());
    }

    #[test]
    fn like_wildcards_in_key_are_literal() {
        assert_eq!(like_pattern("tee"), "%tee%");
        assert_eq!(like_pattern("%"), "%\\%%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn in_stock_through_any_variant() {
        let available = HashMap::from([(1, 0), (2, 0), (3, 5)]);
        assert!(resolve_in_stock(1, &[2, 3], &available));
        assert!(!resolve_in_stock(1, &[2], &available));
        assert!(!resolve_in_stock(42, &[], &available));
    }

    #[test]
    fn rating_rounds_to_nearest() {
        let avg = BigDecimal::from_str("3.5").unwrap();
        assert_eq!(round_rating(Some(&avg)), Some(4));
        let avg = BigDecimal::from_str("4.2").unwrap();
        assert_eq!(round_rating(Some(&avg)), Some(4));
        assert_eq!(round_rating(None), None);
    }
}
