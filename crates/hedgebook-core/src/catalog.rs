//! Product catalog and hedge contract list offered when booking a cargo.

/// Selection that switches to a free-text product name.
pub const CUSTOM_PRODUCT: &str = "Other Crude / Custom Product";

/// Name used when no product could be determined.
pub const DEFAULT_PRODUCT_NAME: &str = "Custom Product";

/// Hedge contract selection meaning "no hedge leg".
pub const NO_HEDGE: &str = "None";

pub const HEDGE_CONTRACTS: &[&str] = &["GASOIL Mo1", "GASOIL Mo2", "GASOIL Mo3", "Others"];

pub const PRODUCT_CATALOG: &[(&str, &[&str])] = &[
    (
        "Crude Oil",
        &[
            "Dubai",
            "Oman",
            "Murban (Abu Dhabi)",
            "Basrah Light (Iraq)",
            "Basrah Heavy (Iraq)",
            "Arab Light (Saudi Arabia)",
            "Arab Heavy (Saudi Arabia)",
            "Kirkuk (Iraq)",
            "ESPO",
        ],
    ),
    (
        "Refined Products",
        &[
            "Gasoline",
            "Diesel / Gasoil (10 ppm)",
            "Diesel / Gasoil (500 ppm)",
            "Jet Fuel / Aviation Kerosene",
            "Naphtha",
            "Fuel Oil (HSFO)",
            "Fuel Oil (VLSFO)",
            "Marine Gas Oil (MGO)",
            "Bitumen / Asphalt",
        ],
    ),
    ("Gas / LNG / LPG", &["LNG", "LPG - Propane", "LPG - Butane", "Condensate"]),
    ("Optional / Custom", &["Petchem Feedstocks", CUSTOM_PRODUCT]),
];

pub fn categories() -> impl Iterator<Item = &'static str> {
    PRODUCT_CATALOG.iter().map(|(category, _)| *category)
}

pub fn products(category: &str) -> Option<&'static [&'static str]> {
    PRODUCT_CATALOG
        .iter()
        .find(|(name, _)| *name == category)
        .map(|(_, products)| *products)
}

pub fn category_of(product: &str) -> Option<&'static str> {
    PRODUCT_CATALOG
        .iter()
        .find(|(_, products)| products.iter().any(|p| *p == product))
        .map(|(category, _)| *category)
}

/// Product name recorded on new trades.
///
/// The custom name only applies when the custom entry is selected.
pub fn resolve_product_name(selection: &str, custom: Option<&str>) -> String {
    let name = match custom {
        Some(custom) if selection == CUSTOM_PRODUCT => custom.trim(),
        _ => selection.trim(),
    };

    if name.is_empty() {
        DEFAULT_PRODUCT_NAME.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_category_and_product() {
        assert_eq!(categories().count(), 4);
        assert_eq!(products("Gas / LNG / LPG").map(|p| p.len()), Some(4));
        assert_eq!(products("Metals"), None);
        assert_eq!(category_of("Naphtha"), Some("Refined Products"));
        assert_eq!(category_of(CUSTOM_PRODUCT), Some("Optional / Custom"));
        assert_eq!(category_of("Copper"), None);
    }

    #[test]
    fn test_resolve_product_name() {
        assert_eq!(resolve_product_name("Dubai", Some("ignored")), "Dubai");
        assert_eq!(resolve_product_name(CUSTOM_PRODUCT, Some("  Upper Zakum ")), "Upper Zakum");
        assert_eq!(resolve_product_name(CUSTOM_PRODUCT, Some("   ")), DEFAULT_PRODUCT_NAME);
        assert_eq!(resolve_product_name(CUSTOM_PRODUCT, None), CUSTOM_PRODUCT);
        assert_eq!(resolve_product_name("", None), DEFAULT_PRODUCT_NAME);
    }
}
