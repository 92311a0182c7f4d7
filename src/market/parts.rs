//! Valuable-part detection for disassembly pricing.
//!
//! Certain product families resell better as parts (retro consoles, VCRs,
//! film cameras). Templates map a product-name keyword to the part names
//! worth pricing out; each part becomes its own marketplace sub-query.

pub struct PartTemplate {
    keyword: &'static str,
    parts: &'static [&'static str],
}

/// First matching keyword wins.
const PART_TEMPLATES: &[PartTemplate] = &[
    PartTemplate {
        keyword: "nintendo",
        parts: &["Original Box", "Manual", "Battery Cover"],
    },
    PartTemplate {
        keyword: "game boy",
        parts: &["Original Box", "Manual", "Battery Cover"],
    },
    PartTemplate {
        keyword: "playstation",
        parts: &["Original Controller", "Power Cable"],
    },
    PartTemplate {
        keyword: "xbox",
        parts: &["Original Controller", "Power Brick"],
    },
    PartTemplate {
        keyword: "vcr",
        parts: &["Original Remote Control", "AV Cables"],
    },
    PartTemplate {
        keyword: "cassette",
        parts: &["Original Remote Control"],
    },
    PartTemplate {
        keyword: "walkman",
        parts: &["Original Headphones", "Battery Cover"],
    },
    PartTemplate {
        keyword: "ipod",
        parts: &["Original Dock", "USB Cable"],
    },
    PartTemplate {
        keyword: "atari",
        parts: &["Original Controllers", "Power Adapter"],
    },
    PartTemplate {
        keyword: "camera",
        parts: &["Original Lens Cap", "Camera Strap", "Battery Pack"],
    },
    PartTemplate {
        keyword: "canon",
        parts: &["Original Lens Cap", "Battery Pack"],
    },
    PartTemplate {
        keyword: "nikon",
        parts: &["Original Lens Cap", "Battery Pack"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartQuery {
    pub part_name: String,
    pub query: String,
}

/// Part sub-queries for a product, empty when no template matches. The
/// queries are independent; callers may issue them concurrently.
pub fn part_queries(product_name: &str) -> Vec<PartQuery> {
    let needle = product_name.to_lowercase();
    for template in PART_TEMPLATES {
        if needle.contains(template.keyword) {
            return template
                .parts
                .iter()
                .map(|part| PartQuery {
                    part_name: (*part).to_string(),
                    query: format!("{product_name} {part}"),
                })
                .collect();
        }
    }
    Vec::new()
}
