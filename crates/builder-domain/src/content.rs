//! Page content schema (§6 "Page content schema"): `PageContent` is an
//! ordered list of tagged section variants. Immutable once embedded in a
//! rendered `SiteVersion` (§3 `PageContent` invariant).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Columns {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
}

impl Columns {
    pub fn as_u8(&self) -> u8 {
        match self {
            Columns::Two => 2,
            Columns::Three => 3,
            Columns::Four => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtaVariant {
    Primary,
    Secondary,
    Outline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroSection {
    pub heading: String,
    #[serde(default)]
    pub subheading: Option<String>,
    #[serde(default)]
    pub cta_text: Option<String>,
    #[serde(default)]
    pub cta_link: Option<String>,
    #[serde(default)]
    pub background_image: Option<String>,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextSection {
    #[serde(default)]
    pub heading: Option<String>,
    pub body: String,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureItem {
    pub icon: String,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesSection {
    #[serde(default)]
    pub heading: Option<String>,
    pub columns: Columns,
    pub items: Vec<FeatureItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardItem {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsSection {
    #[serde(default)]
    pub heading: Option<String>,
    pub columns: Columns,
    pub items: Vec<CardItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSection {
    pub src: String,
    pub alt: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub full_width: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtaSection {
    pub heading: String,
    #[serde(default)]
    pub description: Option<String>,
    pub button_text: String,
    pub button_link: String,
    pub variant: CtaVariant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Section {
    Hero(HeroSection),
    Text(TextSection),
    Features(FeaturesSection),
    Cards(CardsSection),
    Image(ImageSection),
    Cta(CtaSection),
}

impl Section {
    pub fn type_name(&self) -> &'static str {
        match self {
            Section::Hero(_) => "hero",
            Section::Text(_) => "text",
            Section::Features(_) => "features",
            Section::Cards(_) => "cards",
            Section::Image(_) => "image",
            Section::Cta(_) => "cta",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PageContent {
    pub sections: Vec<Section>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_roundtrips_through_json() {
        let section = Section::Hero(HeroSection {
            heading: "Welcome".into(),
            subheading: None,
            cta_text: None,
            cta_link: None,
            background_image: None,
            alignment: Alignment::Center,
        });
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["type"], "hero");
        let back: Section = serde_json::from_value(json).unwrap();
        assert_eq!(back.type_name(), "hero");
    }

    #[test]
    fn columns_serializes_as_numeric_string_tag() {
        assert_eq!(Columns::Three.as_u8(), 3);
    }
}
