// src/models/page.rs

//! Publishing pages and their content blocks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::jsonapi::{decode, describe};

/// A published Church Center page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub blocks: Vec<Block>,
}

#[derive(Deserialize)]
struct RawPage {
    id: String,
    attributes: PageAttributes,
}

#[derive(Deserialize)]
struct PageAttributes {
    slug: String,
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    blocks: Vec<Value>,
}

impl Page {
    /// Decode an inlined page resource, rejecting unknown block kinds.
    pub fn from_resource(value: Value) -> Result<Self> {
        let context = describe(&value);
        let raw: RawPage =
            serde_json::from_value(value).map_err(|e| AppError::decode(context, e))?;

        let blocks = raw
            .attributes
            .blocks
            .into_iter()
            .map(Block::from_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id: raw.id,
            slug: raw.attributes.slug,
            title: raw.attributes.title,
            content: raw.attributes.content,
            blocks,
        })
    }
}

/// A content block. The set is closed: anything else fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    Button(ButtonBlock),
    Divider(DividerBlock),
    Grid(GridBlock),
    Image(ImageBlock),
    SectionHeader(SectionHeaderBlock),
    Text(TextBlock),
    Video(VideoBlock),
}

impl Block {
    pub const KINDS: [&'static str; 7] = [
        "Button",
        "Divider",
        "Grid",
        "Image",
        "SectionHeader",
        "Text",
        "Video",
    ];

    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        if !Self::KINDS.contains(&kind) {
            return Err(AppError::UnsupportedBlock {
                block_type: kind.to_string(),
                id: value
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or("?")
                    .to_string(),
            });
        }
        decode(value)
    }

    pub fn id(&self) -> &str {
        match self {
            Block::Button(b) => &b.id,
            Block::Divider(b) => &b.id,
            Block::Grid(b) => &b.id,
            Block::Image(b) => &b.id,
            Block::SectionHeader(b) => &b.id,
            Block::Text(b) => &b.id,
            Block::Video(b) => &b.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonBlock {
    pub id: String,
    pub attributes: ButtonAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonAttributes {
    pub text: String,
    #[serde(default)]
    pub link_target: Option<String>,
    pub link_url: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub position: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DividerBlock {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridBlock {
    pub id: String,
    pub attributes: GridAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridAttributes {
    pub items: Vec<GridItem>,
    #[serde(default)]
    pub image_enabled: bool,
    #[serde(default)]
    pub title_enabled: bool,
    #[serde(default)]
    pub body_enabled: bool,
    #[serde(default)]
    pub button_enabled: bool,
    #[serde(default)]
    pub columns_desktop: u32,
    #[serde(default)]
    pub columns_mobile: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub button_text: String,
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub id: String,
    pub attributes: ImageAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAttributes {
    #[serde(default)]
    pub link_url: String,
    #[serde(default)]
    pub link_url_enabled: bool,
    #[serde(default)]
    pub alt: String,
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionHeaderBlock {
    pub id: String,
    pub attributes: SectionHeaderAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionHeaderAttributes {
    pub background_image_enabled: bool,
    #[serde(default)]
    pub background_image_url: String,
    pub callout_button_enabled: bool,
    #[serde(default)]
    pub callout_button_text: String,
    #[serde(default)]
    pub callout_link_url: String,
    pub callout_text_enabled: bool,
    #[serde(default)]
    pub callout_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub id: String,
    pub attributes: TextAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAttributes {
    /// Rich text as HTML
    pub content: String,
    #[serde(default)]
    pub text_align: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlock {
    pub id: String,
    pub attributes: VideoAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoAttributes {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_with_blocks(blocks: Value) -> Value {
        json!({
            "id": "p1",
            "type": "Page",
            "attributes": {
                "slug": "youth-group",
                "title": "Rooted",
                "content": "",
                "blocks": blocks
            }
        })
    }

    #[test]
    fn test_decode_known_blocks_in_order() {
        let page = Page::from_resource(page_with_blocks(json!([
            { "id": "b1", "type": "Text", "attributes": { "content": "<p>Hi</p>", "text_align": "left" } },
            { "id": "b2", "type": "Divider", "attributes": {} },
            { "id": "b3", "type": "Video", "attributes": { "url": "https://vimeo.com/1" } }
        ])))
        .unwrap();

        assert_eq!(page.slug, "youth-group");
        let ids: Vec<&str> = page.blocks.iter().map(Block::id).collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
        assert!(matches!(page.blocks[1], Block::Divider(_)));
    }

    #[test]
    fn test_unknown_block_fails_closed() {
        let err = Page::from_resource(page_with_blocks(json!([
            { "id": "b1", "type": "Carousel", "attributes": {} }
        ])))
        .unwrap_err();

        match err {
            AppError::UnsupportedBlock { block_type, id } => {
                assert_eq!(block_type, "Carousel");
                assert_eq!(id, "b1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_malformed_known_block_is_decode_error() {
        let err = Page::from_resource(page_with_blocks(json!([
            { "id": "b1", "type": "Image", "attributes": { "alt": "no src" } }
        ])))
        .unwrap_err();
        assert!(matches!(err, AppError::Decode { .. }));
    }
}
