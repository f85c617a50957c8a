// src/services/render.rs

//! Markdown rendering for Church Center publishing pages.
//!
//! Each block renders to one Markdown chunk; chunks are joined by blank
//! lines under a YAML front matter carrying the title, excerpt, and cover
//! image. Images referenced by blocks are downloaded serially in block order.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};
use unicode_segmentation::UnicodeSegmentation;

use super::images::{ImageStore, ministry_image_name};
use crate::error::{AppError, Result};
use crate::models::{Block, ExportConfig, GridBlock, ImageBlock, Page, SectionHeaderBlock};

/// Maximum excerpt length, in grapheme clusters.
pub const EXCERPT_GRAPHEMES: usize = 100;

static YOUTUBE_WATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:www\.|m\.)?(?:youtube\.com/watch\?(?:[^#]*&)?v=|youtu\.be/)([\w-]+)")
        .expect("valid regex")
});

static VIMEO_WATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:www\.)?vimeo\.com/(\d+)").expect("valid regex"));

/// Rendering switches taken from `[export]`.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub require_cover_image: bool,
    pub image_url_prefix: String,
}

impl RenderOptions {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            require_cover_image: config.require_cover_image,
            image_url_prefix: config.image_url_prefix.clone(),
        }
    }

    fn image_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.image_url_prefix.trim_end_matches('/'), file_name)
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// A page rendered to Markdown.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub site_slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    /// Site path of the cover image
    pub cover_image: Option<String>,
    pub body: String,
}

impl RenderedPage {
    /// Front matter followed by the body.
    pub fn to_markdown(&self) -> Result<String> {
        let mut out = String::from("---\n");
        out.push_str(&format!("title: {}\n", yaml_string(&self.title)?));
        if let Some(excerpt) = &self.excerpt {
            out.push_str(&format!("excerpt: {}\n", yaml_string(excerpt)?));
        }
        if let Some(image) = &self.cover_image {
            out.push_str(&format!("image: {}\n", yaml_string(image)?));
        }
        out.push_str("---\n\n");
        out.push_str(&self.body);
        out.push('\n');
        Ok(out)
    }
}

/// JSON string escaping yields a valid double-quoted YAML scalar.
fn yaml_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Render every block of `page`, downloading its images into `images`.
pub async fn render_page(
    page: &Page,
    site_slug: &str,
    images: &mut dyn ImageStore,
    options: &RenderOptions,
) -> Result<RenderedPage> {
    let mut renderer = PageRenderer {
        site_slug,
        images,
        options,
        cover_image: None,
        first_text: None,
    };

    let mut chunks = Vec::with_capacity(page.blocks.len());
    for block in &page.blocks {
        let chunk = renderer.render_block(block).await?;
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
    }

    let PageRenderer {
        cover_image,
        first_text,
        ..
    } = renderer;

    if cover_image.is_none() && options.require_cover_image {
        return Err(AppError::MissingCoverImage {
            slug: page.slug.clone(),
        });
    }

    Ok(RenderedPage {
        site_slug: site_slug.to_string(),
        title: page.title.clone(),
        excerpt: first_text
            .map(|text| excerpt(&text, EXCERPT_GRAPHEMES))
            .filter(|text| !text.is_empty()),
        cover_image,
        body: chunks.join("\n\n"),
    })
}

struct PageRenderer<'a> {
    site_slug: &'a str,
    images: &'a mut dyn ImageStore,
    options: &'a RenderOptions,
    cover_image: Option<String>,
    first_text: Option<String>,
}

impl PageRenderer<'_> {
    async fn render_block(&mut self, block: &Block) -> Result<String> {
        let chunk = match block {
            Block::Button(b) => link(&b.attributes.text, &b.attributes.link_url),
            Block::Divider(_) => "---".to_string(),
            Block::Grid(b) => self.render_grid(b).await?,
            Block::Image(b) => self.render_image(b).await?,
            Block::SectionHeader(b) => self.render_section_header(b).await?,
            Block::Text(b) => {
                let markdown = html_to_markdown(&b.attributes.content);
                if self.first_text.is_none() && !markdown.trim().is_empty() {
                    self.first_text = Some(markdown.clone());
                }
                markdown
            }
            Block::Video(b) => video_embed(&b.attributes.url),
        };
        Ok(chunk)
    }

    /// Download an image and return its site path.
    async fn download(&mut self, url: &str, block_id: &str, index: Option<usize>) -> Result<String> {
        let name = ministry_image_name(self.site_slug, block_id, index);
        let file_name = self.images.store(url, &name).await?;
        Ok(self.options.image_url(&file_name))
    }

    fn offer_cover(&mut self, path: &str) {
        if self.cover_image.is_none() {
            self.cover_image = Some(path.to_string());
        }
    }

    async fn render_image(&mut self, block: &ImageBlock) -> Result<String> {
        let a = &block.attributes;
        let path = self.download(&a.src, &block.id, None).await?;
        self.offer_cover(&path);

        let image = format!("![{}]({})", a.alt, path);
        if a.link_url_enabled && !a.link_url.is_empty() {
            Ok(format!("[{}]({})", image, a.link_url))
        } else {
            Ok(image)
        }
    }

    async fn render_section_header(&mut self, block: &SectionHeaderBlock) -> Result<String> {
        let a = &block.attributes;
        let mut parts = Vec::new();

        if a.background_image_enabled && !a.background_image_url.is_empty() {
            let path = self.download(&a.background_image_url, &block.id, None).await?;
            self.offer_cover(&path);
            parts.push(format!("![]({})", path));
        }

        if a.callout_text_enabled {
            let text = html_to_markdown(&a.callout_text).replace('\n', " ");
            if !text.trim().is_empty() {
                parts.push(format!("## {}", text.trim()));
            }
        }

        if a.callout_button_enabled && !a.callout_link_url.is_empty() {
            parts.push(link(&a.callout_button_text, &a.callout_link_url));
        }

        Ok(parts.join("\n\n"))
    }

    async fn render_grid(&mut self, block: &GridBlock) -> Result<String> {
        let a = &block.attributes;
        let mut sections = Vec::with_capacity(a.items.len());

        for (index, item) in a.items.iter().enumerate() {
            let mut parts = Vec::new();

            if a.title_enabled && !item.title.trim().is_empty() {
                parts.push(format!("### {}", item.title.trim()));
            }
            if a.image_enabled && !item.src.is_empty() {
                let path = self.download(&item.src, &block.id, Some(index)).await?;
                parts.push(format!("![{}]({})", item.alt, path));
            }
            if a.body_enabled {
                let body = html_to_markdown(&item.body);
                if !body.is_empty() {
                    parts.push(body);
                }
            }
            if a.button_enabled && !item.link_url.is_empty() {
                parts.push(link(&item.button_text, &item.link_url));
            }

            if !parts.is_empty() {
                sections.push(parts.join("\n\n"));
            }
        }

        Ok(sections.join("\n\n"))
    }
}

fn link(text: &str, url: &str) -> String {
    let text = if text.trim().is_empty() { url } else { text.trim() };
    format!("[{}]({})", text, url)
}

/// Embed URL for YouTube and Vimeo watch links; other URLs pass through.
pub fn embed_url(url: &str) -> String {
    if let Some(caps) = YOUTUBE_WATCH.captures(url) {
        return format!("https://www.youtube.com/embed/{}", &caps[1]);
    }
    if let Some(caps) = VIMEO_WATCH.captures(url) {
        return format!("https://player.vimeo.com/video/{}", &caps[1]);
    }
    url.to_string()
}

fn video_embed(url: &str) -> String {
    format!(
        r#"<iframe src="{}" width="560" height="315" frameborder="0" allow="autoplay; fullscreen; picture-in-picture" allowfullscreen></iframe>"#,
        embed_url(url).replace('"', "&quot;")
    )
}

/// Plain-text excerpt: no newlines, `*`, or quotes, whitespace collapsed,
/// cut to `limit` graphemes with `...` appended when cut.
pub fn excerpt(text: &str, limit: usize) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '*' | '"' | '\''))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    let graphemes: Vec<&str> = collapsed.graphemes(true).collect();
    if graphemes.len() <= limit {
        collapsed
    } else {
        format!("{}...", graphemes[..limit].concat().trim_end())
    }
}

// --- HTML to Markdown ---

/// Convert rich-text HTML to Markdown.
///
/// Handles paragraphs, headings, bold, italic, links, (nested) lists, and
/// line breaks. Other elements contribute their text only.
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::new();
    write_children(fragment.root_element(), 0, &mut out);

    out.split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn write_children(element: ElementRef<'_>, depth: usize, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&collapse_whitespace(text)),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    write_element(el, depth, out);
                }
            }
            _ => {}
        }
    }
}

fn inner_markdown(element: ElementRef<'_>, depth: usize) -> String {
    let mut out = String::new();
    write_children(element, depth, &mut out);
    out
}

fn write_element(element: ElementRef<'_>, depth: usize, out: &mut String) {
    let name = element.value().name();
    match name {
        "p" | "div" if depth == 0 => push_block(out, inner_markdown(element, depth).trim()),
        // Inside list items, paragraphs flow inline with a separating space.
        "p" | "div" => {
            if !out.is_empty() && !out.ends_with(char::is_whitespace) {
                out.push(' ');
            }
            write_children(element, depth, out);
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = usize::from(name.as_bytes()[1] - b'0');
            let text = inner_markdown(element, depth);
            if depth == 0 {
                push_block(out, &format!("{} {}", "#".repeat(level), text.trim()));
            } else {
                emphasize(out, "**", &text);
            }
        }
        "strong" | "b" => emphasize(out, "**", &inner_markdown(element, depth)),
        "em" | "i" => emphasize(out, "*", &inner_markdown(element, depth)),
        "a" => {
            let text = inner_markdown(element, depth);
            match element.value().attr("href") {
                Some(href) if !href.is_empty() => {
                    out.push_str(&format!("[{}]({})", text.trim(), href));
                }
                _ => out.push_str(&text),
            }
        }
        "br" => out.push_str("  \n"),
        "ul" => write_list(element, false, depth, out),
        "ol" => write_list(element, true, depth, out),
        "script" | "style" => {}
        _ => write_children(element, depth, out),
    }
}

fn write_list(list: ElementRef<'_>, ordered: bool, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let items = list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "li");

    let mut lines = Vec::new();
    for (i, item) in items.enumerate() {
        let marker = if ordered {
            format!("{}.", i + 1)
        } else {
            "-".to_string()
        };
        let content = inner_markdown(item, depth + 1);
        let content = content
            .trim()
            .lines()
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        lines.push(format!("{}{} {}", indent, marker, content));
    }

    if lines.is_empty() {
        return;
    }
    if depth == 0 {
        push_block(out, &lines.join("\n"));
    } else {
        out.push('\n');
        out.push_str(&lines.join("\n"));
    }
}

fn push_block(out: &mut String, text: &str) {
    if !text.is_empty() {
        out.push_str("\n\n");
        out.push_str(text);
        out.push_str("\n\n");
    }
}

/// Wrap `text` in `marker`, keeping surrounding whitespace outside it.
fn emphasize(out: &mut String, marker: &str, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        out.push_str(text);
        return;
    }
    if text.starts_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(marker);
    out.push_str(trimmed);
    out.push_str(marker);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
                in_space = true;
            }
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}
