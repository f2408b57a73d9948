//! Pure HTML renderer (§4.6): `(Page, Site, SiteSettings) -> String`.
//!
//! Deterministic and escape-safe by construction: every user-supplied
//! string passes through `escape_html` before it reaches the output buffer,
//! which is what makes property 6 (§8 "HTML escape") and the manifest's
//! hash-stability invariant (§3) hold.

use builder_domain::content::{Alignment, CtaVariant, Section};
use builder_domain::model::{Page, Site};

/// Escape `&`, `<`, `>`, `"`, `'` — the five characters property 6 (§8)
/// requires never to appear literally in rendered output.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn alignment_class(a: Alignment) -> &'static str {
    match a {
        Alignment::Left => "align-left",
        Alignment::Center => "align-center",
        Alignment::Right => "align-right",
    }
}

fn cta_variant_class(v: CtaVariant) -> &'static str {
    match v {
        CtaVariant::Primary => "btn-primary",
        CtaVariant::Secondary => "btn-secondary",
        CtaVariant::Outline => "btn-outline",
    }
}

/// Known icon names map to an emoji glyph; unknown names fall back to a
/// default icon (§4.6).
fn icon_glyph(name: &str) -> &'static str {
    match name {
        "code" => "💻",
        "palette" => "🎨",
        "rocket" => "🚀",
        "star" => "⭐",
        "shield" => "🛡️",
        "zap" => "⚡",
        "heart" => "❤️",
        "globe" => "🌐",
        "mail" => "✉️",
        "phone" => "📞",
        "settings" => "⚙️",
        "check" => "✅",
        "chart" => "📊",
        "lock" => "🔒",
        "cloud" => "☁️",
        "users" => "👥",
        _ => "✨",
    }
}

fn render_hero(s: &builder_domain::content::HeroSection) -> String {
    let mut out = format!(
        "<section class=\"section hero {}\">",
        alignment_class(s.alignment)
    );
    out.push_str(&format!("<h1>{}</h1>", escape_html(&s.heading)));
    if let Some(sub) = &s.subheading {
        out.push_str(&format!("<p class=\"subheading\">{}</p>", escape_html(sub)));
    }
    if let (Some(text), Some(link)) = (&s.cta_text, &s.cta_link) {
        out.push_str(&format!(
            "<a class=\"btn btn-primary\" href=\"{}\">{}</a>",
            escape_html(link),
            escape_html(text)
        ));
    }
    out.push_str("</section>");
    out
}

fn render_text(s: &builder_domain::content::TextSection) -> String {
    let mut out = format!(
        "<section class=\"section text {}\">",
        alignment_class(s.alignment)
    );
    if let Some(heading) = &s.heading {
        out.push_str(&format!("<h2>{}</h2>", escape_html(heading)));
    }
    out.push_str(&format!("<div class=\"body\">{}</div>", escape_html(&s.body)));
    out.push_str("</section>");
    out
}

fn grid_class(columns: builder_domain::content::Columns) -> String {
    format!("grid grid-cols-{}", columns.as_u8())
}

fn render_features(s: &builder_domain::content::FeaturesSection) -> String {
    let mut out = String::from("<section class=\"section features\">");
    if let Some(heading) = &s.heading {
        out.push_str(&format!("<h2>{}</h2>", escape_html(heading)));
    }
    out.push_str(&format!("<div class=\"{}\">", grid_class(s.columns)));
    for item in &s.items {
        out.push_str("<div class=\"feature-item\">");
        out.push_str(&format!(
            "<span class=\"icon\">{}</span>",
            icon_glyph(&item.icon)
        ));
        out.push_str(&format!("<h3>{}</h3>", escape_html(&item.title)));
        out.push_str(&format!("<p>{}</p>", escape_html(&item.description)));
        out.push_str("</div>");
    }
    out.push_str("</div></section>");
    out
}

fn render_cards(s: &builder_domain::content::CardsSection) -> String {
    let mut out = String::from("<section class=\"section cards\">");
    if let Some(heading) = &s.heading {
        out.push_str(&format!("<h2>{}</h2>", escape_html(heading)));
    }
    out.push_str(&format!("<div class=\"{}\">", grid_class(s.columns)));
    for item in &s.items {
        out.push_str("<div class=\"card\">");
        if let Some(image) = &item.image {
            out.push_str(&format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape_html(image),
                escape_html(&item.title)
            ));
        }
        out.push_str(&format!("<h3>{}</h3>", escape_html(&item.title)));
        out.push_str(&format!("<p>{}</p>", escape_html(&item.description)));
        if let Some(link) = &item.link {
            out.push_str(&format!(
                "<a class=\"card-link\" href=\"{}\">Learn more</a>",
                escape_html(link)
            ));
        }
        out.push_str("</div>");
    }
    out.push_str("</div></section>");
    out
}

fn render_image(s: &builder_domain::content::ImageSection) -> String {
    let width_class = if s.full_width { "full-width" } else { "" };
    let mut out = format!("<section class=\"section image {width_class}\">");
    out.push_str(&format!(
        "<img src=\"{}\" alt=\"{}\">",
        escape_html(&s.src),
        escape_html(&s.alt)
    ));
    if let Some(caption) = &s.caption {
        out.push_str(&format!(
            "<figcaption>{}</figcaption>",
            escape_html(caption)
        ));
    }
    out.push_str("</section>");
    out
}

fn render_cta(s: &builder_domain::content::CtaSection) -> String {
    let mut out = String::from("<section class=\"section cta\">");
    out.push_str(&format!("<h2>{}</h2>", escape_html(&s.heading)));
    if let Some(desc) = &s.description {
        out.push_str(&format!("<p>{}</p>", escape_html(desc)));
    }
    out.push_str(&format!(
        "<a class=\"btn {}\" href=\"{}\">{}</a>",
        cta_variant_class(s.variant),
        escape_html(&s.button_link),
        escape_html(&s.button_text)
    ));
    out.push_str("</section>");
    out
}

fn render_section(section: &Section) -> String {
    match section {
        Section::Hero(s) => render_hero(s),
        Section::Text(s) => render_text(s),
        Section::Features(s) => render_features(s),
        Section::Cards(s) => render_cards(s),
        Section::Image(s) => render_image(s),
        Section::Cta(s) => render_cta(s),
    }
}

fn render_nav(site: &Site, current_path: &str) -> String {
    if site.settings.nav.is_empty() {
        return String::new();
    }
    let mut out = String::from("<nav>");
    for item in &site.settings.nav {
        let active = if item.path == current_path {
            " class=\"active\""
        } else {
            ""
        };
        out.push_str(&format!(
            "<a href=\"{}\"{active}>{}</a>",
            escape_html(&item.path),
            escape_html(&item.label)
        ));
    }
    out.push_str("</nav>");
    out
}

fn render_footer(site: &Site) -> String {
    let Some(footer) = &site.settings.footer else {
        return String::new();
    };
    let mut out = String::from("<footer>");
    if let Some(text) = &footer.text {
        out.push_str(&format!("<p>{}</p>", escape_html(text)));
    }
    if !footer.links.is_empty() {
        out.push_str("<div class=\"footer-links\">");
        for link in &footer.links {
            out.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&link.path),
                escape_html(&link.label)
            ));
        }
        out.push_str("</div>");
    }
    out.push_str("</footer>");
    out
}

fn theme_style(site: &Site) -> String {
    let t = &site.settings.theme;
    let mut decls = Vec::new();
    if let Some(v) = &t.color_primary {
        decls.push(format!("--color-primary: {};", escape_html(v)));
    }
    if let Some(v) = &t.color_secondary {
        decls.push(format!("--color-secondary: {};", escape_html(v)));
    }
    if let Some(v) = &t.color_bg {
        decls.push(format!("--color-bg: {};", escape_html(v)));
    }
    if let Some(v) = &t.color_text {
        decls.push(format!("--color-text: {};", escape_html(v)));
    }
    if let Some(v) = &t.font_heading {
        decls.push(format!("--font-heading: {};", escape_html(v)));
    }
    if let Some(v) = &t.font_body {
        decls.push(format!("--font-body: {};", escape_html(v)));
    }
    format!(":root {{ {} }}", decls.join(" "))
}

const RESPONSIVE_GRID_CSS: &str = "\
.grid { display: grid; gap: 1.5rem; }
.grid-cols-2 { grid-template-columns: repeat(2, 1fr); }
.grid-cols-3 { grid-template-columns: repeat(3, 1fr); }
.grid-cols-4 { grid-template-columns: repeat(4, 1fr); }
@media (max-width: 768px) {
  .grid-cols-3, .grid-cols-4 { grid-template-columns: repeat(2, 1fr); }
}
@media (max-width: 480px) {
  .grid-cols-2, .grid-cols-3, .grid-cols-4 { grid-template-columns: 1fr; }
}";

/// Renders a standalone HTML5 document for `page` on `site` (§4.6).
pub fn render_page(page: &Page, site: &Site) -> String {
    let title = page.seo_title.as_deref().unwrap_or(&page.title);
    let description = page.seo_description.as_deref().unwrap_or("");

    let body_sections: String = page
        .content
        .sections
        .iter()
        .map(render_section)
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>{title}</title>\n\
<meta name=\"description\" content=\"{description}\">\n\
<meta property=\"og:title\" content=\"{title}\">\n\
<meta property=\"og:description\" content=\"{description}\">\n\
<meta property=\"og:type\" content=\"website\">\n\
<style>{theme}\n{grid_css}</style>\n\
</head>\n\
<body>\n\
{nav}\n\
<main>\n{body}\n</main>\n\
{footer}\n\
</body>\n\
</html>",
        title = escape_html(title),
        description = escape_html(description),
        theme = theme_style(site),
        grid_css = RESPONSIVE_GRID_CSS,
        nav = render_nav(site, &page.path),
        body = body_sections,
        footer = render_footer(site),
    )
}

/// Renders the site's 404 page (§4.4 step 4): same document shell, no
/// page-specific content beyond a fixed not-found message.
pub fn render_404(site: &Site) -> String {
    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"UTF-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
<title>Page not found</title>\n\
<style>{theme}</style>\n\
</head>\n\
<body>\n\
{nav}\n\
<main><section class=\"section text align-center\"><h1>404</h1><p>Page not found.</p></section></main>\n\
{footer}\n\
</body>\n\
</html>",
        theme = theme_style(site),
        nav = render_nav(site, ""),
        footer = render_footer(site),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use builder_domain::content::{HeroSection, PageContent};
    use builder_domain::model::SiteSettings;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_site() -> Site {
        Site {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Acme".into(),
            slug: "acme".into(),
            subdomain: "acme".into(),
            settings: SiteSettings::default(),
            active_version_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_page(site_id: Uuid, heading: &str) -> Page {
        Page {
            id: Uuid::new_v4(),
            site_id,
            path: "/".into(),
            title: "Home".into(),
            content: PageContent {
                sections: vec![Section::Hero(HeroSection {
                    heading: heading.to_string(),
                    subheading: None,
                    cta_text: None,
                    cta_link: None,
                    background_image: None,
                    alignment: Alignment::Center,
                })],
            },
            seo_title: None,
            seo_description: None,
            is_published: true,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn output_begins_with_doctype_and_declares_lang_en() {
        let site = sample_site();
        let page = sample_page(site.id, "Hi");
        let html = render_page(&page, &site);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("lang=\"en\""));
        assert!(html.contains("charset=\"UTF-8\""));
        assert!(html.contains("viewport"));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let site = sample_site();
        let page = sample_page(site.id, "<script>alert(1)</script>");
        let html = render_page(&page, &site);
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn escape_html_covers_all_five_characters() {
        let escaped = escape_html("&<>\"'");
        assert_eq!(escaped, "&amp;&lt;&gt;&quot;&#39;");
    }

    #[test]
    fn rendering_is_deterministic() {
        let site = sample_site();
        let page = sample_page(site.id, "Welcome");
        assert_eq!(render_page(&page, &site), render_page(&page, &site));
    }

    #[test]
    fn unknown_icon_falls_back_to_default() {
        assert_eq!(icon_glyph("not-a-real-icon"), "✨");
        assert_eq!(icon_glyph("rocket"), "🚀");
    }

    proptest::proptest! {
        /// Property 6 (§8): whatever string goes in, none of the five raw
        /// HTML-significant characters ever survive into the output.
        #[test]
        fn escaped_output_never_contains_raw_html_metacharacters(input in ".*") {
            let escaped = escape_html(&input);
            for raw in ['<', '>', '"', '\''] {
                proptest::prop_assert!(!escaped.contains(raw));
            }
            // `&` only ever appears as the lead-in of one of the five
            // entities this function emits.
            for (idx, _) in escaped.match_indices('&') {
                let tail = &escaped[idx..];
                proptest::prop_assert!(
                    tail.starts_with("&amp;")
                        || tail.starts_with("&lt;")
                        || tail.starts_with("&gt;")
                        || tail.starts_with("&quot;")
                        || tail.starts_with("&#39;")
                );
            }
        }
    }
}
