//! Media type sniffing for downloaded bodies
//!
//! The type is decided from leading byte signatures only. URL extensions and
//! `Content-Type` headers are never consulted, because a private blog answers
//! image URLs with an HTML login page and a 200 status.

/// Media type detected from content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    /// JPEG / JFIF / EXIF
    Jpeg,
    /// PNG
    Png,
    /// GIF87a / GIF89a
    Gif,
    /// WebP (RIFF container)
    Webp,
    /// Windows bitmap
    Bmp,
    /// TIFF, either byte order
    Tiff,
    /// Windows icon
    Icon,
    /// AVIF (ISO-BMFF)
    Avif,
    /// HEIC/HEIF (ISO-BMFF)
    Heic,
    /// SVG document
    Svg,
    /// HTML page
    Html,
    /// Other XML document
    Xml,
    /// PDF document
    Pdf,
    /// ZIP archive
    Zip,
    /// GZIP stream
    Gzip,
    /// JSON text
    Json,
    /// Nothing recognized
    Unknown,
}

impl MediaType {
    /// MIME type string
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Webp => "image/webp",
            MediaType::Bmp => "image/bmp",
            MediaType::Tiff => "image/tiff",
            MediaType::Icon => "image/vnd.microsoft.icon",
            MediaType::Avif => "image/avif",
            MediaType::Heic => "image/heic",
            MediaType::Svg => "image/svg+xml",
            MediaType::Html => "text/html",
            MediaType::Xml => "application/xml",
            MediaType::Pdf => "application/pdf",
            MediaType::Zip => "application/zip",
            MediaType::Gzip => "application/gzip",
            MediaType::Json => "application/json",
            MediaType::Unknown => "unknown",
        }
    }

    /// Whether the top-level MIME category is `image`
    pub fn is_image(&self) -> bool {
        self.mime().starts_with("image/")
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime())
    }
}

// (offset, signature, type), checked in order
const SIGNATURES: &[(usize, &[u8], MediaType)] = &[
    (0, b"\xFF\xD8\xFF", MediaType::Jpeg),
    (0, b"\x89PNG\r\n\x1A\n", MediaType::Png),
    (0, b"GIF87a", MediaType::Gif),
    (0, b"GIF89a", MediaType::Gif),
    (8, b"WEBP", MediaType::Webp),
    (0, b"II*\0", MediaType::Tiff),
    (0, b"MM\0*", MediaType::Tiff),
    (0, b"\0\0\x01\0", MediaType::Icon),
    (0, b"%PDF-", MediaType::Pdf),
    (0, b"PK\x03\x04", MediaType::Zip),
    (0, b"PK\x05\x06", MediaType::Zip),
    (0, b"\x1F\x8B", MediaType::Gzip),
];

const AVIF_BRANDS: &[&[u8]] = &[b"avif", b"avis"];
const HEIC_BRANDS: &[&[u8]] = &[b"heic", b"heix", b"hevc", b"hevx", b"mif1", b"msf1"];

const HTML_PREFIXES: &[&[u8]] = &[
    b"<!doctype html",
    b"<html",
    b"<head",
    b"<body",
    b"<title",
    b"<script",
    b"<meta",
    b"<div",
    b"<p>",
    b"<h1",
];

/// How far into a text document to look for the root element
const TEXT_SNIFF_LEN: usize = 1024;

/// Detect the media type of a body
pub fn sniff(data: &[u8]) -> MediaType {
    if data.is_empty() {
        return MediaType::Unknown;
    }

    for (offset, signature, kind) in SIGNATURES {
        if data.get(*offset..*offset + signature.len()) == Some(*signature) {
            // "WEBP" at 8 only counts inside a RIFF container
            if *kind == MediaType::Webp && !data.starts_with(b"RIFF") {
                continue;
            }
            return *kind;
        }
    }

    if data.starts_with(b"BM") && data.len() >= 14 {
        return MediaType::Bmp;
    }

    if let Some(kind) = sniff_ftyp(data) {
        return kind;
    }

    sniff_text(data)
}

/// ISO-BMFF: `....ftyp<brand>`
fn sniff_ftyp(data: &[u8]) -> Option<MediaType> {
    if data.get(4..8) != Some(b"ftyp".as_slice()) {
        return None;
    }
    let brand = data.get(8..12)?;
    if AVIF_BRANDS.iter().any(|b| *b == brand) {
        Some(MediaType::Avif)
    } else if HEIC_BRANDS.iter().any(|b| *b == brand) {
        Some(MediaType::Heic)
    } else {
        None
    }
}

fn sniff_text(data: &[u8]) -> MediaType {
    let data = data.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(data);
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let head = &data[start..data.len().min(start + TEXT_SNIFF_LEN)];
    let lower = head.to_ascii_lowercase();

    if HTML_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return MediaType::Html;
    }

    if lower.starts_with(b"<svg") {
        return MediaType::Svg;
    }

    if lower.starts_with(b"<?xml") || lower.starts_with(b"<!--") || lower.starts_with(b"<!doctype")
    {
        if find(&lower, b"<svg").is_some() {
            return MediaType::Svg;
        }
        if find(&lower, b"<html").is_some() {
            return MediaType::Html;
        }
        return MediaType::Xml;
    }

    if (lower.starts_with(b"{") || lower.starts_with(b"["))
        && serde_json::from_slice::<serde_json::Value>(data).is_ok()
    {
        return MediaType::Json;
    }

    MediaType::Unknown
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_signatures() {
        assert_eq!(sniff(b"\xFF\xD8\xFF\xE0\0\x10JFIF\0"), MediaType::Jpeg);
        assert_eq!(sniff(b"\x89PNG\r\n\x1A\n\0\0\0\rIHDR"), MediaType::Png);
        assert_eq!(sniff(b"GIF89a\x01\0\x01\0"), MediaType::Gif);
        assert_eq!(sniff(b"GIF87a\x01\0\x01\0"), MediaType::Gif);
        assert_eq!(sniff(b"RIFF\x24\0\0\0WEBPVP8 "), MediaType::Webp);
        assert_eq!(sniff(b"BM\x36\0\0\0\0\0\0\0\x36\0\0\0"), MediaType::Bmp);
        assert_eq!(sniff(b"II*\0\x08\0\0\0"), MediaType::Tiff);
        assert_eq!(sniff(b"MM\0*\0\0\0\x08"), MediaType::Tiff);
        assert_eq!(sniff(b"\0\0\x01\0\x01\0\x10\x10"), MediaType::Icon);
    }

    #[test]
    fn iso_bmff_brands() {
        assert_eq!(sniff(b"\0\0\0\x1cftypavif\0\0\0\0"), MediaType::Avif);
        assert_eq!(sniff(b"\0\0\0\x18ftypheic\0\0\0\0"), MediaType::Heic);
        assert_eq!(sniff(b"\0\0\0\x18ftypisom\0\0\0\0"), MediaType::Unknown);
    }

    #[test]
    fn riff_without_webp_is_not_an_image() {
        assert_eq!(sniff(b"RIFF\x24\0\0\0WAVEfmt "), MediaType::Unknown);
    }

    #[test]
    fn html_login_page_is_rejected() {
        let page = b"\n  <!DOCTYPE html>\n<html><head><title>Private Site</title>";
        let kind = sniff(page);
        assert_eq!(kind, MediaType::Html);
        assert_eq!(kind.mime(), "text/html");
        assert!(!kind.is_image());
    }

    #[test]
    fn html_fragment_with_bom() {
        assert_eq!(sniff(b"\xEF\xBB\xBF<HTML lang=en>"), MediaType::Html);
    }

    #[test]
    fn svg_is_an_image() {
        assert_eq!(sniff(b"<svg xmlns='http://www.w3.org/2000/svg'/>"), MediaType::Svg);
        let with_prolog = b"<?xml version=\"1.0\"?>\n<!-- generator -->\n<svg width=\"1\"/>";
        assert_eq!(sniff(with_prolog), MediaType::Svg);
        assert!(MediaType::Svg.is_image());
    }

    #[test]
    fn other_documents_are_recognized_but_not_images() {
        for (body, kind) in [
            (b"<?xml version=\"1.0\"?><rss/>".as_slice(), MediaType::Xml),
            (b"%PDF-1.7\n", MediaType::Pdf),
            (b"PK\x03\x04\x14\0", MediaType::Zip),
            (b"\x1F\x8B\x08\0", MediaType::Gzip),
            (b"{\"error\":\"forbidden\"}", MediaType::Json),
        ] {
            assert_eq!(sniff(body), kind);
            assert!(!kind.is_image(), "{kind}");
        }
    }

    #[test]
    fn empty_and_plain_text_are_unknown() {
        assert_eq!(sniff(b""), MediaType::Unknown);
        assert_eq!(sniff(b"403: Access Denied"), MediaType::Unknown);
        assert_eq!(sniff(b"{not json"), MediaType::Unknown);
        assert_eq!(MediaType::Unknown.mime(), "unknown");
        assert!(!MediaType::Unknown.is_image());
    }

    #[test]
    fn truncated_signatures_do_not_match() {
        assert_eq!(sniff(b"\xFF\xD8"), MediaType::Unknown);
        assert_eq!(sniff(b"\x89PNG"), MediaType::Unknown);
        assert_eq!(sniff(b"BM"), MediaType::Unknown);
    }
}
