//! `Accept` negotiation between machine-readable and page clients.

use http::HeaderValue;
use mime::Mime;

/// Which representation an error response should take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationFamily {
    /// `application/problem+json`.
    Structured,
    /// Generic HTML error page.
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaClass {
    Structured,
    Page,
    Other,
}

/// Picks the family for an `Accept` header.
///
/// Page wins only when an HTML media range is strictly preferred over every
/// JSON range. A missing header, `*/*` or an unparsable value yields
/// [`RepresentationFamily::Structured`]. Ranges that fail to parse, or carry a
/// malformed `q`, are ignored.
#[must_use]
pub fn negotiate(accept: Option<&HeaderValue>) -> RepresentationFamily {
    let Some(accept) = accept.and_then(|v| v.to_str().ok()) else {
        return RepresentationFamily::Structured;
    };

    let mut structured = 0u16;
    let mut page = 0u16;
    for range in accept.split(',') {
        let Ok(media) = range.trim().parse::<Mime>() else {
            continue;
        };
        let quality = match media.get_param("q") {
            Some(q) => match parse_quality(q.as_str()) {
                Some(q) => q,
                None => continue,
            },
            None => 1000,
        };
        match classify(&media) {
            MediaClass::Structured => structured = structured.max(quality),
            MediaClass::Page => page = page.max(quality),
            MediaClass::Other => {}
        }
    }

    if page > structured {
        RepresentationFamily::Page
    } else {
        RepresentationFamily::Structured
    }
}

fn classify(media: &Mime) -> MediaClass {
    let (ty, sub) = (media.type_(), media.subtype());
    if (ty == mime::TEXT && (sub == mime::HTML || sub == mime::STAR))
        || (ty == mime::APPLICATION && sub == "xhtml" && media.suffix() == Some(mime::XML))
    {
        MediaClass::Page
    } else if (ty == mime::APPLICATION && (sub == mime::JSON || sub == mime::STAR))
        || media.suffix() == Some(mime::JSON)
    {
        MediaClass::Structured
    } else {
        MediaClass::Other
    }
}

/// `q` value in thousandths, `None` when malformed or above 1.
fn parse_quality(raw: &str) -> Option<u16> {
    let (int, frac) = raw.trim().split_once('.').unwrap_or((raw.trim(), ""));
    if frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let int: u16 = int.parse().ok()?;
    let frac: u16 = format!("{frac:0<3}").parse().ok()?;
    let q = int.checked_mul(1000)?.checked_add(frac)?;
    (q <= 1000).then_some(q)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn family(accept: &str) -> RepresentationFamily {
        negotiate(Some(&HeaderValue::from_str(accept).unwrap()))
    }

    #[test]
    fn missing_or_wildcard_accept_is_structured() {
        assert_eq!(negotiate(None), RepresentationFamily::Structured);
        assert_eq!(family("*/*"), RepresentationFamily::Structured);
        assert_eq!(family(""), RepresentationFamily::Structured);
    }

    #[test]
    fn browsers_get_pages() {
        assert_eq!(
            family("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
            RepresentationFamily::Page
        );
        assert_eq!(family("text/html"), RepresentationFamily::Page);
    }

    #[test]
    fn json_clients_get_problems() {
        assert_eq!(family("application/json"), RepresentationFamily::Structured);
        assert_eq!(
            family("application/problem+json"),
            RepresentationFamily::Structured
        );
        assert_eq!(
            family("application/vnd.acme+json, text/html;q=0.5"),
            RepresentationFamily::Structured
        );
    }

    #[test]
    fn ties_and_weights() {
        assert_eq!(
            family("text/html, application/json"),
            RepresentationFamily::Structured
        );
        assert_eq!(
            family("application/json;q=0.2, text/html;q=0.9"),
            RepresentationFamily::Page
        );
        assert_eq!(family("text/html;q=0"), RepresentationFamily::Structured);
        assert_eq!(
            family("text/html;q=bogus, application/json;q=0.1"),
            RepresentationFamily::Structured
        );
        assert_eq!(
            family("application/json;q=2, text/html;q=0.5"),
            RepresentationFamily::Page
        );
        assert_eq!(family("text/*;q=0.9, */*;q=0.1"), RepresentationFamily::Page);
    }

    #[test]
    fn quality_parsing() {
        assert_eq!(parse_quality("1"), Some(1000));
        assert_eq!(parse_quality("0.8"), Some(800));
        assert_eq!(parse_quality("0.125"), Some(125));
        assert_eq!(parse_quality("1.5"), None);
        assert_eq!(parse_quality("0.1234"), None);
        assert_eq!(parse_quality("abc"), None);
    }
}
