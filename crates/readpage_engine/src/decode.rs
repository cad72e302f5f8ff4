use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// A fetched body turned into text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBody {
    pub text: String,
    pub encoding_label: String,
    /// Malformed sequences were replaced with U+FFFD.
    pub lossy: bool,
}

/// Turn body bytes into text. Never fails: bytes that do not fit the chosen
/// encoding become U+FFFD, the way browsers read broken pages.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> DecodedBody {
    let encoding = pick_encoding(bytes, content_type);
    // `decode` also strips a BOM matching `encoding`.
    let (text, used, lossy) = encoding.decode(bytes);
    DecodedBody {
        text: text.into_owned(),
        encoding_label: used.name().to_string(),
        lossy,
    }
}

/// A byte order mark wins, then a usable `charset` parameter, then a guess.
fn pick_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((bom, _)) = Encoding::for_bom(bytes) {
        return bom;
    }
    let declared = content_type
        .and_then(charset_param)
        .and_then(|label| Encoding::for_label(label.as_bytes()));
    declared.unwrap_or_else(|| {
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        detector.guess(None, true)
    })
}

fn charset_param(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']))
    })
}
