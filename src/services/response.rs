use serde::Serialize;
use serde_json::{Deserializer, Map, Value};

/// Result of pulling the probability object out of a free-text reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind")]
pub enum ParsedResponse {
    Parsed {
        probabilities: Map<String, Value>,
        extra: String,
    },
    Unparsed {
        raw: String,
    },
}

/// Extracts the first top-level JSON object; text after the last `}` of the
/// reply becomes `extra`.
///
/// Replies with no object, an empty object, or an object that is not valid
/// JSON come back as `Unparsed`.
pub fn parse_response(text: &str) -> ParsedResponse {
    let unparsed = || ParsedResponse::Unparsed {
        raw: text.trim().to_string(),
    };

    let mut search_from = 0;
    while let Some(rel) = text[search_from..].find('{') {
        let start = search_from + rel;
        let mut stream = Deserializer::from_str(&text[start..]).into_iter::<Map<String, Value>>();

        match stream.next() {
            Some(Ok(object)) => {
                if object.is_empty() {
                    return unparsed();
                }
                let object_end = start + stream.byte_offset();
                let end = text.rfind('}').map_or(object_end, |i| i + 1);
                return ParsedResponse::Parsed {
                    probabilities: object,
                    extra: text[end..].trim().to_string(),
                };
            }
            // Not an object here; try the next brace.
            _ => search_from = start + 1,
        }
    }

    unparsed()
}
