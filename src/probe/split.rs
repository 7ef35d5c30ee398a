use tracing::warn;

/// Split a blob of back-to-back JSON objects into one slice per object.
///
/// A document opens at a `{` seen outside any document and closes when the
/// count of open `{`/`[` minus closing `}`/`]` returns to zero. Delimiters
/// inside string literals (escapes included) are not counted. Text between
/// documents is skipped, and an unterminated trailing document is dropped.
pub fn split_documents(text: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, byte) in text.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'{' if depth == 0 => {
                start = i;
                depth = 1;
            }
            b'"' if depth > 0 => in_string = true,
            b'{' | b'[' if depth > 0 => depth += 1,
            b'}' | b']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    documents.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    if depth > 0 {
        warn!(
            "Dropping unterminated JSON document starting at byte {} ({} bytes)",
            start,
            text.len() - start
        );
    }

    documents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_document() {
        let docs = split_documents(r#"  {"a": {"b": [1, 2]}}  "#);
        assert_eq!(docs, vec![r#"{"a": {"b": [1, 2]}}"#]);
    }

    #[test]
    fn back_to_back_documents_without_separator() {
        let docs = split_documents(r#"{"n":1}{"n":2}"#);
        assert_eq!(docs, vec![r#"{"n":1}"#, r#"{"n":2}"#]);
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let text = r#"{"error": "unexpected '}' in \"stream\" {"}{"n":2}"#;
        let docs = split_documents(text);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1], r#"{"n":2}"#);
    }

    #[test]
    fn banner_text_between_documents_is_skipped() {
        let text = "-----------\nServer listening on 5201 \"x\"\n{\"n\":1}\nnoise }\n{\"n\":2}\n";
        assert_eq!(split_documents(text), vec!["{\"n\":1}", "{\"n\":2}"]);
    }

    #[test]
    fn truncated_tail_is_dropped() {
        assert_eq!(split_documents(r#"{"n":1}{"n":"#), vec![r#"{"n":1}"#]);
        assert!(split_documents("").is_empty());
    }
}
