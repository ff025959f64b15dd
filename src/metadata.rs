use crate::model::Metadata;

/// Markdown header block for a book: title, authors, publisher, language and
/// description, closed by a rule. Empty when the metadata is empty.
pub fn format_metadata(metadata: &Metadata) -> String {
    let mut lines = Vec::new();

    if let Some(title) = &metadata.title {
        lines.push(format!("# {}", title));
        lines.push(String::new());
    }

    if !metadata.authors.is_empty() {
        lines.push(format!("**Author:** {}", metadata.authors.join(", ")));
    }

    if let Some(publisher) = &metadata.publisher {
        lines.push(format!("**Publisher:** {}", publisher));
    }

    if let Some(language) = &metadata.language {
        lines.push(format!("**Language:** {}", language));
    }

    let description = metadata
        .long_description
        .as_ref()
        .or(metadata.description.as_ref());
    if let Some(description) = description {
        lines.push(String::new());
        for line in description.lines() {
            lines.push(format!("> {}", line).trim_end().to_string());
        }
    }

    if !lines.is_empty() {
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    let result = lines.join("\n");
    if result.is_empty() {
        result
    } else {
        result + "\n"
    }
}
