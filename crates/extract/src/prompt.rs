/// Fixed taxonomy description sent as the system message.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert knowledge extraction AI for a personal knowledge base.
Extract structured entities and the relationships between them from documents. Return JSON only, no markdown formatting.

For LinkedIn profiles, extract:
- Full name, current role, company, location, key skills (5-7 most important)

For meeting notes, extract:
- Meeting title, date (parse from text), key attendees (full names only), main topics discussed (3-5), technologies mentioned

For technical documents, extract:
- Organization names, technologies/platforms mentioned, strategic topics

Relationships connect entity names and must use one of these types:
- works_for (person -> organization)
- uses (person or organization -> technology)
- attended (person -> meeting title)
- discussed_in (topic -> meeting title)
- mentioned_with (any entity -> any entity mentioned alongside it)

Return in this exact JSON format:
{
  "people": [{"name": "Full Name", "role": "Job Title", "company": "Company", "location": "City, Country", "skills": ["skill1", "skill2"]}],
  "organizations": ["Company Name"],
  "technologies": ["Technology Name"],
  "topics": ["Topic description"],
  "meetings": [{"title": "Meeting Title", "date": "YYYY-MM-DD or Q4 2025", "attendees": ["Name1", "Name2"], "topics": ["topic1"]}],
  "relationships": [{"type": "works_for", "source": "Full Name", "target": "Company Name"}]
}

Only include entities that are clearly mentioned. Use empty arrays if not applicable."#;

pub const CONSOLIDATION_SYSTEM_PROMPT: &str = r#"You clean up technology name lists for a knowledge base.
Merge duplicates, spelling variants and typos into one canonical name each (for example "Power BI", "PowerBI" and "power bi" become "Power BI").
Drop entries that are not technologies, platforms or products.
Return JSON only, no markdown formatting, in this exact format:
{"technologies": ["Canonical Name"]}"#;

/// Character-safe prefix of `text`; anything past the budget is not sent.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn build_extraction_prompt(text: &str, source: &str, doc_type: &str, max_chars: usize) -> String {
    format!(
        r#"Document Type: {}
Source: {}

Document Content:
{}

Extract all relevant entities."#,
        doc_type,
        source,
        truncate_chars(text, max_chars)
    )
}

pub fn build_consolidation_prompt(names: &[String]) -> String {
    let mut prompt = format!("TECHNOLOGIES ({}):\n", names.len());
    for name in names {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push('\n');
    }
    prompt.push_str("\nReturn the consolidated list.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_extraction_prompt_is_truncated() {
        let text = "a".repeat(9000);
        let prompt = build_extraction_prompt(&text, "in/x.md", "Meeting Notes", 8000);

        assert!(prompt.starts_with("Document Type: Meeting Notes\nSource: in/x.md"));
        assert!(prompt.contains(&"a".repeat(8000)));
        assert!(!prompt.contains(&"a".repeat(8001)));
    }
}
