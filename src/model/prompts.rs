//! Prompt text sent to the model.

/// JSON shape every structured summary must follow.
const SUMMARY_SCHEMA: &str = r##"{
  "title": "A simplified, punchy title (max 10 words)",
  "one_sentence_summary": "A single sentence capturing the core contribution.",
  "key_innovations": [
    {"emoji": "🚀", "title": "Innovation title", "description": "Short explanation"}
  ],
  "impact_statement": "Why this research matters for the field (1-2 sentences).",
  "tags": ["Tag1", "Tag2", "Tag3"],
  "design_theme": {
    "accent_color": "#RRGGBB matching the topic",
    "highlight_bg": "#RRGGBB, a very light version of the accent colour"
  }
}"##;

/// Summary prompt for an attached PDF.
pub(crate) fn summarize_paper() -> String {
    format!(
        "You are an expert academic editor. Read the attached paper and extract its key \
         information for busy researchers deciding whether to read it.\n\
         Output only valid JSON with this schema:\n{SUMMARY_SCHEMA}"
    )
}

/// Summary prompt for an abstract.
pub(crate) fn summarize_text(text: &str) -> String {
    format!(
        "You are an expert academic editor. Read the following abstract and extract its key \
         information for busy researchers deciding whether to read it.\n\
         Output only valid JSON with this schema:\n{SUMMARY_SCHEMA}\n\nAbstract:\n{text}"
    )
}

/// Image prompt for a free-text description.
pub(crate) fn image_prompt(description: &str) -> String {
    format!(
        "Write one prompt for an image generation model. The image is a clean, modern \
         scientific illustration without any text, suitable as a poster cover for:\n\
         {description}\n\nReturn only the prompt."
    )
}

/// Hero image prompt for a whole digest.
pub(crate) fn digest_prompt(digest_text: &str) -> String {
    format!(
        "Today's research digest covers these papers:\n{digest_text}\n\
         Write one prompt for an image generation model describing a single editorial \
         illustration that ties the common themes together. No text in the image. \
         Return only the prompt."
    )
}

/// Library analysis prompt.
pub(crate) fn analyze_library(library: &str) -> String {
    format!(
        "These documents come from one researcher's personal library:\n{library}\n\
         Infer their research interests. Output only valid JSON:\n\
         {{\"suggested_queries\": [\"3-5 concise arXiv search queries, most relevant first\"], \
         \"research_directions\": [\"2-4 short research directions\"]}}"
    )
}
