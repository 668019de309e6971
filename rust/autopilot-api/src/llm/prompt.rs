//! Article generation prompt.

use std::fmt::Write;

use super::Message;
use crate::domain::{Article, Project};

const SYSTEM_PROMPT: &str = "You are an experienced SEO copywriter. \
Write complete, well-structured blog articles in HTML using <h2>, <h3>, <p>, <ul> and <li> tags only. \
Do not include <html>, <head> or <body> tags. \
Reply with a single JSON object with the keys \"title\", \"content\", \"metaDescription\" and \"excerpt\". \
\"content\" holds the HTML body. \"metaDescription\" is at most 155 characters.";

/// Messages for generating `article` within `project`.
pub fn build_article_prompt(project: &Project, article: &Article) -> Vec<Message> {
    let mut user = format!(
        "Write an article for the website \"{}\".\nLanguage: {}\nWorking title: {}\n",
        project.name, project.language, article.title
    );
    if !article.focus_keyword.is_empty() {
        let _ = writeln!(user, "Focus keyword: {}", article.focus_keyword);
    }
    if let Some(outline) = article.outline.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(user, "Follow this outline:\n{outline}");
    }
    if let Some(notes) = article.notes.as_deref().filter(|s| !s.trim().is_empty()) {
        let _ = writeln!(user, "Additional notes:\n{notes}");
    }

    vec![Message::system(SYSTEM_PROMPT), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessageRole;

    #[test]
    fn test_prompt_includes_article_fields() {
        let mut project = Project::new("t", "Garden Blog");
        project.language = "nl".into();
        let mut article = Article::new("t", &project.id, "Pruning roses", "rose pruning");
        article.outline = Some("1. When\n2. How".into());

        let messages = build_article_prompt(&project, &article);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        let user = &messages[1].content;
        assert!(user.contains("Garden Blog"));
        assert!(user.contains("Language: nl"));
        assert!(user.contains("Focus keyword: rose pruning"));
        assert!(user.contains("1. When"));
        assert!(!user.contains("Additional notes"));
    }
}
