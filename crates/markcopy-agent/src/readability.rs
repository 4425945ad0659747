//! Article extraction seam, used when the locator finds nothing.

use tracing::debug;

/// Extracted main article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub content: String,
    pub title: Option<String>,
}

/// Article extraction over a copy of the document. Implementations never
/// see the live page.
pub trait ReadabilityExtractor: Send + Sync {
    fn extract(&self, document_html: &str, url: &str) -> Option<Article>;
}

/// Mozilla Readability port backed by `readabilityrs`.
#[derive(Debug, Clone, Default)]
pub struct ReadabilityArticle;

impl ReadabilityExtractor for ReadabilityArticle {
    fn extract(&self, document_html: &str, url: &str) -> Option<Article> {
        let base = (!url.is_empty()).then_some(url);
        let parser = match readabilityrs::Readability::new(document_html, base, None) {
            Ok(parser) => parser,
            Err(e) => {
                debug!("Readability rejected document: {:?}", e);
                return None;
            }
        };
        let article = parser.parse()?;
        let content = article.content.filter(|c| !c.trim().is_empty())?;
        Some(Article {
            content,
            title: article.title.filter(|t| !t.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAGRAPH: &str = "The harbour lights came on one by one as the ferry pulled \
        away from the pier, and the passengers gathered along the rail to watch the \
        city fold itself into the evening haze while gulls wheeled overhead.";

    #[test]
    fn test_extracts_article_body() {
        let body: String = (0..8).map(|_| format!("<p>{}</p>", PARAGRAPH)).collect();
        let html = format!(
            "<html><head><title>Evening Ferry</title></head><body>\
             <nav><a href=\"/\">Home</a></nav>\
             <article><h1>Evening Ferry</h1>{}</article>\
             <footer>Copyright</footer></body></html>",
            body
        );
        let article = ReadabilityArticle
            .extract(&html, "https://example.com/ferry")
            .unwrap();
        assert!(article.content.contains("harbour lights"));
    }
}
