use pulldown_cmark::{html, Options, Parser};

/// Turns assistant markdown into sanitized, display-ready HTML. Async so a
/// heavyweight implementation can never block message-list insertion.
#[async_trait::async_trait]
pub trait Formatter: Send + Sync {
    async fn markdown_to_html(&self, raw: &str) -> String;
}

/// CommonMark rendering with an HTML sanitizer pass on the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct CmarkFormatter;

#[async_trait::async_trait]
impl Formatter for CmarkFormatter {
    async fn markdown_to_html(&self, raw: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        let parser = Parser::new_ext(raw, options);

        let mut rendered = String::with_capacity(raw.len() * 2);
        html::push_html(&mut rendered, parser);

        ammonia::clean(&rendered)
    }
}
