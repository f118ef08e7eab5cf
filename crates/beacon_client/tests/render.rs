use beacon_client::{CmarkFormatter, Formatter};

#[tokio::test]
async fn markdown_renders_to_html() {
    let html = CmarkFormatter
        .markdown_to_html("**bold** and `code`")
        .await;

    assert!(html.contains("<strong>bold</strong>"));
    assert!(html.contains("<code>code</code>"));
}

#[tokio::test]
async fn script_tags_are_sanitized_away() {
    let html = CmarkFormatter
        .markdown_to_html("hi <script>alert('x')</script> there")
        .await;

    assert!(!html.contains("<script>"));
    assert!(html.contains("hi"));
}

#[tokio::test]
async fn tables_and_strikethrough_are_enabled() {
    let html = CmarkFormatter
        .markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~gone~~")
        .await;

    assert!(html.contains("<table>"));
    assert!(html.contains("<del>gone</del>"));
}
