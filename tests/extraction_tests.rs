//! Extraction and resolution tests
//!
//! Realistic page heads run through [`TagExtractor`] and [`FieldResolver`]
//! together.

use pretty_assertions::assert_eq;
use url::Url;
use webapp_catalog::config::PolicyTables;
use webapp_catalog::extraction::{
    FieldResolver, FieldSource, OpenGraphData, PrecedenceTable, TagExtractor,
};

fn resolve(html: &str, page: &str) -> webapp_catalog::extraction::ResolvedFields {
    let tags = TagExtractor::default().extract(html);
    FieldResolver::default().resolve(&tags, &Url::parse(page).unwrap())
}

#[test]
fn test_typical_marketing_page() {
    let html = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Acme Tasks | Team task manager</title>
  <meta name="description" content="Organize your team's tasks and projects.">
  <meta property="og:title" content="Acme Tasks">
  <meta property="og:description" content="Tasks, projects &amp; deadlines in one place.">
  <meta property="og:image" content="/img/social.png">
  <meta property="og:site_name" content="Acme">
  <meta name="twitter:card" content="summary_large_image">
</head>
<body><h1>Acme</h1></body>
</html>"#;

    let fields = resolve(html, "https://acme.example/tasks");
    assert_eq!(fields.title, "Acme Tasks");
    assert_eq!(fields.description, "Tasks, projects & deadlines in one place.");
    assert_eq!(fields.image, "https://acme.example/img/social.png");
    assert_eq!(fields.site_name, "Acme");
    assert_eq!(fields.source, FieldSource::Page);
    assert_eq!(
        fields.open_graph,
        OpenGraphData {
            title: Some("Acme Tasks".to_string()),
            description: Some("Tasks, projects & deadlines in one place.".to_string()),
            image: Some("/img/social.png".to_string()),
        }
    );
}

#[test]
fn test_og_title_beats_title_tag() {
    let fields = resolve(
        r#"<title>Document Title</title><meta property="og:title" content="Graph Title">"#,
        "https://example.com",
    );
    assert_eq!(fields.title, "Graph Title");
}

#[test]
fn test_twitter_only_page() {
    let html = r#"<head>
        <meta name="twitter:title" content="Chirp">
        <meta name="twitter:description" content="Short updates">
        <meta name="twitter:image" content="https://cdn.example/chirp.png">
    </head>"#;
    let fields = resolve(html, "https://chirp.example");
    assert_eq!(fields.title, "Chirp");
    assert_eq!(fields.description, "Short updates");
    assert_eq!(fields.image, "https://cdn.example/chirp.png");
    assert_eq!(fields.open_graph, OpenGraphData::default());
}

#[test]
fn test_bare_page_falls_back_to_host() {
    let fields = resolve("<html><body>hello</body></html>", "https://bare.example:8443/x");
    assert_eq!(fields.title, "bare.example:8443");
    assert_eq!(fields.site_name, "bare.example:8443");
    assert_eq!(fields.description, "");
    assert_eq!(fields.image, "");
}

#[test]
fn test_malformed_markup_is_tolerated() {
    let html = r#"<head><meta property=og:title content=Unquoted
        <META NAME='Description' CONTENT='Mixed &quot;case&quot;'
        <title>Never closed"#;
    let fields = resolve(html, "https://broken.example");
    assert_eq!(fields.title, "Unquoted");
    assert_eq!(fields.description, "Mixed \"case\"");
}

#[test]
fn test_meta_beyond_snapshot_is_ignored() {
    let filler = "<p>lorem ipsum dolor sit amet</p>".repeat(400);
    let html = format!(
        r#"<head><title>Early</title></head><body>{filler}<meta property="og:title" content="Late"></body>"#
    );
    let tags = TagExtractor::default().extract(&html);
    assert!(tags.truncated);

    let fields = FieldResolver::default().resolve(&tags, &Url::parse("https://big.example").unwrap());
    assert_eq!(fields.title, "Early");
}

#[test]
fn test_policy_tables_from_json() {
    let tables: PolicyTables = serde_json::from_str(
        r#"{ "precedence": { "title": ["application-name", "og:title"] } }"#,
    )
    .unwrap();
    assert_eq!(tables.precedence.title, vec!["application-name", "og:title"]);
    assert_eq!(tables.precedence.description, PrecedenceTable::default().description);

    let tags = TagExtractor::default().extract(
        r#"<meta property="og:title" content="OG"><meta name="application-name" content="App">"#,
    );
    let fields = FieldResolver::new(tables.precedence)
        .resolve(&tags, &Url::parse("https://example.com").unwrap());
    assert_eq!(fields.title, "App");
}
