//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use papershelf_lib::Settings;

/// Build a PDF whose page `i` shows the lines in `pages[i]`, one per baseline.
pub fn build_pdf(pages: &[Vec<String>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
            Operation::new("Td", vec![72.into(), 740.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(line.as_str())]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// `count` pages, each saying which page it is plus `filler` lines of text.
pub fn numbered_pdf(count: usize, filler: usize) -> Vec<u8> {
    let pages: Vec<Vec<String>> = (1..=count)
        .map(|n| {
            let mut lines = vec![format!("This is page {}", n)];
            lines.extend((0..filler).map(|i| format!("Filler line {} of page {} with some words", i, n)));
            lines
        })
        .collect();
    build_pdf(&pages)
}

/// Settings pointing every remote at `server_url` and storage at `dir`.
pub fn settings_for(server_url: &str, dir: &std::path::Path) -> Settings {
    Settings {
        storage_dir: dir.to_path_buf(),
        arxiv_api_url: format!("{}/api/query", server_url),
        semantic_scholar_api_url: format!("{}/graph/v1", server_url),
        http_timeout_secs: 5,
        ..Settings::default()
    }
}

pub fn arxiv_feed(entry_id: &str, title: &str, pdf_href: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/{id}</id>
    <published>2017-06-12T17:57:40Z</published>
    <title>{title}</title>
    <summary>An abstract.</summary>
    <author><name>Ashish Vaswani</name></author>
    <link href="http://arxiv.org/abs/{id}" rel="alternate" type="text/html"/>
    <link title="pdf" href="{pdf}" rel="related" type="application/pdf"/>
  </entry>
</feed>"#,
        id = entry_id,
        title = title,
        pdf = pdf_href,
    )
}
