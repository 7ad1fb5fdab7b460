//! HTML pages for browsing contracts.

use std::fmt::Write;

use twinroom_core::{locate::by_directory, Origin};

use crate::registry::{CompiledContract, Registry};

/// `GET /slang/`: contracts grouped by directory.
pub(crate) fn listing(registry: &Registry) -> String {
    let identities = registry.identities();
    let mut html = String::from("<html><body><h1>Available contract files:</h1>\n");
    for (dir, contracts) in by_directory(&identities) {
        let heading = if dir.is_empty() { "/" } else { dir };
        let _ = write!(html, "<h2>Directory: {}</h2><ul>", escape(heading));
        for contract in contracts {
            let route = contract.route();
            let _ = write!(
                html,
                r#"<li><a href="/slang/{}">{}</a></li>"#,
                escape(&route),
                escape(&route)
            );
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</body></html>\n");
    html
}

/// `GET /slang/<path>`: contract text and a button that POSTs to `/<path>`.
pub(crate) fn contract_page(contract: &CompiledContract) -> String {
    let route = contract.route();
    let origin = match contract.schema.origin() {
        Some(Origin::ExplicitMetadata) => "metadata",
        Some(Origin::DerivedIntrospection) => "introspection",
        None => "unresolved",
    };
    let mut html = String::new();
    let _ = write!(
        html,
        "<html><body><h1>{}</h1><p>{}</p><p>Parameters from: {}</p><pre>{}</pre>",
        escape(contract.identity.stem()),
        escape(&contract.about()),
        origin,
        escape(&contract.identity.content)
    );
    let _ = write!(
        html,
        r#"<form method="POST" action="/{}"><button type="submit">Execute {}</button></form>"#,
        escape(&route),
        escape(&contract.identity.file_name)
    );
    html.push_str("</body></html>\n");
    html
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
