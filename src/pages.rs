//! Server-rendered HTML for the issuer and public flows.

use crate::service::{RegisterOutcome, Verification};

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<h1>{title}</h1>
{body}
<p><a href="/">Home</a> | <a href="/register">Register</a> | <a href="/verify">Verify</a></p>
</body>
</html>
"#,
        title = escape_html(title),
        body = body,
    )
}

pub fn index() -> String {
    layout(
        "Certificate Registry",
        r#"<p>Issuers register certificate files on chain. Anyone can check a file against the registry.</p>
<ul>
<li><a href="/register">Register a certificate (issuers)</a></li>
<li><a href="/verify">Verify a certificate</a></li>
</ul>"#,
    )
}

pub fn register_form() -> String {
    layout(
        "Register Certificate",
        r#"<form method="post" action="/register" enctype="multipart/form-data">
<p><label>Password <input type="password" name="password" required></label></p>
<p><label>Certificate <input type="file" name="certificate" required></label></p>
<p><button type="submit">Register</button></p>
</form>"#,
    )
}

pub fn verify_form() -> String {
    layout(
        "Verify Certificate",
        r#"<form method="post" action="/verify" enctype="multipart/form-data">
<p><label>Certificate <input type="file" name="certificate" required></label></p>
<p><button type="submit">Verify</button></p>
</form>"#,
    )
}

pub fn register_outcome(outcome: &RegisterOutcome) -> String {
    let body = match outcome {
        RegisterOutcome::Denied => "<p>Invalid password. Access denied.</p>".to_string(),
        RegisterOutcome::AlreadyRegistered { hash } => format!(
            "<p>Certificate already registered!</p>\n<p>Hash: <code>{}</code></p>",
            hash.to_prefixed_hex()
        ),
        RegisterOutcome::Registered { tx_hash, id, hash } => format!(
            "<p>Certificate registered! Tx: <code>{}</code></p>\n<p>Certificate ID: {}</p>\n<p>Hash: <code>{}</code></p>",
            escape_html(tx_hash),
            id,
            hash.to_prefixed_hex()
        ),
    };
    layout("Register Certificate", &body)
}

pub fn verification_result(v: &Verification) -> String {
    let body = if v.exists {
        let mut rows = format!(
            "<p>Certificate is valid.</p>\n<table>\n<tr><th>Hash</th><td><code>0x{}</code></td></tr>\n",
            escape_html(&v.hash)
        );
        if let Some(id) = v.id {
            rows.push_str(&format!("<tr><th>Certificate ID</th><td>{}</td></tr>\n", id));
        }
        if let Some(issuer) = &v.issuer {
            rows.push_str(&format!("<tr><th>Issuer</th><td><code>{}</code></td></tr>\n", escape_html(issuer)));
        }
        if let Some(ts) = &v.timestamp {
            rows.push_str(&format!("<tr><th>Issued at</th><td>{}</td></tr>\n", escape_html(ts)));
        }
        rows.push_str("</table>");
        rows
    } else {
        format!(
            "<p>Certificate not found. It was never registered.</p>\n<p>Hash: <code>0x{}</code></p>",
            escape_html(&v.hash)
        )
    };
    layout("Verification Result", &body)
}

pub fn error_page(status: u16, message: &str) -> String {
    layout(
        "Error",
        &format!("<p>Error {}: {}</p>", status, escape_html(message)),
    )
}
