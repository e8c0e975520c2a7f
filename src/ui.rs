use crate::gate::{Flash, FlashKind};
use crate::record::{FormCatalog, MetricKind};
use chrono::NaiveDate;

pub fn render_gate_page(title: &str, flash: Option<&Flash>) -> String {
    page(title, &format!("{}{GATE_FORM}", render_flash(flash)))
}

pub fn render_entry_page(
    catalog: &FormCatalog,
    flash: Option<&Flash>,
    today: NaiveDate,
    forwarding_enabled: bool,
) -> String {
    let companies: String = catalog
        .companies
        .iter()
        .map(|name| {
            let name = escape_html(name);
            format!(r#"<option value="{name}">{name}</option>"#)
        })
        .collect();

    let forward = if forwarding_enabled {
        FORWARD_FORM.to_string()
    } else {
        r#"<p class="hint">Email forwarding is not configured.</p>"#.to_string()
    };

    let body = ENTRY_FORM
        .replace("{{COMPANIES}}", &companies)
        .replace("{{TODAY}}", &today.format("%Y-%m-%d").to_string())
        .replace("{{METRICS}}", &render_metric_sections(catalog))
        .replace("{{FORWARD}}", &forward);

    page(
        &catalog.title,
        &format!("{}{body}", render_flash(flash)),
    )
}

fn render_metric_sections(catalog: &FormCatalog) -> String {
    let mut html = String::new();
    let mut current: Option<&str> = None;
    for field in catalog.fields {
        if current != Some(field.section) {
            if current.is_some() {
                html.push_str("</div>");
            }
            html.push_str(&format!(
                r#"<div class="column"><h3>{}</h3>"#,
                escape_html(field.section)
            ));
            current = Some(field.section);
        }
        let (step, placeholder) = match field.kind {
            MetricKind::Money => ("0.01", "0.00"),
            MetricKind::Count => ("1", "0"),
        };
        html.push_str(&format!(
            r#"<label>{label}<input type="number" name="{key}" min="0" step="{step}" placeholder="{placeholder}" /></label>"#,
            label = escape_html(field.label),
            key = field.key,
        ));
    }
    if current.is_some() {
        html.push_str("</div>");
    }
    html
}

fn render_flash(flash: Option<&Flash>) -> String {
    match flash {
        Some(flash) => {
            let class = match flash.kind {
                FlashKind::Success => "ok",
                FlashKind::Error => "error",
            };
            format!(
                r#"<p class="flash" data-type="{class}">{}</p>"#,
                escape_html(&flash.message)
            )
        }
        None => String::new(),
    }
}

fn page(title: &str, body: &str) -> String {
    PAGE_HTML
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{BODY}}", body)
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const GATE_FORM: &str = r#"
    <section class="card">
      <form method="post" action="/unlock" class="stack">
        <label>Please enter the access password
          <input type="password" name="password" autocomplete="current-password" autofocus />
        </label>
        <button class="btn-primary" type="submit">Enter</button>
      </form>
    </section>
"#;

const ENTRY_FORM: &str = r#"
    <form method="post" action="/submit" class="card stack">
      <h2>1. General Info</h2>
      <div class="grid">
        <label>Company Name
          <select name="company">{{COMPANIES}}</select>
        </label>
        <label>Entered By (Your Name)
          <input type="text" name="entered_by" />
        </label>
        <label>Report Month
          <input type="date" name="report_month" value="{{TODAY}}" />
        </label>
      </div>
      <hr />
      <h2>2. Performance Metrics</h2>
      <div class="grid">{{METRICS}}</div>
      <hr />
      <label>Campaign Notes / Anomalies
        <textarea name="notes" rows="4"></textarea>
      </label>
      <button class="btn-primary" type="submit">Submit Entry</button>
    </form>

    <section class="card stack">
      <h2>Send a file to the administrator</h2>
      {{FORWARD}}
    </section>
"#;

const FORWARD_FORM: &str = r#"
      <form method="post" action="/forward" enctype="multipart/form-data" class="stack">
        <label>File
          <input type="file" name="file" />
        </label>
        <label>Note
          <textarea name="note" rows="3"></textarea>
        </label>
        <button class="btn-secondary" type="submit">Send File</button>
      </form>
"#;

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg-1: #f8f3e6;
      --bg-2: #f5d3a7;
      --ink: #2b2a28;
      --accent: #ff6b4a;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.86);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.18);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #ffe9d4 60%, #f9f2e9 100%);
      color: var(--ink);
      font-family: "Trebuchet MS", sans-serif;
      display: grid;
      place-items: start center;
      padding: 32px 18px 48px;
    }

    .app {
      width: min(920px, 100%);
      display: grid;
      gap: 24px;
    }

    h1 {
      font-family: "Georgia", serif;
      font-size: clamp(1.8rem, 4vw, 2.6rem);
      margin: 0;
    }

    h2 {
      margin: 0;
      font-size: 1.2rem;
    }

    h3 {
      margin: 0 0 8px;
      font-size: 0.85rem;
      text-transform: uppercase;
      letter-spacing: 0.12em;
      color: #8b857d;
    }

    .card {
      background: var(--card);
      border-radius: 24px;
      box-shadow: var(--shadow);
      padding: 28px;
    }

    .stack {
      display: grid;
      gap: 16px;
    }

    .grid {
      display: grid;
      grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
      gap: 16px;
    }

    .column {
      display: grid;
      gap: 10px;
      align-content: start;
    }

    label {
      display: grid;
      gap: 6px;
      font-size: 0.95rem;
    }

    input, select, textarea {
      font: inherit;
      padding: 10px 12px;
      border-radius: 12px;
      border: 1px solid rgba(47, 72, 88, 0.2);
      background: white;
    }

    hr {
      border: none;
      border-top: 1px solid rgba(47, 72, 88, 0.12);
      width: 100%;
    }

    button {
      appearance: none;
      border: none;
      border-radius: 999px;
      padding: 14px 20px;
      font-size: 1rem;
      font-weight: 600;
      cursor: pointer;
      justify-self: start;
      color: white;
    }

    .btn-primary {
      background: var(--accent);
      box-shadow: 0 10px 24px rgba(255, 107, 74, 0.3);
    }

    .btn-secondary {
      background: var(--accent-2);
      box-shadow: 0 10px 24px rgba(47, 72, 88, 0.3);
    }

    .flash {
      margin: 0;
      padding: 14px 18px;
      border-radius: 14px;
      background: white;
    }

    .flash[data-type="error"] {
      color: #c63b2b;
    }

    .flash[data-type="ok"] {
      color: #2d7a4b;
    }

    .hint {
      margin: 0;
      color: #6f6a65;
      font-size: 0.9rem;
    }

    @media (max-width: 600px) {
      .card {
        padding: 22px;
      }
      button {
        width: 100%;
      }
    }
  </style>
</head>
<body>
  <main class="app">
    <header>
      <h1>{{TITLE}}</h1>
    </header>
{{BODY}}
  </main>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DEFAULT_COMPANIES, FormVariant};

    fn catalog() -> FormCatalog {
        FormCatalog::new(
            "TSG <Entry>",
            FormVariant::Performance,
            DEFAULT_COMPANIES.iter().map(|name| name.to_string()).collect(),
        )
    }

    #[test]
    fn gate_page_has_password_field_and_flash() {
        let html = render_gate_page("Entry", Some(&Flash::error("Password incorrect")));
        assert!(html.contains(r#"type="password""#));
        assert!(html.contains("Password incorrect"));
        assert!(!html.contains("/submit"));
    }

    #[test]
    fn entry_page_lists_companies_and_fields() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let html = render_entry_page(&catalog(), None, today, false);

        assert!(html.contains("TSG &lt;Entry&gt;"));
        assert!(html.contains(r#"<option value="Trinity Solar">"#));
        assert!(html.contains(r#"name="qualified_leads""#));
        assert!(html.contains(r#"value="2026-05-01""#));
        assert!(html.contains("Email forwarding is not configured."));
        assert_eq!(html.matches(r#"<div class="column">"#).count(), 3);
    }

    #[test]
    fn flash_text_is_escaped() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let flash = Flash::success("Success! Data for <b>Thrive</b> saved.");
        let html = render_entry_page(&catalog(), Some(&flash), today, true);

        assert!(html.contains("&lt;b&gt;Thrive&lt;/b&gt;"));
        assert!(html.contains(r#"action="/forward""#));
    }
}
