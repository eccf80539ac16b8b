//! Configuration form rendering.

use crate::config::{DeviceConfig, Resolution};
use crate::portal::session::SessionToken;

/// Split a stored URL into the base and endpoint form fields at the last
/// `/` past the scheme.
pub fn split_url_for_form(url: &str) -> (&str, &str) {
    match url.rfind('/') {
        Some(slash) if slash > 7 => (&url[..slash], &url[slash + 1..]),
        _ => (url, ""),
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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

fn text_field(out: &mut String, label: &str, name: &str, kind: &str, value: &str) {
    out.push_str(&format!(
        "<div class=\"field\"><label>{}</label><input type=\"{}\" name=\"{}\" value=\"{}\"></div>\n",
        label,
        kind,
        name,
        escape(value)
    ));
}

/// Render the form prefilled from `config`.
pub fn render_form(config: &DeviceConfig, session: &SessionToken, saved: bool) -> String {
    let (upload_base, upload_endpoint) = split_url_for_form(&config.upload_url);
    let (init_base, init_endpoint) = split_url_for_form(&config.init_url);

    let mut html = String::with_capacity(4096);
    html.push_str(
        "<!DOCTYPE html><html><head>\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Camera Node Configuration</title>\n\
         <style>body{font-family:sans-serif;max-width:720px;margin:40px auto;padding:0 20px}\
         .field{margin-bottom:14px}label{display:block;font-weight:600}\
         input,select{width:100%;padding:8px}.message{background:#e6f4ea;padding:12px}</style>\n\
         </head><body>\n<h1>Camera Node Configuration</h1>\n",
    );
    if saved {
        html.push_str("<div class=\"message\"><strong>Configuration saved successfully.</strong></div>\n");
    }

    html.push_str("<form action=\"/save\" method=\"POST\" autocomplete=\"off\">\n");
    html.push_str(&format!(
        "<input type=\"hidden\" name=\"session\" value=\"{}\">\n",
        escape(session.as_str())
    ));

    html.push_str("<h2>General</h2>\n");
    text_field(&mut html, "Module Name", "module_name", "text", &config.module_name);

    html.push_str("<h2>Network</h2>\n");
    text_field(&mut html, "WiFi SSID", "ssid", "text", &config.ssid);
    text_field(&mut html, "WiFi Password", "password", "password", &config.password);
    text_field(&mut html, "Initialization Base URL", "init_base", "text", init_base);
    text_field(&mut html, "Initialization Endpoint", "init_endpoint", "text", init_endpoint);
    text_field(&mut html, "Upload Base URL", "upload_base", "text", upload_base);
    text_field(&mut html, "Upload Endpoint", "upload_endpoint", "text", upload_endpoint);

    html.push_str("<h2>Camera</h2>\n");
    text_field(
        &mut html,
        "Capture Interval (ms)",
        "interval",
        "number",
        &config.capture_interval_ms.to_string(),
    );

    html.push_str("<div class=\"field\"><label>Resolution</label><select name=\"res\">\n");
    let current = Resolution::from_name(&config.resolution);
    for resolution in Resolution::ALL {
        let (width, height) = resolution.dimensions();
        let selected = if current == Some(resolution) { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{}\"{}>{} - {}x{}</option>\n",
            resolution.name(),
            selected,
            resolution.name().to_ascii_uppercase(),
            width,
            height
        ));
    }
    html.push_str("</select></div>\n");

    text_field(&mut html, "Vertical Flip (0 or 1)", "vflip", "number", &config.vertical_flip.to_string());
    text_field(&mut html, "Brightness", "bright", "number", &config.brightness.to_string());
    text_field(&mut html, "Saturation", "sat", "number", &config.saturation.to_string());

    html.push_str("<button type=\"submit\">Save Configuration</button>\n</form></body></html>\n");
    html
}

/// Full `200 OK` response carrying `page`.
pub fn html_response(page: &str) -> Vec<u8> {
    let mut response = format!(
        "HTTP/1.1 200 OK\r\n\
         Content-Type: text/html\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\r\n",
        page.len()
    )
    .into_bytes();
    response.extend_from_slice(page.as_bytes());
    response
}
