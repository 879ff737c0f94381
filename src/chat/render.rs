//! HTML rendering for the chat page.
//!
//! [`render`] is a pure function of a [`SessionView`]; the server calls it
//! after every transition instead of mutating a live page.  All text that came
//! from a person or a model goes through [`escape_html`].

use crate::chat::session::{Phase, SessionView};
use crate::credential::API_KEY_NAME;
use crate::types::Role;

const TITLE: &str = "Matrix AI Chatbot";

const STYLE: &str = r#"
body { margin: 0; background-color: #0a0a0a; color: #00ff41; font-family: 'Courier New', monospace; }
.layout { display: flex; min-height: 100vh; }
.sidebar { width: 260px; padding: 20px; background-color: #111; border-right: 1px solid #00ff41; }
.main { flex: 1; padding: 20px 40px; }
.main-title { text-align: center; font-size: 3rem; text-shadow: 0 0 10px #00ff41; margin-bottom: 20px; }
.subtitle { text-align: center; margin-bottom: 30px; }
.chat-message-user { background-color: #1e3c72; color: white; padding: 10px; border-radius: 10px; margin: 10px 0; border-left: 4px solid #00ff41; white-space: pre-wrap; }
.chat-message-bot { background-color: #1a1a1a; color: #00ff41; padding: 10px; border-radius: 10px; margin: 10px 0; border: 1px solid #00ff41; border-left: 4px solid #00ff41; white-space: pre-wrap; }
.empty { text-align: center; font-style: italic; }
.input-row { display: flex; gap: 10px; }
.input-row input { flex: 4; background-color: #1a1a1a; color: #00ff41; border: 2px solid #00ff41; padding: 8px; font-family: inherit; }
button { background-color: #00ff41; color: black; font-weight: bold; border: none; border-radius: 5px; padding: 8px 16px; cursor: pointer; font-family: inherit; }
button:disabled { opacity: 0.5; cursor: wait; }
.setup-box { background-color: #2a2a2a; border: 2px solid #ff6b6b; border-radius: 10px; padding: 20px; margin: 20px 0; color: #ff6b6b; }
.error-box { background-color: #2a1a1a; border: 2px solid #ff6b6b; border-radius: 10px; padding: 15px; margin: 15px 0; color: #ff6b6b; }
.success-box { background-color: #1a2a1a; border: 2px solid #00ff41; border-radius: 10px; padding: 15px; margin: 15px 0; }
.thinking { display: none; margin-top: 10px; }
a { color: #00ff41; }
"#;

const SCRIPT: &str = r#"
document.getElementById('send-form').addEventListener('submit', function (event) {
  var input = document.getElementById('message');
  if (input.value.trim() === '') { event.preventDefault(); return; }
  document.getElementById('send-button').disabled = true;
  document.getElementById('thinking').style.display = 'block';
});
"#;

/// Escape text for inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the full page for a session.
pub fn render(view: &SessionView) -> String {
    let mut body = String::new();
    body.push_str(&header());
    match &view.phase {
        Phase::Unconfigured => {
            body.push_str(&setup_box());
            return page(&body, None);
        }
        Phase::Failed(message) => {
            body.push_str(&format!(
                "<div class=\"error-box\"><strong>Failed to initialize the completion client</strong><br>{}</div>\n",
                escape_html(message)
            ));
            return page(&body, None);
        }
        Phase::Configuring => {
            body.push_str("<div class=\"subtitle\">Connecting...</div>\n");
            return page(&body, None);
        }
        Phase::Ready | Phase::AwaitingResponse => {}
    }

    body.push_str(
        "<div class=\"success-box\">✅ <strong>Connected to OpenAI API</strong> - Ready to chat!</div>\n",
    );
    body.push_str(&history(view));
    body.push_str(&input_form());
    page(&body, Some(&sidebar(view)))
}

/// Render the page shown while a session is busy answering.
///
/// The page refreshes itself until the session is free again.
pub fn render_busy() -> String {
    let mut body = header();
    body.push_str(
        "<div class=\"success-box\">🔄 Matrix AI is thinking...</div>\n<p class=\"subtitle\">This page refreshes when the answer is ready.</p>\n",
    );
    page_with_head(&body, None, "<meta http-equiv=\"refresh\" content=\"2; url=/\">")
}

fn header() -> String {
    format!(
        "<h1 class=\"main-title\">🤖 {} 🤖</h1>\n<div class=\"subtitle\">Welcome to the Matrix</div>\n",
        TITLE.to_uppercase()
    )
}

fn setup_box() -> String {
    format!(
        r#"<div class="setup-box">
<h3>🔧 Setup Required</h3>
<p><strong>OpenAI API Key Not Found!</strong></p>
<p>Please add your API key using one of these methods, then restart the server:</p>
<h4>Method 1: Environment Variable</h4>
<code>set {key}=sk-your-key-here</code> (Windows)<br>
<code>export {key}=sk-your-key-here</code> (Mac/Linux)
<h4>Method 2: Secrets File</h4>
<p>Create the secrets file (default <code>.matrix-chat/secrets.toml</code>) with:</p>
<code>{key} = "sk-your-key-here"</code>
<p><a href="https://platform.openai.com/api-keys" target="_blank">Get your API key here</a></p>
</div>
"#,
        key = API_KEY_NAME
    )
}

fn history(view: &SessionView) -> String {
    let mut out = String::from("<h3>💬 Chat History</h3>\n<div id=\"history\">\n");
    if view.turns.is_empty() {
        out.push_str("<div class=\"empty\">Start your conversation...</div>\n");
    }
    for turn in &view.turns {
        let (class, label) = match turn.role() {
            Role::User => ("chat-message-user", "🧑 You:"),
            Role::Assistant => ("chat-message-bot", "🤖 Matrix AI:"),
        };
        out.push_str(&format!(
            "<div class=\"{class}\"><strong>{label}</strong><br>{}</div>\n",
            escape_html(turn.text())
        ));
    }
    out.push_str("</div>\n");
    out
}

fn input_form() -> String {
    r#"<hr>
<form id="send-form" method="post" action="/send">
<label for="message">Your message:</label>
<div class="input-row">
<input id="message" name="message" type="text" placeholder="Enter your message..." autocomplete="off" autofocus>
<button id="send-button" type="submit">🚀 SEND</button>
</div>
<div id="thinking" class="thinking">🔄 Matrix AI is thinking...</div>
</form>
"#
    .to_string()
}

fn sidebar(view: &SessionView) -> String {
    format!(
        r#"<h2>🛠️ Controls</h2>
<form method="post" action="/clear"><button type="submit">🗑️ Clear Chat</button></form>
<h2>ℹ️ Info</h2>
<p><strong>Messages:</strong> <span id="message-count">{count}</span></p>
<p><strong>API Key:</strong> {key}</p>
<hr>
<p><strong>Features:</strong></p>
<ul>
<li>Matrix-themed UI</li>
<li>OpenAI GPT-3.5-turbo</li>
<li>100-word response limit</li>
<li>Chat history</li>
</ul>
"#,
        count = view.message_count,
        key = if view.credential_present {
            "✅ Set"
        } else {
            "❌ Missing"
        }
    )
}

fn page(body: &str, sidebar: Option<&str>) -> String {
    page_with_head(body, sidebar, "")
}

fn page_with_head(body: &str, sidebar: Option<&str>, extra_head: &str) -> String {
    let sidebar = sidebar
        .map(|s| format!("<aside class=\"sidebar\">\n{s}</aside>\n"))
        .unwrap_or_default();
    let script = if body.contains("id=\"send-form\"") {
        format!("<script>{SCRIPT}</script>\n")
    } else {
        String::new()
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{extra_head}
<title>{TITLE}</title>
<style>{STYLE}</style>
</head>
<body>
<div class="layout">
{sidebar}<main class="main">
{body}</main>
</div>
{script}</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatTurn;

    fn view(phase: Phase, turns: Vec<ChatTurn>) -> SessionView {
        SessionView {
            phase,
            credential_present: true,
            message_count: turns.len(),
            turns,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<script>alert("x") & 'y'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;) &amp; &#39;y&#39;&lt;/script&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn unconfigured_shows_only_setup() {
        let mut v = view(Phase::Unconfigured, vec![]);
        v.credential_present = false;
        let html = render(&v);
        assert!(html.contains("Setup Required"));
        assert!(html.contains("OPENAI_API_KEY"));
        assert!(!html.contains("send-form"));
        assert!(!html.contains("Clear Chat"));
    }

    #[test]
    fn failed_shows_error() {
        let html = render(&view(Phase::Failed("bad <key>".to_string()), vec![]));
        assert!(html.contains("Failed to initialize the completion client"));
        assert!(html.contains("bad &lt;key&gt;"));
        assert!(!html.contains("send-form"));
    }

    #[test]
    fn ready_empty_transcript() {
        let html = render(&view(Phase::Ready, vec![]));
        assert!(html.contains("Connected to OpenAI API"));
        assert!(html.contains("Start your conversation..."));
        assert!(html.contains("id=\"send-form\""));
        assert!(html.contains("<span id=\"message-count\">0</span>"));
        assert!(html.contains("✅ Set"));
        assert!(html.contains("<script>"));
    }

    #[test]
    fn ready_renders_turns_in_order_and_escaped() {
        let html = render(&view(
            Phase::Ready,
            vec![
                ChatTurn::user("<b>hello</b>"),
                ChatTurn::assistant("Error: quota"),
            ],
        ));
        let user = html.find("&lt;b&gt;hello&lt;/b&gt;").unwrap();
        let bot = html.find("Error: quota").unwrap();
        assert!(user < bot);
        assert!(!html.contains("<b>hello</b>"));
        assert!(html.contains("chat-message-user"));
        assert!(html.contains("chat-message-bot"));
        assert!(html.contains("<span id=\"message-count\">2</span>"));
        assert!(!html.contains("Start your conversation"));
    }

    #[test]
    fn busy_page_refreshes() {
        let html = render_busy();
        assert!(html.contains("http-equiv=\"refresh\""));
        assert!(html.contains("Matrix AI is thinking"));
        assert!(!html.contains("<script>"));
    }
}
