use gtb_core::formatting::escape_html;

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title}</title>\n\
<style>body{{font-family:system-ui,sans-serif;max-width:32rem;margin:4rem auto;padding:0 1rem;text-align:center}}</style>\n\
</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

pub fn success_page(login: Option<&str>) -> String {
    let who = login
        .map(|l| format!(" as <b>{}</b>", escape_html(l)))
        .unwrap_or_default();
    page(
        "GitHub linked",
        &format!(
            "<h1>✅ GitHub account linked</h1>\n<p>You are connected{who}.</p>\n\
<p>You can close this window and return to Telegram.</p>"
        ),
    )
}

pub fn error_page(message: &str) -> String {
    page(
        "Linking failed",
        &format!(
            "<h1>❌ Linking failed</h1>\n<p>{}</p>\n\
<p>Return to Telegram and send /link to try again.</p>",
            escape_html(message)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_escape_user_content() {
        assert!(success_page(Some("<script>")).contains("&lt;script&gt;"));
        assert!(error_page("a & b").contains("a &amp; b"));
        assert!(!success_page(None).contains(" as "));
    }
}
