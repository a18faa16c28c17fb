use dom_smoothie::{Config, Readability};
use tracing::{debug, warn};

/// Main-content HTML of a page, or the whole page when readability gives up.
pub(super) fn readable_html(html: &str, url: Option<&str>) -> String {
    let mut readability = match Readability::new(html, url, Some(Config::default())) {
        Ok(r) => r,
        Err(e) => {
            warn!(%e, "readability init failed, keeping whole page");
            return html.to_string();
        }
    };

    if !readability.is_probably_readable() {
        debug!("page does not look like an article, keeping whole page");
        return html.to_string();
    }

    match readability.parse() {
        Ok(article) if !article.content.trim().is_empty() => article.content.to_string(),
        Ok(_) => html.to_string(),
        Err(e) => {
            warn!(%e, "readability parse failed, keeping whole page");
            html.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER_HTML: &str = r#"
<!DOCTYPE html>
<html>
<head><title>Sleep and Memory Consolidation</title></head>
<body>
<nav>Journal home | Issues | Submit</nav>
<article>
    <h1>Sleep and Memory Consolidation</h1>
    <p>We recorded overnight polysomnography in forty healthy adults and
    measured recall of paired associates learned the previous evening.
    Participants who slept recalled markedly more word pairs than controls.</p>
    <p>Spindle density during stage two sleep predicted the overnight gain in
    recall, and the association held after controlling for total sleep time
    and baseline performance on the learning task.</p>
    <p>Slow oscillation and spindle coupling was strongest over frontal sites,
    which matches earlier reports linking coupled events to hippocampal
    replay and the transfer of memories to neocortical stores.</p>
    <p>These results support an active systems account of consolidation in
    which sleep reorganizes recently encoded material rather than merely
    protecting it from interference during the retention interval.</p>
    <p>Limitations include the modest sample and the use of a single
    declarative task, and replication with procedural tasks is needed.</p>
</article>
<footer>Copyright notice</footer>
</body>
</html>"#;

    #[test]
    fn article_body_is_extracted() {
        let content = readable_html(PAPER_HTML, Some("https://journal.example.com/a/1"));
        assert!(content.contains("Spindle density"));
        assert!(!content.contains("Journal home"));
    }

    #[test]
    fn short_page_is_kept_whole() {
        let html = "<html><body><p>Hello</p></body></html>";
        let content = readable_html(html, None);
        assert!(content.contains("Hello"));
    }
}
