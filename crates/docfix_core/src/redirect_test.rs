use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;

use crate::redirects::{
    ProductRules, is_absolute_http_url, normalize_destination, normalize_source_path,
};

#[derive(Debug, Clone)]
pub struct RedirectTestOptions {
    pub base_url: String,
    pub timeout: Duration,
    pub delay: Duration,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectCheck {
    pub product: String,
    pub old_url: String,
    pub expected_url: String,
    pub final_url: String,
    pub status_code: u16,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct RedirectTestResults {
    pub checks: Vec<RedirectCheck>,
    pub pending_review: usize,
}

impl RedirectTestResults {
    pub fn total(&self) -> usize {
        self.checks.len()
    }

    pub fn passed(&self) -> usize {
        self.checks.iter().filter(|check| check.success).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    /// Percentage of passing checks, `None` when nothing was tested.
    pub fn success_rate(&self) -> Option<f64> {
        if self.checks.is_empty() {
            return None;
        }
        Some(self.passed() as f64 / self.total() as f64 * 100.0)
    }
}

/// Blocking client shared by the redirect tools. Redirects are followed.
pub fn http_client(timeout: Duration, user_agent: &str) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent.to_string())
        .build()
        .context("failed to build redirect HTTP client")
}

pub struct RedirectTester {
    client: Client,
    base_url: String,
    delay: Duration,
}

impl RedirectTester {
    pub fn new(options: &RedirectTestOptions) -> Result<Self> {
        let client = http_client(options.timeout, &options.user_agent)?;
        Ok(Self::with_client(client, &options.base_url, options.delay))
    }

    pub fn with_client(client: Client, base_url: &str, delay: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Requests `old_link` on the staging site, following redirects, and
    /// compares where it lands with `new_link`. Transport failures are
    /// reported as failed checks.
    pub fn check(&self, product: &str, old_link: &str, new_link: &str) -> RedirectCheck {
        let request_url = format!("{}{}", self.base_url, normalize_source_path(old_link));
        let expected = expected_url(&self.base_url, new_link);
        let mut check = RedirectCheck {
            product: product.to_string(),
            old_url: old_link.to_string(),
            expected_url: new_link.to_string(),
            final_url: String::new(),
            status_code: 0,
            success: false,
            message: String::new(),
        };

        match self.client.get(&request_url).send() {
            Ok(response) => {
                check.final_url = response.url().to_string();
                check.status_code = response.status().as_u16();
                if comparable_url(&check.final_url) == comparable_url(&expected) {
                    check.success = true;
                    check.message = "redirect successful".to_string();
                } else {
                    check.message = format!("expected {expected}, got {}", check.final_url);
                }
            }
            Err(error) if error.is_timeout() => {
                check.message = "request timed out".to_string();
            }
            Err(error) => {
                check.message = format!("request failed: {error}");
            }
        }
        log::debug!("{request_url}: {}", check.message);
        check
    }

    pub fn run(&self, selected: &[ProductRules]) -> RedirectTestResults {
        self.run_with_progress(selected, |_, _| {})
    }

    /// Like [`RedirectTester::run`], calling `on_check` with the 1-based index
    /// of each check as soon as it completes.
    pub fn run_with_progress<F>(
        &self,
        selected: &[ProductRules],
        mut on_check: F,
    ) -> RedirectTestResults
    where
        F: FnMut(usize, &RedirectCheck),
    {
        let mut results = RedirectTestResults::default();
        for product in selected {
            results.pending_review += product.pending_review;
            for rule in &product.rules {
                if !results.checks.is_empty() && !self.delay.is_zero() {
                    sleep(self.delay);
                }
                log::info!("testing {}", rule.old_link);
                let check = self.check(&product.product, &rule.old_link, &rule.new_link);
                on_check(results.checks.len() + 1, &check);
                results.checks.push(check);
            }
        }
        results
    }
}

pub fn expected_url(base_url: &str, new_link: &str) -> String {
    if is_absolute_http_url(new_link) {
        new_link.to_string()
    } else {
        format!(
            "{}{}",
            base_url.trim_end_matches('/'),
            normalize_destination(new_link)
        )
    }
}

/// Canonical form used to compare landing and expected URLs: a trailing `/`
/// on the path is ignored unless the path is the root.
pub fn comparable_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let path = parsed.path();
    let path = if path == "/" {
        path
    } else {
        path.trim_end_matches('/')
    };

    let mut output = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or(""));
    if let Some(port) = parsed.port() {
        output.push_str(&format!(":{port}"));
    }
    output.push_str(path);
    if let Some(query) = parsed.query() {
        output.push('?');
        output.push_str(query);
    }
    if let Some(fragment) = parsed.fragment() {
        output.push('#');
        output.push_str(fragment);
    }
    output
}

pub fn render_report(results: &RedirectTestResults, base_url: &str, generated_at: &str) -> String {
    let mut lines = vec![
        "# Redirect Test Report".to_string(),
        format!("**Generated:** {generated_at}"),
        format!("**Staging URL:** {base_url}"),
        String::new(),
        "## Summary".to_string(),
        format!("- **Total tests:** {}", results.total()),
        format!("- **Passed:** {}", results.passed()),
        format!("- **Failed:** {}", results.failed()),
        match results.success_rate() {
            Some(rate) => format!("- **Success rate:** {rate:.1}%"),
            None => "- **Success rate:** N/A".to_string(),
        },
        String::new(),
    ];

    if results.failed() > 0 {
        lines.push("## Failed Tests".to_string());
        for check in results.checks.iter().filter(|check| !check.success) {
            lines.push(format!(
                "### {}: {}",
                check.product.to_uppercase(),
                check.old_url
            ));
            lines.push(format!("- **Expected:** {}", check.expected_url));
            lines.push(format!("- **Got:** {}", check.final_url));
            lines.push(format!("- **Status:** {}", check.status_code));
            lines.push(format!("- **Message:** {}", check.message));
            lines.push(String::new());
        }
    }

    lines.push("## All Test Details".to_string());
    for check in &results.checks {
        lines.push(format!(
            "### {} {}: {}",
            if check.success { "PASS" } else { "FAIL" },
            check.product.to_uppercase(),
            check.old_url
        ));
        lines.push(format!("- **Expected:** {}", check.expected_url));
        lines.push(format!("- **Final URL:** {}", check.final_url));
        lines.push(format!("- **Status Code:** {}", check.status_code));
        lines.push(format!("- **Message:** {}", check.message));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Renders the report stamped with the local time and writes it to `path`.
pub fn write_report(results: &RedirectTestResults, base_url: &str, path: &Path) -> Result<()> {
    let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    fs::write(path, render_report(results, base_url, &generated_at))
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use reqwest::blocking::Client;

    use tempfile::tempdir;

    use super::{
        RedirectCheck, RedirectTestResults, RedirectTester, comparable_url, expected_url,
        render_report, write_report,
    };
    use crate::redirects::RedirectMapping;

    fn spawn_staging_site() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr");
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else {
                    continue;
                };
                let Ok(read_half) = stream.try_clone() else {
                    continue;
                };
                let mut reader = BufReader::new(read_half);
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).is_err() {
                    continue;
                }
                loop {
                    let mut header = String::new();
                    match reader.read_line(&mut header) {
                        Ok(0) | Err(_) => break,
                        Ok(_) if header == "\r\n" => break,
                        Ok(_) => {}
                    }
                }
                let path = request_line.split_whitespace().nth(1).unwrap_or("/");
                let response = match path {
                    "/user-guide/" => redirect("/aws/user-guide/"),
                    "/stale/" => redirect("/elsewhere/"),
                    "/aws/user-guide/" => {
                        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
                            .to_string()
                    }
                    _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string(),
                };
                let _ = stream.write_all(response.as_bytes());
                let _ = stream.flush();
            }
        });
        format!("http://{address}")
    }

    fn redirect(location: &str) -> String {
        format!(
            "HTTP/1.1 301 Moved Permanently\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        )
    }

    fn tester(base_url: &str) -> RedirectTester {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("client");
        RedirectTester::with_client(client, base_url, Duration::ZERO)
    }

    #[test]
    fn trailing_slash_is_ignored_when_comparing() {
        assert_eq!(
            comparable_url("https://docs.example.dev/aws/user-guide/"),
            comparable_url("https://docs.example.dev/aws/user-guide")
        );
        assert_eq!(
            comparable_url("http://localhost:4321/"),
            "http://localhost:4321/"
        );
        assert_eq!(
            comparable_url("https://a.dev/x/?q=1#top"),
            "https://a.dev/x?q=1#top"
        );
    }

    #[test]
    fn expected_url_joins_site_paths_only() {
        assert_eq!(
            expected_url("https://staging.dev/", "aws/x/"),
            "https://staging.dev/aws/x/"
        );
        assert_eq!(
            expected_url("https://staging.dev", "https://other.dev/y"),
            "https://other.dev/y"
        );
    }

    #[test]
    fn follows_redirects_and_compares_landing_url() {
        let base = spawn_staging_site();
        let tester = tester(&base);

        let ok = tester.check("aws", "/user-guide/", "/aws/user-guide");
        assert!(ok.success, "{}", ok.message);
        assert_eq!(ok.status_code, 200);
        assert_eq!(ok.final_url, format!("{base}/aws/user-guide/"));

        let wrong = tester.check("aws", "/stale/", "/aws/user-guide/");
        assert!(!wrong.success);
        assert_eq!(wrong.status_code, 404);
        assert!(wrong.message.contains("/elsewhere/"));
    }

    #[test]
    fn run_counts_results_and_pending_rules() {
        let base = spawn_staging_site();
        let mapping = RedirectMapping::parse(
            r#"{"aws": [
                {"old_link": "/user-guide/", "new_link": "/aws/user-guide/"},
                {"old_link": "stale/", "new_link": "/aws/user-guide/"},
                {"old_link": "/todo/", "new_link": "?", "_note": "MANUALLY REVIEW AND UPDATE new_link"}
            ]}"#,
        )
        .expect("mapping");
        let selected = mapping.select(&["aws".to_string()]).expect("select");

        let results = tester(&base).run(&selected);
        assert_eq!(results.total(), 2);
        assert_eq!(results.passed(), 1);
        assert_eq!(results.failed(), 1);
        assert_eq!(results.pending_review, 1);
        assert_eq!(results.success_rate(), Some(50.0));
    }

    #[test]
    fn progress_is_reported_as_each_check_completes() {
        let base = spawn_staging_site();
        let mapping = RedirectMapping::parse(
            r#"{"aws": [
                {"old_link": "/user-guide/", "new_link": "/aws/user-guide/"},
                {"old_link": "/stale/", "new_link": "/aws/user-guide/"}
            ]}"#,
        )
        .expect("mapping");
        let selected = mapping.select(&["aws".to_string()]).expect("select");

        let mut seen = Vec::new();
        let results = tester(&base).run_with_progress(&selected, |index, check| {
            seen.push((index, check.old_url.clone(), check.success));
        });
        assert_eq!(
            seen,
            vec![
                (1, "/user-guide/".to_string(), true),
                (2, "/stale/".to_string(), false),
            ]
        );
        assert_eq!(results.total(), 2);
    }

    #[test]
    fn unreachable_host_is_a_failed_check() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let address = listener.local_addr().expect("addr");
        drop(listener);

        let check = tester(&format!("http://{address}")).check("aws", "/a/", "/b/");
        assert!(!check.success);
        assert_eq!(check.status_code, 0);
        assert!(check.message.starts_with("request"));
    }

    #[test]
    fn report_lists_failures_first() {
        let results = RedirectTestResults {
            checks: vec![
                RedirectCheck {
                    product: "aws".to_string(),
                    old_url: "/a/".to_string(),
                    expected_url: "/aws/a/".to_string(),
                    final_url: "https://s.dev/aws/a/".to_string(),
                    status_code: 200,
                    success: true,
                    message: "redirect successful".to_string(),
                },
                RedirectCheck {
                    product: "aws".to_string(),
                    old_url: "/b/".to_string(),
                    expected_url: "/aws/b/".to_string(),
                    final_url: "https://s.dev/b/".to_string(),
                    status_code: 404,
                    success: false,
                    message: "expected https://s.dev/aws/b/, got https://s.dev/b/".to_string(),
                },
            ],
            pending_review: 0,
        };

        let report = render_report(&results, "https://s.dev", "2026-01-02 03:04:05");
        assert!(report.contains("**Generated:** 2026-01-02 03:04:05"));
        assert!(report.contains("- **Success rate:** 50.0%"));
        let failed_section = report.find("## Failed Tests").expect("failed section");
        let details = report.find("## All Test Details").expect("details");
        assert!(failed_section < details);
        assert!(report.contains("### FAIL AWS: /b/"));
        assert!(report.contains("### PASS AWS: /a/"));
    }

    #[test]
    fn empty_results_have_no_rate() {
        let report = render_report(&RedirectTestResults::default(), "https://s.dev", "now");
        assert!(report.contains("- **Success rate:** N/A"));
        assert!(!report.contains("## Failed Tests"));
    }

    #[test]
    fn written_report_carries_a_timestamp() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("report.md");
        write_report(&RedirectTestResults::default(), "https://s.dev", &path).expect("write");
        let report = std::fs::read_to_string(&path).expect("read");
        let stamp = report
            .lines()
            .find_map(|line| line.strip_prefix("**Generated:** "))
            .expect("generated line");
        assert_eq!(stamp.len(), "2026-01-02 03:04:05".len());
    }
}
