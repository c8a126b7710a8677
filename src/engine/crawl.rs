use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::http::{describe_error, describe_status, probe_client};
use super::{Connector, parse_descriptor_url};
use crate::errors::EngineFault;
use crate::probe::{EndpointType, ProbeDescriptor, ProbeOutcome, Verdict, status_line};

const MAX_BUDGET_MARGIN: Duration = Duration::from_millis(500);
/// Follow-up pages are not started with less time than this left.
const MIN_PAGE_TIME: Duration = Duration::from_millis(50);

/// Breadth-first walk over same-origin links, starting at the descriptor URL.
pub struct CrawlConnector {
    descriptor: ProbeDescriptor,
    client: Client,
    max_pages: usize,
}

impl CrawlConnector {
    pub fn new(descriptor: ProbeDescriptor, max_pages: usize) -> Result<Self, EngineFault> {
        let client = probe_client(descriptor.timeout())?;
        Ok(Self {
            descriptor,
            client,
            max_pages: max_pages.max(1),
        })
    }
}

/// Absolute http(s) links found in `href` attributes, fragments removed.
pub fn extract_links(base: &Url, html: &str) -> Vec<Url> {
    let mut links = Vec::new();
    let mut rest = html;
    while let Some(index) = rest.find("href=") {
        rest = &rest[index + 5..];
        let Some(quote) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            continue;
        };
        rest = &rest[1..];
        let Some(end) = rest.find(quote) else {
            break;
        };
        let target = rest[..end].trim();
        rest = &rest[end + 1..];

        if let Ok(mut link) = base.join(target) {
            if matches!(link.scheme(), "http" | "https") {
                link.set_fragment(None);
                links.push(link);
            }
        }
    }
    links
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Time kept back from the probe timeout so the crawl reports its own result
/// before the caller's bound on the connector elapses.
fn crawl_budget(timeout: Duration) -> Duration {
    timeout.saturating_sub((timeout / 10).min(MAX_BUDGET_MARGIN))
}

#[async_trait]
impl Connector for CrawlConnector {
    async fn run(self: Box<Self>) -> Result<ProbeOutcome, EngineFault> {
        let descriptor = &self.descriptor;
        let mut start_url = parse_descriptor_url(descriptor)?;
        if let Some(port) = descriptor.port {
            start_url.set_port(Some(port)).map_err(|_| {
                EngineFault::InvalidDescriptor(format!("cannot set port on '{start_url}'"))
            })?;
        }

        let budget = crawl_budget(descriptor.timeout());
        let started = Instant::now();
        let first = match self
            .client
            .get(start_url.clone())
            .timeout(budget)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(ProbeOutcome::timed_out(descriptor)),
            Err(e) => {
                return Ok(ProbeOutcome::unmeasured(
                    status_line(EndpointType::CrawlSite, Verdict::Failure, &describe_error(e)),
                    descriptor.timeout_ms,
                ));
            }
        };
        let first_response = started.elapsed();

        if !first.status().is_success() {
            return Ok(ProbeOutcome::measured(
                false,
                first_response,
                status_line(
                    EndpointType::CrawlSite,
                    Verdict::Failure,
                    &format!("Start page returned {}", describe_status(first.status())),
                ),
                descriptor.timeout_ms,
            ));
        }

        let mut visited: HashSet<Url> = HashSet::from([start_url.clone()]);
        let mut queue: VecDeque<Url> = VecDeque::new();
        let mut crawled = 1usize;
        let mut failed = 0usize;

        let page_url = first.url().clone();
        let body = first.text().await.unwrap_or_default();
        enqueue(&start_url, &page_url, &body, &mut visited, &mut queue);

        while crawled + failed < self.max_pages {
            let remaining = budget.saturating_sub(started.elapsed());
            if remaining < MIN_PAGE_TIME {
                debug!("crawl budget spent with {} pages queued", queue.len());
                break;
            }
            let Some(url) = queue.pop_front() else {
                break;
            };
            match self.client.get(url.clone()).timeout(remaining).send().await {
                Ok(response) if response.status().is_success() => {
                    let page_url = response.url().clone();
                    match response.text().await {
                        Ok(body) => {
                            crawled += 1;
                            enqueue(&start_url, &page_url, &body, &mut visited, &mut queue);
                        }
                        Err(e) => {
                            debug!("crawl {url} body failed: {}", describe_error(e));
                            failed += 1;
                        }
                    }
                }
                Ok(response) => {
                    debug!("crawl {url} returned {}", response.status());
                    failed += 1;
                }
                Err(e) => {
                    debug!("crawl {url} failed: {}", describe_error(e));
                    failed += 1;
                }
            }
        }

        Ok(ProbeOutcome::measured(
            true,
            first_response,
            status_line(
                EndpointType::CrawlSite,
                Verdict::Success,
                &format!("Crawled {crawled} pages, {failed} failed"),
            ),
            descriptor.timeout_ms,
        ))
    }
}

/// Queue unseen links of a page. Relative links resolve against `page`, the
/// page they were found on; only links sharing `origin`'s origin are kept.
fn enqueue(
    origin: &Url,
    page: &Url,
    body: &str,
    visited: &mut HashSet<Url>,
    queue: &mut VecDeque<Url>,
) {
    for link in extract_links(page, body) {
        if same_origin(origin, &link) && visited.insert(link.clone()) {
            queue.push_back(link);
        }
    }
}
