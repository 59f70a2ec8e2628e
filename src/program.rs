use std::time::Duration;

use serde_json::{json, Value};

/// One URL to feed into a remote job, plus the metadata the actor echoes
/// back so results can be matched to store rows.
pub struct Submission {
    pub url: String,
    pub user_data: Value,
}

/// A field-discovery rule set executed remotely against each fetched page,
/// bundled with the job knobs the actor expects. Fixed per pipeline variant;
/// the client never derives these per call.
pub struct ExtractionProgram {
    pub name: &'static str,
    pub actor_id: &'static str,
    page_function: &'static str,
    pub max_concurrency: u32,
    pub max_request_retries: u32,
    pub request_timeout_secs: Option<u32>,
    /// How long to wait for the whole job before giving up on the chunk.
    pub job_timeout: Duration,
}

impl ExtractionProgram {
    /// Directory listing pages: one entry per table row.
    pub fn listing() -> Self {
        Self {
            name: "listing",
            actor_id: "apify/cheerio-scraper",
            page_function: LISTING_PAGE_FN,
            max_concurrency: 5,
            max_request_retries: 3,
            request_timeout_secs: None,
            job_timeout: Duration::from_secs(600),
        }
    }

    /// Company detail pages: websites, phone, address.
    pub fn detail() -> Self {
        Self {
            name: "detail",
            actor_id: "apify/cheerio-scraper",
            page_function: DETAIL_PAGE_FN,
            max_concurrency: 10,
            max_request_retries: 3,
            request_timeout_secs: Some(30),
            job_timeout: Duration::from_secs(1200),
        }
    }

    /// Wider-net variant of `detail` for records the first pass missed.
    pub fn rescrape() -> Self {
        Self {
            name: "rescrape",
            actor_id: "apify/cheerio-scraper",
            page_function: RESCRAPE_PAGE_FN,
            max_concurrency: 10,
            max_request_retries: 5,
            request_timeout_secs: Some(45),
            job_timeout: Duration::from_secs(900),
        }
    }

    pub fn run_input(&self, submissions: &[Submission]) -> Value {
        let start_urls: Vec<Value> = submissions
            .iter()
            .map(|s| {
                json!({
                    "url": s.url,
                    "method": "GET",
                    "userData": s.user_data,
                })
            })
            .collect();

        let mut input = json!({
            "startUrls": start_urls,
            "pageFunction": self.page_function,
            "proxyConfiguration": { "useApifyProxy": true },
            "maxConcurrency": self.max_concurrency,
            "maxRequestRetries": self.max_request_retries,
        });
        if let Some(secs) = self.request_timeout_secs {
            input["requestTimeoutSecs"] = json!(secs);
        }
        input
    }
}

const LISTING_PAGE_FN: &str = r#"
async function pageFunction(context) {
    const { $, request } = context;
    const pageNum = request.userData.pageNum || 1;

    const results = [];
    $('table.enf-list-table tbody tr').each((index, row) => {
        const cells = $(row).find('td');
        if (cells.length < 2) return;

        const nameLink = $(cells[0]).find('a').first();
        const companyName = nameLink.text().trim();
        let detailUrl = nameLink.attr('href') || '';
        if (detailUrl.startsWith('/')) {
            detailUrl = 'https://www.enfsolar.com' + detailUrl;
        }

        const area = $(cells[1]).text().trim();
        const batteryStorage = cells.length > 2 && $(cells[2]).text().trim().toLowerCase() === 'yes' ? 'Yes' : '';

        if (companyName) {
            results.push({
                company_name: companyName,
                area: area,
                battery_storage: batteryStorage,
                detail_url: detailUrl,
                source_page: pageNum
            });
        }
    });

    return results;
}
"#;

const DETAIL_PAGE_FN: &str = r#"
async function pageFunction(context) {
    const { $, request } = context;

    const result = {
        detail_url: request.url,
        entryIndex: request.userData.entryIndex,
        websites: [],
        phone: '',
        address: '',
    };

    // Labelled website links (globe icon or "Website" text nearby)
    $('a').each((i, el) => {
        const $el = $(el);
        const href = $el.attr('href') || '';
        if (!href.startsWith('http')) return;
        if (href.includes('enfsolar.com')) return;
        if (href.includes('facebook.com') || href.includes('twitter.com') ||
            href.includes('linkedin.com') || href.includes('instagram.com') ||
            href.includes('youtube.com') || href.includes('google.com/maps')) return;

        const parentHtml = $el.parent().html() || '';
        if (parentHtml.includes('fa-globe') ||
            parentHtml.includes('fa-external') ||
            parentHtml.toLowerCase().includes('website') ||
            $el.prev().hasClass('fa-globe')) {
            if (!result.websites.includes(href)) {
                result.websites.push(href);
            }
        }
    });

    // Profile table rows
    $('table.table tr, .company-profile tr, .enf-company-profile tr').each((i, row) => {
        const $row = $(row);
        const text = $row.text();
        const lowerText = text.toLowerCase();

        if (lowerText.includes('website')) {
            $row.find('a').each((j, link) => {
                const href = $(link).attr('href') || '';
                if (href.startsWith('http') && !href.includes('enfsolar.com')) {
                    if (!result.websites.includes(href)) {
                        result.websites.push(href);
                    }
                }
            });
        }

        if (lowerText.includes('phone') || lowerText.includes('tel')) {
            const phoneMatch = text.match(/[\+]?[1]?[\s\-\.]?[\(]?\d{3}[\)]?[\s\-\.]?\d{3}[\s\-\.]?\d{4}/);
            if (phoneMatch && !result.phone) {
                result.phone = phoneMatch[0].trim();
            }
        }

        if (lowerText.includes('address') || lowerText.includes('location')) {
            const link = $row.find('a');
            if (link.length && link.attr('href')?.includes('maps')) {
                result.address = link.text().trim();
            } else {
                const tds = $row.find('td');
                if (tds.length > 1) {
                    result.address = $(tds[1]).text().trim();
                }
            }
        }
    });

    // Icon-adjacent fields outside the profile table
    $('p, div').each((i, el) => {
        const $el = $(el);
        const html = $el.html() || '';
        const text = $el.text().trim();

        if (html.includes('fa-globe') && !result.websites.length) {
            const link = $el.find('a[href^="http"]');
            if (link.length) {
                const href = link.attr('href');
                if (href && !href.includes('enfsolar.com')) {
                    result.websites.push(href);
                }
            }
        }

        if (html.includes('fa-phone') && !result.phone) {
            const phoneMatch = text.match(/[\+]?[1]?[\s\-\.]?[\(]?\d{3}[\)]?[\s\-\.]?\d{3}[\s\-\.]?\d{4}/);
            if (phoneMatch) {
                result.phone = phoneMatch[0].trim();
            }
        }

        if (html.includes('fa-map-marker') && !result.address) {
            const link = $el.find('a');
            if (link.length) {
                result.address = link.text().trim();
            } else {
                result.address = text.replace(/^[^a-zA-Z0-9]+/, '').trim();
            }
        }
    });

    // Fallback: external links whose text looks like a site
    const bodyText = $('body').text();
    if (!result.websites.length) {
        $('a[href^="http"]').each((i, el) => {
            const href = $(el).attr('href') || '';
            const text = $(el).text().toLowerCase();

            if (href.includes('enfsolar.com')) return;
            if (href.includes('facebook.com') || href.includes('twitter.com') ||
                href.includes('linkedin.com') || href.includes('google.com')) return;

            if (text.includes('.com') || text.includes('.net') || text.includes('.org') ||
                text.includes('website') || text.includes('visit')) {
                if (!result.websites.includes(href)) {
                    result.websites.push(href);
                }
            }
        });
    }

    if (!result.phone) {
        const phonePattern = /(?:phone|tel|call)[:\s]*([+\d\s\-\(\)\.]{10,20})/gi;
        const match = phonePattern.exec(bodyText);
        if (match) {
            result.phone = match[1].trim();
        }
    }

    result.websites = [...new Set(result.websites)];

    return result;
}
"#;

const RESCRAPE_PAGE_FN: &str = r#"
async function pageFunction(context) {
    const { $, request } = context;

    const result = {
        detail_url: request.url,
        entryIndex: request.userData.entryIndex,
        websites: [],
        phone: '',
        address: '',
    };

    const allLinks = [];
    $('a[href]').each((i, el) => {
        const href = $(el).attr('href') || '';
        if (href.startsWith('http') && !href.includes('enfsolar.com')) {
            allLinks.push({
                href: href,
                text: $(el).text().trim().toLowerCase(),
                parentText: $(el).parent().text().toLowerCase().slice(0, 100),
                hasGlobe: $(el).prev().hasClass('fa') || ($(el).parent().html() || '').includes('fa-globe')
            });
        }
    });

    const socialDomains = [
        'facebook.com', 'twitter.com', 'linkedin.com', 'instagram.com',
        'youtube.com', 'pinterest.com', 'tiktok.com', 'yelp.com',
        'google.com', 'bbb.org', 'trustpilot.com', 'angieslist.com',
        'homeadvisor.com', 'thumbtack.com', 'apple.com', 'play.google.com'
    ];

    for (const link of allLinks) {
        const isSocial = socialDomains.some(d => link.href.toLowerCase().includes(d));
        if (isSocial) continue;

        const isWebsiteIndicator =
            link.hasGlobe ||
            link.parentText.includes('website') ||
            link.parentText.includes('web:') ||
            link.text.includes('website') ||
            link.text.includes('visit') ||
            link.text.includes('.com') ||
            link.text.includes('.net') ||
            link.text.includes('.org') ||
            link.text.includes('.us') ||
            link.text.includes('.io');

        if (isWebsiteIndicator && !result.websites.includes(link.href)) {
            result.websites.push(link.href);
        }
    }

    // Last resort: any external non-social, non-CDN link
    if (!result.websites.length) {
        for (const link of allLinks) {
            const isSocial = socialDomains.some(d => link.href.toLowerCase().includes(d));
            if (!isSocial && !result.websites.includes(link.href)) {
                const skipDomains = ['cloudflare', 'amazonaws', 'googleapi', 'gstatic',
                                     'cloudfront', 'jsdelivr', 'cdnjs', 'jquery'];
                const isSkip = skipDomains.some(d => link.href.includes(d));
                if (!isSkip) {
                    result.websites.push(link.href);
                }
            }
        }
    }

    const bodyText = $('body').text();
    const phoneMatch = bodyText.match(/\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}/);
    if (phoneMatch) {
        result.phone = phoneMatch[0].trim();
    }

    $('div, p, span').each((i, el) => {
        const html = $(el).html() || '';
        if (html.includes('fa-map-marker') && !result.address) {
            const link = $(el).find('a');
            if (link.length) {
                result.address = link.text().trim();
            }
        }
    });

    result.websites = [...new Set(result.websites)];

    return result;
}
"#;

// ── Tests ──
