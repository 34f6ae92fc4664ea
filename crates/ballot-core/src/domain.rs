//! Domain permutations of a link's URL.
//!
//! A link to `https://a.b.example.com/x` belongs to the listings of
//! `a.b.example.com`, `b.example.com` and `example.com`. Links without a URL,
//! with an IP-address host, or with a single-label host have no domain.

use url::{Host, Url};

/// The lowercase hostname of `raw`, if it has a usable domain.
pub fn hostname(raw: &str) -> Option<String> {
  let url = Url::parse(raw).ok()?;
  match url.host()? {
    Host::Domain(d) => {
      let d = d.trim_end_matches('.').to_ascii_lowercase();
      d.contains('.').then_some(d)
    }
    Host::Ipv4(_) | Host::Ipv6(_) => None,
  }
}

/// Every suffix of the hostname with at least two labels, longest first.
pub fn domain_permutations(raw: &str) -> Vec<String> {
  let Some(host) = hostname(raw) else {
    return Vec::new();
  };
  let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
  (0..labels.len().saturating_sub(1))
    .map(|start| labels[start..].join("."))
    .collect()
}
