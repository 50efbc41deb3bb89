use std::net::IpAddr;

/// Source allow-filter. Accepts everything when no address is configured,
/// otherwise only an exact textual match of the sender's address.
pub fn accept(source: IpAddr, filter: Option<&str>) -> bool {
    match filter {
        Some(expected) => source.to_string() == expected,
        None           => true,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn no_filter_accepts_everything() {
        assert!(accept(ip("192.0.2.11"), None));
    }

    #[test]
    fn exact_match_only() {
        assert!(accept(ip("192.0.2.10"), Some("192.0.2.10")));
        assert!(!accept(ip("192.0.2.11"), Some("192.0.2.10")));
        assert!(!accept(ip("192.0.2.1"), Some("192.0.2.10")));
    }
}
